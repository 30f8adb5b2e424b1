use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    rc::Rc,
};

use log::{debug, error, info, trace, warn};
use tempfile::NamedTempFile;

use crate::{MurmurError, Note, Result};

/// String-keyed, string-valued persistence with whole-value overwrite.
pub trait KeyValueStore {
    /// Returns the stored value, or `None` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrites the stored value unconditionally.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Creates the store, making sure the directory exists.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            debug!("Data directory does not exist, creating: {}", dir.display());
            fs::create_dir_all(&dir).map_err(|e| {
                error!("Failed to create data directory: {}", e);
                MurmurError::DirectoryError { path: dir.clone() }
            })?;
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            trace!("No value stored at {}", path.display());
            return Ok(None);
        }

        let value = fs::read_to_string(&path).map_err(|e| {
            error!("Failed to read {}: {}", path.display(), e);
            MurmurError::Io(e)
        })?;
        Ok(Some(value))
    }

    /// Writes through a temporary file in the same directory so a crash
    /// never leaves a half-written value behind.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);

        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            MurmurError::Io(e)
        })?;

        temp_file.write_all(value.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            MurmurError::Io(e)
        })?;

        temp_file.flush().map_err(|e| {
            error!("Failed to flush temporary file: {}", e);
            MurmurError::Io(e)
        })?;

        temp_file.persist(&path).map_err(|e| {
            error!("Failed to persist file {}: {}", path.display(), e.error);
            MurmurError::Io(e.error)
        })?;

        trace!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

/// In-process map; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Reads and writes the whole murmur collection as one JSON array under
/// a fixed key. Last writer wins.
pub struct IdeaRepository {
    backend: Box<dyn KeyValueStore>,
    key: String,
}

impl IdeaRepository {
    pub fn new(backend: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Decodes the stored collection.
    ///
    /// A key that was never written yields an empty collection. A value
    /// that does not decode yields `PersistenceDecode`.
    pub fn read_all(&self) -> Result<Vec<Note>> {
        let raw = match self.backend.get(&self.key)? {
            Some(raw) => raw,
            None => {
                debug!("Nothing stored under '{}', starting empty", self.key);
                return Ok(Vec::new());
            }
        };

        let notes: Vec<Note> = serde_json::from_str(&raw).map_err(|e| {
            warn!("Stored value under '{}' is malformed: {}", self.key, e);
            MurmurError::PersistenceDecode {
                key: self.key.clone(),
                message: e.to_string(),
            }
        })?;

        info!("Loaded {} murmurs from '{}'", notes.len(), self.key);
        Ok(notes)
    }

    pub fn write_all(&self, notes: &[Note]) -> Result<()> {
        let json = serde_json::to_string(notes).map_err(|e| {
            error!("Failed to serialize murmurs: {}", e);
            MurmurError::Serialization(e)
        })?;

        self.backend.set(&self.key, &json)?;
        debug!("Persisted {} murmurs under '{}'", notes.len(), self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClipRef;

    fn sample(id: i64, title: &str) -> Note {
        Note {
            id,
            title: title.to_string(),
            content: format!("{} details", title),
            audio_reference: None,
            has_audio: false,
            created_at: id,
        }
    }

    #[test]
    fn missing_key_reads_as_empty() {
        let repo = IdeaRepository::new(Box::new(MemoryKeyValueStore::new()), "ideas");
        assert!(repo.read_all().unwrap().is_empty());
    }

    #[test]
    fn malformed_value_is_a_decode_error() {
        let kv = MemoryKeyValueStore::new();
        kv.set("ideas", "{not json").unwrap();
        let repo = IdeaRepository::new(Box::new(kv), "ideas");

        match repo.read_all() {
            Err(MurmurError::PersistenceDecode { key, .. }) => assert_eq!(key, "ideas"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn file_store_round_trips_collection() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKeyValueStore::open(dir.path().join("data")).unwrap();
        let repo = IdeaRepository::new(Box::new(kv.clone()), "ideas");

        let mut with_audio = sample(2, "Voice memo");
        with_audio.audio_reference = Some(ClipRef::new("clips/2.pcm"));
        with_audio.has_audio = true;
        let notes = vec![sample(1, "First"), with_audio];

        repo.write_all(&notes).unwrap();
        assert!(kv.dir().join("ideas.json").exists());
        assert_eq!(repo.read_all().unwrap(), notes);
    }

    #[test]
    fn write_all_overwrites_previous_value() {
        let kv = MemoryKeyValueStore::new();
        let repo = IdeaRepository::new(Box::new(kv.clone()), "ideas");

        repo.write_all(&[sample(1, "a"), sample(2, "b")]).unwrap();
        repo.write_all(&[sample(3, "c")]).unwrap();

        let stored = repo.read_all().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, 3);
    }
}
