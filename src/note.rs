//! Core data structures for the murmur application.
//!
//! This module contains the persisted `Note` record, the `Draft` under
//! edit and the opaque `ClipRef` handle to a captured recording.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Note identifiers are creation timestamps in epoch milliseconds.
pub type NoteId = i64;

/// Opaque handle to a captured audio clip.
///
/// Playable through the audio device that produced it, but not guaranteed
/// to survive a restart unless the backend keeps the clip on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipRef(String);

impl ClipRef {
    pub fn new(reference: impl Into<String>) -> Self {
        ClipRef(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a single murmur in our system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier, assigned at creation time
    pub id: NoteId,
    /// Note title, never blank once saved
    pub title: String,
    /// Free text, may be empty
    pub content: String,
    /// Recorded clip attached to the note
    #[serde(
        rename = "audioUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_reference: Option<ClipRef>,
    /// True iff `audio_reference` is set
    #[serde(rename = "hasAudio", default)]
    pub has_audio: bool,
    /// Creation time in epoch milliseconds; doubles as the sort key
    #[serde(rename = "timestamp")]
    pub created_at: i64,
}

impl Note {
    /// Creates a note from a validated draft, trimming title and content.
    pub fn from_draft(id: NoteId, created_at: i64, draft: &Draft) -> Self {
        Note {
            id,
            title: draft.title.trim().to_string(),
            content: draft.content.trim().to_string(),
            audio_reference: draft.audio_reference.clone(),
            has_audio: draft.has_audio,
            created_at,
        }
    }

    /// Overwrites everything except identity with the draft's fields.
    pub fn apply_draft(&mut self, draft: &Draft) {
        self.title = draft.title.trim().to_string();
        self.content = draft.content.trim().to_string();
        self.audio_reference = draft.audio_reference.clone();
        self.has_audio = draft.has_audio;
    }

    /// Case-insensitive substring match against title or content.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.content.to_lowercase().contains(needle)
    }
}

/// The single note-shaped object currently under edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub content: String,
    pub audio_reference: Option<ClipRef>,
    pub has_audio: bool,
}

impl Draft {
    pub fn from_note(note: &Note) -> Self {
        Draft {
            title: note.title.clone(),
            content: note.content.clone(),
            audio_reference: note.audio_reference.clone(),
            has_audio: note.has_audio,
        }
    }

    pub fn set_audio(&mut self, reference: Option<ClipRef>) {
        self.has_audio = reference.is_some();
        self.audio_reference = reference;
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.content.is_empty() && self.audio_reference.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_storage_field_names() {
        let note = Note {
            id: 1700000000000,
            title: "Trip idea".to_string(),
            content: String::new(),
            audio_reference: Some(ClipRef::new("clips/a.pcm")),
            has_audio: true,
            created_at: 1700000000000,
        };

        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["audioUrl"], "clips/a.pcm");
        assert_eq!(value["hasAudio"], true);
        assert_eq!(value["timestamp"], 1700000000000i64);
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn optional_audio_fields_default_when_absent() {
        let json = r#"{"id":5,"title":"t","content":"c","timestamp":5}"#;
        let note: Note = serde_json::from_str(json).unwrap();

        assert_eq!(note.audio_reference, None);
        assert!(!note.has_audio);

        let back = serde_json::to_value(&note).unwrap();
        assert!(back.get("audioUrl").is_none());
    }

    #[test]
    fn draft_audio_flag_tracks_reference() {
        let mut draft = Draft::default();
        draft.set_audio(Some(ClipRef::new("memory://clip-1")));
        assert!(draft.has_audio);

        draft.set_audio(None);
        assert!(!draft.has_audio);
        assert!(draft.audio_reference.is_none());
    }

    #[test]
    fn matches_title_or_content() {
        let note = Note {
            id: 1,
            title: "Trip idea".to_string(),
            content: "Book a Hotel".to_string(),
            audio_reference: None,
            has_audio: false,
            created_at: 1,
        };

        assert!(note.matches("trip"));
        assert!(note.matches("hotel"));
        assert!(!note.matches("train"));
    }
}
