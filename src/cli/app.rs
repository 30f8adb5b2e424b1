//! CLI module for the murmur application
//!
//! This module binds the command-line interface to the idea store and the
//! audio recorder.
use std::{
    fs::{read_to_string, OpenOptions},
    io::{stdin, stdout, Write},
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use chrono::Local;
use log::{debug, info};
use shell_words::split;
use tempfile::Builder;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    content_preview, format_timestamp, AudioDevice, AudioRecorder, ClipRef, Commands, Config,
    ConfiguredDevice, ConsoleNotifier, FileKeyValueStore, IdeaRepository, IdeaStore,
    MurmurError, Note, NoteId, Result,
};

/// CLI Application handler - processes CLI commands against the idea store
pub struct App {
    /// The murmur collection, draft and view state
    pub(crate) store: IdeaStore,

    /// Microphone capture and playback
    pub(crate) recorder: AudioRecorder<ConfiguredDevice>,

    /// Application configuration
    config: Config,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Opens the configured data directory and loads the stored murmurs.
    pub fn new(config: Config, verbose: bool) -> Result<Self> {
        info!(
            "Opening murmurs in {} under key '{}'",
            config.data_dir.display(),
            config.storage_key
        );

        let backend = FileKeyValueStore::open(&config.data_dir)?;
        let repository = IdeaRepository::new(Box::new(backend), config.storage_key.clone());
        let mut store = IdeaStore::new(repository, Box::new(ConsoleNotifier));
        store.load();

        let recorder = AudioRecorder::new(ConfiguredDevice::from_config(&config));

        Ok(Self::from_parts(store, recorder, config, verbose))
    }

    pub fn from_parts(
        store: IdeaStore,
        recorder: AudioRecorder<ConfiguredDevice>,
        config: Config,
        verbose: bool,
    ) -> Self {
        Self {
            store,
            recorder,
            config,
            verbose,
        }
    }

    pub fn store(&self) -> &IdeaStore {
        &self.store
    }

    pub fn recorder(&self) -> &AudioRecorder<ConfiguredDevice> {
        &self.recorder
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Add {
                title,
                content,
                edit,
                audio,
            } => self.handle_add(title, content, edit, audio)?,

            Commands::List { limit, json, brief } => {
                self.store.set_search_query("");
                self.list_view(limit, json, brief)?
            }

            Commands::Search { query, limit, json } => {
                self.store.set_search_query(query);
                self.list_view(limit, json, false)?
            }

            Commands::Show { id, json } => self.handle_show(id, json)?,

            Commands::Edit {
                id,
                title,
                content,
                edit,
                audio,
                remove_audio,
            } => self.handle_edit(id, title, content, edit, audio, remove_audio)?,

            Commands::Delete { id, force } => self.handle_delete(id, force)?,

            Commands::Record { title, content } => self.handle_record(title, content).await?,

            Commands::Play { id } => self.handle_play(id).await?,

            Commands::Shell => self.run_shell().await?,

            Commands::Config { .. } => {
                return Err(MurmurError::ApplicationError {
                    message: "Configuration commands are handled before the store is opened"
                        .to_string(),
                })
            }
        }

        Ok(())
    }

    fn handle_add(
        &mut self,
        title: String,
        content: Option<String>,
        edit: bool,
        audio: Option<PathBuf>,
    ) -> Result<()> {
        let content = match content {
            Some(content) => content,
            None if edit => self.open_editor_for_content(&title, "")?,
            None => String::new(),
        };

        self.store.set_draft_title(title);
        self.store.set_draft_content(content);
        if let Some(path) = audio {
            self.store.set_draft_audio(Some(clip_from_file(&path)?));
        }

        let id = self.store.save()?;
        println!("Murmur created with ID: {}", id);
        Ok(())
    }

    fn handle_edit(
        &mut self,
        id: NoteId,
        title: Option<String>,
        content: Option<String>,
        edit: bool,
        audio: Option<PathBuf>,
        remove_audio: bool,
    ) -> Result<()> {
        if content.is_some() && edit {
            return Err(MurmurError::ApplicationError {
                message: "Cannot specify both --content and --edit options".to_string(),
            });
        }

        if !self.store.select(id) {
            return Err(MurmurError::NoteNotFound { id });
        }
        let previous_clip = self.store.draft().audio_reference.clone();

        if let Some(title) = title {
            self.store.set_draft_title(title);
        }

        if let Some(content) = content {
            self.store.set_draft_content(content);
        } else if edit {
            let draft = self.store.draft().clone();
            let content = self.open_editor_for_content(&draft.title, &draft.content)?;
            self.store.set_draft_content(content);
        }

        if let Some(path) = audio {
            self.store.set_draft_audio(Some(clip_from_file(&path)?));
        } else if remove_audio {
            self.store.set_draft_audio(None);
        }

        let new_clip = self.store.draft().audio_reference.clone();
        if let Err(e) = self.store.save() {
            // Leave the store as if the edit had been abandoned.
            self.store.toggle_editor();
            return Err(e);
        }

        if previous_clip != new_clip {
            self.release_saved_clip(previous_clip);
        }

        println!("Murmur {} updated", id);
        Ok(())
    }

    fn handle_show(&self, id: NoteId, json: bool) -> Result<()> {
        let note = self
            .store
            .get(id)
            .ok_or(MurmurError::NoteNotFound { id })?;

        if json {
            println!("{}", serde_json::to_string_pretty(note)?);
            return Ok(());
        }

        println!(
            "ID: {} | {}",
            note.id,
            format_timestamp(note.created_at, Local::now())
        );
        println!("Title: {}", console::style(&note.title).bold());
        if let Some(clip) = &note.audio_reference {
            println!("Audio: {}", console::style(clip).cyan());
        }
        if !note.content.is_empty() {
            println!("\n{}", note.content);
        }
        Ok(())
    }

    /// Two-phase delete: stage, ask, then confirm or cancel.
    fn handle_delete(&mut self, id: NoteId, force: bool) -> Result<()> {
        let note = self
            .store
            .get(id)
            .cloned()
            .ok_or(MurmurError::NoteNotFound { id })?;

        self.store.request_delete(id);

        if !force {
            println!("You are about to delete the following murmur:");
            println!("ID:      {}", note.id);
            println!("Title:   {}", note.title);
            println!(
                "Created: {}",
                format_timestamp(note.created_at, Local::now())
            );
            let preview = content_preview(&note.content, 100);
            if !preview.is_empty() {
                println!("\n{}", preview);
            }

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this murmur? [y/N]: ");
            stdout().flush().map_err(MurmurError::Io)?;

            let mut input = String::new();
            stdin().read_line(&mut input).map_err(MurmurError::Io)?;

            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                self.store.cancel_delete();
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        if self.store.confirm_delete().is_some() {
            self.release_saved_clip(note.audio_reference);
        }
        Ok(())
    }

    async fn handle_record(&mut self, title: String, content: Option<String>) -> Result<()> {
        self.store.set_draft_title(title);
        self.store.set_draft_content(content.unwrap_or_default());
        if self.store.draft().title.trim().is_empty() {
            // Reports the validation failure without recording anything.
            return self.store.save().map(|_| ());
        }

        self.recorder.start_recording().await?;
        println!("Recording... press Enter to stop");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.recorder.tick();
                    print!("\r{} {}", console::style("●").red(), self.recorder.elapsed_display());
                    stdout().flush().map_err(MurmurError::Io)?;
                }
                line = lines.next_line() => {
                    line?;
                    break;
                }
            }
        }

        let clip = self.recorder.stop_recording().await?;
        println!("\rRecorded {}", self.recorder.elapsed_display());

        self.store.set_draft_audio(Some(clip));
        match self.store.save() {
            Ok(id) => {
                self.recorder.commit();
                println!("Murmur created with ID: {}", id);
                Ok(())
            }
            Err(e) => {
                self.recorder.discard();
                Err(e)
            }
        }
    }

    async fn handle_play(&mut self, id: NoteId) -> Result<()> {
        let note = self
            .store
            .get(id)
            .ok_or(MurmurError::NoteNotFound { id })?;
        let clip = note
            .audio_reference
            .clone()
            .ok_or_else(|| MurmurError::ApplicationError {
                message: format!("Murmur {} has no recording", id),
            })?;

        self.recorder.adopt(clip);
        self.recorder.play()?;
        println!("Playing '{}'... press Enter to stop", note.title);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        tokio::select! {
            _ = self.recorder.wait_for_playback() => println!("Finished."),
            line = lines.next_line() => {
                line?;
                self.recorder.stop();
                println!("Stopped.");
            }
        }
        Ok(())
    }

    /// Releases the clip file of a murmur that no longer references it.
    pub(crate) fn release_saved_clip(&mut self, clip: Option<ClipRef>) {
        if let Some(clip) = clip {
            if self.store.ideas().iter().any(|n| n.audio_reference.as_ref() == Some(&clip)) {
                debug!("Clip {} is still referenced, keeping it", clip);
                return;
            }
            self.recorder.device_mut().release_clip(&clip);
        }
    }

    fn list_view(&self, limit: usize, json: bool, brief: bool) -> Result<()> {
        let mut notes = self.store.filtered_ideas();
        if limit > 0 && notes.len() > limit {
            notes.truncate(limit);
        }

        if notes.is_empty() {
            if json {
                println!("[]");
            } else {
                println!("{}", self.empty_message());
            }
            return Ok(());
        }

        if json {
            self.display_notes_json(&notes, brief)?;
        } else {
            self.display_notes_text(&notes, brief);
            println!(
                "\n{} murmur{}",
                notes.len(),
                if notes.len() == 1 { "" } else { "s" }
            );
        }
        Ok(())
    }

    pub(crate) fn empty_message(&self) -> &'static str {
        if self.store.is_searching() {
            "No murmurs match your search"
        } else {
            "No murmurs yet. Create your first one!"
        }
    }

    /// Display notes in JSON format
    fn display_notes_json(&self, notes: &[&Note], brief: bool) -> Result<()> {
        if brief {
            let simplified: Vec<serde_json::Value> = notes
                .iter()
                .map(|note| {
                    serde_json::json!({
                        "id": note.id,
                        "title": note.title,
                        "timestamp": note.created_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&simplified)?);
        } else {
            println!("{}", serde_json::to_string_pretty(notes)?);
        }
        Ok(())
    }

    /// Display notes in text format
    pub(crate) fn display_notes_text(&self, notes: &[&Note], brief: bool) {
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);
        let now = Local::now();

        for (i, note) in notes.iter().enumerate() {
            if brief {
                println!("{}  {}", note.id, note.title);
                continue;
            }

            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let audio_marker = if note.has_audio { " ♪" } else { "" };
            println!(
                "{}{}",
                console::style(&note.title).bold(),
                console::style(audio_marker).cyan()
            );

            let preview = content_preview(&note.content, term_width.saturating_sub(4).min(100));
            if !preview.is_empty() {
                println!("{}", preview);
            }

            println!(
                "{}",
                console::style(format!(
                    "ID: {} | {}",
                    note.id,
                    format_timestamp(note.created_at, now)
                ))
                .dim()
            );
        }
    }

    fn open_editor_for_content(&self, title: &str, initial: &str) -> Result<String> {
        let temp_file = Builder::new().suffix(".md").tempfile()?;
        let temp_path = temp_file.path().to_path_buf();

        let editor_cmd = self.config.get_editor_command();
        self.write_editor_template(&temp_path, title, initial)?;

        info!("Opening editor to write murmur details. Save and exit when done...");
        if self.verbose {
            println!("Launching editor: {}", editor_cmd);
        }
        self.launch_editor(&editor_cmd, &temp_path)?;

        let content = read_to_string(&temp_path)?;
        Ok(self.process_editor_content(content))
    }

    fn write_editor_template(&self, path: &Path, title: &str, initial: &str) -> Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;

        writeln!(file, "<!-- {} -->", title)?;
        writeln!(file, "<!-- ")?;
        writeln!(file, "Write the details of your murmur below.")?;
        writeln!(
            file,
            "Lines that start with <!-- and end with --> are comments and will be ignored."
        )?;
        writeln!(file, "Save and exit the editor when you're done.")?;
        writeln!(file, "-->")?;
        if !initial.is_empty() {
            writeln!(file, "{}", initial)?;
        }

        Ok(())
    }

    fn launch_editor(&self, editor_cmd: &str, file_path: &Path) -> Result<()> {
        let path_str = file_path.to_string_lossy();

        let args = split(editor_cmd).map_err(|e| MurmurError::EditorError {
            message: format!("Failed to parse editor command: {}", e),
        })?;

        let Some((program, rest)) = args.split_first() else {
            return Err(MurmurError::EditorError {
                message: "Empty editor command".to_string(),
            });
        };

        let status = Command::new(program)
            .args(rest)
            .arg(path_str.as_ref())
            .status()?;

        if !status.success() {
            return Err(MurmurError::EditorError {
                message: "Editor exited with non-zero status".to_string(),
            });
        }

        Ok(())
    }

    /// Drops `<!-- ... -->` comment lines and blocks left by the template.
    fn process_editor_content(&self, content: String) -> String {
        let mut in_comment = false;
        content
            .lines()
            .filter(|line| {
                let trimmed = line.trim();
                if in_comment {
                    in_comment = !trimmed.ends_with("-->");
                    return false;
                }
                if trimmed.starts_with("<!--") {
                    in_comment = !trimmed.ends_with("-->");
                    return false;
                }
                true
            })
            .collect::<Vec<&str>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// Handles `murmur config`; runs without opening the store.
pub fn run_config_command(
    config: &mut Config,
    config_path: &Path,
    show: bool,
    set: Option<String>,
    reset: bool,
) -> Result<()> {
    let nothing_requested = !show && set.is_none() && !reset;

    if reset {
        *config = Config::default();
        config.save(config_path)?;
        println!("Configuration reset to defaults");
    }

    if let Some(assignment) = set {
        config.set(&assignment)?;
        config.save(config_path)?;
        println!("Updated {}", assignment);
    }

    if show || nothing_requested {
        println!("# {}", config_path.display());
        println!("{}", serde_json::to_string_pretty(config)?);
    }

    Ok(())
}

/// References an existing audio file as a clip.
fn clip_from_file(path: &Path) -> Result<ClipRef> {
    if !path.is_file() {
        return Err(MurmurError::ApplicationError {
            message: format!("Audio file not found: {}", path.display()),
        });
    }

    let path = path.canonicalize()?;
    Ok(ClipRef::new(path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectingNotifier, MemoryDevice, MemoryKeyValueStore};

    fn app() -> (App, CollectingNotifier) {
        let notifier = CollectingNotifier::new();
        let repo = IdeaRepository::new(Box::new(MemoryKeyValueStore::new()), "ideas");
        let store = IdeaStore::new(repo, Box::new(notifier.clone()));
        let recorder = AudioRecorder::new(ConfiguredDevice::Memory(MemoryDevice::new()));
        (
            App::from_parts(store, recorder, Config::default(), false),
            notifier,
        )
    }

    #[tokio::test]
    async fn add_then_forced_delete() {
        let (mut app, notifier) = app();

        app.run(Commands::Add {
            title: "Trip idea".to_string(),
            content: Some("pack light".to_string()),
            edit: false,
            audio: None,
        })
        .await
        .unwrap();
        let id = app.store().ideas()[0].id;

        app.run(Commands::Delete { id, force: true }).await.unwrap();

        assert!(app.store().ideas().is_empty());
        assert!(!app.store().is_delete_dialog_open());
        assert_eq!(
            notifier.last().unwrap().description,
            "Murmur deleted successfully!"
        );
    }

    #[tokio::test]
    async fn edit_unknown_id_is_not_found() {
        let (mut app, _) = app();

        let err = app
            .run(Commands::Edit {
                id: 42,
                title: Some("x".to_string()),
                content: None,
                edit: false,
                audio: None,
                remove_audio: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MurmurError::NoteNotFound { id: 42 }));
    }

    #[tokio::test]
    async fn edit_with_blank_title_leaves_note_and_editor_untouched() {
        let (mut app, _) = app();
        app.run(Commands::Add {
            title: "Keep me".to_string(),
            content: None,
            edit: false,
            audio: None,
        })
        .await
        .unwrap();
        let id = app.store().ideas()[0].id;

        let err = app
            .run(Commands::Edit {
                id,
                title: Some("   ".to_string()),
                content: None,
                edit: false,
                audio: None,
                remove_audio: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MurmurError::Validation { .. }));
        assert_eq!(app.store().get(id).unwrap().title, "Keep me");
        assert!(!app.store().is_editor_visible());
        assert_eq!(app.store().selected_id(), None);
    }

    #[test]
    fn attaching_missing_audio_file_fails() {
        let err = clip_from_file(Path::new("/definitely/not/here.pcm")).unwrap_err();
        assert!(matches!(err, MurmurError::ApplicationError { .. }));
    }

    #[test]
    fn editor_comments_are_stripped() {
        let (app, _) = app();
        let cleaned = app.process_editor_content(
            "<!-- Title -->\n<!-- \nignored help\n-->\nreal line\nsecond\n".to_string(),
        );
        assert_eq!(cleaned, "real line\nsecond");
    }
}
