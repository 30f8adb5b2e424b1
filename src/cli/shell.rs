//! Interactive session: one line per action against the draft, the list,
//! the delete prompt and the recorder.
use std::{
    io::{stdout, Write},
    time::Duration,
};

use log::debug;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};

use crate::{
    App, ConsoleNotifier, MurmurError, NoteId, Notification, Notifier, Result, StoreChange,
};

const TICK: Duration = Duration::from_secs(1);

const HELP: &str = "\
Commands:
  list                 show murmurs matching the current search
  search [text]        set the search query (empty clears it)
  new                  start a fresh draft
  title <text>         set the draft title
  content <text>       set the draft details
  draft                show the draft and recorder state
  record               start recording a voice clip
  stop                 stop recording and attach the clip
  play                 play the draft's clip
  halt                 stop playback
  discard              drop the draft's clip
  save                 save the draft
  select <id>          load a murmur into the draft for editing
  delete <id>          ask to delete a murmur
  yes | no             answer the delete prompt
  toggle               open or close the editor (closing drops the draft)
  help                 show this help
  quit                 leave the session";

/// What the session loop should do after a line has been handled.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

impl App {
    /// Runs the interactive session until `quit` or end of input.
    pub async fn run_shell(&mut self) -> Result<()> {
        let subscription = self.store.subscribe(|store, change| {
            debug!("Store change: {:?}", change);
            if let StoreChange::DeleteRequested(id) = change {
                if let Some(note) = store.get(id) {
                    println!("Delete '{}' ({})? Answer yes or no.", note.title, id);
                }
            }
        });

        println!("Murmur shell. Type 'help' for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = recording_ticker();
        self.prompt()?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match self.step(&line, &mut ticker).await {
                        Ok(Flow::Quit) => break,
                        Ok(Flow::Continue) => {}
                        Err(e) => report(&e),
                    }
                    self.prompt()?;
                }
                _ = ticker.tick(), if self.recorder.is_recording() => {
                    self.recorder.tick();
                }
                _ = self.recorder.wait_for_playback(), if self.recorder.is_playing() => {
                    println!("\nPlayback finished.");
                    self.prompt()?;
                }
            }
        }

        self.recorder.teardown();
        self.store.unsubscribe(subscription);
        Ok(())
    }

    fn prompt(&self) -> Result<()> {
        let marker = if self.recorder.is_recording() {
            format!("● {} ", self.recorder.elapsed_display())
        } else if self.store.is_delete_dialog_open() {
            "(yes/no) ".to_string()
        } else if self.store.is_editor_visible() {
            "* ".to_string()
        } else {
            String::new()
        };
        print!("{}murmur> ", marker);
        stdout().flush().map_err(MurmurError::Io)
    }

    /// Handles a line, restarting the elapsed ticker when the line began a
    /// recording so idle time is never counted.
    pub(crate) async fn step(&mut self, line: &str, ticker: &mut Interval) -> Result<Flow> {
        let was_recording = self.recorder.is_recording();
        let flow = self.handle_line(line).await;
        if !was_recording && self.recorder.is_recording() {
            *ticker = recording_ticker();
        }
        flow
    }

    /// Applies one shell line to the store and recorder.
    pub(crate) async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "help" | "?" => println!("{}", HELP),
            "quit" | "exit" => return Ok(Flow::Quit),

            "list" | "ls" => self.print_list(),
            "search" => {
                self.store.set_search_query(rest);
                self.print_list();
            }

            "new" => {
                if self.store.is_editor_visible() {
                    self.close_editor();
                }
                self.store.toggle_editor();
            }
            "toggle" => {
                if self.store.is_editor_visible() {
                    self.close_editor();
                } else {
                    self.store.toggle_editor();
                }
            }
            "title" => self.store.set_draft_title(rest),
            "content" => self.store.set_draft_content(rest),
            "draft" => self.print_draft(),

            "record" => {
                self.recorder.start_recording().await?;
                println!("Recording. Type 'stop' to finish.");
            }
            "stop" => {
                let clip = self.recorder.stop_recording().await?;
                println!("Recorded {}", self.recorder.elapsed_display());
                self.store.set_draft_audio(Some(clip));
            }
            "play" => self.recorder.play()?,
            "halt" => self.recorder.stop(),
            "discard" => {
                self.recorder.discard();
                self.store.set_draft_audio(None);
            }

            "save" => self.save_draft()?,
            "select" => {
                let id = parse_id(rest)?;
                self.select(id);
            }
            "delete" | "rm" => {
                let id = parse_id(rest)?;
                self.store.request_delete(id);
            }
            "yes" | "y" => self.confirm_delete(),
            "no" | "n" => {
                self.store.cancel_delete();
                println!("Deletion cancelled.");
            }

            other => {
                return Err(MurmurError::ApplicationError {
                    message: format!("Unknown command: {}. Type 'help' for commands.", other),
                })
            }
        }

        Ok(Flow::Continue)
    }

    fn select(&mut self, id: NoteId) {
        if !self.store.select(id) {
            return;
        }

        self.recorder.discard();
        if let Some(clip) = self.store.draft().audio_reference.clone() {
            self.recorder.adopt(clip);
        }
        self.print_draft();
    }

    fn save_draft(&mut self) -> Result<()> {
        let replaced = self
            .store
            .selected_id()
            .and_then(|id| self.store.get(id))
            .and_then(|note| note.audio_reference.clone());

        self.store.save()?;
        self.recorder.commit();
        self.release_saved_clip(replaced);
        Ok(())
    }

    fn confirm_delete(&mut self) {
        let selected = self.store.selected_id();
        let clip = self
            .store
            .pending_delete_id()
            .and_then(|id| self.store.get(id))
            .and_then(|note| note.audio_reference.clone());

        if let Some(id) = self.store.confirm_delete() {
            if selected == Some(id) {
                self.recorder.discard();
            }
            self.release_saved_clip(clip);
        }
    }

    /// Closes the editor, dropping the draft and any unsaved recording.
    fn close_editor(&mut self) {
        if self.recorder.is_recording() {
            self.recorder.teardown();
        } else {
            self.recorder.discard();
        }
        self.store.toggle_editor();
    }

    fn print_list(&self) {
        let notes = self.store.filtered_ideas();
        if self.store.is_searching() {
            println!("Searching for \"{}\"", self.store.search_query().trim());
        }
        if notes.is_empty() {
            println!("{}", self.empty_message());
        } else {
            self.display_notes_text(&notes, false);
            println!("\n{} murmur{}", notes.len(), if notes.len() == 1 { "" } else { "s" });
        }
    }

    fn print_draft(&mut self) {
        let draft = self.store.draft();
        let heading = match self.store.selected_id() {
            Some(id) => format!("Editing murmur {}", id),
            None => "New murmur".to_string(),
        };
        let editor = if self.store.is_editor_visible() { "open" } else { "closed" };

        println!("{} (editor {})", console::style(heading).bold(), editor);
        println!("Title:   {}", draft.title);
        println!("Details: {}", draft.content);
        match &draft.audio_reference {
            Some(clip) => println!("Audio:   {}", clip),
            None => println!("Audio:   none"),
        }

        let mut recorder_state = Vec::new();
        if self.recorder.is_recording() {
            recorder_state.push(format!("recording {}", self.recorder.elapsed_display()));
        } else if self.recorder.elapsed_secs() > 0 {
            recorder_state.push(format!("recorded {}", self.recorder.elapsed_display()));
        }
        if self.recorder.is_playing() {
            recorder_state.push("playing".to_string());
        }
        if !recorder_state.is_empty() {
            println!("Recorder: {}", recorder_state.join(", "));
        }
    }
}

/// One tick per second, first one a full second from now.
fn recording_ticker() -> Interval {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn parse_id(raw: &str) -> Result<NoteId> {
    raw.trim()
        .parse()
        .map_err(|_| MurmurError::ApplicationError {
            message: format!("Expected a murmur ID, got: '{}'", raw),
        })
}

/// Surfaces a recoverable error without ending the session.
fn report(error: &MurmurError) {
    let description = match error {
        // Already reported by the store.
        MurmurError::Validation { .. } => return,
        MurmurError::DeviceAccess { message } => {
            format!("Could not access the microphone: {}", message)
        }
        other => other.to_string(),
    };
    ConsoleNotifier.notify(Notification::error(description));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AudioRecorder, CollectingNotifier, Config, ConfiguredDevice, IdeaRepository, IdeaStore,
        MemoryDevice, MemoryKeyValueStore,
    };

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

    async fn run(app: &mut App, lines: &[&str]) {
        for line in lines {
            app.handle_line(line).await.unwrap();
        }
    }

    #[tokio::test]
    async fn record_then_save_attaches_clip() {
        let (mut app, _) = app();
        run(&mut app, &["new", "title Voice memo", "record"]).await;
        for _ in 0..3 {
            app.recorder.tick();
        }
        run(&mut app, &["stop"]).await;
        assert_eq!(app.recorder().elapsed_display(), "00:03");
        assert!(app.store().draft().has_audio);

        run(&mut app, &["save"]).await;
        let note = &app.store().ideas()[0];
        assert!(note.has_audio);
        assert!(app.recorder().clip().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_before_record_is_not_counted() {
        let (mut app, _) = app();
        let mut ticker = recording_ticker();
        tokio::time::advance(Duration::from_secs(5)).await;

        app.step("record", &mut ticker).await.unwrap();
        let early = tokio::time::timeout(Duration::from_millis(100), ticker.tick()).await;
        assert!(early.is_err());
        assert_eq!(app.recorder().elapsed_display(), "00:00");

        for _ in 0..3 {
            ticker.tick().await;
            app.recorder.tick();
        }
        assert_eq!(app.recorder().elapsed_display(), "00:03");

        let extra = tokio::time::timeout(Duration::from_millis(500), ticker.tick()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn delete_prompt_answers() {
        let (mut app, _) = app();
        run(&mut app, &["title Keep", "save"]).await;
        let id = app.store().ideas()[0].id;

        let delete = format!("delete {}", id);
        run(&mut app, &[delete.as_str()]).await;
        assert!(app.store().is_delete_dialog_open());
        run(&mut app, &["no"]).await;
        assert_eq!(app.store().ideas().len(), 1);

        run(&mut app, &[delete.as_str(), "yes"]).await;
        assert!(app.store().ideas().is_empty());
        assert!(!app.store().is_delete_dialog_open());
    }

    #[tokio::test]
    async fn quit_and_unknown_commands() {
        let (mut app, _) = app();
        assert_eq!(app.handle_line("quit").await.unwrap(), Flow::Quit);
        assert!(app.handle_line("frobnicate").await.is_err());
        assert!(app.handle_line("select abc").await.is_err());
    }

    #[tokio::test]
    async fn blank_title_save_keeps_draft() {
        let (mut app, notifier) = app();
        run(&mut app, &["title    ", "content details"]).await;

        let err = app.handle_line("save").await.unwrap_err();
        assert!(matches!(err, MurmurError::Validation { .. }));
        assert_eq!(app.store().draft().content, "details");
        assert_eq!(
            notifier.last().unwrap().description,
            "Please add a title for your idea"
        );
    }
}
