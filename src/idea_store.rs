//! The idea store: the murmur collection, the draft under edit, and the
//! editor/search/delete-prompt state the presentation layer binds to.
//!
//! Every mutation mirrors the full collection to the repository and then
//! notifies subscribed listeners with a `StoreChange`.
use std::mem;

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::{
    ClipRef, Draft, IdeaRepository, MurmurError, Note, NoteId, Notification, Notifier, Result,
    StoreChange, SubscriptionId,
};

type Listener = Box<dyn FnMut(&IdeaStore, StoreChange)>;
type Clock = Box<dyn Fn() -> i64>;

pub struct IdeaStore {
    ideas: Vec<Note>,
    draft: Draft,
    selected_id: Option<NoteId>,
    pending_delete_id: Option<NoteId>,
    delete_dialog_open: bool,
    editor_visible: bool,
    search_query: String,

    repository: IdeaRepository,
    notifier: Box<dyn Notifier>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    clock: Clock,
}

impl IdeaStore {
    /// Creates an empty store. Call `load()` to read the persisted collection.
    pub fn new(repository: IdeaRepository, notifier: Box<dyn Notifier>) -> Self {
        Self {
            ideas: Vec::new(),
            draft: Draft::default(),
            selected_id: None,
            pending_delete_id: None,
            delete_dialog_open: false,
            editor_visible: false,
            search_query: String::new(),
            repository,
            notifier,
            listeners: Vec::new(),
            next_subscription: 0,
            clock: Box::new(|| Utc::now().timestamp_millis()),
        }
    }

    /// Replaces the epoch-millisecond clock used for new ids.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&IdeaStore, StoreChange) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, change: StoreChange) {
        let mut listeners = mem::take(&mut self.listeners);
        for (_, listener) in listeners.iter_mut() {
            listener(self, change);
        }
        self.listeners = listeners;
    }

    /// Reads the persisted collection. A value that fails to decode leaves
    /// the collection empty and is reported, never propagated.
    pub fn load(&mut self) {
        match self.repository.read_all() {
            Ok(mut notes) => {
                let total = notes.len();
                let mut seen = std::collections::HashSet::with_capacity(total);
                notes.retain(|note| seen.insert(note.id));
                if notes.len() != total {
                    warn!(
                        "Dropped {} murmurs with duplicate ids while loading",
                        total - notes.len()
                    );
                }
                for note in notes.iter_mut() {
                    let has_audio = note.audio_reference.is_some();
                    if note.has_audio != has_audio {
                        debug!("Murmur {} had a stale audio flag", note.id);
                        note.has_audio = has_audio;
                    }
                }
                self.ideas = notes;
            }
            Err(e) => {
                error!("Failed to load murmurs: {}", e);
                self.ideas.clear();
                self.notifier
                    .notify(Notification::error("Failed to load saved ideas"));
            }
        }

        self.emit(StoreChange::Loaded);
    }

    fn persist(&self) {
        if let Err(e) = self.repository.write_all(&self.ideas) {
            error!("Failed to persist murmurs: {}", e);
            self.notifier
                .notify(Notification::error("Failed to save ideas"));
        }
    }

    pub fn set_draft_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
        self.emit(StoreChange::DraftEdited);
    }

    pub fn set_draft_content(&mut self, content: impl Into<String>) {
        self.draft.content = content.into();
        self.emit(StoreChange::DraftEdited);
    }

    /// Attaches (`Some`) or detaches (`None`) a clip; `has_audio` follows.
    pub fn set_draft_audio(&mut self, reference: Option<ClipRef>) {
        self.draft.set_audio(reference);
        self.emit(StoreChange::DraftEdited);
    }

    fn fresh_id(&self) -> NoteId {
        let now = (self.clock)();
        match self.ideas.iter().map(|note| note.id).max() {
            Some(max) if max >= now => max + 1,
            _ => now,
        }
    }

    /// Commits the draft: overwrites the selected note in place, or
    /// creates a new one. Fails with `Validation` on a blank title and
    /// leaves everything untouched.
    pub fn save(&mut self) -> Result<NoteId> {
        if self.draft.title.trim().is_empty() {
            let message = "Please add a title for your idea";
            self.notifier.notify(Notification::error(message));
            return Err(MurmurError::Validation {
                message: message.to_string(),
            });
        }

        let existing = self
            .selected_id
            .and_then(|id| self.ideas.iter().position(|note| note.id == id));

        let (change, id, description) = match existing {
            Some(index) => {
                let note = &mut self.ideas[index];
                note.apply_draft(&self.draft);
                info!("Updated murmur {}", note.id);
                (StoreChange::Updated(note.id), note.id, "Murmur updated successfully!")
            }
            None => {
                if let Some(id) = self.selected_id {
                    warn!("Selected murmur {} no longer exists, saving as new", id);
                }
                let id = self.fresh_id();
                self.ideas.insert(0, Note::from_draft(id, id, &self.draft));
                info!("Created murmur {}", id);
                (StoreChange::Created(id), id, "Murmur saved successfully!")
            }
        };

        self.persist();

        self.draft = Draft::default();
        self.selected_id = None;
        self.editor_visible = false;

        self.notifier.notify(Notification::success(description));
        self.emit(change);
        Ok(id)
    }

    /// Copies the note into the draft and opens the editor. Unknown ids
    /// are ignored; the return value says whether the note was found.
    pub fn select(&mut self, id: NoteId) -> bool {
        let Some(note) = self.ideas.iter().find(|note| note.id == id) else {
            debug!("Ignoring select of unknown murmur {}", id);
            return false;
        };

        self.draft = Draft::from_note(note);
        self.selected_id = Some(id);
        self.editor_visible = true;
        self.emit(StoreChange::Selected(id));
        true
    }

    /// Stages `id` for deletion and opens the confirmation prompt.
    pub fn request_delete(&mut self, id: NoteId) {
        self.pending_delete_id = Some(id);
        self.delete_dialog_open = true;
        self.emit(StoreChange::DeleteRequested(id));
    }

    /// Removes the staged note, if it still exists, and closes the prompt.
    pub fn confirm_delete(&mut self) -> Option<NoteId> {
        let pending = self.pending_delete_id.take();
        self.delete_dialog_open = false;

        let removed = pending.and_then(|id| {
            let index = self.ideas.iter().position(|note| note.id == id)?;
            self.ideas.remove(index);
            Some(id)
        });

        let Some(id) = removed else {
            debug!("Staged murmur {:?} no longer exists, nothing deleted", pending);
            self.emit(StoreChange::DeleteCancelled);
            return None;
        };

        self.persist();

        if self.selected_id == Some(id) {
            self.draft = Draft::default();
            self.selected_id = None;
            self.editor_visible = false;
        }

        info!("Deleted murmur {}", id);
        self.notifier
            .notify(Notification::success("Murmur deleted successfully!"));
        self.emit(StoreChange::Deleted(id));
        Some(id)
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete_id = None;
        self.delete_dialog_open = false;
        self.emit(StoreChange::DeleteCancelled);
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.emit(StoreChange::SearchChanged);
    }

    /// Notes matching the search query, newest first.
    pub fn filtered_ideas(&self) -> Vec<&Note> {
        let needle = self.search_query.trim().to_lowercase();

        let mut view: Vec<&Note> = if needle.is_empty() {
            self.ideas.iter().collect()
        } else {
            self.ideas.iter().filter(|note| note.matches(&needle)).collect()
        };

        view.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        view
    }

    pub fn is_searching(&self) -> bool {
        !self.search_query.trim().is_empty()
    }

    /// Closing discards the draft and any selection; opening keeps the draft.
    pub fn toggle_editor(&mut self) {
        if self.editor_visible {
            self.editor_visible = false;
            self.draft = Draft::default();
            self.selected_id = None;
        } else {
            self.editor_visible = true;
        }
        self.emit(StoreChange::EditorToggled);
    }

    pub fn ideas(&self) -> &[Note] {
        &self.ideas
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.ideas.iter().find(|note| note.id == id)
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn selected_id(&self) -> Option<NoteId> {
        self.selected_id
    }

    pub fn pending_delete_id(&self) -> Option<NoteId> {
        self.pending_delete_id
    }

    pub fn is_delete_dialog_open(&self) -> bool {
        self.delete_dialog_open
    }

    pub fn is_editor_visible(&self) -> bool {
        self.editor_visible
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogNotifier, MemoryKeyValueStore};

    fn store_at(now: i64) -> IdeaStore {
        let repo = IdeaRepository::new(Box::new(MemoryKeyValueStore::new()), "ideas");
        IdeaStore::new(repo, Box::new(LogNotifier)).with_clock(move || now)
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let mut store = store_at(1_000);

        store.set_draft_title("one");
        let first = store.save().unwrap();
        store.set_draft_title("two");
        let second = store.save().unwrap();

        assert_eq!(first, 1_000);
        assert_eq!(second, 1_001);
        assert_eq!(store.get(second).unwrap().created_at, 1_001);
    }

    #[test]
    fn save_trims_title_and_content() {
        let mut store = store_at(5);
        store.set_draft_title("  Trip idea  ");
        store.set_draft_content("\n pack light \n");
        let id = store.save().unwrap();

        let note = store.get(id).unwrap();
        assert_eq!(note.title, "Trip idea");
        assert_eq!(note.content, "pack light");
    }

    #[test]
    fn listeners_see_state_after_change() {
        use std::{cell::RefCell, rc::Rc};

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = store_at(10);
        let sink = Rc::clone(&seen);
        let sub = store.subscribe(move |store, change| {
            sink.borrow_mut().push((change, store.ideas().len()));
        });

        store.set_draft_title("hello");
        store.save().unwrap();
        assert!(store.unsubscribe(sub));
        store.set_search_query("x");

        assert_eq!(
            *seen.borrow(),
            vec![(StoreChange::DraftEdited, 0), (StoreChange::Created(10), 1)]
        );
        assert!(!store.unsubscribe(sub));
    }
}
