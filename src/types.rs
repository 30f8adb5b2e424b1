//! Shared types for the murmur application.
//!
//! This module contains the crate-wide `Result` alias, the change events
//! the idea store broadcasts, and the CLI subcommand definitions.
use std::path::PathBuf;

use clap::Subcommand;

use crate::{MurmurError, NoteId};

/// A specialized Result type for murmur operations.
pub type Result<T> = std::result::Result<T, MurmurError>;

/// Handle returned by `IdeaStore::subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// What changed in the idea store, delivered to every listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// The collection was (re)loaded from persistence
    Loaded,
    /// A draft field was edited
    DraftEdited,
    /// A new note was created
    Created(NoteId),
    /// An existing note was overwritten from the draft
    Updated(NoteId),
    /// A note was copied into the draft for editing
    Selected(NoteId),
    /// A delete was staged and the confirmation prompt opened
    DeleteRequested(NoteId),
    /// A staged delete was confirmed and the note removed
    Deleted(NoteId),
    /// The confirmation prompt was closed without removing anything
    DeleteCancelled,
    /// The search query changed
    SearchChanged,
    /// The editor was opened or closed
    EditorToggled,
}

/// Available subcommands for the murmur application
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture a new murmur
    Add {
        /// Title of the murmur
        #[clap(short = 'T', long)]
        title: String,

        /// Details of the murmur
        #[clap(short, long)]
        content: Option<String>,

        /// Open content in editor before saving
        #[clap(short, long)]
        edit: bool,

        /// Attach an existing audio clip file
        #[clap(long)]
        audio: Option<PathBuf>,
    },

    /// List murmurs, newest first
    List {
        /// Limit the number of murmurs shown (0 shows all)
        #[clap(short = 'n', long, default_value_t = 0)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,

        /// Only show IDs and titles
        #[clap(short, long)]
        brief: bool,
    },

    /// Search murmurs by title or details
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results (0 shows all)
        #[clap(short = 'n', long, default_value_t = 0)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Show a single murmur
    Show {
        /// ID of the murmur
        id: NoteId,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Edit an existing murmur
    Edit {
        /// ID of the murmur to edit
        id: NoteId,

        /// New title
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New details
        #[clap(short, long)]
        content: Option<String>,

        /// Open content in editor before saving
        #[clap(short, long)]
        edit: bool,

        /// Attach an existing audio clip file
        #[clap(long, conflicts_with = "remove_audio")]
        audio: Option<PathBuf>,

        /// Detach the recorded clip
        #[clap(long)]
        remove_audio: bool,
    },

    /// Delete a murmur by ID
    Delete {
        /// ID of the murmur to delete
        id: NoteId,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Record a voice murmur; press Enter to stop
    Record {
        /// Title of the murmur
        #[clap(short = 'T', long)]
        title: String,

        /// Details of the murmur
        #[clap(short, long)]
        content: Option<String>,
    },

    /// Play the clip attached to a murmur; press Enter to stop
    Play {
        /// ID of the murmur
        id: NoteId,
    },

    /// Interactive session over the draft, list and recorder
    Shell,

    /// Configuration management
    Config {
        /// Show current configuration
        #[clap(short = 'S', long)]
        show: bool,

        /// Update a configuration setting (key=value)
        #[clap(short, long)]
        set: Option<String>,

        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,
    },
}
