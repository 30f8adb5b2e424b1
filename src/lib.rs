//! Murmur: a note-capture library
//!
//! This library provides an idea store for creating, editing, searching and
//! deleting short notes, optionally with a recorded voice clip, persisted as
//! one JSON collection in a key-value store.

mod audio;
mod cli;
mod config;
mod errors;
mod helper;
mod idea_store;
mod note;
mod notification;
mod storage;
mod types;

// Re-export key components
pub use audio::*;
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use helper::*;
pub use idea_store::*;
pub use note::*;
pub use notification::*;
pub use storage::*;
pub use types::*;
