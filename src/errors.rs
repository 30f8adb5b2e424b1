//! Error types for the murmur application.
//!
//! This module defines custom error types that categorize the failures
//! that can occur while capturing, storing and playing back murmurs.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::NoteId;

/// The main error type for the murmur application.
#[derive(Error, Debug)]
pub enum MurmurError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The draft failed validation; nothing was mutated.
    #[error("{message}")]
    Validation { message: String },

    /// The stored collection under `key` could not be decoded.
    #[error("Failed to decode stored value for key '{key}': {message}")]
    PersistenceDecode { key: String, message: String },

    /// Microphone or playback device could not be acquired.
    #[error("Audio device unavailable: {message}")]
    DeviceAccess { message: String },

    /// An audio operation was attempted from a state that does not allow it.
    #[error("Invalid audio state: {message}")]
    InvalidAudioState { message: String },

    /// Note was not found when performing an operation.
    #[error("Murmur not found: {id}")]
    NoteNotFound { id: NoteId },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    #[error("{message}")]
    EditorError { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}
