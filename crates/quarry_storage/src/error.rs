//! Error types for storage operations.

use quarry_codec::CodecError;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No live record exists under the handle.
    #[error("record {handle} not found")]
    NotFound {
        /// The requested handle.
        handle: u64,
    },

    /// A mutation was attempted without an open physical transaction.
    #[error("storage mutation outside of a transaction")]
    NotInTransaction,

    /// The storage file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,

    /// Another process holds the storage file.
    #[error("storage file {0} is locked by another process")]
    Locked(String),

    /// A record could not be encoded or decoded.
    #[error("record codec error: {0}")]
    Codec(#[from] CodecError),
}
