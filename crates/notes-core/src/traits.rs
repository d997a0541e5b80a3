//! Core traits for local state and connection handshakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::ClientMessage;

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt storage file: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Durable key/value storage for client state.
///
/// Values are opaque strings; callers own their encoding.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Source of the first message sent on every new connection.
///
/// Called once per successful (re)connection, so the answer can change as the
/// user signs in and out.
pub trait Handshake: Send + Sync {
    /// Either `init` or `restore_session`.
    fn handshake(&self) -> ClientMessage;
}
