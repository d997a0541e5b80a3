//! Persisted session state for the notes client.
//!
//! Provides:
//! - `SessionStore` - the signed-in user, persisted and restored
//! - Storage implementations (memory, file)

pub mod storage;
pub mod store;

pub use store::{SESSION_KEY, SessionStore};
