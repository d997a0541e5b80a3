//! Core building blocks for the notes client.
//!
//! This crate provides:
//! - `ClientMessage` / `ServerMessage` - JSON wire protocol
//! - `Attachment` - base64 note attachments
//! - `ClientId` / `RequestId` - opaque identifiers
//! - `ClientConfig` - endpoint, reconnect and correlation settings
//! - Storage and handshake traits

pub mod attachment;
pub mod config;
pub mod ids;
pub mod protocol;
pub mod traits;

pub use attachment::{Attachment, AttachmentError, AttachmentField, AttachmentKind};
pub use config::{ClientConfig, ConfigError, CorrelationStrategy, ReconnectPolicy};
pub use ids::{ClientId, RequestId};
pub use protocol::{
    Action, ClientMessage, Envelope, Note, NoteType, NoteUpdate, ServerMessage, SessionUser, Status,
};
pub use traits::{Handshake, StateStorage, StorageError};
