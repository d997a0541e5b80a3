//! Presentation and interaction layer for the notes client.
//!
//! Provides:
//! - `Controller` - user actions in, view updates out
//! - `PushEvent` - routing of inbound messages by status and action
//! - `NoteCard` - note view model with attachment blocks
//! - Media capture and file attachment helpers
//! - `View` trait for front-ends

pub mod controller;
pub mod dispatch;
pub mod draft;
pub mod media;
pub mod render;
pub mod view;

pub use controller::Controller;
pub use dispatch::PushEvent;
pub use draft::{NoteDraft, NoteEditor};
pub use media::{AudioCapture, FilePayload, MediaError, RecordedAudio};
pub use render::{AttachmentBlock, NoteCard};
pub use view::{Alert, AlertKind, Busy, Dialog, Placeholder, RecordingView, View, ViewEvent};

use notes_transport::TransportError;

/// Client error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
