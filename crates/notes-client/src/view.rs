//! What the controller asks a front-end to show.

use std::sync::{Mutex, PoisonError};

use notes_core::SessionUser;
use notes_transport::ConnectionState;

use crate::{NoteCard, NoteEditor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
}

/// Transient notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialog {
    Login,
    Register,
    Note,
    Profile,
}

/// Controls that show a working state while a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Busy {
    Login,
    Register,
    SaveNote,
    DeleteNote,
    DeleteAll,
}

impl Busy {
    /// Label while working.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "Logging in...",
            Self::Register => "Registering...",
            Self::SaveNote => "Saving...",
            Self::DeleteNote | Self::DeleteAll => "Deleting...",
        }
    }

    /// Label once idle again.
    #[must_use]
    pub const fn idle_label(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Register => "Register",
            Self::SaveNote => "Save",
            Self::DeleteNote => "Delete",
            Self::DeleteAll => "Delete All Notes",
        }
    }
}

/// Text shown in place of the notes list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Loading,
    Searching,
    LoginPrompt,
    ConnectedLoginPrompt,
    Reconnecting,
    LoggedOut,
    NoNotes,
    LoadError,
}

impl Placeholder {
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::Loading => "Loading notes...",
            Self::Searching => "Searching...",
            Self::LoginPrompt => "Please login to view your notes.",
            Self::ConnectedLoginPrompt => "Connected. Please login to view your notes.",
            Self::Reconnecting => "Disconnected from server. Trying to reconnect...",
            Self::LoggedOut => "Disconnected. Please login to view your notes.",
            Self::NoNotes => "No notes found. Create your first note!",
            Self::LoadError => "Error loading notes. Please try again.",
        }
    }
}

/// Front-end surface driven by the controller.
pub trait View: Send + Sync {
    fn show_notes(&self, cards: &[NoteCard]);
    fn show_placeholder(&self, placeholder: Placeholder);
    fn show_alert(&self, alert: Alert);
    fn show_connection(&self, state: ConnectionState);
    fn show_signed_in(&self, user: &SessionUser);
    fn show_signed_out(&self);
    fn show_profile(&self, user: &SessionUser);
    fn show_note_editor(&self, editor: &NoteEditor);
    fn close_dialog(&self, dialog: Dialog);
    fn set_busy(&self, busy: Busy);
    /// Return every working control to its idle state.
    fn reset_busy(&self);
}

/// A call made on a [`RecordingView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Notes(Vec<NoteCard>),
    Placeholder(Placeholder),
    Alert(Alert),
    Connection(ConnectionState),
    SignedIn(String),
    SignedOut,
    Profile(String),
    Editor(NoteEditor),
    CloseDialog(Dialog),
    Busy(Busy),
    ResetBusy,
}

/// Headless view that records every call.
#[derive(Debug, Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ViewEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    #[must_use]
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Alert(alert) => Some(alert),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn contains(&self, event: &ViewEvent) -> bool {
        self.events().contains(event)
    }
}

impl View for RecordingView {
    fn show_notes(&self, cards: &[NoteCard]) {
        self.push(ViewEvent::Notes(cards.to_vec()));
    }

    fn show_placeholder(&self, placeholder: Placeholder) {
        self.push(ViewEvent::Placeholder(placeholder));
    }

    fn show_alert(&self, alert: Alert) {
        self.push(ViewEvent::Alert(alert));
    }

    fn show_connection(&self, state: ConnectionState) {
        self.push(ViewEvent::Connection(state));
    }

    fn show_signed_in(&self, user: &SessionUser) {
        self.push(ViewEvent::SignedIn(user.id.clone()));
    }

    fn show_signed_out(&self) {
        self.push(ViewEvent::SignedOut);
    }

    fn show_profile(&self, user: &SessionUser) {
        self.push(ViewEvent::Profile(user.id.clone()));
    }

    fn show_note_editor(&self, editor: &NoteEditor) {
        self.push(ViewEvent::Editor(editor.clone()));
    }

    fn close_dialog(&self, dialog: Dialog) {
        self.push(ViewEvent::CloseDialog(dialog));
    }

    fn set_busy(&self, busy: Busy) {
        self.push(ViewEvent::Busy(busy));
    }

    fn reset_busy(&self) {
        self.push(ViewEvent::ResetBusy);
    }
}
