//! Routing of inbound messages by `(status, action)`.

use notes_core::{Action, Note, ServerMessage, SessionUser, Status};

/// What an inbound message means to the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Server acknowledged the connection.
    Connected,
    LoggedIn(Option<SessionUser>),
    Registered,
    NotesLoaded(Option<Vec<Note>>),
    SearchResults(Option<Vec<Note>>),
    NoteCreated,
    NoteUpdated(Option<Note>),
    NoteDeleted,
    AllNotesDeleted(Option<String>),
    /// Application error reported by the server or the transport.
    Failed(Option<String>),
    /// Nothing for the front-end to do.
    Ignored,
}

impl PushEvent {
    #[must_use]
    pub fn classify(msg: &ServerMessage) -> Self {
        match msg.status {
            Status::Connected => Self::Connected,
            Status::Error => Self::Failed(msg.message.clone()),
            Status::Success => match msg.action {
                Some(Action::Login) => Self::LoggedIn(msg.user.clone()),
                Some(Action::Register) => Self::Registered,
                Some(Action::GetNotes) => Self::NotesLoaded(msg.notes.clone()),
                Some(Action::SearchNotes) => Self::SearchResults(msg.notes.clone()),
                Some(Action::CreateNote) => Self::NoteCreated,
                Some(Action::UpdateNote) => Self::NoteUpdated(msg.note.clone()),
                Some(Action::DeleteNote) => Self::NoteDeleted,
                Some(Action::DeleteAllNotes) => Self::AllNotesDeleted(msg.message.clone()),
                _ => Self::Ignored,
            },
            Status::Unknown => Self::Ignored,
        }
    }
}
