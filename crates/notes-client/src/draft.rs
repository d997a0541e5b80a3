//! Note form state and conversion to requests.

use notes_core::{Attachment, ClientMessage, Note, NoteType, NoteUpdate};

use crate::media::{FilePayload, RecordedAudio};
use crate::render::{AttachmentBlock, attachment_blocks};

/// Contents of the note form at save time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    /// Set when editing an existing note.
    pub note_id: Option<String>,
    pub title: String,
    pub content: String,
    pub note_type: NoteType,
    pub encrypt: bool,
    pub audio: Option<RecordedAudio>,
    pub files: Vec<FilePayload>,
}

impl NoteDraft {
    #[must_use]
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Content and attachments actually sent for this draft.
    ///
    /// Voice notes with a recording and image notes with files replace the
    /// typed content with a short summary.
    fn payload(&self) -> (String, Vec<Attachment>) {
        match self.note_type {
            NoteType::Voice => {
                if let Some(audio) = &self.audio {
                    return ("Voice recording".to_string(), vec![audio.to_attachment()]);
                }
            }
            NoteType::Image if !self.files.is_empty() => {
                let attachments = self.files.iter().map(FilePayload::to_attachment).collect();
                return (format!("{} file(s) attached", self.files.len()), attachments);
            }
            NoteType::Image | NoteType::Text => {}
        }
        (self.content.clone(), Vec::new())
    }

    /// Build the create or update request for `user_id`.
    #[must_use]
    pub fn into_message(self, user_id: &str) -> ClientMessage {
        let (content, attachments) = self.payload();
        match self.note_id {
            Some(note_id) => ClientMessage::UpdateNote {
                user_id: user_id.to_string(),
                note_id,
                update_data: NoteUpdate {
                    title: Some(self.title),
                    content: Some(content),
                    note_type: Some(self.note_type),
                    encrypt: Some(self.encrypt),
                    attachments,
                },
            },
            None => ClientMessage::CreateNote {
                user_id: user_id.to_string(),
                title: self.title,
                content,
                note_type: self.note_type,
                encrypt: self.encrypt,
                attachments,
            },
        }
    }
}

/// State of the note dialog when it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEditor {
    pub heading: &'static str,
    pub draft: NoteDraft,
    /// Existing attachments shown read-only.
    pub previews: Vec<AttachmentBlock>,
}

impl NoteEditor {
    #[must_use]
    pub fn blank() -> Self {
        Self {
            heading: "Create Note",
            draft: NoteDraft::default(),
            previews: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_note(note: &Note) -> Self {
        Self {
            heading: "Edit Note",
            draft: NoteDraft {
                note_id: Some(note.id.clone()),
                title: note.title.clone().unwrap_or_default(),
                content: note.content.clone().unwrap_or_default(),
                note_type: note.note_type,
                encrypt: note.is_encrypted,
                audio: None,
                files: Vec::new(),
            },
            previews: note
                .attachment
                .as_ref()
                .map(attachment_blocks)
                .unwrap_or_default(),
        }
    }
}
