//! Note view models.

use std::fmt::Write as _;

use notes_core::{AttachmentField, AttachmentKind, Note, NoteType, SessionUser};

/// One rendered attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentBlock {
    /// Inline audio player.
    Audio { src: String },
    /// Inline image.
    Image { src: String },
    /// Download link for anything else.
    Download { name: String, href: String },
    /// The attachment field could not be read.
    Invalid,
}

/// Blocks for every attachment in `field`, one per attachment object.
#[must_use]
pub fn attachment_blocks(field: &AttachmentField) -> Vec<AttachmentBlock> {
    match field.attachments() {
        Ok(list) => list
            .into_iter()
            .map(|att| {
                let src = att.data_uri();
                match att.kind {
                    AttachmentKind::Audio => AttachmentBlock::Audio { src },
                    AttachmentKind::Image => AttachmentBlock::Image { src },
                    AttachmentKind::File => AttachmentBlock::Download {
                        name: att.name,
                        href: src,
                    },
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("unreadable attachment: {e}");
            vec![AttachmentBlock::Invalid]
        }
    }
}

/// Display form of a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteCard {
    pub id: String,
    pub title: String,
    pub encrypted: bool,
    pub note_type: NoteType,
    pub content: String,
    pub attachments: Vec<AttachmentBlock>,
    /// Last update time, falling back to creation time.
    pub updated: String,
}

impl NoteCard {
    #[must_use]
    pub fn from_note(note: &Note) -> Self {
        let updated = note
            .time_update
            .as_deref()
            .or(note.time_creation.as_deref())
            .unwrap_or("Unknown date")
            .to_string();

        Self {
            id: note.id.clone(),
            title: note
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or("Untitled")
                .to_string(),
            encrypted: note.is_encrypted,
            note_type: note.note_type,
            content: note.content.clone().unwrap_or_default(),
            attachments: note
                .attachment
                .as_ref()
                .map(attachment_blocks)
                .unwrap_or_default(),
            updated,
        }
    }
}

/// Notes that belong to `user`; nothing when signed out.
#[must_use]
pub fn visible_notes<'a>(notes: &'a [Note], user: Option<&SessionUser>) -> Vec<&'a Note> {
    let Some(user) = user else {
        return Vec::new();
    };
    notes.iter().filter(|note| note.user_id == user.id).collect()
}

/// Plain-text rendering for terminal front-ends.
#[must_use]
pub fn render_text(card: &NoteCard) -> String {
    let mut out = String::new();
    let badge = if card.encrypted { " [Encrypted]" } else { "" };
    let _ = writeln!(out, "{}{} ({})", card.title, badge, card.note_type);
    if !card.content.is_empty() {
        let _ = writeln!(out, "  {}", card.content);
    }
    for block in &card.attachments {
        let line = match block {
            AttachmentBlock::Audio { .. } => "  [audio]".to_string(),
            AttachmentBlock::Image { .. } => "  [image]".to_string(),
            AttachmentBlock::Download { name, .. } => format!("  [download {name}]"),
            AttachmentBlock::Invalid => "  [attachment error]".to_string(),
        };
        let _ = writeln!(out, "{line}");
    }
    let _ = write!(out, "  Updated: {}", card.updated);
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn note(value: serde_json::Value) -> Note {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_single_and_list_attachments_render_alike() {
        let att = json!({"type": "file", "name": "report.pdf", "data": "JVBERg=="});
        let single = NoteCard::from_note(&note(json!({"_id": "1", "attachment": att})));
        let listed = NoteCard::from_note(&note(json!({"_id": "1", "attachment": [att]})));

        assert_eq!(single.attachments, listed.attachments);
        assert_eq!(
            single.attachments,
            vec![AttachmentBlock::Download {
                name: "report.pdf".into(),
                href: "data:application/octet-stream;base64,JVBERg==".into(),
            }]
        );
    }

    #[test]
    fn test_one_block_per_attachment_in_order() {
        let card = NoteCard::from_note(&note(json!({
            "_id": "1",
            "note_type": "image",
            "attachment": [
                {"type": "image", "name": "a.png", "data": "AA=="},
                {"type": "audio", "name": "r.wav", "data": "AQ=="},
                {"type": "file", "name": "c.bin", "data": "Ag=="}
            ]
        })));
        assert_eq!(card.attachments.len(), 3);
        assert_eq!(
            card.attachments[0],
            AttachmentBlock::Image {
                src: "data:image/*;base64,AA==".into()
            }
        );
        assert!(matches!(card.attachments[1], AttachmentBlock::Audio { .. }));
        assert!(matches!(card.attachments[2], AttachmentBlock::Download { .. }));
    }

    #[test]
    fn test_encoded_attachment_string() {
        let encoded = json!([{"type": "audio", "name": "recording.wav", "data": "AA=="}]).to_string();
        let card = NoteCard::from_note(&note(json!({"_id": "1", "attachment": encoded})));
        assert_eq!(card.attachments.len(), 1);
        assert!(matches!(card.attachments[0], AttachmentBlock::Audio { .. }));
    }

    #[test]
    fn test_broken_attachment_renders_error_block() {
        let card = NoteCard::from_note(&note(json!({"_id": "1", "attachment": "{oops"})));
        assert_eq!(card.attachments, vec![AttachmentBlock::Invalid]);
    }

    #[test]
    fn test_card_defaults() {
        let card = NoteCard::from_note(&note(json!({"_id": "1"})));
        assert_eq!(card.title, "Untitled");
        assert_eq!(card.note_type, NoteType::Text);
        assert_eq!(card.updated, "Unknown date");
        assert!(card.attachments.is_empty());

        let card = NoteCard::from_note(&note(json!({
            "_id": "2", "title": "Groceries", "is_encrypted": true,
            "time_creation": "2024-05-01T10:00:00"
        })));
        assert_eq!(card.updated, "2024-05-01T10:00:00");
        let text = render_text(&card);
        assert!(text.starts_with("Groceries [Encrypted] (text)"));
    }

    #[test]
    fn test_visible_notes_filters_by_owner() {
        let user: SessionUser = serde_json::from_value(json!({"id": "u1"})).unwrap();
        let notes = vec![
            note(json!({"_id": "a", "user_id": "u1"})),
            note(json!({"_id": "b", "user_id": "u2"})),
        ];
        let visible = visible_notes(&notes, Some(&user));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "a");
        assert!(visible_notes(&notes, None).is_empty());
    }
}
