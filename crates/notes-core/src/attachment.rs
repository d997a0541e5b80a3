//! Note attachments.
//!
//! Payloads always travel as base64 text because frames are JSON.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Attachment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Audio,
    Image,
    File,
}

impl AttachmentKind {
    /// MIME type used when the payload is rendered as a `data:` URI.
    #[must_use]
    pub const fn data_mime(self) -> &'static str {
        match self {
            Self::Audio => "audio/wav",
            Self::Image => "image/*",
            Self::File => "application/octet-stream",
        }
    }
}

/// Attachment error.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Invalid attachment JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unrecognised attachment shape")]
    Malformed,
}

/// A single attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default)]
    pub name: String,
    /// Base64 payload.
    pub data: String,
}

impl Attachment {
    /// Create an attachment from raw bytes.
    #[must_use]
    pub fn from_bytes(kind: AttachmentKind, name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            kind,
            name: name.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// Decode the payload back to bytes.
    ///
    /// # Errors
    /// Returns error if the payload is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, AttachmentError> {
        Ok(BASE64.decode(&self.data)?)
    }

    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.kind.data_mime(), self.data)
    }
}

/// The `attachment` field of a stored note.
///
/// Servers store whatever the client sent: a single object, a list, or (from
/// older clients) a JSON string encoding either of those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentField {
    Many(Vec<Attachment>),
    One(Attachment),
    Encoded(String),
    Other(Value),
}

impl AttachmentField {
    /// Flatten every supported shape into an ordered list.
    ///
    /// # Errors
    /// Returns error if the field holds something that is not an attachment.
    pub fn attachments(&self) -> Result<Vec<Attachment>, AttachmentError> {
        match self {
            Self::Many(list) => Ok(list.clone()),
            Self::One(single) => Ok(vec![single.clone()]),
            Self::Encoded(text) => match serde_json::from_str::<Self>(text)? {
                Self::Many(list) => Ok(list),
                Self::One(single) => Ok(vec![single]),
                Self::Encoded(_) | Self::Other(_) => Err(AttachmentError::Malformed),
            },
            Self::Other(_) => Err(AttachmentError::Malformed),
        }
    }
}

impl From<Vec<Attachment>> for AttachmentField {
    fn from(list: Vec<Attachment>) -> Self {
        Self::Many(list)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_payload_is_base64() {
        let att = Attachment::from_bytes(AttachmentKind::Audio, "recording.wav", b"RIFF\x00\x01");
        assert_eq!(att.data, "UklGRgAB");
        assert_eq!(att.decode().unwrap(), b"RIFF\x00\x01");
        assert_eq!(att.data_uri(), "data:audio/wav;base64,UklGRgAB");
    }

    #[test]
    fn test_single_and_list_shapes_flatten_alike() {
        let one: AttachmentField =
            serde_json::from_value(json!({"type": "image", "name": "a.png", "data": "AA=="}))
                .unwrap();
        let many: AttachmentField =
            serde_json::from_value(json!([{"type": "image", "name": "a.png", "data": "AA=="}]))
                .unwrap();
        assert!(matches!(one, AttachmentField::One(_)));
        assert_eq!(one.attachments().unwrap(), many.attachments().unwrap());
    }

    #[test]
    fn test_encoded_string_shape() {
        let inner = json!([
            {"type": "file", "name": "a.txt", "data": "YQ=="},
            {"type": "image", "name": "b.png", "data": "Yg=="}
        ])
        .to_string();
        let field: AttachmentField = serde_json::from_value(Value::String(inner)).unwrap();
        let list = field.attachments().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].kind, AttachmentKind::Image);
    }

    #[test]
    fn test_malformed_shapes() {
        let field: AttachmentField = serde_json::from_value(json!({"size": 3})).unwrap();
        assert!(matches!(field.attachments(), Err(AttachmentError::Malformed)));

        let field: AttachmentField = serde_json::from_value(json!("not json")).unwrap();
        assert!(matches!(field.attachments(), Err(AttachmentError::Json(_))));
    }
}
