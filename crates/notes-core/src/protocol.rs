//! Wire protocol for client-server communication.
//!
//! Every frame is a single JSON object. Outbound frames carry an `action`
//! tag, inbound frames carry a `status`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{Attachment, AttachmentField, ClientId, RequestId};

/// Action tag shared by requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Init,
    RestoreSession,
    Login,
    Register,
    Logout,
    GetNotes,
    SearchNotes,
    CreateNote,
    UpdateNote,
    DeleteNote,
    DeleteAllNotes,
    /// Any action this client does not know about.
    #[serde(other)]
    Unknown,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::RestoreSession => "restore_session",
            Self::Login => "login",
            Self::Register => "register",
            Self::Logout => "logout",
            Self::GetNotes => "get_notes",
            Self::SearchNotes => "search_notes",
            Self::CreateNote => "create_note",
            Self::UpdateNote => "update_note",
            Self::DeleteNote => "delete_note",
            Self::DeleteAllNotes => "delete_all_notes",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    #[default]
    Text,
    Voice,
    Image,
}

impl NoteType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields changed by an `update_note` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Anonymous handshake.
    Init { client_id: ClientId },
    /// Handshake for a client that already has a stored session.
    RestoreSession { client_id: ClientId, user_id: String },
    Login { email: String, password: String },
    Register {
        username: String,
        email: String,
        password: String,
    },
    Logout { user_id: String },
    GetNotes { user_id: String },
    SearchNotes { user_id: String, query: String },
    CreateNote {
        user_id: String,
        title: String,
        content: String,
        note_type: NoteType,
        encrypt: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<Attachment>,
    },
    UpdateNote {
        user_id: String,
        note_id: String,
        update_data: NoteUpdate,
    },
    DeleteNote { user_id: String, note_id: String },
    DeleteAllNotes { user_id: String },
}

impl ClientMessage {
    /// The action tag this message is sent under.
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Init { .. } => Action::Init,
            Self::RestoreSession { .. } => Action::RestoreSession,
            Self::Login { .. } => Action::Login,
            Self::Register { .. } => Action::Register,
            Self::Logout { .. } => Action::Logout,
            Self::GetNotes { .. } => Action::GetNotes,
            Self::SearchNotes { .. } => Action::SearchNotes,
            Self::CreateNote { .. } => Action::CreateNote,
            Self::UpdateNote { .. } => Action::UpdateNote,
            Self::DeleteNote { .. } => Action::DeleteNote,
            Self::DeleteAllNotes { .. } => Action::DeleteAllNotes,
        }
    }
}

/// Outbound frame: a message plus the optional correlation identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(flatten)]
    pub message: ClientMessage,
}

impl Envelope {
    /// Envelope without a request identifier (handshakes, fire-and-forget).
    #[must_use]
    pub const fn unsolicited(message: ClientMessage) -> Self {
        Self {
            request_id: None,
            message,
        }
    }

    #[must_use]
    pub const fn request(request_id: RequestId, message: ClientMessage) -> Self {
        Self {
            request_id: Some(request_id),
            message,
        }
    }

    /// Encode as a single JSON text frame.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
    Connected,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Authenticated user as returned by the server.
///
/// Fields beyond the three the client uses are kept so the record survives a
/// persist/restore cycle unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionUser {
    /// Avatar letter: the uppercased first character of the username.
    #[must_use]
    pub fn initial(&self) -> Option<char> {
        self.username.chars().next().map(|c| c.to_ascii_uppercase())
    }
}

/// Note record as stored by the server.
///
/// Documents come straight from the database, so every field is read
/// leniently: `null`, a missing key, or a value of the wrong shape falls back
/// to the default instead of rejecting the whole frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "_id", default, deserialize_with = "document_id")]
    pub id: String,
    #[serde(default, deserialize_with = "document_id")]
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Unknown types read as text.
    #[serde(default, deserialize_with = "lenient")]
    pub note_type: NoteType,
    #[serde(default, deserialize_with = "lenient")]
    pub is_encrypted: bool,
    #[serde(default, deserialize_with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub time_creation: Option<String>,
    #[serde(default, deserialize_with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub time_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentField>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Extended-JSON wrappers such as `{"$date": ...}` or `{"$oid": ...}` are
/// unwrapped; numbers are kept as their decimal text.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(mut map) => ["$date", "$oid", "$numberLong"]
            .into_iter()
            .find_map(|key| map.remove(key))
            .and_then(scalar_text),
        _ => None,
    }
}

fn document_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

/// Message from server to client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,
    /// Fields not modelled above (`user_id`, `note_id`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerMessage {
    /// Locally generated error-status object.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Parse a text frame.
    ///
    /// # Errors
    /// Returns error if the frame is not a JSON object of the expected shape.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
