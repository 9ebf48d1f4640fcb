// krishi-common/src/models/chat.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Which side of a conversation a connection represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Agent,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Agent => "agent",
        }
    }

    /// The role on the receiving end of a message from this role.
    pub fn opposite(&self) -> ChatRole {
        match self {
            ChatRole::User => ChatRole::Agent,
            ChatRole::Agent => ChatRole::User,
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "agent" => Ok(ChatRole::Agent),
            other => Err(Error::Parse(format!("invalid chat role: {other}"))),
        }
    }
}

/// Body of one chat message unit as supplied by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Wire shape of one chat frame. `from_role` and `doc_id` are stamped by the
/// server before fan-out; anything the client sends in those fields is
/// overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub message: MessageBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_role: Option<ChatRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
}

/// One persisted chat message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub conversation_id: String,
    pub role: ChatRole,
    pub body: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Event fanned out on the broadcast bus when the receiving role is not
/// connected to the publishing process. `origin_process` lets consumers drop
/// their own events even when local and remote delivery race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEvent {
    pub conversation_id: String,
    pub origin_role: ChatRole,
    pub origin_process: Uuid,
    pub envelope: ChatEnvelope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        assert_eq!("user".parse::<ChatRole>().unwrap(), ChatRole::User);
        assert_eq!("agent".parse::<ChatRole>().unwrap(), ChatRole::Agent);
        assert!("admin".parse::<ChatRole>().is_err());
        assert_eq!(ChatRole::User.opposite(), ChatRole::Agent);
        assert_eq!(ChatRole::Agent.opposite(), ChatRole::User);
    }

    #[test]
    fn envelope_omits_unstamped_fields() {
        let envelope = ChatEnvelope {
            message: MessageBody {
                kind: "chat".into(),
                text: Some("hello".into()),
                data: None,
            },
            from_role: None,
            doc_id: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("from_role"));
        assert!(!json.contains("doc_id"));
        assert!(!json.contains("data"));
    }

    #[test]
    fn envelope_accepts_client_frame_without_role() {
        let envelope: ChatEnvelope =
            serde_json::from_str(r#"{"message":{"type":"chat","text":"hi"}}"#).unwrap();
        assert_eq!(envelope.message.kind, "chat");
        assert_eq!(envelope.message.text.as_deref(), Some("hi"));
        assert!(envelope.from_role.is_none());
    }

    #[test]
    fn stamped_envelope_serializes_role_lowercase() {
        let envelope = ChatEnvelope {
            message: MessageBody {
                kind: "chat".into(),
                text: Some("hello".into()),
                data: None,
            },
            from_role: Some(ChatRole::User),
            doc_id: Some("u1".into()),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""from_role":"user""#));
        assert!(json.contains(r#""doc_id":"u1""#));
    }
}
