// krishi-core/src/relay/wire.rs

use krishi_common::Error;
use krishi_common::models::chat::{ChatEnvelope, ChatRole};

/// Payload type that triggers the call-request workflow.
pub const CALL_REQUEST_KIND: &str = "call_request";

/// Parse one inbound frame and stamp the server-authoritative fields.
/// Client-supplied `from_role`/`doc_id` values are discarded.
pub fn parse_inbound(raw: &str, role: ChatRole, conversation_id: &str) -> Result<ChatEnvelope, Error> {
    let mut envelope: ChatEnvelope = serde_json::from_str(raw)?;
    envelope.from_role = Some(role);
    envelope.doc_id = Some(conversation_id.to_string());
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_role_and_conversation() {
        let envelope =
            parse_inbound(r#"{"message":{"type":"chat","text":"hello"}}"#, ChatRole::User, "u1")
                .unwrap();
        assert_eq!(envelope.from_role, Some(ChatRole::User));
        assert_eq!(envelope.doc_id.as_deref(), Some("u1"));
    }

    #[test]
    fn client_supplied_stamps_are_overwritten() {
        let raw = r#"{"message":{"type":"chat","text":"x"},"from_role":"agent","doc_id":"spoof"}"#;
        let envelope = parse_inbound(raw, ChatRole::User, "u1").unwrap();
        assert_eq!(envelope.from_role, Some(ChatRole::User));
        assert_eq!(envelope.doc_id.as_deref(), Some("u1"));
    }

    #[test]
    fn frames_without_a_message_are_rejected() {
        assert!(parse_inbound("", ChatRole::User, "u1").is_err());
        assert!(parse_inbound("{}", ChatRole::User, "u1").is_err());
        assert!(parse_inbound("not json", ChatRole::User, "u1").is_err());
    }
}
