use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, Reaction};

/// Events sent FROM client TO server over the WebSocket.
///
/// The wire envelope is `{"type": "<event name>", "data": {...}}` with the
/// event names the web client emits (`user:joined`, `chat:message`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    /// Client announces its self-declared username for this connection.
    #[serde(rename = "user:joined")]
    Join { username: String },

    /// Client posts a new message. The client's clock and any client-supplied
    /// reactions are ignored; the server stamps its own time and starts the
    /// reaction list empty.
    #[serde(rename = "chat:message")]
    Message {
        id: String,
        username: String,
        text: String,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        reactions: Option<Vec<Reaction>>,
    },

    /// Toggle one user's reaction on a message.
    #[serde(rename = "message:reaction", rename_all = "camelCase")]
    Reaction {
        message_id: String,
        emoji: String,
        username: String,
    },

    /// Replace a message's text. Only honored for the message's author.
    #[serde(rename = "message:edit", rename_all = "camelCase")]
    Edit {
        message_id: String,
        new_text: String,
        username: String,
    },

    /// Remove a message entirely. Only honored for the message's author.
    #[serde(rename = "message:delete", rename_all = "camelCase")]
    Delete {
        message_id: String,
        username: String,
    },
}

/// Events sent FROM server TO clients over the WebSocket.
///
/// Failed mutations have no counterpart here: the protocol never answers an
/// offending client, it just stays silent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    /// Someone joined; delivered to everyone except the joining connection.
    #[serde(rename = "user:joined")]
    UserJoined {
        username: String,
        timestamp: DateTime<Utc>,
    },

    /// A message was created. Echoed to the sender too, so it receives the
    /// server-assigned timestamp.
    #[serde(rename = "chat:message")]
    Message(Message),

    /// A message's reaction groups changed.
    #[serde(rename = "message:reaction:update", rename_all = "camelCase")]
    ReactionUpdate {
        message_id: String,
        reactions: Vec<Reaction>,
    },

    /// A message's text was replaced by its author.
    #[serde(rename = "message:edit:update", rename_all = "camelCase")]
    EditUpdate {
        message_id: String,
        new_text: String,
    },

    /// A message was removed by its author.
    #[serde(rename = "message:delete:update", rename_all = "camelCase")]
    DeleteUpdate { message_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_wire_payloads() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"chat:message","data":{"id":"m1","username":"A","text":"hi","timestamp":"2026-01-01T00:00:00Z","reactions":[]}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::Message { id, username, text, timestamp, reactions } => {
                assert_eq!(id, "m1");
                assert_eq!(username, "A");
                assert_eq!(text, "hi");
                assert_eq!(timestamp.as_deref(), Some("2026-01-01T00:00:00Z"));
                assert_eq!(reactions, Some(vec![]));
            }
            other => panic!("parsed wrong variant: {other:?}"),
        }

        // timestamp and reactions are optional on the wire
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"chat:message","data":{"id":"m2","username":"A","text":"hi"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            ClientEvent::Message { timestamp: None, reactions: None, .. }
        ));
    }

    #[test]
    fn client_mutations_use_camel_case_keys() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"message:reaction","data":{"messageId":"m1","emoji":"👍","username":"B"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::Reaction { .. }));

        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"message:edit","data":{"messageId":"m1","newText":"hi!","username":"A"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::Edit { message_id, new_text, username } => {
                assert_eq!(message_id, "m1");
                assert_eq!(new_text, "hi!");
                assert_eq!(username, "A");
            }
            other => panic!("parsed wrong variant: {other:?}"),
        }

        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"message:delete","data":{"messageId":"m1","username":"A"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::Delete { .. }));
    }

    #[test]
    fn server_events_keep_original_event_names() {
        let json = serde_json::to_value(ServerEvent::UserJoined {
            username: "A".into(),
            timestamp: "2026-01-01T00:00:00Z".parse().unwrap(),
        })
        .unwrap();
        assert_eq!(json["type"], "user:joined");
        assert_eq!(json["data"]["username"], "A");

        let json = serde_json::to_value(ServerEvent::ReactionUpdate {
            message_id: "m1".into(),
            reactions: vec![Reaction { emoji: "👍".into(), users: vec!["B".into()] }],
        })
        .unwrap();
        assert_eq!(json["type"], "message:reaction:update");
        assert_eq!(json["data"]["messageId"], "m1");
        assert_eq!(json["data"]["reactions"][0]["emoji"], "👍");
        assert_eq!(json["data"]["reactions"][0]["users"][0], "B");

        let json = serde_json::to_value(ServerEvent::EditUpdate {
            message_id: "m1".into(),
            new_text: "hi!".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "message:edit:update");
        assert_eq!(json["data"]["newText"], "hi!");

        let json =
            serde_json::to_value(ServerEvent::DeleteUpdate { message_id: "m1".into() }).unwrap();
        assert_eq!(json["type"], "message:delete:update");
        assert_eq!(json["data"]["messageId"], "m1");
    }

    #[test]
    fn message_broadcast_carries_full_record() {
        let json = serde_json::to_value(ServerEvent::Message(Message {
            id: "m1".into(),
            username: "A".into(),
            text: "hi".into(),
            timestamp: "2026-01-01T00:00:00Z".parse().unwrap(),
            edited: false,
            reactions: vec![],
        }))
        .unwrap();
        assert_eq!(json["type"], "chat:message");
        assert_eq!(json["data"]["id"], "m1");
        assert_eq!(json["data"]["username"], "A");
        assert_eq!(json["data"]["text"], "hi");
        assert_eq!(json["data"]["edited"], false);
        assert_eq!(json["data"]["reactions"], serde_json::json!([]));
        // chrono serializes RFC 3339, which is what the web client parses
        assert!(json["data"]["timestamp"].as_str().unwrap().starts_with("2026-01-01T00:00:00"));
    }
}
