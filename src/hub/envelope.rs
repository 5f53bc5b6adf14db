use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Caller-verified role, carried through joins and re-broadcast untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

/// Inbound envelopes. Anything that doesn't parse into one of these is a
/// protocol error: logged and dropped, the connection stays up.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Join {
        display_name: String,
        role: Role,
        room_id: String,
    },
    // Extra fields (a client-supplied room or name) are ignored; only the
    // join-time identity is trusted.
    Message { text: String },
}

/// Outbound envelopes. `id` is assigned by the hub right before broadcast and
/// resets on restart; `join_rejected` is never broadcast so it carries none.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    JoinRejected {
        display_name: String,
        reason: String,
    },
    UserJoined {
        id: u64,
        display_name: String,
        role: Role,
        room_id: String,
        timestamp: i64,
    },
    Message {
        id: u64,
        display_name: String,
        role: Role,
        room_id: String,
        text: String,
        timestamp: i64,
    },
    UserLeft {
        id: u64,
        display_name: String,
        role: Role,
        room_id: String,
        timestamp: i64,
    },
}

/// Wire timestamps are unix milliseconds.
pub fn unix_millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_parses_with_camel_case_fields() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"join","displayName":"Sam","role":"student","roomId":"math-101"}"#,
        )
        .unwrap();
        match event {
            ClientEvent::Join { display_name, role, room_id } => {
                assert_eq!(display_name, "Sam");
                assert_eq!(role, Role::Student);
                assert_eq!(room_id, "math-101");
            }
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn message_ignores_client_supplied_identity() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"message","text":"hi","roomId":"spoofed","displayName":"Eve"}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::Message { text } if text == "hi"));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"nuke","text":"x"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>(r#"{"text":"no tag"}"#).is_err());
    }

    #[test]
    fn server_events_tag_and_case() {
        let json = serde_json::to_value(ServerEvent::UserLeft {
            id: 7,
            display_name: "Sam".into(),
            role: Role::Teacher,
            room_id: "math-101".into(),
            timestamp: 123,
        })
        .unwrap();
        assert_eq!(json["type"], "user_left");
        assert_eq!(json["displayName"], "Sam");
        assert_eq!(json["role"], "teacher");
        assert_eq!(json["roomId"], "math-101");
        assert_eq!(json["id"], 7);
    }
}
