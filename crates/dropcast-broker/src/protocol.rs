//! Signaling wire format — `spec.md` §4.1 and §6. Every frame is a text
//! message carrying a JSON object tagged by a lowercase, hyphenated
//! `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role assigned to a peer at attach time (`spec.md` §3 "Room").
/// The creator is always [`Role::Sender`]; the joiner is always
/// [`Role::Receiver`]. Roles never change for the lifetime of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

/// A signaling frame. The same envelope is used for both directions:
/// inbound frames are parsed into it, and relayed frames (`offer`,
/// `answer`, `ice-candidate`) are re-serialized from it unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingMessage {
    /// Inbound: request to create a new room or join an existing one.
    Join {
        create_new: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },

    /// Bidirectional: an SDP offer (inbound from the sender, forwarded
    /// to the receiver).
    Offer { offer: Value },

    /// Bidirectional: an SDP answer (inbound from the receiver,
    /// forwarded to the sender).
    Answer { answer: Value },

    /// Bidirectional: an ICE candidate, forwarded to whichever peer
    /// didn't send it.
    IceCandidate { candidate: Value },

    /// Inbound: heartbeat probe; answered with [`SignalingMessage::Pong`].
    Ping,

    /// Outbound: sent on successful join.
    Joined {
        room_id: String,
        role: Role,
        peer_count: usize,
    },

    /// Outbound: sent once when a session's transport opens.
    Connected { message: String },

    /// Outbound: sent on an invalid join (unknown room, full room,
    /// malformed frame). The session is not torn down.
    Error { message: String },

    /// Outbound: sent to the surviving peer when its counterpart
    /// detaches.
    PeerDisconnected,

    /// Outbound: sent to all peers of a room just before its teardown.
    RoomExpired,

    /// Outbound: heartbeat reply.
    Pong,
}

impl SignalingMessage {
    /// Serialize to the wire's single-line JSON text form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("SignalingMessage serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_with_room_id_round_trips() {
        let msg = SignalingMessage::Join {
            create_new: false,
            room_id: Some("ABCXYZ".into()),
        };
        let json = msg.to_json();
        assert!(json.contains("\"type\":\"join\""));
        let parsed: SignalingMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            SignalingMessage::Join { create_new, room_id } => {
                assert!(!create_new);
                assert_eq!(room_id.as_deref(), Some("ABCXYZ"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn join_create_new_omits_room_id() {
        let msg = SignalingMessage::Join {
            create_new: true,
            room_id: None,
        };
        let json = msg.to_json();
        assert!(!json.contains("room_id"));
    }

    #[test]
    fn tags_match_spec_table() {
        assert!(SignalingMessage::Ping.to_json().contains("\"type\":\"ping\""));
        assert!(SignalingMessage::Pong.to_json().contains("\"type\":\"pong\""));
        assert!(SignalingMessage::PeerDisconnected
            .to_json()
            .contains("\"type\":\"peer-disconnected\""));
        assert!(SignalingMessage::RoomExpired
            .to_json()
            .contains("\"type\":\"room-expired\""));
        assert!(SignalingMessage::IceCandidate {
            candidate: Value::Null
        }
        .to_json()
        .contains("\"type\":\"ice-candidate\""));
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = SignalingMessage::Joined {
            room_id: "ABCXYZ".into(),
            role: Role::Sender,
            peer_count: 1,
        };
        assert!(msg.to_json().contains("\"role\":\"sender\""));
    }

    #[test]
    fn unrecognized_type_fails_to_parse() {
        let json = r#"{"type":"bogus"}"#;
        assert!(serde_json::from_str::<SignalingMessage>(json).is_err());
    }
}
