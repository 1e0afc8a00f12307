//! Control messages exchanged with the peer.
//!
//! # Message Flow
//!
//! ## Handshake
//! 1. Peer → Client: [`ServerMessage::Challenge`] - Fresh random nonce, hex encoded
//! 2. Client → Peer: [`ClientMessage::ChallengeResponse`] - Signature over the nonce bytes
//! 3. Peer → Client: [`ServerMessage::ChallengeAccepted`] - The channel is active
//!
//! ## Credential rotation
//! 4. Client → Peer: [`ClientMessage::SetAuth`] - Replacement auth bundle
//! 5. Peer → Client: [`ServerMessage::SetAuthResult`] - Whether it was stored
//!
//! Every message is a JSON object with a `type` discriminator. Anything else that arrives on an
//! active channel is application data and is handed to the application untouched.

use authlink_crypto::AuthBundle;
use serde::{Deserialize, Serialize};

/// `type` of the rotation reply, used to route it to the waiting rotation.
pub const SET_AUTH_RESULT: &str = "set_auth_result";

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Proof of possession for the current challenge.
    ChallengeResponse {
        /// Raw `r || s` signature, 128 hex characters.
        signature: String,
    },
    /// Replace the published identity.
    SetAuth {
        /// The new bundle.
        auth: AuthBundle,
    },
}

/// Control messages sent by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A fresh nonce to sign.
    Challenge {
        /// Hex encoded nonce.
        challenge: String,
    },
    /// The challenge response was verified.
    ChallengeAccepted,
    /// Outcome of a [`ClientMessage::SetAuth`].
    SetAuthResult {
        /// Whether the new bundle was stored.
        #[serde(default)]
        success: bool,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn challenge_response_wire_format() {
        let message = ClientMessage::ChallengeResponse {
            signature: "ab".repeat(64),
        };
        assert_eq!(
            serde_json::to_value(&message).expect("serializable"),
            json!({ "type": "challenge_response", "signature": "ab".repeat(64) })
        );
    }

    #[test]
    fn parses_server_messages() {
        let challenge: ServerMessage =
            serde_json::from_value(json!({ "type": "challenge", "challenge": "00ff" }))
                .expect("valid");
        assert_eq!(
            challenge,
            ServerMessage::Challenge {
                challenge: "00ff".to_owned()
            }
        );

        let accepted: ServerMessage =
            serde_json::from_value(json!({ "type": "challenge_accepted" })).expect("valid");
        assert_eq!(accepted, ServerMessage::ChallengeAccepted);

        let result: ServerMessage =
            serde_json::from_value(json!({ "type": SET_AUTH_RESULT, "success": true }))
                .expect("valid");
        assert_eq!(result, ServerMessage::SetAuthResult { success: true });
    }

    #[test]
    fn challenge_without_nonce_is_rejected() {
        assert!(serde_json::from_value::<ServerMessage>(json!({ "type": "challenge" })).is_err());
        assert!(serde_json::from_value::<ServerMessage>(
            json!({ "type": "challenge", "challenge": 42 })
        )
        .is_err());
    }
}
