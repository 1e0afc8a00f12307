//! Dynamic proof of possession on a freshly opened transport.
//!
//! ```text
//! Opening ──opened──▶ AwaitingChallenge ──challenge──▶ AwaitingAcceptance ──accepted──▶ Active
//!    │                        │                                │
//!    └────────────────────────┴───── anything else ────────────┴──────────────────▶ Failed
//! ```
//!
//! The static proof travels with the opening request and is checked by the peer before the
//! transport opens. [`Handshake`] only models what happens after that.

use std::time::Duration;

use authlink_crypto::KeyMaterial;
use tracing::debug;

use crate::{
    error::ChannelError,
    messages::{ClientMessage, ServerMessage},
    transport::{Transport, TransportEvent},
};

/// Where a single handshake attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// The transport is being opened.
    Opening,
    /// Open, waiting for `challenge`.
    AwaitingChallenge,
    /// `challenge_response` sent, waiting for `challenge_accepted`.
    AwaitingAcceptance,
    /// The peer accepted the proof.
    Active,
    /// The attempt failed. Terminal.
    Failed,
}

/// The handshake state machine, fed one inbound frame at a time.
pub struct Handshake<'a> {
    keys: &'a KeyMaterial,
    state: HandshakeState,
}

impl<'a> Handshake<'a> {
    /// Start a handshake that proves possession of `keys`.
    pub fn new(keys: &'a KeyMaterial) -> Self {
        Self {
            keys,
            state: HandshakeState::Opening,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The transport is open.
    pub fn opened(&mut self) -> Result<(), ChannelError> {
        match self.state {
            HandshakeState::Opening => {
                self.state = HandshakeState::AwaitingChallenge;
                Ok(())
            }
            state => Err(self.violation(format!("transport opened while {state:?}"))),
        }
    }

    /// Process one inbound frame. Returns the reply to send, if any.
    ///
    /// Any frame that is not exactly the expected control message fails the handshake.
    pub fn on_message(&mut self, text: &str) -> Result<Option<ClientMessage>, ChannelError> {
        let message = serde_json::from_str::<ServerMessage>(text).ok();

        match (self.state, message) {
            (HandshakeState::AwaitingChallenge, Some(ServerMessage::Challenge { challenge })) => {
                let Ok(nonce) = hex::decode(&challenge) else {
                    return Err(self.violation("challenge is not hex"));
                };
                let signature = self.keys.sign(&nonce);
                debug!("Sending challenge response, waiting for acceptance");
                self.state = HandshakeState::AwaitingAcceptance;
                Ok(Some(ClientMessage::ChallengeResponse {
                    signature: signature.to_hex(),
                }))
            }
            (HandshakeState::AwaitingAcceptance, Some(ServerMessage::ChallengeAccepted)) => {
                debug!("Challenge accepted");
                self.state = HandshakeState::Active;
                Ok(None)
            }
            (state, _) => Err(self.violation(format!("unexpected message while {state:?}"))),
        }
    }

    /// Mark the attempt as failed.
    pub fn fail(&mut self) {
        self.state = HandshakeState::Failed;
    }

    fn violation(&mut self, reason: impl Into<String>) -> ChannelError {
        self.fail();
        ChannelError::ProtocolViolation(reason.into())
    }
}

/// Drive a [`Handshake`] over an opened transport until the peer accepts or `timeout` elapses.
pub async fn perform(
    transport: &mut Transport,
    keys: &KeyMaterial,
    timeout: Duration,
) -> Result<(), ChannelError> {
    let mut handshake = Handshake::new(keys);
    handshake.opened()?;
    debug!("Transport open, waiting for auth challenge");

    let exchange = async {
        loop {
            match transport.next_event().await {
                TransportEvent::Message(text) => {
                    if let Some(reply) = handshake.on_message(&text)? {
                        transport.send(serde_json::to_string(&reply)?)?;
                    }
                    if handshake.state() == HandshakeState::Active {
                        return Ok::<(), ChannelError>(());
                    }
                }
                TransportEvent::Error(reason) => return Err(ChannelError::Transport(reason)),
                TransportEvent::Closed => return Err(ChannelError::TransportClosed),
            }
        }
    };

    let result = match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(ChannelError::HandshakeTimeout),
    };
    if result.is_err() {
        handshake.fail();
    }
    result
}
