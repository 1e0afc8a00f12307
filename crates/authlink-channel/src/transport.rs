//! The transport seam.
//!
//! A [`Connector`] opens one [`Transport`] per connection attempt. A transport is a pair of
//! unbounded channels plus a [`CancellationToken`]: cancelling the token closes the underlying
//! socket and detaches the handle, so a superseded transport can never deliver events into a
//! later attempt.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ChannelError;

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame.
    Message(String),
    /// The transport failed. No further events follow.
    Error(String),
    /// The transport closed. No further events follow.
    Closed,
}

/// Out-of-band credential attached to the transport-opening request.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectCredential {
    /// Cookie name.
    pub name: String,
    /// Cookie value, the hex encoded static proof.
    pub value: String,
}

impl ConnectCredential {
    /// Credential `name=value`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `name=value`, as sent in a `Cookie` header.
    pub fn cookie(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl std::fmt::Debug for ConnectCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectCredential")
            .field("name", &self.name)
            .finish()
    }
}

/// Opens transports to the peer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new transport, presenting `credential` with the opening request.
    ///
    /// Resolves once the transport is open and ready to exchange messages.
    async fn open(&self, credential: &ConnectCredential) -> Result<Transport, ChannelError>;
}

/// Cloneable sending half of a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportSender {
    outgoing: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl TransportSender {
    /// Queue a text frame for sending.
    pub fn send(&self, text: String) -> Result<(), ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::TransportClosed);
        }
        self.outgoing
            .send(text)
            .map_err(|_| ChannelError::TransportClosed)
    }

    /// Close the transport.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the transport has been closed locally.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// An open transport. Dropping it closes it.
#[derive(Debug)]
pub struct Transport {
    sender: TransportSender,
    incoming: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Transport {
    /// Assemble a transport from its channels.
    ///
    /// The implementation behind the channels must stop and close the socket once `cancel` is
    /// cancelled, and must report the end of the stream with [`TransportEvent::Closed`] or
    /// [`TransportEvent::Error`].
    pub fn new(
        outgoing: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sender: TransportSender { outgoing, cancel },
            incoming,
        }
    }

    /// Build an in-memory transport together with the peer's end of it.
    pub fn pair() -> (Transport, PeerEnd) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let peer = PeerEnd {
            to_client: incoming_tx,
            from_client: outgoing_rx,
            cancel: cancel.clone(),
        };
        (Transport::new(outgoing_tx, incoming_rx, cancel), peer)
    }

    /// A sending handle that outlives borrows of the transport.
    pub fn sender(&self) -> TransportSender {
        self.sender.clone()
    }

    /// Queue a text frame for sending.
    pub fn send(&self, text: String) -> Result<(), ChannelError> {
        self.sender.send(text)
    }

    /// Wait for the next event.
    ///
    /// Once the transport has been closed locally this returns [`TransportEvent::Closed`]
    /// immediately, even if frames were still buffered.
    pub async fn next_event(&mut self) -> TransportEvent {
        tokio::select! {
            biased;
            _ = self.sender.cancel.cancelled() => TransportEvent::Closed,
            event = self.incoming.recv() => event.unwrap_or(TransportEvent::Closed),
        }
    }

    /// Close the transport.
    pub fn close(&self) {
        self.sender.close();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.sender.close();
    }
}

/// The peer's end of an in-memory [`Transport::pair`].
#[derive(Debug)]
pub struct PeerEnd {
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl PeerEnd {
    /// Deliver a text frame to the client. Returns `false` once the client side is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.to_client
            .send(TransportEvent::Message(text.into()))
            .is_ok()
    }

    /// Deliver a JSON value to the client.
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send(value.to_string())
    }

    /// Fail the transport with `reason`.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.to_client.send(TransportEvent::Error(reason.into()));
    }

    /// Close the transport from the peer side.
    pub fn close(&self) {
        let _ = self.to_client.send(TransportEvent::Closed);
    }

    /// Next frame sent by the client, or `None` once the client closed the transport.
    ///
    /// Frames the client queued before closing are still returned first.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::select! {
            biased;
            text = self.from_client.recv() => text,
            _ = self.cancel.cancelled() => None,
        }
    }

    /// Next frame sent by the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let text = self.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Whether the client closed the transport.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the client closes the transport.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_delivers_both_ways() {
        let (mut transport, mut peer) = Transport::pair();

        transport.send("hello".to_owned()).expect("open");
        assert_eq!(peer.recv().await.as_deref(), Some("hello"));

        assert!(peer.send("world"));
        assert_eq!(
            transport.next_event().await,
            TransportEvent::Message("world".to_owned())
        );
    }

    #[tokio::test]
    async fn local_close_detaches_buffered_events() {
        let (mut transport, peer) = Transport::pair();
        peer.send("late");
        transport.close();

        assert_eq!(transport.next_event().await, TransportEvent::Closed);
        assert!(peer.is_closed());
        assert_eq!(
            transport.send("x".to_owned()),
            Err(ChannelError::TransportClosed)
        );
    }

    #[tokio::test]
    async fn dropping_the_transport_closes_it() {
        let (transport, mut peer) = Transport::pair();
        let sender = transport.sender();
        sender.send("queued".to_owned()).expect("open");
        drop(transport);

        assert!(sender.is_closed());
        assert_eq!(peer.recv().await.as_deref(), Some("queued"));
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn peer_close_and_error_end_the_stream() {
        let (mut transport, peer) = Transport::pair();
        peer.fail("boom");
        assert_eq!(
            transport.next_event().await,
            TransportEvent::Error("boom".to_owned())
        );

        let (mut transport, peer) = Transport::pair();
        drop(peer);
        assert_eq!(transport.next_event().await, TransportEvent::Closed);
    }

    #[test]
    fn cookie_format() {
        let credential = ConnectCredential::new("connectKey", "abcd");
        assert_eq!(credential.cookie(), "connectKey=abcd");
        assert!(!format!("{credential:?}").contains("abcd"));
    }
}
