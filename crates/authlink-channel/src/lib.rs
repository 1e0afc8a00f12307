//! A password authenticated message channel that survives disconnects.
//!
//! A [`Connection`] proves possession of a password derived identity twice per transport: a
//! static proof in the opening request, then a signature over a fresh nonce from the peer. After
//! that it carries opaque JSON messages, queues them while no transport is active, and reconnects
//! with linear backoff until it gives up after [`ChannelConfig::max_attempts`] consecutive
//! failures. The published identity can be replaced in band with [`Connection::rotate`].
//!
//! Transports are pluggable through [`Connector`]. [`WebSocketConnector`] is the production
//! implementation; [`Transport::pair`] gives an in-memory one for tests.

mod bundle_source;
pub use bundle_source::AuthBundleSource;
#[cfg(feature = "http")]
pub use bundle_source::HttpAuthBundleSource;
mod config;
pub use config::{ChannelConfig, DEFAULT_CREDENTIAL_NAME};
mod connection;
pub use connection::{Connection, ConnectionState};
mod credentials;
pub mod error;
pub use error::{ChannelError, FetchError, RotationError};
mod events;
pub use events::{ChannelEvent, ChannelEvents, HandlerError};
pub mod handshake;
pub mod messages;
mod pending;
mod rotation;
mod transport;
pub use transport::{
    ConnectCredential, Connector, PeerEnd, Transport, TransportEvent, TransportSender,
};
#[cfg(feature = "websocket")]
mod websocket;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
