use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Error returned by an application message handler. It is logged and otherwise ignored.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Notifications from a [`Connection`](crate::Connection) to the surrounding application.
///
/// Every method is optional. All of them are called from the connection's background task, one
/// at a time and in event order, so implementations should return quickly.
pub trait ChannelEvents: Send + Sync {
    /// An application message arrived on the active channel.
    ///
    /// An error returned here is logged. It never affects the connection.
    fn on_message(&self, _message: Value) -> Result<(), HandlerError> {
        Ok(())
    }

    /// A previously working connection was lost. The channel keeps reconnecting.
    fn on_disconnect(&self, _cause: &ChannelError) {}

    /// The channel is active again after a loss.
    fn on_reconnected(&self) {}

    /// The connection failed for good, after the initial `connect()` already resolved.
    fn on_error(&self, _error: &ChannelError) {}
}

/// A [`ChannelEvents`] notification as a value, for consumers that prefer a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    #[allow(missing_docs)]
    Message(Value),
    #[allow(missing_docs)]
    Disconnected(ChannelError),
    #[allow(missing_docs)]
    Reconnected,
    #[allow(missing_docs)]
    Error(ChannelError),
}

impl ChannelEvents for mpsc::UnboundedSender<ChannelEvent> {
    fn on_message(&self, message: Value) -> Result<(), HandlerError> {
        self.send(ChannelEvent::Message(message))?;
        Ok(())
    }

    fn on_disconnect(&self, cause: &ChannelError) {
        let _ = self.send(ChannelEvent::Disconnected(cause.clone()));
    }

    fn on_reconnected(&self) {
        let _ = self.send(ChannelEvent::Reconnected);
    }

    fn on_error(&self, error: &ChannelError) {
        let _ = self.send(ChannelEvent::Error(error.clone()));
    }
}
