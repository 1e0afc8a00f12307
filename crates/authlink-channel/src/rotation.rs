use authlink_crypto::AuthBundle;
use serde_json::Value;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::{
    connection::Connection,
    credentials::blocking,
    error::{ChannelError, RotationError},
    messages::{ClientMessage, ServerMessage, SET_AUTH_RESULT},
};

impl Connection {
    /// Replace the published identity with one derived from `new_password`.
    ///
    /// Sends a fresh [`AuthBundle`] over the active channel and waits for the peer's verdict. On
    /// success the new password becomes active and the live transport is closed, so the reconnect
    /// loop authenticates again against the new identity. On failure the previous identity stays
    /// in effect. Only one rotation can be pending at a time, and none is attempted while the
    /// channel is not active.
    pub async fn rotate(&self, new_password: &str) -> Result<(), ChannelError> {
        let inner = &self.inner;
        if !self.is_active().await {
            return Err(RotationError::NotConnected.into());
        }
        let Some((id, reply)) = inner.pending.register(SET_AUTH_RESULT).await else {
            return Err(RotationError::InProgress.into());
        };

        let password = Zeroizing::new(new_password.to_owned());
        let auth = match blocking(move || AuthBundle::create(&password)).await {
            Ok((auth, _)) => auth,
            Err(e) => {
                inner.pending.cancel(id).await;
                return Err(ChannelError::InvalidCredentials(e));
            }
        };
        let request = match serde_json::to_string(&ClientMessage::SetAuth { auth }) {
            Ok(request) => request,
            Err(e) => {
                inner.pending.cancel(id).await;
                return Err(e.into());
            }
        };
        if inner.send_active(request).await.is_err() {
            inner.pending.cancel(id).await;
            warn!("Channel went down before the credential rotation was sent");
            return Err(RotationError::NotConnected.into());
        }

        let reply = match tokio::time::timeout(inner.config.rotation_timeout, reply).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) | Err(_) => {
                inner.pending.cancel(id).await;
                warn!("No reply to the credential rotation");
                return Err(RotationError::Timeout.into());
            }
        };

        if !accepted(reply) {
            warn!("Peer rejected the new credentials");
            return Err(RotationError::Rejected.into());
        }

        inner.credentials.lock().await.rotated(new_password);
        inner.close_transport().await;
        info!("Credentials rotated, reconnecting with the new identity");
        Ok(())
    }
}

fn accepted(reply: Value) -> bool {
    matches!(
        serde_json::from_value(reply),
        Ok(ServerMessage::SetAuthResult { success: true })
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_explicit_success_is_accepted() {
        assert!(accepted(json!({ "type": "set_auth_result", "success": true })));
        assert!(!accepted(json!({ "type": "set_auth_result", "success": false })));
        assert!(!accepted(json!({ "type": "set_auth_result" })));
        assert!(!accepted(json!({ "type": "set_auth_result", "success": "yes" })));
    }
}
