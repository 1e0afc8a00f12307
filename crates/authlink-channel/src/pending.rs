use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

struct PendingRequest {
    reply_type: &'static str,
    reply: oneshot::Sender<Value>,
}

#[derive(Default)]
struct Registry {
    requests: HashMap<Uuid, PendingRequest>,
    by_reply_type: HashMap<&'static str, Uuid>,
}

/// Requests waiting for a reply on the channel, keyed by a generated id.
///
/// Replies carry no request id on the wire, so each pending request also claims the `type` of
/// the reply it expects. At most one request can wait for a given reply type, and the first
/// inbound message of that type consumes the request.
#[derive(Default)]
pub(crate) struct PendingRequests {
    registry: Mutex<Registry>,
}

impl PendingRequests {
    /// Register a request expecting a reply of `reply_type`.
    ///
    /// Returns `None` if another request is already waiting for that reply type.
    pub(crate) async fn register(
        &self,
        reply_type: &'static str,
    ) -> Option<(Uuid, oneshot::Receiver<Value>)> {
        let mut registry = self.registry.lock().await;
        if registry.by_reply_type.contains_key(reply_type) {
            return None;
        }

        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        registry.requests.insert(
            id,
            PendingRequest {
                reply_type,
                reply: tx,
            },
        );
        registry.by_reply_type.insert(reply_type, id);
        Some((id, rx))
    }

    /// Hand `message` to the request waiting for its `type`. Returns whether it was consumed.
    pub(crate) async fn resolve(&self, message: &Value) -> bool {
        let Some(reply_type) = message.get("type").and_then(Value::as_str) else {
            return false;
        };

        let mut registry = self.registry.lock().await;
        let Some(id) = registry.by_reply_type.remove(reply_type) else {
            return false;
        };
        if let Some(request) = registry.requests.remove(&id) {
            // The requester may have given up already, the reply is consumed either way
            let _ = request.reply.send(message.clone());
        }
        true
    }

    /// Forget a request without resolving it.
    pub(crate) async fn cancel(&self, id: Uuid) {
        let mut registry = self.registry.lock().await;
        if let Some(request) = registry.requests.remove(&id) {
            registry.by_reply_type.remove(request.reply_type);
        }
    }
}
