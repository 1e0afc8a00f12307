use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::COOKIE, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::ChannelError,
    transport::{ConnectCredential, Connector, Transport, TransportEvent},
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// Opens WebSocket transports, presenting the credential as a `Cookie` header.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    #[allow(missing_docs)]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, credential: &ConnectCredential) -> Result<Transport, ChannelError> {
        let mut request = self.url.as_str().into_client_request()?;
        let cookie = HeaderValue::from_str(&credential.cookie())
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        request.headers_mut().insert(COOKIE, cookie);

        let (ws_stream, _) = connect_async(request).await?;
        let (ws_sink, ws_source) = ws_stream.split();
        debug!(url = %self.url, "WebSocket open");

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(write_task(ws_sink, outgoing_rx, cancel.clone()));
        tokio::spawn(read_task(ws_source, incoming_tx, cancel.clone()));

        Ok(Transport::new(outgoing_tx, incoming_rx, cancel))
    }
}

/// Write task: forwards outgoing frames, sends a close frame once cancelled
async fn write_task(
    mut ws_sink: WsSink,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_sink.send(Message::Close(None)).await;
                break;
            }
            text = outgoing_rx.recv() => {
                let Some(text) = text else { break };
                if ws_sink.send(Message::Text(text)).await.is_err() {
                    cancel.cancel();
                    break;
                }
            }
        }
    }
}

/// Read task: turns frames into transport events until the stream ends or is cancelled
async fn read_task(
    mut ws_source: WsSource,
    incoming_tx: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = ws_source.next() => frame,
        };

        let event = match frame {
            Some(Ok(Message::Text(text))) => TransportEvent::Message(text),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                Ok(text) => TransportEvent::Message(text),
                Err(e) => TransportEvent::Error(format!("Binary frame is not UTF-8: {e}")),
            },
            Some(Ok(Message::Close(_))) | None => TransportEvent::Closed,
            Some(Ok(_)) => continue,
            Some(Err(e)) => TransportEvent::Error(e.to_string()),
        };

        let last = !matches!(event, TransportEvent::Message(_));
        if incoming_tx.send(event).is_err() || last {
            break;
        }
    }
}
