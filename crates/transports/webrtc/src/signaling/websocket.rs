//! WebSocket transport for the signaling channel
//!
//! [`connect`] returns immediately with a sink and an event stream. The
//! socket is opened in a background task which reports
//! [`SocketEvent::Opened`] once the handshake finishes, then one
//! [`SocketEvent::Frame`] per text frame, and finally a single
//! [`SocketEvent::Closed`].

use super::channel::SignalingSink;
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Event reported by the socket task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Handshake finished; the channel may be marked ready
    Opened,
    /// Text frame received
    Frame(String),
    /// Socket closed or failed to open
    Closed(Option<String>),
}

/// Sink writing text frames to the socket task
pub struct WebSocketSink {
    tx: mpsc::UnboundedSender<Message>,
}

impl SignalingSink for WebSocketSink {
    fn transmit(&mut self, frame: String) -> Result<()> {
        self.tx
            .send(Message::Text(frame))
            .map_err(|_| Error::ChannelUnavailable("WebSocket writer has stopped".to_string()))
    }

    fn close(&mut self) {
        let _ = self.tx.send(Message::Close(None));
    }
}

/// Open a signaling socket in the background
///
/// # Arguments
///
/// * `url` - WebSocket signaling server URL (ws:// or wss://)
pub fn connect(url: &str) -> (WebSocketSink, mpsc::UnboundedReceiver<SocketEvent>) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(socket_task(url.to_string(), out_rx, event_tx));

    (WebSocketSink { tx: out_tx }, event_rx)
}

async fn socket_task(
    url: String,
    out_rx: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    info!("Connecting to signaling server: {}", url);

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("Failed to connect to signaling server: {}", e);
            let _ = events.send(SocketEvent::Closed(Some(format!("Failed to connect: {}", e))));
            return;
        }
    };

    info!("Connected to signaling server");
    if events.send(SocketEvent::Opened).is_err() {
        return;
    }

    let (write, read) = ws_stream.split();
    let sender = tokio::spawn(sender_task(write, out_rx));

    let reason = receiver_task(read, &events).await;
    sender.abort();
    let _ = events.send(SocketEvent::Closed(reason));
}

/// Sender task: forwards queued frames to the socket
async fn sender_task(
    mut write: futures::stream::SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = write.send(msg).await {
            error!("Failed to send WebSocket message: {}", e);
            break;
        }
        if closing {
            break;
        }
    }

    debug!("Sender task terminated");
}

/// Receiver task: forwards text frames until the socket closes
///
/// Returns the close reason, if any.
async fn receiver_task(
    mut read: futures::stream::SplitStream<WsStream>,
    events: &mpsc::UnboundedSender<SocketEvent>,
) -> Option<String> {
    while let Some(msg_result) = read.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if events.send(SocketEvent::Frame(text)).is_err() {
                    return None;
                }
            }
            Ok(Message::Close(frame)) => {
                info!("WebSocket connection closed");
                return frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
            }
            Ok(Message::Binary(_)) => warn!("Ignoring binary signaling frame"),
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket error: {}", e);
                return Some(e.to_string());
            }
        }
    }

    debug!("Receiver task terminated");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_reports_stopped_writer() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sink = WebSocketSink { tx };
        drop(rx);

        let err = sink.transmit("{}".to_string()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_sink_queues_text_and_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = WebSocketSink { tx };

        sink.transmit(r#"{"Key":"get_channels"}"#.to_string()).unwrap();
        sink.close();

        assert_eq!(rx.try_recv().unwrap(), Message::Text(r#"{"Key":"get_channels"}"#.to_string()));
        assert!(matches!(rx.try_recv().unwrap(), Message::Close(None)));
    }

    #[tokio::test]
    async fn test_connect_failure_reports_closed() {
        // Port 9 (discard) on localhost is not a WebSocket server
        let (_sink, mut events) = connect("ws://127.0.0.1:9/ws");
        match events.recv().await {
            Some(SocketEvent::Closed(Some(reason))) => assert!(reason.contains("Failed to connect")),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
