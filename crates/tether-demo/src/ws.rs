//! WebSocket glue between tokio-tungstenite and the engine's transport seam.
//!
//! The socket library owns framing, handshake and keep-alive. This module
//! only splits each connection into an outbound [`Transport`] half and an
//! inbound [`InboundMessage`] stream for the router, and runs the server-side
//! accept/dispatch loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use tether_core::{InboundMessage, MethodRegistry, RpcConfig, RpcError, Transport};

/// Outbound half of a client WebSocket connection.
///
/// Sends go through an unbounded queue drained by a writer task, so many
/// concurrent callers never contend on the socket itself.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, text: &str) -> Result<(), RpcError> {
        self.outbound
            .send(Message::Text(text.to_string()))
            .map_err(|_| RpcError::Transport {
                message: "websocket connection closed".to_string(),
            })
    }
}

/// Connect to `url` and split the socket into a transport plus the inbound
/// stream to feed the router.
pub async fn connect(
    url: &str,
) -> Result<(WsTransport, mpsc::Receiver<InboundMessage>), RpcError> {
    let (socket, _response) =
        tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RpcError::Transport {
                message: format!("connect to {url} failed: {e}"),
            })?;
    info!(url, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                warn!(error = %e, "websocket send failed; writer task exiting");
                break;
            }
        }
    });

    let (in_tx, in_rx) = mpsc::channel(RpcConfig::INBOUND_QUEUE_CAPACITY);
    tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let msg = match frame {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "websocket read failed; reader task exiting");
                    break;
                }
            };
            let Some(inbound) = classify(msg) else {
                continue;
            };
            if in_tx.send(inbound).await.is_err() {
                break;
            }
        }
        debug!("websocket reader task done");
    });

    Ok((WsTransport { outbound: out_tx }, in_rx))
}

/// Map a socket frame onto the engine's inbound classification.
///
/// Pong and close frames are the socket library's bookkeeping and never
/// reach the router.
fn classify(msg: Message) -> Option<InboundMessage> {
    match msg {
        Message::Text(text) => Some(InboundMessage::text(text)),
        Message::Binary(bytes) => Some(InboundMessage::binary(
            String::from_utf8_lossy(&bytes).into_owned(),
        )),
        Message::Ping(_) => Some(InboundMessage::ping()),
        Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}

/// Accept connections on `listener` and answer each request frame through
/// `registry`.
pub async fn serve(listener: TcpListener, registry: Arc<MethodRegistry>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let registry = registry.clone();
        tokio::spawn(async move {
            debug!(%peer, "connection accepted");
            if let Err(e) = handle_connection(stream, registry).await {
                debug!(%peer, error = %e, "connection ended");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<MethodRegistry>,
) -> Result<(), WsError> {
    let socket = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = socket.split();

    while let Some(frame) = stream.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(_) => break,
            // The socket library answers pings on its own.
            _ => continue,
        };

        // Notifications produce no reply frame at all.
        if let Some(reply) = registry.process_message(&text).await {
            sink.send(Message::Text(reply)).await?;
        }
    }

    Ok(())
}
