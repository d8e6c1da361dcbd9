//! Transport seam between the correlation engine and the socket library.
//!
//! The engine never touches sockets. Outbound text goes through the
//! [`Transport`] trait; inbound frames arrive as [`InboundMessage`]s, already
//! classified the way the socket library reports them (text, binary, ping).
//! [`ChannelTransport`] is an in-process implementation used by the test
//! suites and for same-process wiring.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::RpcConfig;
use crate::error::RpcError;

/// One inbound delivery from the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Frame payload, decoded as text.
    pub data: String,
    /// The frame arrived as a binary message.
    pub is_binary: bool,
    /// The frame is a keep-alive ping; carries no routable payload.
    pub is_ping: bool,
}

impl InboundMessage {
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            is_binary: false,
            is_ping: false,
        }
    }

    pub fn binary(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            is_binary: true,
            is_ping: false,
        }
    }

    pub fn ping() -> Self {
        Self {
            data: String::new(),
            is_binary: false,
            is_ping: true,
        }
    }
}

/// Outbound half of a duplex, message-oriented connection.
///
/// Implementations deliver whole text messages; framing, handshake and
/// keep-alive belong to the socket library behind the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one text message to the peer.
    async fn send(&self, text: &str) -> Result<(), RpcError>;
}

/// In-process transport endpoint backed by tokio channels.
///
/// [`ChannelTransport::pair`] links two endpoints: text sent on one side
/// shows up on the other side's inbound receiver.
#[derive(Debug)]
pub struct ChannelTransport {
    peer: mpsc::Sender<InboundMessage>,
}

impl ChannelTransport {
    /// Create two linked endpoints, each with its own inbound stream.
    #[allow(clippy::type_complexity)]
    pub fn pair() -> (
        (Self, mpsc::Receiver<InboundMessage>),
        (Self, mpsc::Receiver<InboundMessage>),
    ) {
        let (to_a, a_inbound) = mpsc::channel(RpcConfig::INBOUND_QUEUE_CAPACITY);
        let (to_b, b_inbound) = mpsc::channel(RpcConfig::INBOUND_QUEUE_CAPACITY);
        ((Self { peer: to_b }, a_inbound), (Self { peer: to_a }, b_inbound))
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, text: &str) -> Result<(), RpcError> {
        self.peer
            .send(InboundMessage::text(text))
            .await
            .map_err(|_| RpcError::Transport {
                message: "peer inbound queue closed".to_string(),
            })
    }
}
