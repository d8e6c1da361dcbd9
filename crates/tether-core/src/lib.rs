//! Tether Core - request/response correlation over a duplex, message-oriented
//! transport.
//!
//! A caller issues a remote procedure call and gets a synchronous-looking
//! result back, even though replies arrive on an independent delivery path
//! that may reorder, delay, or never deliver them. [`RpcClient`] allocates a
//! collision-free correlation ID per call, parks a one-shot waiter in the
//! pending table, ships the request, and routes each inbound message back to
//! the waiter that owns it. A call resolves to a deserialized result, a
//! remote-declared error, or a timeout - and the table entry is gone on every
//! one of those paths.
//!
//! The transport itself (framing, handshake, keep-alive) is someone else's
//! job: implementations of [`Transport`] deliver outbound text, and the
//! socket integration feeds inbound frames through [`RpcClient::handle_message`]
//! (usually via [`spawn_router`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_core::{spawn_router, ChannelTransport, RpcClient};
//!
//! # async fn run() -> tether_core::Result<()> {
//! let ((transport, inbound), _peer) = ChannelTransport::pair();
//! let client = Arc::new(RpcClient::new(transport));
//! spawn_router(client.clone(), inbound);
//!
//! let todos: Vec<serde_json::Value> =
//!     client.call("getTodos", serde_json::json!({ "userId": 2 })).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod pending;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-export commonly used types
pub use client::{spawn_router, RpcClient};
pub use config::RpcConfig;
pub use error::{Result, RpcError};
pub use id::RequestIdAllocator;
pub use pending::PendingCalls;
pub use protocol::{ErrorObject, Request, Response};
pub use server::{MethodRegistry, RpcMethod};
pub use transport::{ChannelTransport, InboundMessage, Transport};
