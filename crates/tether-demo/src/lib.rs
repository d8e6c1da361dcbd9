//! Todo request/response sample over WebSockets.
//!
//! Exercises the tether-core correlation engine end to end: a WebSocket
//! server dispatches Todo methods through a [`tether_core::MethodRegistry`],
//! and a client issues correlated calls through a typed proxy. The
//! `todo-server` and `todo-client` binaries wire the two halves together
//! over a real socket.

pub mod todo;
pub mod ws;

pub use todo::{todo_registry, Todo, TodoProxy, TodoStore};
pub use ws::{connect, serve, WsTransport};
