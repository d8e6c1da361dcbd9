//! Error types for the correlation engine.
//!
//! Only failures detected on the calling path (or during server-side
//! dispatch) become variants here. Events on the router's delivery path -
//! orphan responses, undecodable inbound frames - are logged where they
//! happen and never raised, so a bad frame cannot take down the transport
//! or any other in-flight call.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::protocol;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Main error type for calls and server-side dispatch.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The far end answered with an error object.
    #[error("remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// No matching response arrived within the deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed to deliver the request.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The request was malformed before it ever hit the wire.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Dispatch target is not registered.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// A waiter for this correlation ID is already registered.
    ///
    /// Only reachable when an ID wraps around while the call that first
    /// used it is still in flight.
    #[error("request id {0} is already in flight")]
    DuplicateRequestId(u64),

    /// JSON (de)serialization failed on the calling path.
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

impl RpcError {
    /// Map onto the JSON-RPC code space for server-side error responses.
    pub fn to_error_code(&self) -> i64 {
        match self {
            Self::Remote { code, .. } => *code,
            Self::MethodNotFound(_) => protocol::METHOD_NOT_FOUND,
            Self::InvalidRequest { .. } => protocol::INVALID_REQUEST,
            Self::Json { .. } => protocol::PARSE_ERROR,
            _ => protocol::INTERNAL_ERROR,
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            message: e.to_string(),
            source: Some(e),
        }
    }
}
