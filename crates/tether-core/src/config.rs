//! Tunable constants for the correlation engine.

use std::time::Duration;

/// Engine-wide defaults. Per-client overrides go through the builder
/// methods on `RpcClient`.
pub struct RpcConfig;

impl RpcConfig {
    /// Per-call deadline when the caller does not pass one.
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

    /// Correlation IDs restart from 1 after reaching this value.
    pub const DEFAULT_MAX_REQUEST_ID: u64 = u64::MAX;

    /// Inbound deliveries buffered between the socket task and the router.
    pub const INBOUND_QUEUE_CAPACITY: usize = 64;
}
