//! RPC client: the dispatcher and the response router.
//!
//! The dispatcher ([`RpcClient::call`]) allocates a correlation ID, parks a
//! waiter in the pending table, ships the request, and suspends the calling
//! task until the router resolves the waiter or the deadline passes. The
//! router ([`RpcClient::handle_message`]) runs on the transport's delivery
//! task: it classifies frames, fires the matching waiter, and reports
//! orphans. A fault on the router path must never escape, since it would
//! take the connection's delivery loop down with it.
//!
//! All correlation state is owned by the client instance. Two clients on two
//! connections cannot cross-correlate or contend on each other's table.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::config::RpcConfig;
use crate::error::{Result, RpcError};
use crate::id::RequestIdAllocator;
use crate::pending::PendingCalls;
use crate::protocol::{Request, Response};
use crate::transport::{InboundMessage, Transport};

/// Client side of one logical connection.
pub struct RpcClient<T: Transport> {
    transport: T,
    ids: RequestIdAllocator,
    pending: PendingCalls,
    call_timeout: Duration,
}

impl<T: Transport> RpcClient<T> {
    /// Create a client over `transport` with the default limits.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            ids: RequestIdAllocator::new(RpcConfig::DEFAULT_MAX_REQUEST_ID),
            pending: PendingCalls::new(),
            call_timeout: RpcConfig::DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Override the correlation-ID wraparound bound.
    ///
    /// Keep the number of concurrently outstanding calls well below this
    /// bound: reuse of an ID while its previous call is still pending is a
    /// correctness hazard.
    pub fn with_max_request_id(mut self, max: u64) -> Self {
        self.ids = RequestIdAllocator::new(max);
        self
    }

    /// Number of calls currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Call `method` with the client's default timeout.
    pub async fn call<R>(&self, method: &str, params: Value) -> Result<R>
    where
        R: DeserializeOwned + Default,
    {
        self.call_with_timeout(method, params, self.call_timeout)
            .await
    }

    /// Call `method` and wait up to `timeout` for the correlated response.
    ///
    /// The pending-table entry is removed on every exit path - result,
    /// remote error, timeout, transport failure, or the caller's future
    /// being dropped mid-wait.
    pub async fn call_with_timeout<R>(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<R>
    where
        R: DeserializeOwned + Default,
    {
        if method.is_empty() {
            return Err(RpcError::InvalidRequest {
                message: "empty method name".to_string(),
            });
        }

        let id = self.ids.next();
        let request = Request::new(method, params, id);
        let text = serde_json::to_string(&request)?;

        // Park the waiter before the request can hit the wire; otherwise a
        // fast response races the registration.
        let rx = self.pending.register(id)?;
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        debug!(id, method, "sending request");
        self.transport.send(&text).await?;

        let raw = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(_)) => {
                // The sender was dropped without firing: our entry was
                // discarded behind our back, e.g. during teardown.
                return Err(RpcError::Transport {
                    message: "waiter discarded before a response arrived".to_string(),
                });
            }
            Err(_) => {
                warn!(
                    id,
                    method,
                    timeout_ms = timeout.as_millis() as u64,
                    "call timed out waiting for response"
                );
                return Err(RpcError::Timeout(timeout));
            }
        };

        let response: Response = serde_json::from_str(&raw)?;
        if let Some(err) = response.error {
            return Err(RpcError::Remote {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        match serde_json::from_value::<R>(result) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Best-effort result decoding: a result payload that does
                // not match the expected shape degrades to the type's
                // default instead of failing the call.
                warn!(
                    id,
                    method,
                    error = %e,
                    "result did not match the expected shape; returning default"
                );
                Ok(R::default())
            }
        }
    }

    /// Send a notification: no correlation ID, no waiter, no response.
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        if method.is_empty() {
            return Err(RpcError::InvalidRequest {
                message: "empty method name".to_string(),
            });
        }

        let request = Request::notification(method, params);
        let text = serde_json::to_string(&request)?;
        debug!(method, "sending notification");
        self.transport.send(&text).await
    }

    /// Route one inbound transport message to its waiter.
    ///
    /// Runs on the transport's delivery task: whatever arrives, this logs
    /// and returns. Nothing on this path blocks, panics, or propagates.
    pub fn handle_message(&self, msg: InboundMessage) {
        if msg.is_ping {
            trace!("received ping");
            return;
        }
        if msg.is_binary {
            debug!("message type is binary");
        }
        trace!(data = %msg.data, "processing message");

        let response: Response = match serde_json::from_str(&msg.data) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "dropping undecodable inbound frame");
                return;
            }
        };

        if let Some(err) = &response.error {
            error!(
                code = err.code,
                message = %err.message,
                data = ?err.data,
                "response carries an error object"
            );
        }

        let Some(id) = response.correlation_id() else {
            warn!(id = ?response.id, "response has no usable correlation id");
            return;
        };

        if !self.pending.resolve(id, msg.data) {
            // Already timed out, a duplicate delivery, or never ours.
            warn!(id, "unexpected response with no pending call");
        }
    }
}

/// Removes the table entry when the call scope ends, whichever way it ends.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

/// Feed a transport's inbound stream through the router.
///
/// This is the "register the message callback once at construction" step:
/// the spawned task owns the receiving end for the life of the connection
/// and ends when the transport side closes the channel.
pub fn spawn_router<T>(
    client: Arc<RpcClient<T>>,
    mut inbound: mpsc::Receiver<InboundMessage>,
) -> JoinHandle<()>
where
    T: Transport + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = inbound.recv().await {
            client.handle_message(msg);
        }
        debug!("inbound stream closed; router task exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use async_trait::async_trait;
    use serde_json::json;

    /// Transport whose send always fails, for abort-path tests.
    struct DeadTransport;

    #[async_trait]
    impl Transport for DeadTransport {
        async fn send(&self, _text: &str) -> Result<()> {
            Err(RpcError::Transport {
                message: "connection lost".to_string(),
            })
        }
    }

    fn respond(client: &RpcClient<ChannelTransport>, text: &str) {
        client.handle_message(InboundMessage::text(text));
    }

    #[tokio::test]
    async fn test_empty_method_is_rejected_before_sending() {
        let ((transport, _inbound), (_peer, mut peer_inbound)) = ChannelTransport::pair();
        let client = RpcClient::new(transport);

        let result: Result<Value> = client.call("", json!({})).await;
        match result {
            Err(RpcError::InvalidRequest { .. }) => {}
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
        assert!(peer_inbound.try_recv().is_err(), "nothing should be sent");
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_aborts_and_clears_the_table() {
        let client = RpcClient::new(DeadTransport);

        let result: Result<Value> = client
            .call_with_timeout("getTodos", json!({}), Duration::from_secs(1))
            .await;

        match result {
            Err(RpcError::Transport { .. }) => {}
            other => panic!("expected Transport error, got {other:?}"),
        }
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_timeout_clears_the_table() {
        let ((transport, _inbound), _peer) = ChannelTransport::pair();
        let client = RpcClient::new(transport);

        let start = std::time::Instant::now();
        let result: Result<Value> = client
            .call_with_timeout("getTodos", json!({}), Duration::from_millis(50))
            .await;

        match result {
            Err(RpcError::Timeout(t)) => assert_eq!(t, Duration::from_millis(50)),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_late_response_after_timeout_is_an_orphan() {
        let ((transport, _inbound), _peer) = ChannelTransport::pair();
        let client = RpcClient::new(transport);

        let result: Result<Value> = client
            .call_with_timeout("getTodos", json!({}), Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(RpcError::Timeout(_))));

        // The response shows up anyway; it must be swallowed, not crash.
        respond(&client, r#"{"id": 1, "result": "too late"}"#);
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_remote_error_carries_code_message_and_data() {
        let ((transport, _inbound), _peer) = ChannelTransport::pair();
        let client = Arc::new(RpcClient::new(transport));

        let call = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call_with_timeout::<Value>("getTodos", json!({}), Duration::from_secs(1))
                    .await
            })
        };

        tokio::task::yield_now().await;
        respond(
            &client,
            r#"{"id": 1, "error": {"code": 42, "message": "bad input", "data": "userId"}}"#,
        );

        match call.await.unwrap() {
            Err(RpcError::Remote {
                code,
                message,
                data,
            }) => {
                assert_eq!(code, 42);
                assert_eq!(message, "bad input");
                assert_eq!(data, Some(json!("userId")));
            }
            other => panic!("expected Remote error, got {other:?}"),
        }
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_string_rendered_id_resolves_the_numeric_call() {
        let ((transport, _inbound), _peer) = ChannelTransport::pair();
        let client = Arc::new(RpcClient::new(transport));

        let call = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call_with_timeout::<String>("echo", json!({}), Duration::from_secs(1))
                    .await
            })
        };

        tokio::task::yield_now().await;
        respond(&client, r#"{"id": "1", "result": "matched"}"#);

        assert_eq!(call.await.unwrap().unwrap(), "matched");
    }

    #[tokio::test]
    async fn test_mismatched_result_shape_degrades_to_default() {
        let ((transport, _inbound), _peer) = ChannelTransport::pair();
        let client = Arc::new(RpcClient::new(transport));

        let call = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call_with_timeout::<Vec<u64>>("getTodos", json!({}), Duration::from_secs(1))
                    .await
            })
        };

        tokio::task::yield_now().await;
        respond(&client, r#"{"id": 1, "result": "not an array"}"#);

        assert_eq!(call.await.unwrap().unwrap(), Vec::<u64>::new());
    }

    #[tokio::test]
    async fn test_router_ignores_pings_and_garbage() {
        let ((transport, _inbound), _peer) = ChannelTransport::pair();
        let client = RpcClient::new(transport);

        client.handle_message(InboundMessage::ping());
        client.handle_message(InboundMessage::text("{ not json"));
        client.handle_message(InboundMessage::binary("\u{1}\u{2}"));
        respond(&client, r#"{"id": 12345, "result": null}"#);

        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_orphan_response_does_not_disturb_a_live_call() {
        let ((transport, _inbound), _peer) = ChannelTransport::pair();
        let client = Arc::new(RpcClient::new(transport));

        let call = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .call_with_timeout::<String>("echo", json!({}), Duration::from_secs(1))
                    .await
            })
        };

        tokio::task::yield_now().await;
        respond(&client, r#"{"id": 999, "result": "not yours"}"#);
        respond(&client, r#"{"id": 1, "result": "yours"}"#);

        assert_eq!(call.await.unwrap().unwrap(), "yours");
    }

    #[tokio::test]
    async fn test_notification_carries_no_id_and_no_waiter() {
        let ((transport, _inbound), (_peer, mut peer_inbound)) = ChannelTransport::pair();
        let client = RpcClient::new(transport);

        client.notify("log", json!({"line": "hi"})).await.unwrap();

        let sent = peer_inbound.recv().await.unwrap();
        assert!(!sent.data.contains("\"id\""));
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_request_ids_increase_per_call() {
        let ((transport, _inbound), (_peer, mut peer_inbound)) = ChannelTransport::pair();
        let client = Arc::new(
            RpcClient::new(transport).with_call_timeout(Duration::from_millis(10)),
        );

        for _ in 0..2 {
            let _: Result<Value> = client.call("tick", json!({})).await;
        }

        let first: Request =
            serde_json::from_str(&peer_inbound.recv().await.unwrap().data).unwrap();
        let second: Request =
            serde_json::from_str(&peer_inbound.recv().await.unwrap().data).unwrap();
        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
    }
}
