//! Server-side method registry and dispatch.
//!
//! Method names map to typed handlers through an explicit registry resolved
//! at startup; dispatching an unregistered name is a hard
//! [`RpcError::MethodNotFound`], never a silent fallthrough.
//! [`MethodRegistry::process_message`] turns one inbound request frame into
//! at most one response frame - a request without an `id` is a notification
//! and gets its handler run but no response.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{Result, RpcError};
use crate::protocol::{self, Request, Response};

/// A callable server-side operation.
#[async_trait]
pub trait RpcMethod: Send + Sync {
    /// Handle a dispatched call and produce the result payload.
    async fn handle(&self, params: Value) -> Result<Value>;
}

/// Adapter so plain async closures can be registered without a named type.
struct FnMethod<F>(F);

#[async_trait]
impl<F, Fut> RpcMethod for FnMethod<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn handle(&self, params: Value) -> Result<Value> {
        (self.0)(params).await
    }
}

/// Name to handler mapping, resolved at startup.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Box<dyn RpcMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register(&mut self, name: impl Into<String>, handler: impl RpcMethod + 'static) {
        self.methods.insert(name.into(), Box::new(handler));
    }

    /// Register a plain async closure under `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(name, FnMethod(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Dispatch `method` with `params`.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        match self.methods.get(method) {
            Some(handler) => handler.handle(params).await,
            None => Err(RpcError::MethodNotFound(method.to_string())),
        }
    }

    /// Process one inbound request frame, producing the response text.
    ///
    /// Returns `None` when the request was a notification: its handler ran,
    /// but nothing goes back to the peer.
    pub async fn process_message(&self, text: &str) -> Option<String> {
        let request: Request = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "malformed request frame");
                return serialize_response(Response::error(
                    None,
                    protocol::PARSE_ERROR,
                    format!("parse error: {e}"),
                ));
            }
        };

        debug!(method = %request.method, id = ?request.id, "processing request");
        let params = request
            .params
            .unwrap_or(Value::Object(Default::default()));
        let outcome = self.dispatch(&request.method, params).await;

        let id = match request.id {
            Some(id) => id,
            None => {
                // Notifications never get a response, success or failure.
                if let Err(e) = outcome {
                    debug!(method = %request.method, error = %e, "notification handler failed");
                }
                return None;
            }
        };

        let response = match outcome {
            Ok(result) => Response::success(Some(Value::from(id)), result),
            // A handler that returns Remote speaks for the application:
            // pass its code, message and data through untouched.
            Err(RpcError::Remote {
                code,
                message,
                data,
            }) => Response {
                id: Some(Value::from(id)),
                result: None,
                error: Some(protocol::ErrorObject {
                    code,
                    message,
                    data,
                }),
            },
            Err(e) => {
                error!(method = %request.method, id, error = %e, "method dispatch failed");
                Response::error(Some(Value::from(id)), e.to_error_code(), e.to_string())
            }
        };
        serialize_response(response)
    }
}

fn serialize_response(response: Response) -> Option<String> {
    match serde_json::to_string(&response) {
        Ok(text) => Some(text),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn echo_registry() -> MethodRegistry {
        let mut registry = MethodRegistry::new();
        registry.register_fn("echo", |params| async move { Ok(params) });
        registry.register_fn("fail", |_params| async move {
            Err(RpcError::Remote {
                code: 42,
                message: "bad input".to_string(),
                data: None,
            })
        });
        registry
    }

    #[tokio::test]
    async fn test_dispatch_known_method() {
        let registry = echo_registry();
        let result = registry.dispatch("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method_is_method_not_found() {
        let registry = echo_registry();
        match registry.dispatch("nope", json!({})).await {
            Err(RpcError::MethodNotFound(name)) => assert_eq!(name, "nope"),
            other => panic!("expected MethodNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_process_message_success_echoes_the_id() {
        let registry = echo_registry();
        let reply = registry
            .process_message(r#"{"method": "echo", "params": [1, 2], "id": 9}"#)
            .await
            .unwrap();

        let response: Response = serde_json::from_str(&reply).unwrap();
        assert_eq!(response.correlation_id(), Some(9));
        assert_eq!(response.result, Some(json!([1, 2])));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_process_message_passes_remote_errors_through() {
        let registry = echo_registry();
        let reply = registry
            .process_message(r#"{"method": "fail", "params": {}, "id": 3}"#)
            .await
            .unwrap();

        let response: Response = serde_json::from_str(&reply).unwrap();
        let err = response.error.unwrap();
        assert_eq!(err.code, 42);
        assert_eq!(err.message, "bad input");
    }

    #[tokio::test]
    async fn test_process_message_unknown_method_code() {
        let registry = echo_registry();
        let reply = registry
            .process_message(r#"{"method": "nope", "id": 4}"#)
            .await
            .unwrap();

        let response: Response = serde_json::from_str(&reply).unwrap();
        assert_eq!(response.error.unwrap().code, protocol::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_process_message_parse_error_code() {
        let registry = echo_registry();
        let reply = registry.process_message("not valid json").await.unwrap();

        let response: Response = serde_json::from_str(&reply).unwrap();
        assert_eq!(response.error.unwrap().code, protocol::PARSE_ERROR);
        assert!(response.id.is_none());
    }

    #[tokio::test]
    async fn test_notification_runs_handler_but_suppresses_response() {
        let hits = Arc::new(AtomicU64::new(0));
        let mut registry = MethodRegistry::new();
        let counter = hits.clone();
        registry.register_fn("tick", move |_params| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
        });

        let reply = registry
            .process_message(r#"{"method": "tick", "params": {}}"#)
            .await;

        assert!(reply.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_notification_is_also_silent() {
        let registry = echo_registry();
        let reply = registry
            .process_message(r#"{"method": "nope", "params": {}}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_missing_params_default_to_empty_object() {
        let registry = echo_registry();
        let reply = registry
            .process_message(r#"{"method": "echo", "id": 1}"#)
            .await
            .unwrap();

        let response: Response = serde_json::from_str(&reply).unwrap();
        assert_eq!(response.result, Some(json!({})));
    }
}
