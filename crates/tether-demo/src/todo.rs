//! The Todo sample service: model, in-memory store, registry wiring and the
//! typed client-side proxy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use tether_core::{MethodRegistry, Result, RpcClient, Transport};

/// A single Todo item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub user_id: u64,
}

/// In-memory Todo collection for simulation purposes.
#[derive(Debug, Clone)]
pub struct TodoStore {
    todos: Vec<Todo>,
}

impl Default for TodoStore {
    fn default() -> Self {
        Self::seeded()
    }
}

impl TodoStore {
    /// The sample data set.
    pub fn seeded() -> Self {
        Self {
            todos: vec![
                Todo {
                    id: 1,
                    title: "Buy milk".to_string(),
                    user_id: 1,
                },
                Todo {
                    id: 2,
                    title: "Leave out the trash".to_string(),
                    user_id: 2,
                },
                Todo {
                    id: 3,
                    title: "Clean room".to_string(),
                    user_id: 2,
                },
            ],
        }
    }

    /// All Todos, optionally narrowed to one user.
    pub fn get_todos(&self, user_id: Option<u64>) -> Vec<Todo> {
        match user_id {
            Some(uid) if uid > 0 => self
                .todos
                .iter()
                .filter(|t| t.user_id == uid)
                .cloned()
                .collect(),
            _ => self.todos.clone(),
        }
    }
}

/// Build the method registry the Todo server exposes.
pub fn todo_registry(store: TodoStore) -> MethodRegistry {
    let store = Arc::new(store);
    let mut registry = MethodRegistry::new();
    registry.register_fn("getTodos", move |params| {
        let store = store.clone();
        async move {
            let user_id = params.get("userId").and_then(|v| v.as_u64());
            debug!(?user_id, "getting todos");
            serde_json::to_value(store.get_todos(user_id)).map_err(Into::into)
        }
    });
    registry
}

/// Typed proxy over the raw `call` surface.
pub struct TodoProxy<'a, T: Transport> {
    client: &'a RpcClient<T>,
}

impl<'a, T: Transport> TodoProxy<'a, T> {
    pub fn new(client: &'a RpcClient<T>) -> Self {
        Self { client }
    }

    /// Fetch Todos, optionally for a single user.
    pub async fn get_todos(&self, user_id: Option<u64>) -> Result<Vec<Todo>> {
        debug!(?user_id, "getting Todos");
        let todos: Vec<Todo> = self
            .client
            .call("getTodos", json!({ "userId": user_id }))
            .await?;
        debug!(count = todos.len(), "found Todos");
        Ok(todos)
    }
}
