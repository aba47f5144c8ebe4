//! Shared step context.
//!
//! A journey's steps communicate through a mutable key/value store.
//! Scoped views namespace keys so steps from different concerns do not
//! trample each other. Infrastructure clients (HTTP client, ports) are
//! registered by name in a separate map that checkpoint/restore never
//! touches: only the data map participates in branch isolation.

use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot of the context's data map.
///
/// Clients are deliberately excluded; they are shared infrastructure,
/// not per-path state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    data: BTreeMap<String, Value>,
}

impl ContextSnapshot {
    /// Number of captured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the snapshot captured nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Mutable key/value store shared across steps.
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: BTreeMap<String, Value>,
    clients: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under a key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Fetch a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Fetch a value as a string, if it is one.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Remove a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Check if a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of data entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the data map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// A namespaced view over this context.
    ///
    /// Keys read and written through the view are prefixed with
    /// `scope.`, so `ctx.scoped("auth").set("token", ...)` lands under
    /// `auth.token`.
    pub fn scoped(&mut self, scope: impl Into<String>) -> ScopedContext<'_> {
        ScopedContext {
            context: self,
            scope: scope.into(),
        }
    }

    /// Register a named infrastructure client.
    ///
    /// Clients survive checkpoint/restore untouched and are shared, not
    /// cloned, when the context is cloned for a parallel path.
    pub fn register_client<C: Any + Send + Sync>(&mut self, name: impl Into<String>, client: C) {
        self.clients.insert(name.into(), Arc::new(client));
    }

    /// Register an already-shared client without re-wrapping it.
    ///
    /// Use this when another owner (e.g. a
    /// [`SharedSystem`](crate::checkpoint::SharedSystem)) must keep a
    /// handle to the same instance.
    pub fn register_client_arc<C: Any + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        client: Arc<C>,
    ) {
        self.clients.insert(name.into(), client);
    }

    /// Fetch a registered client by name and type.
    #[must_use]
    pub fn client<C: Any + Send + Sync>(&self, name: &str) -> Option<Arc<C>> {
        self.clients
            .get(name)
            .cloned()
            .and_then(|c| c.downcast::<C>().ok())
    }

    /// Check if a client is registered under a name.
    #[must_use]
    pub fn has_client(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    /// Snapshot the data map. Clients are not captured.
    #[must_use]
    pub fn checkpoint(&self) -> ContextSnapshot {
        ContextSnapshot {
            data: self.data.clone(),
        }
    }

    /// Replace the data map with a snapshot's contents.
    ///
    /// Registered clients are left as they are.
    pub fn restore(&mut self, snapshot: &ContextSnapshot) {
        self.data = snapshot.data.clone();
    }
}

/// A namespaced view over a [`Context`].
#[derive(Debug)]
pub struct ScopedContext<'a> {
    context: &'a mut Context,
    scope: String,
}

impl ScopedContext<'_> {
    fn full_key(&self, key: &str) -> String {
        format!("{}.{key}", self.scope)
    }

    /// Store a value under the scoped key.
    pub fn set(&mut self, key: &str, value: Value) {
        let full = self.full_key(key);
        self.context.set(full, value);
    }

    /// Fetch a value by scoped key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context.get(&self.full_key(key))
    }

    /// Remove a scoped value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let full = self.full_key(key);
        self.context.remove(&full)
    }

    /// Check if a scoped key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.context.contains(&self.full_key(key))
    }
}
