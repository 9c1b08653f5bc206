//! Node Registry
//!
//! The registry is the factory and lookup table for task nodes. It owns the
//! strong reference to every node in the graph, resolves dependency
//! references by name or by handle, and provides the two specialized node
//! factories: settable inputs and externally cached nodes.
//!
//! # Registration order
//!
//! The node table preserves insertion order. Topological correctness never
//! depends on it, but the executor uses it as the deterministic tie-break
//! when several nodes become ready at the same time.
//!
//! # Idempotent registration
//!
//! Registering a name that already exists returns the existing node; the
//! arguments of the later call are ignored. Callers routinely invoke a
//! node's factory multiple times to fetch the same handle.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::debug;

use crate::cache::{CacheStore, MemoryCache};
use crate::error::GraphError;
use crate::graph::node::{ExecutionMode, TaskNode};

/// A dependency reference accepted by [`Registry::register`].
///
/// Dependencies can be declared either by the name of an already registered
/// node or by a node handle obtained from an earlier factory call.
pub enum DepRef<'a, V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Resolve against the registry's node table at registration time.
    Name(&'a str),

    /// Use the node directly. A handle not yet present in the table is
    /// adopted into it.
    Node(&'a TaskNode<V>),
}

/// Factory and lookup table for the nodes of a task graph.
pub struct Registry<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// All nodes, keyed by name, in declaration order.
    nodes: RwLock<IndexMap<String, TaskNode<V>>>,

    /// Settable input nodes: logical name -> version key -> node.
    input_nodes: RwLock<HashMap<String, HashMap<String, TaskNode<V>>>>,

    /// External store consulted by cached-mode nodes. Entries survive a
    /// node-level reset; a registry-wide reset clears them.
    cache: Arc<dyn CacheStore<V>>,
}

impl<V> Registry<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a registry with the default in-memory cache store.
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryCache::new()))
    }

    /// Create a registry backed by an external cache store.
    pub fn with_cache(cache: Arc<dyn CacheStore<V>>) -> Self {
        Self {
            nodes: RwLock::new(IndexMap::new()),
            input_nodes: RwLock::new(HashMap::new()),
            cache,
        }
    }

    /// Register a computation node.
    ///
    /// Idempotent: if `name` is already present, the existing node is
    /// returned and `deps`/`mode`/`can_set`/`func` are ignored. Dependent
    /// back-links are wired as part of node construction.
    pub fn register<F>(
        &self,
        name: &str,
        deps: &[DepRef<'_, V>],
        mode: ExecutionMode,
        can_set: bool,
        func: F,
    ) -> Result<TaskNode<V>, GraphError>
    where
        F: Fn(&[V]) -> Option<V> + Send + Sync + 'static,
    {
        let mut nodes = self.nodes.write();
        if let Some(existing) = nodes.get(name) {
            return Ok(existing.clone());
        }

        let mut resolved: SmallVec<[TaskNode<V>; 4]> = SmallVec::new();
        for dep in deps {
            match dep {
                DepRef::Name(dep_name) => {
                    let node = nodes
                        .get(*dep_name)
                        .ok_or_else(|| GraphError::UnknownNode((*dep_name).to_string()))?;
                    resolved.push(node.clone());
                }
                DepRef::Node(node) => {
                    // Adopt a handle created against this registry but not
                    // yet in the table.
                    if !nodes.contains_key(node.name()) {
                        nodes.insert(node.name().to_string(), (*node).clone());
                    }
                    resolved.push((*node).clone());
                }
            }
        }

        debug!(node = %name, mode = mode.as_str(), deps = deps.len(), "registering node");

        let node = TaskNode::new(name.to_string(), Arc::new(func), resolved, mode, can_set);
        nodes.insert(name.to_string(), node.clone());
        Ok(node)
    }

    /// Create (or fetch) a settable input node for `(name, key)`.
    ///
    /// The node is named `"{name}_{key}"`, has no dependencies, is eager,
    /// and permits `set_value`. If `initial` is provided it is applied
    /// immediately.
    pub fn input(
        &self,
        name: &str,
        key: &str,
        initial: Option<V>,
    ) -> Result<TaskNode<V>, GraphError> {
        let node_name = format!("{name}_{key}");

        let node = {
            let inputs = self.input_nodes.read();
            inputs.get(name).and_then(|by_key| by_key.get(key)).cloned()
        };

        let node = match node {
            Some(existing) => existing,
            None => {
                let mut nodes = self.nodes.write();
                let node = match nodes.get(&node_name) {
                    Some(existing) => existing.clone(),
                    None => {
                        debug!(input = %name, key = %key, "creating input node");
                        let node = TaskNode::new(
                            node_name.clone(),
                            Arc::new(|_: &[V]| None),
                            SmallVec::new(),
                            ExecutionMode::Eager,
                            true,
                        );
                        nodes.insert(node_name, node.clone());
                        node
                    }
                };
                drop(nodes);

                self.input_nodes
                    .write()
                    .entry(name.to_string())
                    .or_default()
                    .insert(key.to_string(), node.clone());
                node
            }
        };

        if let Some(value) = initial {
            node.set_value(value)?;
        }
        Ok(node)
    }

    /// Fetch an input node previously created for `(name, key)`.
    pub fn get_input(&self, name: &str, key: &str) -> Option<TaskNode<V>> {
        self.input_nodes
            .read()
            .get(name)
            .and_then(|by_key| by_key.get(key))
            .cloned()
    }

    /// Register a cached-mode node.
    ///
    /// The effective node identity includes the version key: distinct keys
    /// produce distinct nodes, each named `"{name}_{key}"` with zero graph
    /// dependencies. The node's compute function consults the cache store
    /// first and memoizes loader results under the composite key, so the
    /// raw value outlives node-level resets.
    pub fn cached<F>(&self, name: &str, key: &str, loader: F) -> TaskNode<V>
    where
        F: Fn() -> Option<V> + Send + Sync + 'static,
    {
        let node_name = format!("{name}_{key}");

        let mut nodes = self.nodes.write();
        if let Some(existing) = nodes.get(&node_name) {
            return existing.clone();
        }

        debug!(node = %node_name, "registering cached node");

        let cache = Arc::clone(&self.cache);
        let cache_key = node_name.clone();
        let log_name = name.to_string();
        let log_key = key.to_string();

        let func = move |_: &[V]| -> Option<V> {
            if let Some(hit) = cache.get(&cache_key) {
                debug!(node = %log_name, key = %log_key, "loading cached value");
                return Some(hit);
            }
            debug!(node = %log_name, key = %log_key, "no cached value, computing");
            let value = loader()?;
            cache.put(&cache_key, value.clone());
            Some(value)
        };

        let node = TaskNode::new(
            node_name.clone(),
            Arc::new(func),
            SmallVec::new(),
            ExecutionMode::Cached,
            false,
        );
        nodes.insert(node_name, node.clone());
        node
    }

    /// Look up a node by name.
    pub fn get(&self, name: &str) -> Option<TaskNode<V>> {
        self.nodes.read().get(name).cloned()
    }

    /// Snapshot of every node, in declaration order.
    pub fn snapshot(&self) -> Vec<TaskNode<V>> {
        self.nodes.read().values().cloned().collect()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether no nodes are registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Reset every node to its initial state and clear the cache store.
    ///
    /// All nodes are reset uniformly; input values are cleared too.
    pub fn reset(&self) {
        debug!("resetting registry");
        for node in self.nodes.read().values() {
            node.reset();
        }
        self.cache.clear();
    }
}

impl<V> Default for Registry<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
