//! Graph Executor
//!
//! The executor drives evaluation over a registry of task nodes. It builds
//! the dependency adjacency structure, produces a deterministic topological
//! order with cycle detection, runs the eager pass, and exposes
//! demand-driven retrieval of any node's value.
//!
//! # Two-phase evaluation
//!
//! 1. The eager pass walks the topological order and computes every eager
//!    node that is not yet computed. Lazy and cached nodes are never
//!    computed during this pass, even when they sit earlier in the order.
//! 2. Requesting a value then forces any lazy or cached dependency chain
//!    that is still unresolved.
//!
//! An eager node that reads from a lazy node forces that lazy node during
//! the eager pass, because its own computation calls `get_value` on the
//! dependency.
//!
//! # Determinism
//!
//! The topological sort is Kahn's algorithm with a FIFO queue. Ties among
//! simultaneously ready nodes are broken by the order in which they became
//! ready, seeded from registration order, so a fixed registration order
//! yields a reproducible pass.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::GraphError;
use crate::graph::node::ExecutionMode;
use crate::graph::registry::Registry;

/// Single-threaded cooperative executor over a [`Registry`] of nodes.
pub struct GraphExecutor<V>
where
    V: Clone + Send + Sync + 'static,
{
    registry: Arc<Registry<V>>,

    /// Whether the eager pass has already run. Subsequent `run_eager` calls
    /// are no-ops until the executor is reset.
    eager_executed: AtomicBool,
}

impl<V> GraphExecutor<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an executor over the given registry.
    pub fn new(registry: Arc<Registry<V>>) -> Self {
        Self {
            registry,
            eager_executed: AtomicBool::new(false),
        }
    }

    /// The registry this executor evaluates.
    pub fn registry(&self) -> &Arc<Registry<V>> {
        &self.registry
    }

    /// Compute a topological order over all registered nodes.
    ///
    /// In-degree is each node's dependency count; the FIFO queue is seeded
    /// with zero-in-degree nodes in registration order. Fails with
    /// [`GraphError::CycleDetected`] naming the unreached nodes when the
    /// order cannot cover the whole graph.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let nodes = self.registry.snapshot();

        let mut in_degree: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::with_capacity(nodes.len());

        for node in &nodes {
            in_degree.insert(node.name().to_string(), node.dependencies().len());
        }
        for node in &nodes {
            for dep in node.dependencies() {
                adjacency
                    .entry(dep.name().to_string())
                    .or_default()
                    .push(node.name().to_string());
            }
        }

        let mut queue: VecDeque<String> = nodes
            .iter()
            .filter(|node| in_degree[node.name()] == 0)
            .map(|node| node.name().to_string())
            .collect();
        let mut order = Vec::with_capacity(nodes.len());

        while let Some(name) = queue.pop_front() {
            if let Some(dependents) = adjacency.get(&name) {
                for dependent in dependents {
                    let degree = in_degree
                        .get_mut(dependent)
                        .expect("adjacency references a registered node");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent.clone());
                    }
                }
            }
            order.push(name);
        }

        if order.len() != nodes.len() {
            let reached: HashSet<&str> = order.iter().map(String::as_str).collect();
            let unreached: Vec<String> = nodes
                .iter()
                .map(|node| node.name().to_string())
                .filter(|name| !reached.contains(name.as_str()))
                .collect();
            error!(nodes = ?unreached, "cycle detected in graph");
            return Err(GraphError::CycleDetected(unreached));
        }

        Ok(order)
    }

    /// Run the eager pass: compute every eager, not-yet-computed node in
    /// topological order.
    ///
    /// Idempotent per executor instance. A cycle aborts the pass before any
    /// eager node is computed and leaves the pass un-run.
    pub fn run_eager(&self) -> Result<(), GraphError> {
        if self.eager_executed.load(Ordering::SeqCst) {
            debug!("eager pass already ran, skipping");
            return Ok(());
        }

        info!("starting eager pass");
        let order = self.topological_order()?;
        debug!(order = ?order, "topological order");

        for name in &order {
            if let Some(node) = self.registry.get(name) {
                if node.mode() == ExecutionMode::Eager && !node.is_computed() {
                    node.compute(false);
                }
            }
        }

        info!("eager pass complete");
        self.eager_executed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Get the value of a node by name.
    ///
    /// Fails with [`GraphError::UnknownNode`] if absent; otherwise delegates
    /// to the node's `get_value`, which forces lazy or cached computation as
    /// needed. `None` means the value is not ready.
    pub fn get_node_value(&self, name: &str) -> Result<Option<V>, GraphError> {
        let node = self
            .registry
            .get(name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))?;
        Ok(node.get_value())
    }

    /// Evaluate the graph and return the value of `target`.
    ///
    /// Runs the eager pass (first call only), then retrieves the target's
    /// value, recursively forcing any unresolved lazy or cached dependency
    /// chain feeding it.
    pub fn execute(&self, target: &str) -> Result<Option<V>, GraphError> {
        if self.registry.get(target).is_none() {
            return Err(GraphError::UnknownNode(target.to_string()));
        }

        debug!(target = %target, "executing graph");
        self.run_eager()?;
        self.get_node_value(target)
    }

    /// Reset the registry and allow the eager pass to run again.
    pub fn reset(&self) {
        self.registry.reset();
        self.eager_executed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::registry::DepRef;
    use std::sync::atomic::AtomicI32;

    fn registry_with_chain() -> Arc<Registry<i32>> {
        // a -> b -> c
        let registry = Arc::new(Registry::new());
        registry
            .register("a", &[], ExecutionMode::Eager, false, |_| Some(1))
            .unwrap();
        registry
            .register("b", &[DepRef::Name("a")], ExecutionMode::Eager, false, |v| {
                Some(v[0] + 1)
            })
            .unwrap();
        registry
            .register("c", &[DepRef::Name("b")], ExecutionMode::Eager, false, |v| {
                Some(v[0] + 1)
            })
            .unwrap();
        registry
    }

    #[test]
    fn topological_order_linearizes_dependencies() {
        let registry = registry_with_chain();
        let executor = GraphExecutor::new(registry);

        let order = executor.topological_order().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn topological_order_breaks_ties_by_registration_order() {
        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        // Three roots, registered out of alphabetical order.
        registry
            .register("zeta", &[], ExecutionMode::Lazy, false, |_| Some(1))
            .unwrap();
        registry
            .register("alpha", &[], ExecutionMode::Lazy, false, |_| Some(2))
            .unwrap();
        registry
            .register("mid", &[], ExecutionMode::Lazy, false, |_| Some(3))
            .unwrap();

        let executor = GraphExecutor::new(registry);
        let order = executor.topological_order().unwrap();
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
    }

    /// Close a two-node loop `a -> b -> a` next to an unrelated free node.
    fn cyclic_registry() -> Arc<Registry<i32>> {
        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        registry
            .register("free", &[], ExecutionMode::Eager, false, |_| Some(0))
            .unwrap();
        let a = registry
            .register("a", &[], ExecutionMode::Lazy, false, |_| Some(1))
            .unwrap();
        let b = registry
            .register("b", &[DepRef::Node(&a)], ExecutionMode::Lazy, false, |v| {
                Some(v[0])
            })
            .unwrap();
        a.push_dependency(&b);
        registry
    }

    #[test]
    fn cycle_detection_names_unreached_nodes() {
        let executor = GraphExecutor::new(cyclic_registry());

        let err = executor.topological_order().unwrap_err();
        match err {
            GraphError::CycleDetected(names) => {
                assert!(names.contains(&"a".to_string()));
                assert!(names.contains(&"b".to_string()));
                assert!(!names.contains(&"free".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cycle_aborts_eager_pass() {
        let registry = cyclic_registry();
        let executor = GraphExecutor::new(Arc::clone(&registry));

        assert!(executor.run_eager().is_err());
        // The pass did not run: nothing was computed and a later call
        // fails again instead of being skipped as already-run.
        assert!(!registry.get("free").unwrap().is_computed());
        assert!(executor.run_eager().is_err());
    }

    #[test]
    fn run_eager_computes_only_eager_nodes() {
        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        let lazy_calls = Arc::new(AtomicI32::new(0));
        let lazy_calls_clone = lazy_calls.clone();

        registry
            .register("eager_root", &[], ExecutionMode::Eager, false, |_| Some(10))
            .unwrap();
        registry
            .register("lazy_root", &[], ExecutionMode::Lazy, false, move |_| {
                lazy_calls_clone.fetch_add(1, Ordering::SeqCst);
                Some(100)
            })
            .unwrap();

        let executor = GraphExecutor::new(Arc::clone(&registry));
        executor.run_eager().unwrap();

        assert!(registry.get("eager_root").unwrap().is_computed());
        assert!(!registry.get("lazy_root").unwrap().is_computed());
        assert_eq!(lazy_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_eager_is_idempotent() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        registry
            .register("counted", &[], ExecutionMode::Eager, false, move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Some(1)
            })
            .unwrap();

        let executor = GraphExecutor::new(registry);
        executor.run_eager().unwrap();
        executor.run_eager().unwrap();
        executor.run_eager().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn eager_consumer_forces_lazy_dependency() {
        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        registry
            .register("l1", &[], ExecutionMode::Lazy, false, |_| Some(100))
            .unwrap();
        registry
            .register("e3", &[DepRef::Name("l1")], ExecutionMode::Eager, false, |v| {
                Some(v[0] * 2)
            })
            .unwrap();

        let executor = GraphExecutor::new(Arc::clone(&registry));
        executor.run_eager().unwrap();

        assert!(registry.get("l1").unwrap().is_computed());
        assert_eq!(
            executor.get_node_value("e3").unwrap(),
            Some(200)
        );
    }

    #[test]
    fn get_node_value_rejects_unknown_names() {
        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        let executor = GraphExecutor::new(registry);

        let err = executor.get_node_value("ghost").unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(name) if name == "ghost"));

        let err = executor.execute("ghost").unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(name) if name == "ghost"));
    }

    #[test]
    fn eager_value_before_pass_is_not_ready() {
        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        registry
            .register("e1", &[], ExecutionMode::Eager, false, |_| Some(10))
            .unwrap();

        let executor = GraphExecutor::new(registry);
        // Strict two-phase evaluation: reading an eager node before the
        // pass does not force it.
        assert_eq!(executor.get_node_value("e1").unwrap(), None);

        executor.run_eager().unwrap();
        assert_eq!(executor.get_node_value("e1").unwrap(), Some(10));
    }

    #[test]
    fn reset_allows_eager_pass_to_run_again() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let registry: Arc<Registry<i32>> = Arc::new(Registry::new());
        registry
            .register("counted", &[], ExecutionMode::Eager, false, move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Some(1)
            })
            .unwrap();

        let executor = GraphExecutor::new(registry);
        assert_eq!(executor.execute("counted").unwrap(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        executor.reset();
        assert_eq!(executor.execute("counted").unwrap(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
