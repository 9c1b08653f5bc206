//! Task Nodes
//!
//! A [`TaskNode`] is a single unit of computation in the task graph. It holds
//! a name, a compute function, its dependency wiring, and the mutable
//! evaluation state (memoized result, dirty flag, override stack).
//!
//! # Evaluation modes
//!
//! Every node is created with one of three [`ExecutionMode`]s:
//!
//! - `Eager`: computed proactively by the executor's topological pass.
//! - `Lazy`: computed on first demand after being marked dirty.
//! - `Cached`: a lazy node whose compute function additionally consults an
//!   external cache store (see the registry's cached-node factory).
//!
//! # "Not ready"
//!
//! A value of `None` means "not ready" — typically an input node whose value
//! has not been set yet. Unavailability propagates: a node that sees `None`
//! from any dependency returns `None` itself without invoking its function
//! and without mutating its state.
//!
//! # Ownership
//!
//! `TaskNode` is a clone-shares-state handle around `Arc`'d interior state.
//! Dependency edges hold strong references (the graph is acyclic, so this
//! cannot leak); dependent back-links are weak so that the two directions of
//! an edge never form a reference cycle. The registry holds the strong
//! reference that keeps every node alive.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::GraphError;

/// Unique identifier for a node in the task graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluation strategy for a task node. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Computed during the executor's eager pass, in topological order.
    Eager,

    /// Computed only when the value is requested and the node is dirty.
    Lazy,

    /// Lazy, with the computed value additionally memoized in an external
    /// cache store keyed by a version parameter. Cache entries survive a
    /// node-level reset.
    Cached,
}

impl ExecutionMode {
    /// Short lowercase name, used in log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Eager => "eager",
            ExecutionMode::Lazy => "lazy",
            ExecutionMode::Cached => "cached",
        }
    }
}

/// The compute function of a node.
///
/// Receives the resolved values of the node's dependencies, positionally, in
/// dependency-list order. Returns `None` to signal "not ready".
pub type ComputeFn<V> = Arc<dyn Fn(&[V]) -> Option<V> + Send + Sync>;

/// Mutable evaluation state, grouped under one lock.
struct NodeState<V> {
    /// Last computed or externally set value. `None` until first success.
    result: Option<V>,
    is_computed: bool,
    is_dirty: bool,
    /// Temporarily injected values; the top shadows everything else.
    override_stack: Vec<V>,
}

struct NodeInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    id: NodeId,
    name: String,
    func: ComputeFn<V>,
    mode: ExecutionMode,
    can_set: bool,

    /// Nodes this node reads from, in declared order. Strong references.
    /// Fixed at construction in the public API.
    dependencies: RwLock<SmallVec<[TaskNode<V>; 4]>>,

    /// Back-links to nodes that read from this one. Weak, populated at
    /// dependent construction time.
    dependents: RwLock<Vec<Weak<NodeInner<V>>>>,

    state: RwLock<NodeState<V>>,
}

/// A unit of computation in the task graph.
///
/// Cloning a `TaskNode` produces another handle to the same node; all state
/// is shared.
pub struct TaskNode<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<NodeInner<V>>,
}

impl<V> TaskNode<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new node and wire the dependent back-links.
    ///
    /// Nodes are created through the registry, which guarantees each name is
    /// constructed at most once — so every dependency gains this node as a
    /// dependent exactly once.
    pub(crate) fn new(
        name: String,
        func: ComputeFn<V>,
        dependencies: SmallVec<[TaskNode<V>; 4]>,
        mode: ExecutionMode,
        can_set: bool,
    ) -> Self {
        let node = Self {
            inner: Arc::new(NodeInner {
                id: NodeId::new(),
                name,
                func,
                mode,
                can_set,
                dependencies: RwLock::new(dependencies),
                dependents: RwLock::new(Vec::new()),
                state: RwLock::new(NodeState {
                    result: None,
                    is_computed: false,
                    is_dirty: true,
                    override_stack: Vec::new(),
                }),
            }),
        };

        for dep in node.inner.dependencies.read().iter() {
            dep.inner
                .dependents
                .write()
                .push(Arc::downgrade(&node.inner));
        }

        node
    }

    /// Test-only hook to wire an extra edge after construction, used to
    /// exercise cycle detection.
    #[cfg(test)]
    pub(crate) fn push_dependency(&self, dep: &TaskNode<V>) {
        self.inner.dependencies.write().push(dep.clone());
        dep.inner
            .dependents
            .write()
            .push(Arc::downgrade(&self.inner));
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the node's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the node's evaluation mode.
    pub fn mode(&self) -> ExecutionMode {
        self.inner.mode
    }

    /// Whether `set_value` is permitted on this node.
    pub fn can_set(&self) -> bool {
        self.inner.can_set
    }

    /// Whether the node's memoized result is stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.state.read().is_dirty
    }

    /// Whether the node has produced a result since the last reset.
    pub fn is_computed(&self) -> bool {
        self.inner.state.read().is_computed
    }

    /// The nodes this node reads from, in declared order.
    pub fn dependencies(&self) -> Vec<TaskNode<V>> {
        self.inner.dependencies.read().iter().cloned().collect()
    }

    /// Number of live nodes reading from this one.
    pub fn dependent_count(&self) -> usize {
        self.inner
            .dependents
            .read()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Execute the node's function with resolved dependency values.
    ///
    /// If `force` is false and the node is computed and clean, returns the
    /// memoized result without side effects. If any dependency reports "not
    /// ready", returns `None` without invoking the function and without
    /// mutating state. The same applies when the function itself returns
    /// `None`.
    pub fn compute(&self, force: bool) -> Option<V> {
        {
            let state = self.inner.state.read();
            if !force && !state.is_dirty && state.is_computed {
                return state.result.clone();
            }
        }

        let dependencies = self.dependencies();
        let mut inputs = Vec::with_capacity(dependencies.len());
        for dep in &dependencies {
            match dep.get_value() {
                Some(value) => inputs.push(value),
                None => {
                    trace!(
                        node = %self.inner.name,
                        dependency = %dep.name(),
                        "dependency not ready, skipping computation"
                    );
                    return None;
                }
            }
        }

        debug!(node = %self.inner.name, mode = self.inner.mode.as_str(), "computing node");

        let result = (self.inner.func)(&inputs);
        if result.is_none() {
            trace!(node = %self.inner.name, "node produced no value");
            return None;
        }

        let mut state = self.inner.state.write();
        state.result = result.clone();
        state.is_computed = true;
        state.is_dirty = false;
        result
    }

    /// Get the current value of this node.
    ///
    /// The top of the override stack, if any, shadows everything else. Lazy
    /// and cached nodes recompute on demand when dirty. Eager nodes never
    /// compute for the first time here — that is the executor's eager pass,
    /// and reading one before that pass yields `None` — but an eager node
    /// whose memoized value went stale recomputes, so mutations to its
    /// inputs stay visible between passes.
    pub fn get_value(&self) -> Option<V> {
        let (dirty, computed) = {
            let state = self.inner.state.read();
            if let Some(value) = state.override_stack.last() {
                return Some(value.clone());
            }
            (state.is_dirty, state.is_computed)
        };

        let recompute = match self.inner.mode {
            ExecutionMode::Lazy | ExecutionMode::Cached => dirty,
            ExecutionMode::Eager => dirty && computed,
        };
        if recompute {
            self.compute(false);
        }

        self.inner.state.read().result.clone()
    }

    /// Manually set the value of this node.
    ///
    /// Fails with [`GraphError::NotSettable`] unless the node was created
    /// with `can_set`. Marks the full dependents closure dirty.
    pub fn set_value(&self, value: V) -> Result<(), GraphError> {
        if !self.inner.can_set {
            return Err(GraphError::NotSettable(self.inner.name.clone()));
        }

        debug!(node = %self.inner.name, "setting node value");

        {
            let mut state = self.inner.state.write();
            state.result = Some(value);
            state.is_computed = true;
            state.is_dirty = false;
        }

        self.mark_dependents_dirty();
        Ok(())
    }

    /// Temporarily override the value of this node.
    ///
    /// Pushes `value` onto the override stack and marks dependents dirty.
    /// The returned guard pops the override and re-marks dependents dirty
    /// when dropped, on every exit path. Overrides nest; only the most
    /// recently pushed one is visible.
    pub fn override_value(&self, value: V) -> OverrideGuard<V> {
        debug!(node = %self.inner.name, "overriding node value");
        self.inner.state.write().override_stack.push(value);
        self.mark_dependents_dirty();
        OverrideGuard { node: self.clone() }
    }

    /// Mark this node and its full dependents closure dirty.
    ///
    /// Always traverses every transitive dependent, even if this node was
    /// already dirty: `mark_dirty` is also invoked directly on arbitrary
    /// nodes after a fresh `set_value`, so short-circuiting on "already
    /// dirty" could under-propagate.
    pub fn mark_dirty(&self) {
        self.inner.state.write().is_dirty = true;
        self.mark_dependents_dirty();
    }

    /// Mark every transitive dependent of this node dirty, leaving this
    /// node's own state untouched.
    pub fn mark_dependents_dirty(&self) {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<Arc<NodeInner<V>>> = VecDeque::new();

        for weak in self.inner.dependents.read().iter() {
            if let Some(dependent) = weak.upgrade() {
                queue.push_back(dependent);
            }
        }

        // BFS over the dependents graph; each node is visited once per call.
        while let Some(inner) = queue.pop_front() {
            if !visited.insert(inner.id) {
                continue;
            }

            inner.state.write().is_dirty = true;

            for weak in inner.dependents.read().iter() {
                if let Some(next) = weak.upgrade() {
                    queue.push_back(next);
                }
            }
        }
    }

    /// Reset the node back to its initial state: uncomputed, dirty, no
    /// result, no overrides. Dependency wiring is untouched.
    pub fn reset(&self) {
        trace!(node = %self.inner.name, "resetting node");
        let mut state = self.inner.state.write();
        state.result = None;
        state.is_computed = false;
        state.is_dirty = true;
        state.override_stack.clear();
    }
}

impl<V> Clone for TaskNode<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Debug for TaskNode<V>
where
    V: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("TaskNode")
            .field("name", &self.inner.name)
            .field("mode", &self.inner.mode)
            .field("result", &state.result)
            .field("is_computed", &state.is_computed)
            .field("is_dirty", &state.is_dirty)
            .field("overrides", &state.override_stack.len())
            .finish()
    }
}

/// Scoped handle to a temporary value override.
///
/// Dropping the guard pops the override and marks the node's dependents
/// dirty again, under normal and panic exits alike.
pub struct OverrideGuard<V>
where
    V: Clone + Send + Sync + 'static,
{
    node: TaskNode<V>,
}

impl<V> Drop for OverrideGuard<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        debug!(node = %self.node.inner.name, "releasing override");
        self.node.inner.state.write().override_stack.pop();
        self.node.mark_dependents_dirty();
    }
}
