//! Task Graph
//!
//! This module implements the reactive hybrid-evaluation task graph: named
//! computation nodes wired into a DAG, each configured to evaluate eagerly,
//! lazily, or through an external cache.
//!
//! # Overview
//!
//! - [`TaskNode`] holds one computation: identity, function, dependency
//!   wiring, and evaluation state (memoized result, dirty flag, override
//!   stack).
//! - [`Registry`] is the factory and lookup table that owns every node and
//!   provides the input-node and cached-node specializations.
//! - [`GraphExecutor`] orders the graph topologically, drives the eager
//!   pass, and serves demand-driven value retrieval.
//!
//! # Control flow
//!
//! Client code registers nodes into the registry, the executor computes a
//! topological order and evaluates the eager nodes, and requesting a target
//! value forces any lazy or cached dependency chain that is still
//! unresolved. Results, dirty flags, and overrides persist in the nodes
//! until an explicit reset.
//!
//! # Design decisions
//!
//! 1. Dependencies are declared explicitly at registration time as a typed
//!    list of references, by name or by handle. There is no call-site
//!    dependency inference.
//!
//! 2. The registry and executor are plain values constructed and passed by
//!    the caller; there is no process-wide graph state.
//!
//! 3. We maintain both forward (dependencies) and reverse (dependents)
//!    edges: forward edges resolve inputs during computation, reverse edges
//!    drive dirty propagation.

mod executor;
mod node;
mod registry;

pub use executor::GraphExecutor;
pub use node::{ComputeFn, ExecutionMode, NodeId, OverrideGuard, TaskNode};
pub use registry::{DepRef, Registry};
