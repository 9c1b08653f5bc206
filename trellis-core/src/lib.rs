//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive task
//! graph. It implements:
//!
//! - Named computation nodes with eager, lazy, and cached evaluation modes
//! - A registry that owns the graph and deduplicates inputs and cached
//!   nodes per version key
//! - A single-threaded executor with deterministic topological scheduling,
//!   cycle detection, and demand-driven evaluation
//! - Scoped value overrides for temporary "what-if" recomputation
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: nodes, registry, and executor
//! - `cache`: the key-value boundary consumed by cached-mode nodes
//! - `error`: the error taxonomy
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_core::graph::{DepRef, ExecutionMode, GraphExecutor, Registry};
//!
//! let registry: Arc<Registry<f64>> = Arc::new(Registry::new());
//!
//! // Settable inputs, versioned by date.
//! let spot = registry.input("spot", "2025-05-10", Some(100.0)).unwrap();
//! let fx = registry.input("fx", "2025-05-10", Some(0.95)).unwrap();
//!
//! // A derived node computed during the eager pass.
//! registry
//!     .register(
//!         "usd_price",
//!         &[DepRef::Node(&spot), DepRef::Node(&fx)],
//!         ExecutionMode::Eager,
//!         false,
//!         |inputs| Some(inputs[0] * inputs[1]),
//!     )
//!     .unwrap();
//!
//! let executor = GraphExecutor::new(registry);
//! assert_eq!(executor.execute("usd_price").unwrap(), Some(95.0));
//!
//! // Temporarily override the FX rate; the override is released on drop.
//! {
//!     let _guard = fx.override_value(1.0);
//!     assert_eq!(executor.execute("usd_price").unwrap(), Some(100.0));
//! }
//! assert_eq!(executor.execute("usd_price").unwrap(), Some(95.0));
//! ```

pub mod cache;
pub mod error;
pub mod graph;

pub use cache::{CacheStore, MemoryCache};
pub use error::GraphError;
pub use graph::{DepRef, ExecutionMode, GraphExecutor, OverrideGuard, Registry, TaskNode};
