//! Error taxonomy for the task graph.
//!
//! Only genuine failures live here. "Not ready" — a dependency whose value
//! is unavailable — is deliberately not an error: it is modeled as `None`
//! and propagates silently through evaluation instead of aborting it.

use thiserror::Error;

/// Errors surfaced by the task graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A requested node name is not registered.
    #[error("node '{0}' not found in graph")]
    UnknownNode(String),

    /// The topological sort could not cover every node. Carries the names
    /// of the nodes left unreached, which participate in (or sit downstream
    /// of) a cycle.
    #[error("cycle detected in graph, nodes in cycle: {0:?}")]
    CycleDetected(Vec<String>),

    /// `set_value` was called on a node created without `can_set`.
    #[error("cannot set value on immutable node '{0}'")]
    NotSettable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_node() {
        let err = GraphError::UnknownNode("usd_price".to_string());
        assert_eq!(err.to_string(), "node 'usd_price' not found in graph");

        let err = GraphError::NotSettable("spot".to_string());
        assert_eq!(err.to_string(), "cannot set value on immutable node 'spot'");
    }

    #[test]
    fn cycle_error_carries_unreached_nodes() {
        let err = GraphError::CycleDetected(vec!["a".to_string(), "b".to_string()]);
        assert!(err.to_string().contains("cycle detected"));
        assert!(err.to_string().contains("\"a\""));
    }
}
