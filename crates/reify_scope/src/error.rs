//! Error types for scope analysis.

use crate::ids::ExprId;

/// Errors raised while walking an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The tree is not a finite, well-formed DAG.
    #[error("malformed expression tree at node {node}: {reason}")]
    Structural {
        /// The node where the problem was found.
        node: ExprId,
        /// What is wrong with it.
        reason: String,
    },
}

impl ScopeError {
    pub(crate) fn structural(node: ExprId, reason: impl Into<String>) -> Self {
        ScopeError::Structural {
            node,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_node() {
        let err = ScopeError::structural(ExprId::from_raw(7), "cycle through this node");
        assert_eq!(
            err.to_string(),
            "malformed expression tree at node #7: cycle through this node"
        );
    }
}
