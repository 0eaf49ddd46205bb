//! Expression trees and the builder that assembles them.

use reify_common::Ident;
use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::error::ScopeError;
use crate::expr::{Expr, Literal};
use crate::ids::ExprId;

/// An expression rooted at one node of an arena.
///
/// Nodes unreachable from the root are ignored by every pass. Reachable nodes
/// may be shared by several parents; the passes visit each once. The root
/// always exists, including in deserialized trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExprTree")]
pub struct ExprTree {
    nodes: Arena<ExprId, Expr>,
    root: ExprId,
}

/// The serialized form of an [`ExprTree`], checked before use.
#[derive(Deserialize)]
struct RawExprTree {
    nodes: Arena<ExprId, Expr>,
    root: ExprId,
}

impl TryFrom<RawExprTree> for ExprTree {
    type Error = ScopeError;

    fn try_from(raw: RawExprTree) -> Result<Self, Self::Error> {
        Self::from_parts(raw.nodes, raw.root)
    }
}

impl ExprTree {
    pub(crate) fn from_parts(nodes: Arena<ExprId, Expr>, root: ExprId) -> Result<Self, ScopeError> {
        if !nodes.contains(root) {
            return Err(ScopeError::structural(root, "root is not in the tree"));
        }
        Ok(Self { nodes, root })
    }

    /// Returns the root node ID.
    pub fn root(&self) -> ExprId {
        self.root
    }

    /// Returns the root node.
    pub fn root_expr(&self) -> &Expr {
        &self.nodes[self.root]
    }

    /// Returns a node, or a structural error if the ID is dangling.
    pub fn get(&self, id: ExprId) -> Result<&Expr, ScopeError> {
        self.nodes
            .get(id)
            .ok_or_else(|| ScopeError::structural(id, "node is not in the tree"))
    }

    /// Returns the number of allocated nodes, reachable or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates over every allocated node.
    pub fn nodes(&self) -> impl Iterator<Item = (ExprId, &Expr)> {
        self.nodes.iter()
    }
}

/// Assembles an [`ExprTree`] node by node.
///
/// Nodes normally reference children built before them. [`reserve`] and
/// [`fill`] allow forward references, which is how a caller (or a buggy
/// transformation) ends up with a cyclic tree.
///
/// [`reserve`]: ExprBuilder::reserve
/// [`fill`]: ExprBuilder::fill
#[derive(Debug, Default)]
pub struct ExprBuilder {
    nodes: Arena<ExprId, Option<Expr>>,
}

impl ExprBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node.
    pub fn push(&mut self, expr: Expr) -> ExprId {
        self.nodes.alloc(Some(expr))
    }

    /// Allocates an empty slot to be filled later.
    pub fn reserve(&mut self) -> ExprId {
        self.nodes.alloc(None)
    }

    /// Fills a reserved slot.
    pub fn fill(&mut self, id: ExprId, expr: Expr) -> Result<(), ScopeError> {
        let Some(slot) = self.nodes.get_mut(id) else {
            return Err(ScopeError::structural(id, "node was never reserved"));
        };
        if slot.is_some() {
            return Err(ScopeError::structural(id, "node is already filled"));
        }
        *slot = Some(expr);
        Ok(())
    }

    /// Adds a literal.
    pub fn literal(&mut self, literal: Literal) -> ExprId {
        self.push(Expr::Literal(literal))
    }

    /// Adds an integer literal.
    pub fn int(&mut self, value: i64) -> ExprId {
        self.literal(Literal::Int(value))
    }

    /// Adds a string literal.
    pub fn str(&mut self, value: &str) -> ExprId {
        self.literal(Literal::Str(value.to_string()))
    }

    /// Adds a variable reference.
    pub fn var(&mut self, name: Ident) -> ExprId {
        self.push(Expr::Var(name))
    }

    /// Adds a call.
    pub fn call(&mut self, callee: ExprId, args: Vec<ExprId>) -> ExprId {
        self.push(Expr::Call { callee, args })
    }

    /// Adds `let name = value in body`.
    pub fn let_in(&mut self, name: Ident, value: ExprId, body: ExprId) -> ExprId {
        self.push(Expr::Let { name, value, body })
    }

    /// Adds `name = value`.
    pub fn assign(&mut self, name: Ident, value: ExprId) -> ExprId {
        self.push(Expr::Assign { name, value })
    }

    /// Adds a block.
    pub fn block(&mut self, stmts: Vec<ExprId>) -> ExprId {
        self.push(Expr::Block(stmts))
    }

    /// Adds a conditional.
    pub fn if_else(&mut self, cond: ExprId, then_branch: ExprId, else_branch: ExprId) -> ExprId {
        self.push(Expr::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    /// Adds a closure literal.
    pub fn closure(&mut self, params: Vec<Ident>, body: ExprId) -> ExprId {
        self.push(Expr::Closure { params, body })
    }

    /// Adds a rebinding statement.
    pub fn rebind(&mut self, name: Ident) -> ExprId {
        self.push(Expr::Rebind(name))
    }

    /// Finishes the tree. Fails if a reserved slot was never filled or the
    /// root was not built here. Cycles are only detected by the passes.
    pub fn finish(self, root: ExprId) -> Result<ExprTree, ScopeError> {
        let nodes = self.nodes.try_map(|id, slot| {
            slot.ok_or_else(|| ScopeError::structural(id, "reserved node was never filled"))
        })?;
        ExprTree::from_parts(nodes, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reify_common::Interner;

    #[test]
    fn builds_a_closure() {
        let names = Interner::new();
        let x = names.get_or_intern("x");
        let mut b = ExprBuilder::new();
        let body = b.var(x);
        let f = b.closure(vec![], body);
        let tree = b.finish(f).unwrap();
        assert_eq!(tree.root(), f);
        assert!(tree.root_expr().is_closure());
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.get(body).unwrap(), &Expr::Var(x));
    }

    #[test]
    fn dangling_lookup_is_structural() {
        let mut b = ExprBuilder::new();
        let one = b.int(1);
        let tree = b.finish(one).unwrap();
        let err = tree.get(ExprId::from_raw(9)).unwrap_err();
        assert!(matches!(err, ScopeError::Structural { node, .. } if node == ExprId::from_raw(9)));
    }

    #[test]
    fn unfilled_reservation_fails_finish() {
        let mut b = ExprBuilder::new();
        let hole = b.reserve();
        let root = b.block(vec![hole]);
        let err = b.finish(root).unwrap_err();
        assert_eq!(
            err,
            ScopeError::Structural {
                node: hole,
                reason: "reserved node was never filled".to_string()
            }
        );
    }

    #[test]
    fn fill_rejects_double_fill_and_unknown_ids() {
        let mut b = ExprBuilder::new();
        let slot = b.reserve();
        b.fill(slot, Expr::Literal(Literal::Unit)).unwrap();
        assert!(b.fill(slot, Expr::Literal(Literal::Unit)).is_err());
        assert!(b.fill(ExprId::from_raw(50), Expr::Literal(Literal::Unit)).is_err());
    }

    #[test]
    fn root_must_exist() {
        let b = ExprBuilder::new();
        assert!(b.finish(ExprId::from_raw(0)).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let mut b = ExprBuilder::new();
        let s = b.str("hi");
        let tree = b.finish(s).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let back: ExprTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn deserialized_root_must_exist() {
        let json = r#"{"nodes":{"items":[{"Literal":"Unit"}]},"root":5}"#;
        let err = serde_json::from_str::<ExprTree>(json).unwrap_err();
        assert!(err.to_string().contains("root is not in the tree"));

        let ok = r#"{"nodes":{"items":[{"Literal":"Unit"}]},"root":0}"#;
        let tree: ExprTree = serde_json::from_str(ok).unwrap();
        assert_eq!(tree.root_expr(), &Expr::Literal(Literal::Unit));
    }
}
