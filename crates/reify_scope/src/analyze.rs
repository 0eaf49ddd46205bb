//! Free-variable analysis of a whole tree.

use std::collections::{BTreeMap, BTreeSet};

use reify_common::Ident;

use crate::analyzer::{free_sets, ScopeAnalyzer};
use crate::error::ScopeError;
use crate::expr::Expr;
use crate::ids::ExprId;
use crate::registry::ReconstructableRegistry;
use crate::tree::ExprTree;
use crate::walk::rewrite;

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeRecord {
    /// The normalized tree. Closure IDs in `captures` refer to it.
    pub tree: ExprTree,
    /// Names referenced but not bound anywhere in the tree.
    pub free: BTreeSet<Ident>,
    /// The free names marked in the registry.
    pub reconstructable: BTreeSet<Ident>,
    /// Free names of each reachable closure.
    pub captures: BTreeMap<ExprId, BTreeSet<Ident>>,
}

/// Normalizes `tree`, then computes its free names and the reconstructable
/// subset.
pub fn analyze(
    tree: &ExprTree,
    registry: &ReconstructableRegistry,
    analyzer: &dyn ScopeAnalyzer,
) -> Result<ScopeRecord, ScopeError> {
    let tree = normalize(tree)?;
    let mut sets = free_sets(&tree, analyzer)?;
    let free = sets.remove(&tree.root()).unwrap_or_default();

    let mut captures = BTreeMap::new();
    for (id, set) in sets {
        if tree.get(id)?.is_closure() {
            captures.insert(id, set);
        }
    }
    if tree.root_expr().is_closure() {
        captures.insert(tree.root(), free.clone());
    }

    let reconstructable = registry.filter(&free);
    tracing::debug!(
        analyzer = analyzer.name(),
        nodes = tree.node_count(),
        free = free.len(),
        reconstructable = reconstructable.len(),
        closures = captures.len(),
        "analyzed expression"
    );
    Ok(ScopeRecord {
        tree,
        free,
        reconstructable,
        captures,
    })
}

/// Flattens nested blocks, collapses single-statement blocks, and drops
/// unreachable nodes.
pub fn normalize(tree: &ExprTree) -> Result<ExprTree, ScopeError> {
    let flattened = rewrite(tree, |_, expr, nodes| match expr {
        Expr::Block(stmts) => {
            let mut flat = Vec::with_capacity(stmts.len());
            for stmt in stmts {
                match nodes.get(stmt) {
                    Some(Expr::Block(inner)) => flat.extend(inner.iter().copied()),
                    _ => flat.push(stmt),
                }
            }
            match flat.as_slice() {
                [single] => Ok(*single),
                _ => Ok(nodes.alloc(Expr::Block(flat))),
            }
        }
        other => Ok(nodes.alloc(other)),
    })?;
    // Spliced blocks are left behind unreferenced.
    rewrite(&flattened, |_, expr, nodes| Ok(nodes.alloc(expr)))
}
