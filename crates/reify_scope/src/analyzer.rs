//! Free-name analyzers.
//!
//! An analyzer computes the free names of one node from the free names of
//! its children. The walk in [`free_sets`] feeds it nodes in post-order, so
//! each node is analyzed once even when shared.

use std::collections::{BTreeSet, HashMap};

use reify_common::Ident;

use crate::error::ScopeError;
use crate::expr::Expr;
use crate::ids::ExprId;
use crate::tree::ExprTree;
use crate::walk::post_order;

/// Computes free names bottom-up.
pub trait ScopeAnalyzer {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Returns the free names of `expr`. `children` holds the free names of
    /// `expr.children()`, in the same order.
    fn free_names(&self, expr: &Expr, children: &[&BTreeSet<Ident>]) -> BTreeSet<Ident>;
}

/// Binding-aware analysis: `let` binds in its body, closures bind their
/// parameters, everything else passes names through.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralAnalyzer;

impl ScopeAnalyzer for StructuralAnalyzer {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn free_names(&self, expr: &Expr, children: &[&BTreeSet<Ident>]) -> BTreeSet<Ident> {
        match expr {
            Expr::Literal(_) => BTreeSet::new(),
            Expr::Var(name) | Expr::Rebind(name) => BTreeSet::from([*name]),
            Expr::Assign { name, .. } => {
                let mut out = union(children);
                out.insert(*name);
                out
            }
            Expr::Let { name, .. } => {
                // children are [value, body]; the name is in scope in body only
                let mut out = children.get(1).map(|b| (*b).clone()).unwrap_or_default();
                out.remove(name);
                if let Some(value) = children.first() {
                    out.extend(value.iter().copied());
                }
                out
            }
            Expr::Closure { params, .. } => {
                let mut out = union(children);
                for param in params {
                    out.remove(param);
                }
                out
            }
            Expr::Call { .. } | Expr::Block(_) | Expr::If { .. } => union(children),
        }
    }
}

/// Fallback that ignores binding structure.
///
/// Every identifier occurrence, binders included, counts as free. This
/// over-approximates: a closure may get rebindings it does not need, but
/// never misses one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntacticCollector;

impl ScopeAnalyzer for SyntacticCollector {
    fn name(&self) -> &'static str {
        "syntactic"
    }

    fn free_names(&self, expr: &Expr, children: &[&BTreeSet<Ident>]) -> BTreeSet<Ident> {
        let mut out = union(children);
        match expr {
            Expr::Var(name)
            | Expr::Rebind(name)
            | Expr::Assign { name, .. }
            | Expr::Let { name, .. } => {
                out.insert(*name);
            }
            Expr::Closure { params, .. } => out.extend(params.iter().copied()),
            Expr::Literal(_) | Expr::Call { .. } | Expr::Block(_) | Expr::If { .. } => {}
        }
        out
    }
}

fn union(children: &[&BTreeSet<Ident>]) -> BTreeSet<Ident> {
    children
        .iter()
        .flat_map(|set| set.iter().copied())
        .collect()
}

/// Free names of every node reachable from the root.
pub fn free_sets(
    tree: &ExprTree,
    analyzer: &dyn ScopeAnalyzer,
) -> Result<HashMap<ExprId, BTreeSet<Ident>>, ScopeError> {
    let order = post_order(tree)?;
    let mut sets: HashMap<ExprId, BTreeSet<Ident>> = HashMap::with_capacity(order.len());
    for id in order {
        let expr = tree.get(id)?;
        let free = {
            let children = expr
                .children()
                .into_iter()
                .map(|child| {
                    sets.get(&child).ok_or_else(|| {
                        ScopeError::structural(child, "child was not analyzed before its parent")
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            analyzer.free_names(expr, &children)
        };
        sets.insert(id, free);
    }
    Ok(sets)
}
