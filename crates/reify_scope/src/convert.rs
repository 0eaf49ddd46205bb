//! Closure conversion: explicit rebinding of reconstructable captures.

use std::collections::BTreeSet;

use reify_common::{Ident, Interner};

use crate::analyzer::{free_sets, ScopeAnalyzer};
use crate::error::ScopeError;
use crate::expr::Expr;
use crate::ids::ExprId;
use crate::tree::ExprTree;
use crate::walk::rewrite;

/// One inserted `rebind` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebinding {
    /// The closure in the converted tree.
    pub closure: ExprId,
    /// The rebound name.
    pub name: Ident,
}

/// Result of [`convert_closures`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedTree {
    /// The rewritten tree.
    pub tree: ExprTree,
    /// Rebindings added by this run, in insertion order.
    pub rebindings: Vec<Rebinding>,
}

/// Rewrites every closure so its body starts with one `rebind` per captured
/// name that is in both `free` and `reconstructable`.
///
/// Names are inserted sorted by their text. Closures are converted
/// innermost first. Rebindings already leading a body are kept and not
/// repeated, so converting a converted tree adds nothing. The returned tree
/// holds only reachable nodes.
pub fn convert_closures(
    tree: &ExprTree,
    free: &BTreeSet<Ident>,
    reconstructable: &BTreeSet<Ident>,
    analyzer: &dyn ScopeAnalyzer,
    interner: &Interner,
) -> Result<ConvertedTree, ScopeError> {
    let captures = free_sets(tree, analyzer)?;
    let mut rebindings = Vec::new();

    let converted = rewrite(tree, |old, expr, nodes| {
        let (params, body) = match expr {
            Expr::Closure { params, body } => (params, body),
            other => return Ok(nodes.alloc(other)),
        };
        let captured = captures
            .get(&old)
            .ok_or_else(|| ScopeError::structural(old, "closure was not analyzed"))?;

        let (present, stmts) = match nodes.get(body) {
            Some(Expr::Block(stmts)) => (
                leading_rebinds(stmts.iter().map(|s| nodes.get(*s))),
                stmts.clone(),
            ),
            Some(Expr::Rebind(name)) => (BTreeSet::from([*name]), vec![body]),
            _ => (BTreeSet::new(), vec![body]),
        };
        let mut missing: Vec<Ident> = captured
            .iter()
            .copied()
            .filter(|n| free.contains(n) && reconstructable.contains(n) && !present.contains(n))
            .collect();
        if missing.is_empty() {
            return Ok(nodes.alloc(Expr::Closure { params, body }));
        }
        missing.sort_by(|a, b| {
            (interner.try_resolve(*a), a.as_raw()).cmp(&(interner.try_resolve(*b), b.as_raw()))
        });

        let mut new_stmts = Vec::with_capacity(missing.len() + stmts.len());
        for name in &missing {
            new_stmts.push(nodes.alloc(Expr::Rebind(*name)));
        }
        new_stmts.extend(stmts);
        let new_body = nodes.alloc(Expr::Block(new_stmts));
        let closure = nodes.alloc(Expr::Closure {
            params,
            body: new_body,
        });
        rebindings.extend(missing.into_iter().map(|name| Rebinding { closure, name }));
        Ok(closure)
    })?;

    // A replaced block body is left behind unreferenced.
    let mut moved = vec![None; converted.node_count()];
    let converted = rewrite(&converted, |old, expr, nodes| {
        let new = nodes.alloc(expr);
        if let Some(slot) = moved.get_mut(old.index()) {
            *slot = Some(new);
        }
        Ok(new)
    })?;
    for rebinding in &mut rebindings {
        rebinding.closure = moved
            .get(rebinding.closure.index())
            .copied()
            .flatten()
            .ok_or_else(|| ScopeError::structural(rebinding.closure, "closure was dropped"))?;
        tracing::trace!(
            closure = %rebinding.closure,
            name = interner.try_resolve(rebinding.name).unwrap_or("?"),
            "inserted rebinding"
        );
    }

    tracing::debug!(
        analyzer = analyzer.name(),
        inserted = rebindings.len(),
        "converted closures"
    );
    Ok(ConvertedTree {
        tree: converted,
        rebindings,
    })
}

fn leading_rebinds<'a>(stmts: impl Iterator<Item = Option<&'a Expr>>) -> BTreeSet<Ident> {
    stmts
        .map_while(|stmt| match stmt {
            Some(Expr::Rebind(name)) => Some(*name),
            _ => None,
        })
        .collect()
}
