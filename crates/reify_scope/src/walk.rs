//! Iterative post-order traversal with cycle detection.

use crate::arena::Arena;
use crate::error::ScopeError;
use crate::expr::Expr;
use crate::ids::ExprId;
use crate::tree::ExprTree;

/// Traversal state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not reached yet.
    Unvisited,
    /// Children are being processed. Reaching the node again is a cycle.
    Visiting,
    /// Finished; its result can be reused by other parents.
    Converted,
}

/// Returns every node reachable from the root, children before parents.
///
/// A node shared by several parents appears once. Uses an explicit stack, so
/// depth is limited only by memory.
pub fn post_order(tree: &ExprTree) -> Result<Vec<ExprId>, ScopeError> {
    tree.get(tree.root())?;
    let mut state = vec![NodeState::Unvisited; tree.node_count()];
    let mut order = Vec::new();
    // `true` marks the second visit, after the children were pushed.
    let mut stack = vec![(tree.root(), false)];

    while let Some((id, children_done)) = stack.pop() {
        if children_done {
            state[id.index()] = NodeState::Converted;
            order.push(id);
            continue;
        }
        match state[id.index()] {
            NodeState::Converted => continue,
            NodeState::Visiting => return Err(cycle_at(id)),
            NodeState::Unvisited => {}
        }
        state[id.index()] = NodeState::Visiting;
        stack.push((id, true));

        let children = tree.get(id)?.children();
        for (position, child) in children.into_iter().enumerate().rev() {
            match state.get(child.index()) {
                None => {
                    return Err(ScopeError::structural(
                        id,
                        format!("child {position} refers to missing node {child}"),
                    ))
                }
                Some(NodeState::Visiting) => return Err(cycle_at(child)),
                Some(NodeState::Converted) => {}
                Some(NodeState::Unvisited) => stack.push((child, false)),
            }
        }
    }
    Ok(order)
}

fn cycle_at(id: ExprId) -> ScopeError {
    ScopeError::structural(id, "node is its own ancestor")
}

/// Rebuilds the reachable part of a tree bottom-up.
///
/// `f` receives each original node with its children already replaced by
/// their new IDs, and returns the ID that stands for it in the new arena. It
/// may allocate a node, or return an existing ID to splice a node away.
pub(crate) fn rewrite<F>(tree: &ExprTree, mut f: F) -> Result<ExprTree, ScopeError>
where
    F: FnMut(ExprId, Expr, &mut Arena<ExprId, Expr>) -> Result<ExprId, ScopeError>,
{
    let order = post_order(tree)?;
    let mut remap: Vec<Option<ExprId>> = vec![None; tree.node_count()];
    let mut nodes = Arena::new();

    for id in order {
        let mut missing = None;
        let expr = tree.get(id)?.map_children(|child| {
            remap[child.index()].unwrap_or_else(|| {
                missing = Some(child);
                child
            })
        });
        if let Some(child) = missing {
            return Err(ScopeError::structural(
                child,
                "child was not rebuilt before its parent",
            ));
        }
        remap[id.index()] = Some(f(id, expr, &mut nodes)?);
    }

    let root = remap[tree.root().index()]
        .ok_or_else(|| ScopeError::structural(tree.root(), "root was not rebuilt"))?;
    ExprTree::from_parts(nodes, root)
}
