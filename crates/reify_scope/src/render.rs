//! S-expression rendering for diagnostics and tests.

use reify_common::{Ident, Interner};

use crate::error::ScopeError;
use crate::expr::{Expr, Literal};
use crate::tree::ExprTree;
use crate::walk::post_order;

/// Renders the tree reachable from the root.
///
/// Shared subtrees are printed at every use. Names not known to `interner`
/// print as `?N`.
pub fn render(tree: &ExprTree, interner: &Interner) -> Result<String, ScopeError> {
    let mut rendered: Vec<Option<String>> = vec![None; tree.node_count()];
    for id in post_order(tree)? {
        let expr = tree.get(id)?;
        let children = expr
            .children()
            .into_iter()
            .map(|child| {
                rendered[child.index()]
                    .as_deref()
                    .ok_or_else(|| ScopeError::structural(child, "child was not rendered"))
            })
            .collect::<Result<Vec<&str>, _>>()?;
        let text = render_node(expr, &children, interner);
        rendered[id.index()] = Some(text);
    }
    rendered[tree.root().index()]
        .take()
        .ok_or_else(|| ScopeError::structural(tree.root(), "root was not rendered"))
}

fn name(interner: &Interner, ident: Ident) -> String {
    match interner.try_resolve(ident) {
        Some(s) => s.to_string(),
        None => format!("?{}", ident.as_raw()),
    }
}

fn render_node(expr: &Expr, children: &[&str], interner: &Interner) -> String {
    match expr {
        Expr::Literal(Literal::Unit) => "()".to_string(),
        Expr::Literal(Literal::Bool(b)) => b.to_string(),
        Expr::Literal(Literal::Int(i)) => i.to_string(),
        Expr::Literal(Literal::Float(x)) => format!("{x:?}"),
        Expr::Literal(Literal::Str(s)) => format!("{s:?}"),
        Expr::Var(ident) => name(interner, *ident),
        Expr::Rebind(ident) => {
            let n = name(interner, *ident);
            format!("({n} = reconstruct(identity_of({n})))")
        }
        Expr::Call { .. } => format!("({})", children.join(" ")),
        Expr::Let { name: ident, .. } => format!(
            "(let ({} {}) {})",
            name(interner, *ident),
            children.first().unwrap_or(&""),
            children.get(1).unwrap_or(&"")
        ),
        Expr::Assign { name: ident, .. } => format!(
            "(set! {} {})",
            name(interner, *ident),
            children.first().unwrap_or(&"")
        ),
        Expr::Block(_) if children.is_empty() => "(do)".to_string(),
        Expr::Block(_) => format!("(do {})", children.join(" ")),
        Expr::If { .. } => format!("(if {})", children.join(" ")),
        Expr::Closure { params, .. } => {
            let params: Vec<String> = params.iter().map(|p| name(interner, *p)).collect();
            format!(
                "(fn ({}) {})",
                params.join(" "),
                children.first().unwrap_or(&"")
            )
        }
    }
}
