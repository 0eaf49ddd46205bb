//! Expression nodes.

use reify_common::Ident;
use serde::{Deserialize, Serialize};

use crate::ids::ExprId;

/// A literal constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// `()`.
    Unit,
    /// `true` or `false`.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    Str(String),
}

/// One node of an expression tree. Children are referenced by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A constant.
    Literal(Literal),
    /// A reference to a name.
    Var(Ident),
    /// `callee(args...)`.
    Call {
        /// The function being called.
        callee: ExprId,
        /// Arguments in order.
        args: Vec<ExprId>,
    },
    /// `let name = value in body`. `name` is bound in `body` only.
    Let {
        /// The bound name.
        name: Ident,
        /// The bound expression.
        value: ExprId,
        /// The scope of the binding.
        body: ExprId,
    },
    /// `name = value`. Assigns to an existing binding; binds nothing.
    Assign {
        /// The assigned name.
        name: Ident,
        /// The new value.
        value: ExprId,
    },
    /// Statements evaluated in order.
    Block(Vec<ExprId>),
    /// `if cond { then_branch } else { else_branch }`.
    If {
        /// The condition.
        cond: ExprId,
        /// Taken when the condition holds.
        then_branch: ExprId,
        /// Taken otherwise.
        else_branch: ExprId,
    },
    /// A closure literal. `params` are bound in `body`.
    Closure {
        /// Parameter names.
        params: Vec<Ident>,
        /// The closure body.
        body: ExprId,
    },
    /// `name = reconstruct(identity_of(name))`, or `name` unchanged when its
    /// runtime value is not a handle.
    Rebind(Ident),
}

impl Expr {
    /// Returns the child IDs in evaluation order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Literal(_) | Expr::Var(_) | Expr::Rebind(_) => Vec::new(),
            Expr::Call { callee, args } => {
                let mut out = Vec::with_capacity(1 + args.len());
                out.push(*callee);
                out.extend(args.iter().copied());
                out
            }
            Expr::Let { value, body, .. } => vec![*value, *body],
            Expr::Assign { value, .. } => vec![*value],
            Expr::Block(stmts) => stmts.clone(),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => vec![*cond, *then_branch, *else_branch],
            Expr::Closure { body, .. } => vec![*body],
        }
    }

    /// Returns a copy with every child ID passed through `f`.
    pub fn map_children(&self, mut f: impl FnMut(ExprId) -> ExprId) -> Expr {
        match self {
            Expr::Literal(_) | Expr::Var(_) | Expr::Rebind(_) => self.clone(),
            Expr::Call { callee, args } => Expr::Call {
                callee: f(*callee),
                args: args.iter().map(|a| f(*a)).collect(),
            },
            Expr::Let { name, value, body } => Expr::Let {
                name: *name,
                value: f(*value),
                body: f(*body),
            },
            Expr::Assign { name, value } => Expr::Assign {
                name: *name,
                value: f(*value),
            },
            Expr::Block(stmts) => Expr::Block(stmts.iter().map(|s| f(*s)).collect()),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => Expr::If {
                cond: f(*cond),
                then_branch: f(*then_branch),
                else_branch: f(*else_branch),
            },
            Expr::Closure { params, body } => Expr::Closure {
                params: params.clone(),
                body: f(*body),
            },
        }
    }

    /// Returns `true` for closure literals.
    pub fn is_closure(&self) -> bool {
        matches!(self, Expr::Closure { .. })
    }
}
