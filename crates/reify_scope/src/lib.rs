//! Scope analysis and closure conversion over arena-allocated expression
//! trees.
//!
//! [`analyze`] computes the free names of a tree and the subset declared in a
//! [`ReconstructableRegistry`]. [`convert_closures`] then inserts, at the top
//! of every closure body, one `rebind` statement per reconstructable name the
//! closure captures, so the closure re-derives the value from its
//! fingerprint instead of capturing it.
//!
//! Trees are walked iteratively in post-order. Children are addressed by
//! [`ExprId`], so a malformed tree may contain a cycle or a dangling child;
//! both surface as [`ScopeError::Structural`].

#![warn(missing_docs)]

pub mod analyze;
pub mod analyzer;
pub mod arena;
pub mod convert;
pub mod error;
pub mod expr;
pub mod ids;
pub mod registry;
pub mod render;
pub mod tree;
pub mod walk;

pub use analyze::{analyze, ScopeRecord};
pub use analyzer::{ScopeAnalyzer, StructuralAnalyzer, SyntacticCollector};
pub use convert::{convert_closures, ConvertedTree, Rebinding};
pub use error::ScopeError;
pub use expr::{Expr, Literal};
pub use ids::ExprId;
pub use registry::ReconstructableRegistry;
pub use render::render;
pub use tree::{ExprBuilder, ExprTree};
