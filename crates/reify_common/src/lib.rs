//! Shared foundational types used across the reify workspace.
//!
//! This crate provides the runtime value model that fingerprints are computed
//! over, interned identifiers for expression trees, and content hashing for
//! diagnostics and on-disk snapshots.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod value;

pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use value::{MapKey, Resource, ResourceKind, Shape, TypeTag, Value, DEFAULT_MAX_DEPTH};
