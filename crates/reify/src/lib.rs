//! Fingerprinted values, a specialization cache keyed by them, and closure
//! conversion that keeps captured values inside the cache's key space.
//!
//! [`Context`] owns one of each collaborator: the fingerprint engine, the
//! cache, the reconstructable-name registry with its interner, and the
//! selected scope analyzer. Nothing is global; two contexts never share
//! state.
//!
//! ```
//! use reify::{Context, Value};
//!
//! let mut ctx: Context<i64> = Context::default();
//! let handle = ctx.wrap(Value::seq([1, 2, 3])).unwrap();
//! let total = ctx
//!     .generate("len", &[&handle], |values| match values {
//!         [Value::Seq(items)] => Ok(items.len() as i64),
//!         _ => Err("expected a sequence"),
//!     })
//!     .unwrap();
//! assert_eq!(total, 3);
//! ```

#![warn(missing_docs)]

pub mod capture;
pub mod context;
pub mod error;

pub use capture::{Binding, CaptureEnv};
pub use context::Context;
pub use error::ReifyError;

pub use reify_cache::{
    BoxError, CacheError, CacheKey, CacheStats, MissingShapeArm, ShapeDispatch, SharedCache,
    SpecializationCache, Specialized,
};
pub use reify_common::{ContentHash, Ident, Interner, MapKey, ResourceKind, Shape, TypeTag, Value};
pub use reify_config::{load_config, load_config_from_str, AnalyzerKind, ConfigError, ReifyConfig};
pub use reify_fingerprint::{
    BincodeCodec, CaptureRecord, Codec, CodecError, EngineOptions, Fingerprint, FingerprintEngine,
    FingerprintError, Fingerprintable, Handle, Reconstruct,
};
pub use reify_scope::{
    ConvertedTree, Expr, ExprBuilder, ExprId, ExprTree, Literal, Rebinding,
    ReconstructableRegistry, ScopeAnalyzer, ScopeError, ScopeRecord, StructuralAnalyzer,
    SyntacticCollector,
};
