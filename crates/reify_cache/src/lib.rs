//! Specialization cache keyed by value fingerprints.
//!
//! [`SpecializationCache`] maps an operation name plus an ordered list of
//! fingerprints to an artifact produced by a caller-supplied generator. For
//! any key the generator runs at most once over the cache's lifetime; a
//! failed run stores nothing and is retried on the next call.
//!
//! The cache never evicts on its own. There is no size bound and no expiry,
//! so memory grows with the number of distinct keys until [`evict`] or
//! [`clear`] is called.
//!
//! [`evict`]: SpecializationCache::evict
//! [`clear`]: SpecializationCache::clear

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod error;
pub mod key;
pub mod manifest;
pub mod shape;
pub mod shared;
pub mod snapshot;

pub use cache::{CacheEntry, CacheStats, SpecializationCache, Specialized};
pub use error::{BoxError, CacheError};
pub use key::CacheKey;
pub use shape::{MissingShapeArm, ShapeDispatch};
pub use shared::SharedCache;
