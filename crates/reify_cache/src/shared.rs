//! A cache that can be shared between threads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use reify_common::Value;
use reify_fingerprint::{FingerprintEngine, Reconstruct};

use crate::cache::{CacheStats, SpecializationCache};
use crate::error::{BoxError, CacheError};
use crate::key::CacheKey;

/// A [`SpecializationCache`] behind a mutex.
///
/// The lock is held across the generator, so concurrent callers asking for
/// the same key see exactly one generator run. Callers for other keys wait
/// as well; generators should be short.
#[derive(Debug)]
pub struct SharedCache<A> {
    inner: Mutex<SpecializationCache<A>>,
}

impl<A> Default for SharedCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> SharedCache<A> {
    /// Creates an empty shared cache.
    pub fn new() -> Self {
        Self::from_cache(SpecializationCache::new())
    }

    /// Wraps an existing cache.
    pub fn from_cache(cache: SpecializationCache<A>) -> Self {
        Self {
            inner: Mutex::new(cache),
        }
    }

    // A generator that panicked inserted nothing, so the state is intact.
    fn lock(&self) -> MutexGuard<'_, SpecializationCache<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the hit and miss counters.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    /// Removes one entry.
    pub fn evict(&self, key: &CacheKey) -> Option<A> {
        self.lock().evict(key)
    }

    /// Removes every entry.
    pub fn clear(&self) -> usize {
        self.lock().clear()
    }

    /// Unwraps the inner cache.
    pub fn into_inner(self) -> SpecializationCache<A> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: Clone> SharedCache<A> {
    /// Same as [`SpecializationCache::generate`], serialized by the lock.
    pub fn generate<F, E>(
        &self,
        engine: &FingerprintEngine,
        operation: &str,
        handles: &[&dyn Reconstruct],
        generator: F,
    ) -> Result<A, CacheError>
    where
        F: FnOnce(&[Value]) -> Result<A, E>,
        E: Into<BoxError>,
    {
        self.lock().generate(engine, operation, handles, generator)
    }

    /// Returns the cached artifact for a key without generating.
    pub fn get(&self, key: &CacheKey) -> Option<A> {
        self.lock().get(key).cloned()
    }
}
