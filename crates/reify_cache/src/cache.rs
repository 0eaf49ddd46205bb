//! The specialization cache.

use std::collections::HashMap;
use std::rc::Rc;

use reify_common::Value;
use reify_fingerprint::{FingerprintEngine, Reconstruct};

use crate::error::{BoxError, CacheError};
use crate::key::CacheKey;

/// A specialized function produced by a two-phase generator.
///
/// The outer generator runs once per key and sees the reconstructed
/// arguments; the returned function is what later calls execute.
pub type Specialized<I, O> = Rc<dyn Fn(I) -> O>;

/// A cached artifact and the order in which it was generated.
#[derive(Debug, Clone)]
pub struct CacheEntry<A> {
    artifact: A,
    generation: u64,
}

impl<A> CacheEntry<A> {
    pub(crate) fn new(artifact: A, generation: u64) -> Self {
        Self {
            artifact,
            generation,
        }
    }

    /// Returns the cached artifact.
    pub fn artifact(&self) -> &A {
        &self.artifact
    }

    /// Returns the zero-based ordinal of the generator run that produced this
    /// entry.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the generator successfully.
    pub misses: u64,
    /// Generator runs or reconstructions that failed.
    pub failures: u64,
    /// Entries removed by `evict` or `clear`.
    pub evictions: u64,
}

/// Maps `(operation, fingerprints)` to generated artifacts.
///
/// The generator for a key runs at most once while the entry is present.
/// Entries live until explicitly evicted; the cache has no size bound and
/// grows with the number of distinct keys it has seen.
#[derive(Debug)]
pub struct SpecializationCache<A> {
    entries: HashMap<CacheKey, CacheEntry<A>>,
    generations: u64,
    stats: CacheStats,
}

impl<A> Default for SpecializationCache<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> SpecializationCache<A> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            generations: 0,
            stats: CacheStats::default(),
        }
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the key has a cached artifact.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the cached artifact for a key without generating.
    pub fn get(&self, key: &CacheKey) -> Option<&A> {
        self.entries.get(key).map(CacheEntry::artifact)
    }

    /// Returns the cached entry for a key without generating.
    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry<A>> {
        self.entries.get(key)
    }

    /// Iterates over the cached keys in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry<A>)> {
        self.entries.iter()
    }

    /// Returns the hit and miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns how many generator runs have succeeded over the cache's life.
    pub fn generations(&self) -> u64 {
        self.generations
    }

    /// Removes one entry. The next lookup for the key generates again.
    pub fn evict(&mut self, key: &CacheKey) -> Option<A> {
        let removed = self.entries.remove(key)?;
        self.stats.evictions += 1;
        tracing::debug!(%key, "evicted specialization");
        Some(removed.artifact)
    }

    /// Removes every entry and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        self.stats.evictions += dropped as u64;
        tracing::debug!(dropped, "cleared specialization cache");
        dropped
    }

    pub(crate) fn restore(&mut self, key: CacheKey, entry: CacheEntry<A>) {
        self.generations = self.generations.max(entry.generation + 1);
        self.entries.insert(key, entry);
    }

    pub(crate) fn set_generations(&mut self, generations: u64) {
        self.generations = self.generations.max(generations);
    }
}

impl<A: Clone> SpecializationCache<A> {
    /// Returns the artifact for `operation` applied to the handles, running
    /// `generator` on a miss.
    ///
    /// On a hit the handles are not reconstructed. On a miss each handle is
    /// reconstructed, the generator receives the values in handle order, and
    /// a successful result is stored. A failing generator leaves the cache
    /// unchanged and its error is returned inside
    /// [`CacheError::Generation`].
    pub fn generate<F, E>(
        &mut self,
        engine: &FingerprintEngine,
        operation: &str,
        handles: &[&dyn Reconstruct],
        generator: F,
    ) -> Result<A, CacheError>
    where
        F: FnOnce(&[Value]) -> Result<A, E>,
        E: Into<BoxError>,
    {
        let key = CacheKey::from_handles(operation, handles);
        if let Some(entry) = self.entries.get(&key) {
            self.stats.hits += 1;
            tracing::trace!(%key, "specialization hit");
            return Ok(entry.artifact.clone());
        }

        let values = match reconstruct_all(engine, handles) {
            Ok(values) => values,
            Err(err) => {
                self.stats.failures += 1;
                return Err(err);
            }
        };

        match generator(&values) {
            Ok(artifact) => {
                let generation = self.generations;
                self.generations += 1;
                self.stats.misses += 1;
                tracing::debug!(%key, generation, "generated specialization");
                self.entries
                    .insert(key, CacheEntry::new(artifact.clone(), generation));
                Ok(artifact)
            }
            Err(err) => {
                self.stats.failures += 1;
                tracing::debug!(%key, "specialization generator failed");
                Err(CacheError::Generation {
                    key: key.to_string(),
                    source: err.into(),
                })
            }
        }
    }
}

impl<I: 'static, O: 'static> SpecializationCache<Specialized<I, O>> {
    /// Two-phase generation: `build` runs once per key and returns the
    /// function that every call with the same arguments shares.
    pub fn specialize<F, G, E>(
        &mut self,
        engine: &FingerprintEngine,
        operation: &str,
        handles: &[&dyn Reconstruct],
        build: F,
    ) -> Result<Specialized<I, O>, CacheError>
    where
        F: FnOnce(&[Value]) -> Result<G, E>,
        G: Fn(I) -> O + 'static,
        E: Into<BoxError>,
    {
        self.generate(engine, operation, handles, |values| {
            build(values).map(|f| Rc::new(f) as Specialized<I, O>)
        })
    }
}

fn reconstruct_all(
    engine: &FingerprintEngine,
    handles: &[&dyn Reconstruct],
) -> Result<Vec<Value>, CacheError> {
    handles
        .iter()
        .map(|h| h.reconstruct_value(engine).map_err(CacheError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use reify_fingerprint::{Fingerprint, FingerprintError, Handle};

    #[derive(Debug, thiserror::Error)]
    #[error("refusing to build")]
    struct Refused;

    fn sum(values: &[Value]) -> Result<i64, Refused> {
        match values.first() {
            Some(Value::Seq(items)) => Ok(items
                .iter()
                .map(|v| match v {
                    Value::Int(i) => *i,
                    _ => 0,
                })
                .sum()),
            _ => Err(Refused),
        }
    }

    #[test]
    fn generator_runs_once_per_key() {
        let engine = FingerprintEngine::default();
        let mut cache = SpecializationCache::new();
        let runs = Cell::new(0);
        let handle = Handle::wrap(&engine, Value::seq([1, 2, 3])).unwrap();

        for _ in 0..5 {
            let out = cache
                .generate(&engine, "sum", &[&handle], |values| {
                    runs.set(runs.get() + 1);
                    sum(values)
                })
                .unwrap();
            assert_eq!(out, 6);
        }
        assert_eq!(runs.get(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 4,
                misses: 1,
                failures: 0,
                evictions: 0
            }
        );
    }

    #[test]
    fn equal_values_from_distinct_handles_share_an_entry() {
        let engine = FingerprintEngine::default();
        let mut cache = SpecializationCache::new();
        let a = Handle::wrap(&engine, Value::seq([4, 5])).unwrap();
        let b = Handle::wrap(&engine, Value::seq([4, 5])).unwrap();
        cache.generate(&engine, "sum", &[&a], sum).unwrap();
        cache
            .generate(&engine, "sum", &[&b], |_: &[Value]| -> Result<i64, Refused> {
                panic!("generator must not run on a hit")
            })
            .unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn operations_are_separate_namespaces() {
        let engine = FingerprintEngine::default();
        let mut cache = SpecializationCache::new();
        let h = Handle::wrap(&engine, Value::seq([1, 1])).unwrap();
        let a = cache.generate(&engine, "sum", &[&h], sum).unwrap();
        let b = cache
            .generate(&engine, "count", &[&h], |_| Ok::<_, Refused>(2))
            .unwrap();
        assert_eq!((a, b), (2, 2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_generation_caches_nothing() {
        let engine = FingerprintEngine::default();
        let mut cache: SpecializationCache<i64> = SpecializationCache::new();
        let h = Handle::wrap(&engine, 3i64).unwrap();

        let err = cache.generate(&engine, "sum", &[&h], sum).unwrap_err();
        match &err {
            CacheError::Generation { key, source } => {
                assert!(key.starts_with("sum[int:"));
                assert!(source.downcast_ref::<Refused>().is_some());
            }
            other => panic!("expected generation error, got {other:?}"),
        }
        assert!(cache.is_empty());
        assert_eq!(cache.stats().failures, 1);

        // A later successful run fills the entry.
        let out = cache
            .generate(&engine, "sum", &[&h], |_| Ok::<_, Refused>(3))
            .unwrap();
        assert_eq!(out, 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn undecodable_handle_fails_on_miss_only() {
        let engine = FingerprintEngine::default();
        let mut cache = SpecializationCache::new();
        let good = Handle::wrap(&engine, 1i64).unwrap();
        cache
            .generate(&engine, "id", &[&good], |_| Ok::<_, Refused>(1i64))
            .unwrap();

        // Same bytes reported under the wrong tag: decoding would fail, but a
        // hit never decodes.
        let bad = BadHandle(
            Fingerprint::from_parts(reify_common::TypeTag::Str, good.identity().as_bytes())
                .unwrap(),
        );
        assert_eq!(
            cache
                .generate(&engine, "id", &[&bad], |_| Ok::<_, Refused>(9))
                .unwrap(),
            1
        );

        let err = cache
            .generate(&engine, "other", &[&bad], |_| Ok::<_, Refused>(9))
            .unwrap_err();
        assert!(matches!(
            err,
            CacheError::Fingerprint(FingerprintError::TypeMismatch { .. })
        ));
    }

    struct BadHandle(Fingerprint);

    impl Reconstruct for BadHandle {
        fn identity(&self) -> &Fingerprint {
            &self.0
        }

        fn reconstruct_value(
            &self,
            engine: &FingerprintEngine,
        ) -> Result<Value, FingerprintError> {
            engine.decode(&self.0)
        }
    }

    #[test]
    fn evict_forces_regeneration() {
        let engine = FingerprintEngine::default();
        let mut cache = SpecializationCache::new();
        let runs = Cell::new(0);
        let h = Handle::wrap(&engine, Value::seq([2])).unwrap();
        let run = |cache: &mut SpecializationCache<i64>| {
            cache
                .generate(&engine, "sum", &[&h], |values| {
                    runs.set(runs.get() + 1);
                    sum(values)
                })
                .unwrap()
        };

        run(&mut cache);
        let key = CacheKey::from_handles("sum", &[&h]);
        assert_eq!(cache.evict(&key), Some(2));
        assert_eq!(cache.evict(&key), None);
        run(&mut cache);
        assert_eq!(runs.get(), 2);
        assert_eq!(cache.entry(&key).unwrap().generation(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let engine = FingerprintEngine::default();
        let mut cache = SpecializationCache::new();
        for i in 0..4i64 {
            let h = Handle::wrap(&engine, i).unwrap();
            cache
                .generate(&engine, "id", &[&h], |_| Ok::<_, Refused>(i))
                .unwrap();
        }
        assert_eq!(cache.clear(), 4);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 4);
        assert_eq!(cache.generations(), 4);
    }

    #[test]
    fn specialize_shares_one_function() {
        let engine = FingerprintEngine::default();
        let mut cache: SpecializationCache<Specialized<i64, i64>> = SpecializationCache::new();
        let builds = Cell::new(0);
        let offset = Handle::wrap(&engine, 10i64).unwrap();

        let get = |cache: &mut SpecializationCache<Specialized<i64, i64>>| {
            cache
                .specialize(&engine, "add", &[&offset], |values| {
                    builds.set(builds.get() + 1);
                    match values {
                        [Value::Int(n)] => {
                            let n = *n;
                            Ok(move |x: i64| x + n)
                        }
                        _ => Err(Refused),
                    }
                })
                .unwrap()
        };

        let f = get(&mut cache);
        let g = get(&mut cache);
        assert!(Rc::ptr_eq(&f, &g));
        assert_eq!(f(1), 11);
        assert_eq!(g(5), 15);
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn zero_argument_operations_are_cached() {
        let engine = FingerprintEngine::default();
        let mut cache = SpecializationCache::new();
        let runs = Cell::new(0);
        for _ in 0..3 {
            cache
                .generate(&engine, "constant", &[], |values| {
                    assert!(values.is_empty());
                    runs.set(runs.get() + 1);
                    Ok::<_, Refused>(42)
                })
                .unwrap();
        }
        assert_eq!(runs.get(), 1);
    }
}
