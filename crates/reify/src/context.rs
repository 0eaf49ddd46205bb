//! The context object owning every stateful collaborator.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use reify_cache::{BoxError, CacheKey, CacheStats, ShapeDispatch, SpecializationCache, Specialized};
use reify_common::{Ident, Interner, Value};
use reify_config::{AnalyzerKind, ReifyConfig};
use reify_fingerprint::{
    BincodeCodec, Codec, EngineOptions, Fingerprint, FingerprintEngine, Fingerprintable, Handle,
    Reconstruct,
};
use reify_scope::{
    ConvertedTree, ExprTree, ReconstructableRegistry, ScopeAnalyzer, ScopeRecord,
    StructuralAnalyzer, SyntacticCollector,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ReifyError;

/// Owns the engine, the cache of `A` artifacts, the registry and the
/// analyzer.
///
/// Configuration is read once at construction. The cache grows without bound
/// until [`evict`](Self::evict) or [`clear`](Self::clear).
pub struct Context<A = Value> {
    engine: FingerprintEngine,
    retain_originals: bool,
    interner: Interner,
    registry: ReconstructableRegistry,
    analyzer: Box<dyn ScopeAnalyzer>,
    cache: SpecializationCache<A>,
    snapshot_dir: Option<PathBuf>,
}

impl<A> Default for Context<A> {
    fn default() -> Self {
        Self::new(Box::new(BincodeCodec), &ReifyConfig::default())
    }
}

impl<A> Context<A> {
    /// Creates a context around `codec`, applying `config`.
    ///
    /// Names listed under `scope.reconstructable` are marked immediately.
    pub fn new(codec: Box<dyn Codec>, config: &ReifyConfig) -> Self {
        let options = EngineOptions {
            verify_determinism: config.fingerprint.verify_determinism,
            max_depth: config.fingerprint.max_depth,
        };
        let analyzer: Box<dyn ScopeAnalyzer> = match config.scope.analyzer {
            AnalyzerKind::Structural => Box::new(StructuralAnalyzer),
            AnalyzerKind::Syntactic => Box::new(SyntacticCollector),
        };
        let mut ctx = Self {
            engine: FingerprintEngine::with_options(codec, options),
            retain_originals: config.fingerprint.retain_originals,
            interner: Interner::new(),
            registry: ReconstructableRegistry::new(),
            analyzer,
            cache: SpecializationCache::new(),
            snapshot_dir: config.cache.snapshot_dir.clone(),
        };
        for name in &config.scope.reconstructable {
            ctx.mark_reconstructable(name);
        }
        ctx
    }

    /// Loads `reify.toml` from `dir` and builds a context with the default
    /// codec. A relative snapshot directory is resolved against `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, ReifyError> {
        let mut config = reify_config::load_config(dir)?;
        if let Some(snapshot_dir) = config.cache.snapshot_dir.take() {
            config.cache.snapshot_dir = Some(dir.join(snapshot_dir));
        }
        Ok(Self::new(Box::new(BincodeCodec), &config))
    }

    /// Returns the fingerprint engine.
    pub fn engine(&self) -> &FingerprintEngine {
        &self.engine
    }

    /// Returns the interner used for expression names.
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Returns the reconstructable-name registry.
    pub fn registry(&self) -> &ReconstructableRegistry {
        &self.registry
    }

    /// Returns the specialization cache.
    pub fn cache(&self) -> &SpecializationCache<A> {
        &self.cache
    }

    /// Returns the name of the configured analyzer.
    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    /// Interns a name for use in expression trees.
    pub fn ident(&self, name: &str) -> Ident {
        self.interner.get_or_intern(name)
    }

    // --- values ---

    /// Fingerprints a value and validates that it round-trips.
    pub fn wrap<T: Fingerprintable>(&self, value: T) -> Result<Handle<T>, ReifyError> {
        let handle = if self.retain_originals {
            Handle::wrap(&self.engine, value)?
        } else {
            Handle::wrap_detached(&self.engine, &value)?
        };
        Ok(handle)
    }

    /// Produces the value behind a handle.
    pub fn reconstruct<T: Fingerprintable + Clone>(
        &self,
        handle: &Handle<T>,
    ) -> Result<T, ReifyError> {
        Ok(handle.reconstruct(&self.engine)?)
    }

    /// Returns the fingerprint of anything reconstructable.
    pub fn identity<'h>(&self, handle: &'h dyn Reconstruct) -> &'h Fingerprint {
        handle.identity()
    }

    /// Encodes a value without wrapping it.
    pub fn encode(&self, value: &Value) -> Result<Fingerprint, ReifyError> {
        Ok(self.engine.encode(value)?)
    }

    /// Decodes a fingerprint.
    pub fn decode(&self, fingerprint: &Fingerprint) -> Result<Value, ReifyError> {
        Ok(self.engine.decode(fingerprint)?)
    }

    // --- registry ---

    /// Declares `name` reconstructable. Returns `false` if it already was.
    pub fn mark_reconstructable(&mut self, name: &str) -> bool {
        let ident = self.interner.get_or_intern(name);
        let added = self.registry.mark(ident);
        if added {
            tracing::debug!(name, "marked reconstructable");
        }
        added
    }

    /// Returns `true` if `name` was declared reconstructable.
    pub fn is_reconstructable(&self, name: &str) -> bool {
        self.interner
            .get(name)
            .is_some_and(|ident| self.registry.is_reconstructable(ident))
    }

    // --- scope ---

    /// Normalizes a tree and computes its free and reconstructable names.
    pub fn analyze(&self, tree: &ExprTree) -> Result<ScopeRecord, ReifyError> {
        Ok(reify_scope::analyze(tree, &self.registry, self.analyzer.as_ref())?)
    }

    /// Inserts rebindings for reconstructable captures into every closure.
    pub fn convert_closures(
        &self,
        tree: &ExprTree,
        free: &BTreeSet<Ident>,
        reconstructable: &BTreeSet<Ident>,
    ) -> Result<ConvertedTree, ReifyError> {
        Ok(reify_scope::convert_closures(
            tree,
            free,
            reconstructable,
            self.analyzer.as_ref(),
            &self.interner,
        )?)
    }

    /// Analyzes a tree, then converts the normalized result.
    pub fn analyze_and_convert(&self, tree: &ExprTree) -> Result<ConvertedTree, ReifyError> {
        let record = self.analyze(tree)?;
        self.convert_closures(&record.tree, &record.free, &record.reconstructable)
    }

    /// Renders a tree with this context's names.
    pub fn render(&self, tree: &ExprTree) -> Result<String, ReifyError> {
        Ok(reify_scope::render(tree, &self.interner)?)
    }

    // --- cache ---

    /// Removes one cache entry.
    pub fn evict(&mut self, key: &CacheKey) -> Option<A> {
        self.cache.evict(key)
    }

    /// Removes every cache entry.
    pub fn clear(&mut self) -> usize {
        self.cache.clear()
    }

    /// Returns the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn snapshot_dir(&self) -> Result<&Path, ReifyError> {
        self.snapshot_dir.as_deref().ok_or(ReifyError::NoSnapshotDir)
    }
}

impl<A: Clone> Context<A> {
    /// Returns the artifact for `operation` on the handles' values, running
    /// `generator` only on a miss.
    pub fn generate<F, E>(
        &mut self,
        operation: &str,
        handles: &[&dyn Reconstruct],
        generator: F,
    ) -> Result<A, ReifyError>
    where
        F: FnOnce(&[Value]) -> Result<A, E>,
        E: Into<BoxError>,
    {
        Ok(self
            .cache
            .generate(&self.engine, operation, handles, generator)?)
    }

    /// Like [`generate`](Self::generate), choosing the generator by the
    /// value's shape.
    pub fn generate_by_shape(
        &mut self,
        operation: &str,
        handle: &dyn Reconstruct,
        dispatch: &ShapeDispatch<'_, A>,
    ) -> Result<A, ReifyError> {
        Ok(self
            .cache
            .generate_by_shape(&self.engine, operation, handle, dispatch)?)
    }
}

impl<I: 'static, O: 'static> Context<Specialized<I, O>> {
    /// Builds a specialized function once per key and returns the shared
    /// instance on every later call.
    pub fn specialize<F, G, E>(
        &mut self,
        operation: &str,
        handles: &[&dyn Reconstruct],
        build: F,
    ) -> Result<Specialized<I, O>, ReifyError>
    where
        F: FnOnce(&[Value]) -> Result<G, E>,
        G: Fn(I) -> O + 'static,
        E: Into<BoxError>,
    {
        Ok(self
            .cache
            .specialize(&self.engine, operation, handles, build)?)
    }
}

impl<A: Serialize> Context<A> {
    /// Writes the cache to the configured snapshot directory.
    pub fn save_snapshot(&self) -> Result<usize, ReifyError> {
        let dir = self.snapshot_dir()?;
        Ok(self.cache.save_snapshot(dir, self.engine.codec())?)
    }
}

impl<A: DeserializeOwned> Context<A> {
    /// Replaces the cache with the snapshot in the configured directory.
    /// Returns the number of entries loaded.
    pub fn load_snapshot(&mut self) -> Result<usize, ReifyError> {
        let dir = self.snapshot_dir()?;
        self.cache = SpecializationCache::load_snapshot(dir, self.engine.codec());
        Ok(self.cache.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reify_config::load_config_from_str;
    use reify_scope::ExprBuilder;

    #[test]
    fn config_marks_names_and_selects_analyzer() {
        let config = load_config_from_str(
            r#"
            [scope]
            analyzer = "syntactic"
            reconstructable = ["table", "weights"]
            "#,
        )
        .unwrap();
        let ctx: Context = Context::new(Box::new(BincodeCodec), &config);
        assert!(ctx.is_reconstructable("table"));
        assert!(ctx.is_reconstructable("weights"));
        assert!(!ctx.is_reconstructable("other"));
        assert_eq!(ctx.analyzer_name(), "syntactic");
    }

    #[test]
    fn is_reconstructable_does_not_intern() {
        let ctx: Context = Context::default();
        assert!(!ctx.is_reconstructable("never_seen"));
        assert!(ctx.interner().is_empty());
    }

    #[test]
    fn mark_is_reported_once() {
        let mut ctx: Context = Context::default();
        assert!(ctx.mark_reconstructable("x"));
        assert!(!ctx.mark_reconstructable("x"));
        assert_eq!(ctx.registry().len(), 1);
    }

    #[test]
    fn retain_originals_off_detaches_handles() {
        let config = load_config_from_str("[fingerprint]\nretain_originals = false\n").unwrap();
        let ctx: Context = Context::new(Box::new(BincodeCodec), &config);
        let handle = ctx.wrap(41i64).unwrap();
        assert!(handle.original().is_none());
        assert_eq!(ctx.reconstruct(&handle).unwrap(), 41);
    }

    #[test]
    fn max_depth_applies_to_encoding() {
        let config = load_config_from_str("[fingerprint]\nmax_depth = 2\n").unwrap();
        let ctx: Context = Context::new(Box::new(BincodeCodec), &config);
        let deep = Value::seq([Value::seq([Value::seq([1])])]);
        assert!(matches!(
            ctx.encode(&deep),
            Err(ReifyError::Fingerprint(
                reify_fingerprint::FingerprintError::Serialization { .. }
            ))
        ));
    }

    #[test]
    fn default_config_matches_engine_defaults() {
        let ctx: Context = Context::default();
        assert_eq!(ctx.engine().options(), EngineOptions::default());
    }

    #[test]
    fn max_depth_applies_to_decoding() {
        let deep = Context::<Value>::default()
            .encode(&Value::seq([Value::seq([Value::seq([1])])]))
            .unwrap();
        let config = load_config_from_str("[fingerprint]\nmax_depth = 2\n").unwrap();
        let ctx: Context = Context::new(Box::new(BincodeCodec), &config);
        assert!(matches!(
            ctx.decode(&deep),
            Err(ReifyError::Fingerprint(
                reify_fingerprint::FingerprintError::Decode { .. }
            ))
        ));
    }

    #[test]
    fn generate_propagates_generator_error() {
        let mut ctx: Context<i64> = Context::default();
        let h = ctx.wrap(1i64).unwrap();
        let err = ctx
            .generate("fail", &[&h], |_| Err::<i64, _>("nope"))
            .unwrap_err();
        assert!(matches!(
            err,
            ReifyError::Cache(reify_cache::CacheError::Generation { .. })
        ));
        assert!(ctx.cache().is_empty());
    }

    #[test]
    fn analyze_and_convert_uses_registry() {
        let mut ctx: Context = Context::default();
        ctx.mark_reconstructable("x");
        let mut b = ExprBuilder::new();
        let x = b.var(ctx.ident("x"));
        let f = b.closure(vec![], x);
        let tree = b.finish(f).unwrap();

        let converted = ctx.analyze_and_convert(&tree).unwrap();
        assert_eq!(converted.rebindings.len(), 1);
        assert_eq!(
            ctx.render(&converted.tree).unwrap(),
            "(fn () (do (x = reconstruct(identity_of(x))) x))"
        );
    }

    #[test]
    fn snapshot_requires_directory() {
        let ctx: Context<i64> = Context::default();
        assert!(matches!(ctx.save_snapshot(), Err(ReifyError::NoSnapshotDir)));
    }

    #[test]
    fn snapshot_through_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("reify.toml"),
            "[cache]\nsnapshot_dir = \"snap\"\n",
        )
        .unwrap();

        let mut first: Context<i64> = Context::from_dir(dir.path()).unwrap();
        let h = first.wrap(Value::seq([1, 2, 3])).unwrap();
        first
            .generate("len", &[&h], |v| Ok::<_, BoxError>(v.len() as i64))
            .unwrap();
        assert_eq!(first.save_snapshot().unwrap(), 1);
        assert!(dir.path().join("snap").join("manifest.json").exists());

        let mut second: Context<i64> = Context::from_dir(dir.path()).unwrap();
        assert_eq!(second.load_snapshot().unwrap(), 1);
        let h = second.wrap(Value::seq([1, 2, 3])).unwrap();
        let out = second
            .generate("len", &[&h], |_| -> Result<i64, BoxError> {
                panic!("loaded entry should hit")
            })
            .unwrap();
        assert_eq!(out, 1);
    }
}
