//! Configuration types deserialized from `reify.toml`.

use serde::Deserialize;
use std::path::PathBuf;

pub use reify_common::DEFAULT_MAX_DEPTH;

/// The top-level configuration parsed from `reify.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct ReifyConfig {
    /// Fingerprint engine and handle settings.
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    /// Scope analysis settings.
    #[serde(default)]
    pub scope: ScopeConfig,
    /// Specialization cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Settings for the fingerprint engine.
#[derive(Debug, Deserialize)]
pub struct FingerprintConfig {
    /// Encode every value twice and reject codecs whose output differs.
    #[serde(default = "default_true")]
    pub verify_determinism: bool,
    /// Maximum container nesting accepted by `encode`.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Keep plain original values inside handles for fast reconstruction.
    #[serde(default = "default_true")]
    pub retain_originals: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            verify_determinism: true,
            max_depth: DEFAULT_MAX_DEPTH,
            retain_originals: true,
        }
    }
}

/// Settings for free-variable analysis and closure conversion.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeConfig {
    /// Which analyzer computes free variables.
    #[serde(default)]
    pub analyzer: AnalyzerKind,
    /// Names marked reconstructable when a context is created.
    #[serde(default)]
    pub reconstructable: Vec<String>,
}

/// Free-variable analyzer selection.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Binding-aware analysis (default).
    #[default]
    Structural,
    /// Conservative collector: every identifier occurrence is a candidate.
    Syntactic,
}

/// Settings for the specialization cache.
#[derive(Debug, Default, Deserialize)]
pub struct CacheConfig {
    /// Directory for optional on-disk snapshots.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
