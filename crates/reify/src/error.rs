//! Top-level error type.

/// Any error a [`Context`](crate::Context) operation can return.
#[derive(Debug, thiserror::Error)]
pub enum ReifyError {
    /// Encoding, decoding, or wrapping failed.
    #[error(transparent)]
    Fingerprint(#[from] reify_fingerprint::FingerprintError),

    /// A generator failed or a snapshot could not be written.
    #[error(transparent)]
    Cache(#[from] reify_cache::CacheError),

    /// An expression tree is malformed.
    #[error(transparent)]
    Scope(#[from] reify_scope::ScopeError),

    /// `reify.toml` could not be loaded.
    #[error(transparent)]
    Config(#[from] reify_config::ConfigError),

    /// A snapshot operation was requested without `cache.snapshot_dir`.
    #[error("no snapshot directory configured")]
    NoSnapshotDir,
}
