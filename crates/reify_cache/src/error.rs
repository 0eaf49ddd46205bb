//! Error types for cache operations.

use std::path::PathBuf;

use reify_fingerprint::FingerprintError;

/// The error type generators may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The generator failed on a cache miss. Nothing was cached.
    #[error("generator for {key} failed: {source}")]
    Generation {
        /// Display form of the key whose generation failed.
        key: String,
        /// The generator's own error, unchanged.
        source: BoxError,
    },

    /// A handle could not be reconstructed on a cache miss.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// An I/O error occurred while reading or writing snapshot files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An artifact or manifest could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}
