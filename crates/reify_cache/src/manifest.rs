//! Snapshot manifest listing every persisted cache entry.
//!
//! Stored as `manifest.json` in the snapshot directory. Each entry keeps the
//! raw fingerprint bytes so a loaded key is byte-identical to the one that
//! was saved.

use std::path::Path;

use reify_common::TypeTag;
use serde::{Deserialize, Serialize};

use crate::artifact::CodecIdentity;
use crate::error::CacheError;

const MANIFEST_FILE: &str = "manifest.json";

/// Top-level snapshot manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Codec whose fingerprints key the entries.
    pub codec: String,
    /// Version of that codec.
    pub codec_version: u32,
    /// Generator runs completed by the cache when it was saved.
    pub generations: u64,
    /// Persisted entries, oldest generation first.
    pub entries: Vec<SnapshotEntry>,
}

/// One persisted cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Operation name.
    pub operation: String,
    /// Argument fingerprints in order.
    pub fingerprints: Vec<FingerprintRecord>,
    /// Generation ordinal of the entry.
    pub generation: u64,
    /// Artifact file key.
    pub artifact_key: String,
}

/// A fingerprint as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Top-level type of the encoded value.
    pub tag: TypeTag,
    /// The encoded bytes.
    pub bytes: Vec<u8>,
}

impl SnapshotManifest {
    /// Creates an empty manifest for a codec.
    pub fn new(codec: CodecIdentity<'_>) -> Self {
        Self {
            codec: codec.name.to_string(),
            codec_version: codec.version,
            generations: 0,
            entries: Vec::new(),
        }
    }

    /// Loads the manifest from `dir`, or `None` if it is missing or
    /// unparseable.
    pub fn load(dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Saves the manifest to `dir`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Returns `true` if the manifest was written under `codec`.
    pub fn is_compatible(&self, codec: CodecIdentity<'_>) -> bool {
        self.codec == codec.name && self.codec_version == codec.version
    }
}
