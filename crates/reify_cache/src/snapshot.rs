//! Persisting a cache to disk and loading it back.
//!
//! Only artifacts that implement serde traits can be persisted. Loading is
//! fail-safe: an unreadable manifest, a foreign codec, or a corrupt artifact
//! costs a cache miss, never an error.

use std::path::Path;

use reify_fingerprint::{Codec, Fingerprint};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::artifact::{ArtifactStore, CodecIdentity};
use crate::cache::{CacheEntry, SpecializationCache};
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::manifest::{FingerprintRecord, SnapshotEntry, SnapshotManifest};

impl<A: Serialize> SpecializationCache<A> {
    /// Writes every entry to `dir` and removes artifact files left over from
    /// earlier snapshots. Returns the number of entries written.
    pub fn save_snapshot(&self, dir: &Path, codec: &dyn Codec) -> Result<usize, CacheError> {
        let identity = CodecIdentity::of(codec);
        let store = ArtifactStore::new(dir);
        let mut manifest = SnapshotManifest::new(identity);
        manifest.generations = self.generations();

        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.generation());

        for (key, entry) in entries {
            let data = bincode::serde::encode_to_vec(entry.artifact(), bincode::config::standard())
                .map_err(|e| CacheError::Serialization {
                    reason: format!("artifact for {key}: {e}"),
                })?;
            let artifact_key = key.content_hash().to_string();
            store.write_artifact(&artifact_key, &data, identity)?;
            manifest.entries.push(SnapshotEntry {
                operation: key.operation().to_string(),
                fingerprints: key
                    .fingerprints()
                    .iter()
                    .map(|f| FingerprintRecord {
                        tag: f.type_tag(),
                        bytes: f.as_bytes().to_vec(),
                    })
                    .collect(),
                generation: entry.generation(),
                artifact_key,
            });
        }

        manifest.save(dir)?;
        let live: Vec<&str> = manifest
            .entries
            .iter()
            .map(|e| e.artifact_key.as_str())
            .collect();
        let removed = store.gc(&live)?;
        tracing::debug!(
            dir = %dir.display(),
            written = manifest.entries.len(),
            removed,
            "saved cache snapshot"
        );
        Ok(manifest.entries.len())
    }
}

impl<A: DeserializeOwned> SpecializationCache<A> {
    /// Loads a snapshot written under the same codec, or returns an empty
    /// cache. Entries whose artifact cannot be read are skipped.
    pub fn load_snapshot(dir: &Path, codec: &dyn Codec) -> Self {
        let identity = CodecIdentity::of(codec);
        let mut cache = Self::new();
        let Some(manifest) = SnapshotManifest::load(dir).filter(|m| m.is_compatible(identity))
        else {
            tracing::debug!(dir = %dir.display(), "no compatible cache snapshot");
            return cache;
        };

        let store = ArtifactStore::new(dir);
        let mut skipped = 0usize;
        for entry in manifest.entries {
            match restore_entry(&store, identity, &entry) {
                Some((key, artifact)) => {
                    cache.restore(key, CacheEntry::new(artifact, entry.generation));
                }
                None => {
                    skipped += 1;
                    tracing::warn!(
                        operation = %entry.operation,
                        artifact = %entry.artifact_key,
                        "skipping unreadable snapshot entry"
                    );
                }
            }
        }
        cache.set_generations(manifest.generations);
        tracing::debug!(
            dir = %dir.display(),
            loaded = cache.len(),
            skipped,
            "loaded cache snapshot"
        );
        cache
    }
}

fn restore_entry<A: DeserializeOwned>(
    store: &ArtifactStore,
    identity: CodecIdentity<'_>,
    entry: &SnapshotEntry,
) -> Option<(CacheKey, A)> {
    let fingerprints = entry
        .fingerprints
        .iter()
        .map(|r| Fingerprint::from_parts(r.tag, r.bytes.as_slice()).ok())
        .collect::<Option<Vec<_>>>()?;
    let key = CacheKey::new(entry.operation.clone(), fingerprints);
    if key.content_hash().to_string() != entry.artifact_key {
        return None;
    }
    let data = store.read_artifact(&entry.artifact_key, identity)?;
    let (artifact, consumed): (A, usize) =
        bincode::serde::decode_from_slice(&data, bincode::config::standard()).ok()?;
    if consumed != data.len() {
        return None;
    }
    Some((key, artifact))
}
