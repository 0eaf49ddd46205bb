//! On-disk artifact files for cache snapshots.
//!
//! Each artifact is `<dir>/artifacts/<key>.bin`: a 4-byte little-endian
//! header length, a bincode [`ArtifactHeader`], then the payload. Reads are
//! fail-safe and treat any mismatch as a missing file.

use std::path::{Path, PathBuf};

use reify_common::ContentHash;
use reify_fingerprint::Codec;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

const ARTIFACT_MAGIC: [u8; 4] = *b"RFYA";

/// Bump on any change to the header or payload layout.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

const ARTIFACT_SUBDIR: &str = "artifacts";
const ARTIFACT_EXT: &str = "bin";

/// Header written before every artifact payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Must be `b"RFYA"`.
    pub magic: [u8; 4],
    /// Artifact layout version.
    pub format_version: u32,
    /// Name of the codec whose fingerprints key this artifact.
    pub codec: String,
    /// Version of that codec.
    pub codec_version: u32,
    /// Hash of the payload.
    pub checksum: ContentHash,
}

/// The codec a snapshot was written under. Fingerprints from one codec are
/// meaningless under another, so every read checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecIdentity<'a> {
    /// Codec name.
    pub name: &'a str,
    /// Codec version.
    pub version: u32,
}

impl<'a> CodecIdentity<'a> {
    /// Returns the identity of a codec.
    pub fn of(codec: &'a dyn Codec) -> Self {
        Self {
            name: codec.name(),
            version: codec.version(),
        }
    }
}

/// Reads and writes artifact files under a snapshot directory.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn subdir(&self) -> PathBuf {
        self.dir.join(ARTIFACT_SUBDIR)
    }

    /// Returns the path of the artifact with the given key.
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.subdir().join(format!("{key}.{ARTIFACT_EXT}"))
    }

    /// Writes an artifact, replacing any existing file with the same key.
    pub fn write_artifact(
        &self,
        key: &str,
        data: &[u8],
        codec: CodecIdentity<'_>,
    ) -> Result<(), CacheError> {
        let subdir = self.subdir();
        std::fs::create_dir_all(&subdir).map_err(|e| CacheError::Io {
            path: subdir,
            source: e,
        })?;

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            codec: codec.name.to_string(),
            codec_version: codec.version,
            checksum: ContentHash::from_bytes(data),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        let path = self.artifact_path(key);
        std::fs::write(&path, &output).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Reads an artifact written under `codec`.
    ///
    /// Returns `None` if the file is missing, truncated, has a foreign magic
    /// or layout version, was written under another codec, or fails its
    /// checksum.
    pub fn read_artifact(&self, key: &str, codec: CodecIdentity<'_>) -> Option<Vec<u8>> {
        let raw = std::fs::read(self.artifact_path(key)).ok()?;
        let len_bytes: [u8; 4] = raw.get(..4)?.try_into().ok()?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        let header_end = 4usize.checked_add(header_len)?;
        let header_bytes = raw.get(4..header_end)?;

        let (header, _): (ArtifactHeader, usize) =
            bincode::serde::decode_from_slice(header_bytes, bincode::config::standard()).ok()?;
        if header.magic != ARTIFACT_MAGIC
            || header.format_version != ARTIFACT_FORMAT_VERSION
            || header.codec != codec.name
            || header.codec_version != codec.version
        {
            return None;
        }

        let payload = &raw[header_end..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }
        Some(payload.to_vec())
    }

    /// Deletes artifact files whose key is not in `live_keys`. Returns the
    /// number removed.
    pub fn gc(&self, live_keys: &[&str]) -> Result<usize, CacheError> {
        let dir = self.subdir();
        if !dir.exists() {
            return Ok(0);
        }
        let entries = std::fs::read_dir(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let mut removed = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| CacheError::Io {
                    path: dir.clone(),
                    source: e,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !live_keys.contains(&stem) {
                std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
