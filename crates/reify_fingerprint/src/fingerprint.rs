//! The fingerprint type.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use reify_common::{ContentHash, TypeTag};

use crate::error::FingerprintError;

/// A byte-exact identity of a value: its type tag and its encoded bytes.
///
/// The buffer is never empty and never changes. Equality and hashing look at
/// the buffer only; the tag travels along so decoding can be checked. Cloning
/// is a reference-count bump.
#[derive(Clone)]
pub struct Fingerprint {
    tag: TypeTag,
    bytes: Arc<[u8]>,
}

impl Fingerprint {
    /// Rebuilds a fingerprint from a tag and a buffer obtained elsewhere.
    ///
    /// The buffer is not decoded here; [`FingerprintEngine::decode`](crate::FingerprintEngine::decode)
    /// validates it when the value is needed.
    pub fn from_parts(tag: TypeTag, bytes: impl Into<Arc<[u8]>>) -> Result<Self, FingerprintError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(FingerprintError::decode("fingerprint buffer is empty"));
        }
        Ok(Self { tag, bytes })
    }

    /// Returns the type tag of the fingerprinted value.
    pub fn type_tag(&self) -> TypeTag {
        self.tag
    }

    /// Returns the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the length of the encoded buffer.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Hash of the buffer, for logs and file names only.
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::from_bytes(&self.bytes)
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.content_hash().short())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fingerprint({}, {}.., {} bytes)",
            self.tag,
            self.content_hash().short(),
            self.bytes.len()
        )
    }
}
