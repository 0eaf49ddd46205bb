//! Cache keys built from an operation name and argument fingerprints.

use std::fmt;

use reify_common::ContentHash;
use reify_fingerprint::{Fingerprint, Reconstruct};

/// Identifies one specialization: an operation applied to specific values.
///
/// Two keys are equal when the operation names match and the fingerprints
/// are pairwise byte-identical in order. Argument order is significant.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    fingerprints: Vec<Fingerprint>,
}

impl CacheKey {
    /// Creates a key from an operation name and fingerprints in argument order.
    pub fn new(operation: impl Into<String>, fingerprints: Vec<Fingerprint>) -> Self {
        Self {
            operation: operation.into(),
            fingerprints,
        }
    }

    /// Creates a key from the identities of the given handles.
    pub fn from_handles(operation: &str, handles: &[&dyn Reconstruct]) -> Self {
        Self::new(
            operation,
            handles.iter().map(|h| h.identity().clone()).collect(),
        )
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the argument fingerprints in order.
    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    /// Returns a hash of the whole key, used to name snapshot artifacts.
    pub fn content_hash(&self) -> ContentHash {
        let mut buf = Vec::with_capacity(
            8 + self.operation.len()
                + self
                    .fingerprints
                    .iter()
                    .map(|f| 8 + f.byte_len())
                    .sum::<usize>(),
        );
        // Length prefixes keep ("ab", [c]) and ("a", [bc]) apart.
        buf.extend_from_slice(&(self.operation.len() as u64).to_le_bytes());
        buf.extend_from_slice(self.operation.as_bytes());
        for fingerprint in &self.fingerprints {
            buf.extend_from_slice(&(fingerprint.byte_len() as u64).to_le_bytes());
            buf.extend_from_slice(fingerprint.as_bytes());
        }
        ContentHash::from_bytes(&buf)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.operation)?;
        for (i, fingerprint) in self.fingerprints.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{fingerprint}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reify_common::Value;
    use reify_fingerprint::{FingerprintEngine, Handle};

    fn fp(engine: &FingerprintEngine, value: impl Into<Value>) -> Fingerprint {
        engine.encode(&value.into()).unwrap()
    }

    #[test]
    fn equal_keys_for_equal_values() {
        let engine = FingerprintEngine::default();
        let a = CacheKey::new("sum", vec![fp(&engine, Value::seq([1, 2]))]);
        let b = CacheKey::new("sum", vec![fp(&engine, Value::seq([1, 2]))]);
        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn operation_distinguishes_keys() {
        let engine = FingerprintEngine::default();
        let a = CacheKey::new("sum", vec![fp(&engine, 1i64)]);
        let b = CacheKey::new("product", vec![fp(&engine, 1i64)]);
        assert_ne!(a, b);
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn argument_order_matters() {
        let engine = FingerprintEngine::default();
        let one = fp(&engine, 1i64);
        let two = fp(&engine, 2i64);
        let a = CacheKey::new("pair", vec![one.clone(), two.clone()]);
        let b = CacheKey::new("pair", vec![two, one]);
        assert_ne!(a, b);
    }

    #[test]
    fn from_handles_uses_identities() {
        let engine = FingerprintEngine::default();
        let handle = Handle::wrap(&engine, 7i64).unwrap();
        let key = CacheKey::from_handles("id", &[&handle]);
        assert_eq!(key.operation(), "id");
        assert_eq!(key.fingerprints(), std::slice::from_ref(handle.identity()));
    }

    #[test]
    fn display_lists_fingerprints() {
        let engine = FingerprintEngine::default();
        let key = CacheKey::new("f", vec![fp(&engine, 1i64), fp(&engine, "x")]);
        let shown = key.to_string();
        assert!(shown.starts_with("f[int:"));
        assert!(shown.contains(", str:"));
        assert!(shown.ends_with(']'));
        assert_eq!(CacheKey::new("g", vec![]).to_string(), "g[]");
    }
}
