//! Error types for fingerprinting and reconstruction.

/// Errors raised while encoding, decoding, or wrapping values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FingerprintError {
    /// The value cannot be encoded: it holds a live resource, contains a
    /// reference cycle, nests too deeply, or the codec rejected it.
    #[error("value is not encodable: {reason}")]
    Serialization {
        /// Description of what made the value unencodable.
        reason: String,
    },

    /// A buffer is empty, truncated, or otherwise corrupt.
    #[error("cannot decode fingerprint: {reason}")]
    Decode {
        /// Description of the decoding failure.
        reason: String,
    },

    /// The decoded value does not have the expected type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The type the caller or the stored tag asked for.
        expected: String,
        /// The type actually decoded.
        found: String,
    },

    /// Decoding the fresh encoding of a value produced a different value.
    #[error("value does not survive a round trip through codec '{codec}': {original} decoded as {decoded}")]
    NotReconstructable {
        /// Name of the codec that lost information.
        codec: String,
        /// The value as given.
        original: String,
        /// The value as decoded.
        decoded: String,
    },
}

impl FingerprintError {
    pub(crate) fn serialization(reason: impl Into<String>) -> Self {
        FingerprintError::Serialization {
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        FingerprintError::Decode {
            reason: reason.into(),
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        FingerprintError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
