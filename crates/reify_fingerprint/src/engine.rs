//! The fingerprint engine: validation around an injected codec.

use std::cell::RefCell;
use std::rc::Rc;

use reify_common::{TypeTag, Value, DEFAULT_MAX_DEPTH};

use crate::codec::{BincodeCodec, Codec};
use crate::error::FingerprintError;
use crate::fingerprint::Fingerprint;

/// Tunables for [`FingerprintEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Encode every value twice and fail if the bytes differ.
    pub verify_determinism: bool,
    /// Maximum container nesting accepted by [`FingerprintEngine::encode`]
    /// and [`FingerprintEngine::decode_bytes`].
    pub max_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            verify_determinism: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Produces fingerprints from values and values from fingerprints.
///
/// Before the codec sees a value, the engine walks it and rejects live
/// resources, nesting beyond [`EngineOptions::max_depth`], and cycles through
/// shared cells. Cycle detection tracks the chain of cells currently open, so
/// a cell reachable along two paths (a DAG) is fine and is encoded by value
/// each time. The engine holds no mutable state; encode and decode are pure.
pub struct FingerprintEngine {
    codec: Box<dyn Codec>,
    options: EngineOptions,
}

impl FingerprintEngine {
    /// Creates an engine with default options.
    pub fn new(codec: Box<dyn Codec>) -> Self {
        Self::with_options(codec, EngineOptions::default())
    }

    /// Creates an engine with explicit options.
    pub fn with_options(codec: Box<dyn Codec>, options: EngineOptions) -> Self {
        Self { codec, options }
    }

    /// Returns the injected codec.
    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Returns the engine options.
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Checks that a value can be handed to the codec.
    pub fn check_encodable(&self, value: &Value) -> Result<(), FingerprintError> {
        let mut open_cells = Vec::new();
        self.check_at(value, 0, &mut open_cells)
    }

    fn check_at(
        &self,
        value: &Value,
        depth: usize,
        open_cells: &mut Vec<*const RefCell<Value>>,
    ) -> Result<(), FingerprintError> {
        if depth > self.options.max_depth {
            return Err(FingerprintError::serialization(format!(
                "value nests deeper than the limit of {}",
                self.options.max_depth
            )));
        }
        match value {
            Value::Resource(resource) => Err(FingerprintError::serialization(format!(
                "live {} resource '{}' cannot be encoded",
                resource.kind, resource.label
            ))),
            Value::Seq(items) | Value::Tuple(items) => items
                .iter()
                .try_for_each(|item| self.check_at(item, depth + 1, open_cells)),
            Value::Map(entries) => entries
                .values()
                .try_for_each(|item| self.check_at(item, depth + 1, open_cells)),
            Value::Shared(cell) => {
                let ptr = Rc::as_ptr(cell);
                if open_cells.contains(&ptr) {
                    return Err(FingerprintError::serialization(
                        "value contains a reference cycle",
                    ));
                }
                let inner = cell.try_borrow().map_err(|_| {
                    FingerprintError::serialization("shared cell is mutably borrowed")
                })?;
                open_cells.push(ptr);
                let result = self.check_at(&inner, depth + 1, open_cells);
                open_cells.pop();
                result
            }
            Value::Unit | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {
                Ok(())
            }
        }
    }

    /// Encodes a value into a fingerprint.
    pub fn encode(&self, value: &Value) -> Result<Fingerprint, FingerprintError> {
        self.check_encodable(value)?;

        let codec = self.codec.name();
        let bytes = self.codec.encode(value).map_err(|e| {
            FingerprintError::serialization(format!("codec '{codec}' failed: {e}"))
        })?;
        if bytes.is_empty() {
            return Err(FingerprintError::serialization(format!(
                "codec '{codec}' produced an empty buffer"
            )));
        }

        if self.options.verify_determinism {
            let again = self.codec.encode(value).map_err(|e| {
                FingerprintError::serialization(format!("codec '{codec}' failed: {e}"))
            })?;
            if again != bytes {
                return Err(FingerprintError::serialization(format!(
                    "codec '{codec}' is not deterministic: two encodings of one value differ"
                )));
            }
        }

        tracing::trace!(tag = %value.type_tag(), bytes = bytes.len(), "encoded value");
        Fingerprint::from_parts(value.type_tag(), bytes)
    }

    /// Decodes a fingerprint back into a value.
    pub fn decode(&self, fingerprint: &Fingerprint) -> Result<Value, FingerprintError> {
        self.decode_bytes(fingerprint.type_tag(), fingerprint.as_bytes())
    }

    /// Decodes a raw buffer that claims to hold a value tagged `tag`.
    ///
    /// The buffer may be hostile; nesting beyond the depth limit is a decode
    /// error.
    pub fn decode_bytes(&self, tag: TypeTag, bytes: &[u8]) -> Result<Value, FingerprintError> {
        if bytes.is_empty() {
            return Err(FingerprintError::decode("buffer is empty"));
        }
        let value = self
            .codec
            .decode_bounded(bytes, self.options.max_depth)
            .map_err(|e| {
                FingerprintError::decode(format!("codec '{}': {e}", self.codec.name()))
            })?;
        let found = value.type_tag();
        if found != tag {
            return Err(FingerprintError::type_mismatch(tag.name(), found.name()));
        }
        Ok(value)
    }
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        Self::new(Box::new(BincodeCodec))
    }
}
