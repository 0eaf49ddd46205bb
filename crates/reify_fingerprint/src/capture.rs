//! Explicit capture records for closure environments.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::fmt;

use reify_common::Value;

use crate::engine::FingerprintEngine;
use crate::error::FingerprintError;
use crate::fingerprint::Fingerprint;
use crate::handle::Reconstruct;

/// An immutable capture of a fingerprinted value.
///
/// A converted closure receives one of these per reconstructable name instead
/// of capturing the value itself. A plain value is decoded the first time it
/// is read and kept afterwards. A value holding shared cells is decoded anew
/// on every read, so no reader can mutate what the next one sees.
pub struct CaptureRecord {
    fingerprint: Fingerprint,
    value: OnceCell<Value>,
}

impl CaptureRecord {
    /// Creates an unmaterialized record.
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            value: OnceCell::new(),
        }
    }

    /// Captures the identity of a handle.
    pub fn from_handle(handle: &dyn Reconstruct) -> Self {
        Self::new(handle.identity().clone())
    }

    /// Returns the captured fingerprint.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns `true` once a plain value has been decoded and kept.
    pub fn is_materialized(&self) -> bool {
        self.value.get().is_some()
    }

    /// Returns the captured value.
    ///
    /// Plain values are borrowed from the record after the first decode;
    /// values with shared cells are returned as a fresh, owned decode.
    pub fn get(&self, engine: &FingerprintEngine) -> Result<Cow<'_, Value>, FingerprintError> {
        if let Some(value) = self.value.get() {
            return Ok(Cow::Borrowed(value));
        }
        let decoded = engine.decode(&self.fingerprint)?;
        if !decoded.is_plain() {
            return Ok(Cow::Owned(decoded));
        }
        Ok(Cow::Borrowed(self.value.get_or_init(|| decoded)))
    }
}

impl Reconstruct for CaptureRecord {
    fn identity(&self) -> &Fingerprint {
        &self.fingerprint
    }

    fn reconstruct_value(&self, engine: &FingerprintEngine) -> Result<Value, FingerprintError> {
        self.get(engine).map(Cow::into_owned)
    }
}

impl fmt::Debug for CaptureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRecord")
            .field("fingerprint", &self.fingerprint)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}
