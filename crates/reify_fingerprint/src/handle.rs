//! Reconstructable handles: values paired with validated fingerprints.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use reify_common::{MapKey, TypeTag, Value};

use crate::engine::FingerprintEngine;
use crate::error::FingerprintError;
use crate::fingerprint::Fingerprint;

/// Rust types that convert losslessly to and from [`Value`].
pub trait Fingerprintable: Sized {
    /// Converts to the value that gets fingerprinted.
    fn to_value(&self) -> Value;

    /// Converts a decoded value back. Fails with
    /// [`FingerprintError::TypeMismatch`] when the value has the wrong shape.
    fn from_value(value: Value) -> Result<Self, FingerprintError>;
}

fn mismatch(expected: TypeTag, found: &Value) -> FingerprintError {
    FingerprintError::type_mismatch(expected.name(), found.type_tag().name())
}

impl Fingerprintable for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        Ok(value)
    }
}

impl Fingerprintable for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(TypeTag::Bool, &other)),
        }
    }
}

impl Fingerprintable for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch(TypeTag::Int, &other)),
        }
    }
}

impl Fingerprintable for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        match value {
            Value::Float(x) => Ok(x),
            other => Err(mismatch(TypeTag::Float, &other)),
        }
    }
}

impl Fingerprintable for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(TypeTag::Str, &other)),
        }
    }
}

impl<T: Fingerprintable> Fingerprintable for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Fingerprintable::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        match value {
            Value::Seq(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch(TypeTag::Seq, &other)),
        }
    }
}

impl<T: Fingerprintable> Fingerprintable for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (MapKey::Str(k.clone()), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        let entries = match value {
            Value::Map(entries) => entries,
            other => return Err(mismatch(TypeTag::Map, &other)),
        };
        entries
            .into_iter()
            .map(|(key, v)| match key {
                MapKey::Str(k) => Ok((k, T::from_value(v)?)),
                MapKey::Bool(_) => Err(FingerprintError::type_mismatch("str key", "bool key")),
                MapKey::Int(_) => Err(FingerprintError::type_mismatch("str key", "int key")),
            })
            .collect()
    }
}

impl<A: Fingerprintable, B: Fingerprintable> Fingerprintable for (A, B) {
    fn to_value(&self) -> Value {
        Value::Tuple(vec![self.0.to_value(), self.1.to_value()])
    }

    fn from_value(value: Value) -> Result<Self, FingerprintError> {
        match value {
            Value::Tuple(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(a), Some(b)) => Ok((A::from_value(a)?, B::from_value(b)?)),
                    _ => Err(FingerprintError::type_mismatch("2-tuple", "short tuple")),
                }
            }
            Value::Tuple(items) => Err(FingerprintError::type_mismatch(
                "2-tuple",
                format!("{}-tuple", items.len()),
            )),
            other => Err(mismatch(TypeTag::Tuple, &other)),
        }
    }
}

/// Object-safe view of anything that carries a fingerprint and can produce
/// the value behind it.
///
/// The specialization cache takes `&[&dyn Reconstruct]` so one call can mix
/// handles of different Rust types.
pub trait Reconstruct {
    /// The fingerprint identifying the value.
    fn identity(&self) -> &Fingerprint;

    /// Produces the value. Repeated calls return equal values.
    fn reconstruct_value(&self, engine: &FingerprintEngine) -> Result<Value, FingerprintError>;
}

/// A value paired with a fingerprint that is known to round-trip.
///
/// Handles are immutable. Two handles are equal when their fingerprint bytes
/// are equal, which for a non-canonical codec can separate values a person
/// would call equal; such handles miss each other in the cache but never
/// reconstruct to a wrong value.
///
/// The original value is retained for fast reconstruction only when asked for
/// and when it is plain (no shared cells, no resources): a retained shared
/// cell could be mutated after wrapping and drift away from its fingerprint.
pub struct Handle<T = Value> {
    fingerprint: Fingerprint,
    original: Option<T>,
}

impl<T: Fingerprintable> Handle<T> {
    /// Wraps a value, keeping it for fast reconstruction when it is plain.
    pub fn wrap(engine: &FingerprintEngine, value: T) -> Result<Self, FingerprintError> {
        let (fingerprint, plain) = validated_fingerprint(engine, &value)?;
        Ok(Self {
            fingerprint,
            original: plain.then_some(value),
        })
    }

    /// Wraps a value without retaining it. Every reconstruction decodes.
    pub fn wrap_detached(engine: &FingerprintEngine, value: &T) -> Result<Self, FingerprintError> {
        let (fingerprint, _) = validated_fingerprint(engine, value)?;
        Ok(Self {
            fingerprint,
            original: None,
        })
    }

    /// The fingerprint of the wrapped value; the only cache key component a
    /// handle offers.
    pub fn identity(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the retained original, if any.
    pub fn original(&self) -> Option<&T> {
        self.original.as_ref()
    }

    /// Drops the retained original.
    pub fn into_detached(self) -> Self {
        Self {
            fingerprint: self.fingerprint,
            original: None,
        }
    }
}

impl<T: Fingerprintable + Clone> Handle<T> {
    /// Produces the wrapped value. Pure: the registry and cache are untouched
    /// and every call yields an equal value.
    pub fn reconstruct(&self, engine: &FingerprintEngine) -> Result<T, FingerprintError> {
        match &self.original {
            Some(value) => Ok(value.clone()),
            None => T::from_value(engine.decode(&self.fingerprint)?),
        }
    }
}

/// Encodes `value`, decodes it again, and requires the two to match.
fn validated_fingerprint<T: Fingerprintable>(
    engine: &FingerprintEngine,
    value: &T,
) -> Result<(Fingerprint, bool), FingerprintError> {
    let original = value.to_value();
    let fingerprint = engine.encode(&original)?;
    let decoded = engine.decode(&fingerprint)?;
    if decoded != original {
        return Err(FingerprintError::NotReconstructable {
            codec: engine.codec().name().to_string(),
            original: original.to_string(),
            decoded: decoded.to_string(),
        });
    }
    T::from_value(decoded)?;
    Ok((fingerprint, original.is_plain()))
}

impl<T: Fingerprintable> Reconstruct for Handle<T> {
    fn identity(&self) -> &Fingerprint {
        &self.fingerprint
    }

    fn reconstruct_value(&self, engine: &FingerprintEngine) -> Result<Value, FingerprintError> {
        match &self.original {
            Some(value) => Ok(value.to_value()),
            None => engine.decode(&self.fingerprint),
        }
    }
}

impl<T: Clone> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            fingerprint: self.fingerprint.clone(),
            original: self.original.clone(),
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("fingerprint", &self.fingerprint)
            .field("retained", &self.original.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BincodeCodec, Codec, CodecError};

    /// Drops the last element of every top-level sequence on decode.
    struct TruncatingCodec;

    impl Codec for TruncatingCodec {
        fn name(&self) -> &str {
            "truncating"
        }
        fn version(&self) -> u32 {
            0
        }
        fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
            BincodeCodec.encode(value)
        }
        fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
            match BincodeCodec.decode(bytes)? {
                Value::Seq(mut items) => {
                    items.pop();
                    Ok(Value::Seq(items))
                }
                other => Ok(other),
            }
        }
    }

    #[test]
    fn wrap_and_reconstruct_mapping() {
        let engine = FingerprintEngine::default();
        let value = Value::map([("a", 1), ("b", 2)]);
        let handle = Handle::wrap(&engine, value.clone()).unwrap();
        assert_eq!(handle.reconstruct(&engine).unwrap(), value);
        assert_eq!(handle.reconstruct(&engine).unwrap(), value);
    }

    #[test]
    fn detached_reconstruct_decodes() {
        let engine = FingerprintEngine::default();
        let handle = Handle::wrap_detached(&engine, &vec![1i64, 2, 3]).unwrap();
        assert!(handle.original().is_none());
        assert_eq!(handle.reconstruct(&engine).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn lossy_codec_is_not_reconstructable() {
        let engine = FingerprintEngine::new(Box::new(TruncatingCodec));
        let err = Handle::wrap(&engine, Value::seq([1, 2])).unwrap_err();
        assert!(matches!(err, FingerprintError::NotReconstructable { .. }));
        // Values the lossy codec happens to preserve still wrap.
        assert!(Handle::wrap(&engine, Value::Int(1)).is_ok());
    }

    #[test]
    fn empty_sequence_wraps() {
        let engine = FingerprintEngine::default();
        let handle = Handle::wrap(&engine, Vec::<i64>::new()).unwrap();
        assert!(handle.reconstruct(&engine).unwrap().is_empty());
    }

    #[test]
    fn equal_values_give_equal_handles() {
        let engine = FingerprintEngine::default();
        let a = Handle::wrap(&engine, "näive".to_string()).unwrap();
        let b = Handle::wrap_detached(&engine, &"näive".to_string()).unwrap();
        assert_eq!(a, b);
        let c = Handle::wrap(&engine, "naive".to_string()).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn shared_values_are_not_retained() {
        let engine = FingerprintEngine::default();
        let value = Value::shared(Value::Int(1));
        let handle = Handle::wrap(&engine, value.clone()).unwrap();
        assert!(handle.original().is_none());

        if let Value::Shared(cell) = &value {
            *cell.borrow_mut() = Value::Int(2);
        }
        assert_eq!(
            handle.reconstruct(&engine).unwrap(),
            Value::shared(Value::Int(1))
        );
    }

    #[test]
    fn typed_reconstruction_checks_type() {
        let engine = FingerprintEngine::default();
        let handle: Handle<Value> = Handle::wrap(&engine, Value::seq(["x"])).unwrap();
        let typed = Vec::<i64>::from_value(handle.reconstruct(&engine).unwrap());
        assert_eq!(typed.unwrap_err(), FingerprintError::type_mismatch("int", "str"));
    }

    #[test]
    fn typed_collections_roundtrip() {
        let engine = FingerprintEngine::default();
        let table: BTreeMap<String, (i64, f64)> =
            [("k".to_string(), (1, f64::NAN))].into_iter().collect();
        let handle = Handle::wrap_detached(&engine, &table).unwrap();
        let back = handle.reconstruct(&engine).unwrap();
        assert_eq!(back["k"].0, 1);
        assert!(back["k"].1.is_nan());
    }

    #[test]
    fn tuple_arity_mismatch() {
        let err = <(i64, i64)>::from_value(Value::tuple([1, 2, 3])).unwrap_err();
        assert_eq!(err, FingerprintError::type_mismatch("2-tuple", "3-tuple"));
    }

    #[test]
    fn non_string_map_keys_rejected() {
        let err = BTreeMap::<String, i64>::from_value(Value::map([(1i64, 2)])).unwrap_err();
        assert!(matches!(err, FingerprintError::TypeMismatch { .. }));
    }

    #[test]
    fn reconstruct_trait_object() {
        let engine = FingerprintEngine::default();
        let a = Handle::wrap(&engine, 7i64).unwrap();
        let b = Handle::wrap(&engine, "s".to_string()).unwrap();
        let handles: [&dyn Reconstruct; 2] = [&a, &b];
        let values: Vec<Value> = handles
            .iter()
            .map(|h| h.reconstruct_value(&engine).unwrap())
            .collect();
        assert_eq!(values, vec![Value::Int(7), Value::from("s")]);
    }
}
