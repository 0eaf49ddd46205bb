//! Fingerprinting and reconstruction of runtime values.
//!
//! A [`FingerprintEngine`] turns a [`Value`](reify_common::Value) into a
//! [`Fingerprint`]: the value's type tag plus the exact bytes an injected
//! [`Codec`] produced for it. Fingerprints are identities. Two fingerprints
//! are equal only if their bytes are equal, which makes them usable as cache
//! keys as long as the codec is deterministic.
//!
//! [`Handle`] pairs a value with a fingerprint that has been validated to
//! round-trip, and [`CaptureRecord`] defers reconstruction until a captured
//! name is first read.

#![warn(missing_docs)]

pub mod capture;
pub mod codec;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod handle;

pub use capture::CaptureRecord;
pub use codec::{BincodeCodec, Codec, CodecError};
pub use engine::{EngineOptions, FingerprintEngine};
pub use error::FingerprintError;
pub use fingerprint::Fingerprint;
pub use handle::{Fingerprintable, Handle, Reconstruct};
