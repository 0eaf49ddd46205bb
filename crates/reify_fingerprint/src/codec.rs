//! The codec contract and the default bincode codec.
//!
//! The engine never looks inside encoded bytes; it only requires that a codec
//! is deterministic (same value, same bytes) and round-trips
//! (`decode(encode(v)) == v`). Both properties are checked at runtime by the
//! engine and by [`Handle::wrap`](crate::Handle::wrap).

use reify_common::{Value, DEFAULT_MAX_DEPTH};

/// An encoding failure reported by a codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct CodecError {
    /// Description of the failure.
    pub reason: String,
}

impl CodecError {
    /// Creates a codec error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Converts values to bytes and back.
pub trait Codec: Send + Sync {
    /// Short name used in error messages and snapshot headers.
    fn name(&self) -> &str;

    /// Format version. Bytes from different versions are never compared.
    fn version(&self) -> u32;

    /// Encodes a value. The engine has already rejected cycles and resources.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decodes a complete buffer.
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;

    /// Decodes a complete buffer, rejecting values nested deeper than
    /// `max_depth`.
    ///
    /// Buffers may come from outside the process, so a codec whose decoder
    /// recurses should override this and bound the recursion before it starts.
    fn decode_bounded(&self, bytes: &[u8], _max_depth: usize) -> Result<Value, CodecError> {
        self.decode(bytes)
    }
}

/// The default codec: `bincode` standard configuration over serde.
///
/// Mapping keys are kept in a `BTreeMap`, floats are written as raw bits, and
/// integers use varint encoding, so equal values always produce equal bytes.
///
/// Decoding first scans the buffer's structure without recursion and rejects
/// nesting beyond the depth limit, since serde decoding recurses once per
/// level. [`Codec::decode`] uses [`DEFAULT_MAX_DEPTH`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Current format version.
    pub const VERSION: u32 = 1;
}

impl Codec for BincodeCodec {
    fn name(&self) -> &str {
        "bincode"
    }

    fn version(&self) -> u32 {
        Self::VERSION
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| CodecError::new(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        self.decode_bounded(bytes, DEFAULT_MAX_DEPTH)
    }

    fn decode_bounded(&self, bytes: &[u8], max_depth: usize) -> Result<Value, CodecError> {
        check_nesting(bytes, max_depth)?;
        let (value, consumed): (Value, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| CodecError::new(e.to_string()))?;
        if consumed != bytes.len() {
            return Err(CodecError::new(format!(
                "{} trailing bytes after value",
                bytes.len() - consumed
            )));
        }
        Ok(value)
    }
}

// Variant indices of `Value` and `MapKey` as serde assigns them.
const VALUE_UNIT: u64 = 0;
const VALUE_BOOL: u64 = 1;
const VALUE_INT: u64 = 2;
const VALUE_FLOAT: u64 = 3;
const VALUE_STR: u64 = 4;
const VALUE_SEQ: u64 = 5;
const VALUE_TUPLE: u64 = 6;
const VALUE_MAP: u64 = 7;
const VALUE_SHARED: u64 = 8;

const KEY_BOOL: u64 = 0;
const KEY_INT: u64 = 1;
const KEY_STR: u64 = 2;

/// A container whose children are still being scanned.
struct OpenContainer {
    remaining: u64,
    is_map: bool,
}

/// Walks the bincode layout of a `Value` iteratively and fails once a value
/// sits deeper than `max_depth`. Depth counts the same way as on encode:
/// every sequence, tuple, map, and shared cell adds one level.
fn check_nesting(bytes: &[u8], max_depth: usize) -> Result<(), CodecError> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut open: Vec<OpenContainer> = Vec::new();

    loop {
        if open.len() > max_depth {
            return Err(CodecError::new(format!(
                "value nests deeper than the limit of {max_depth}"
            )));
        }
        let children = match reader.varint()? {
            VALUE_UNIT => None,
            VALUE_BOOL => {
                reader.skip(1)?;
                None
            }
            VALUE_INT => {
                reader.varint()?;
                None
            }
            VALUE_FLOAT => {
                reader.skip(8)?;
                None
            }
            VALUE_STR => {
                let len = reader.varint()?;
                reader.skip(len)?;
                None
            }
            VALUE_SEQ | VALUE_TUPLE => Some((reader.varint()?, false)),
            VALUE_MAP => Some((reader.varint()?, true)),
            VALUE_SHARED => Some((1, false)),
            other => return Err(CodecError::new(format!("unknown value variant {other}"))),
        };

        match children {
            Some((remaining, is_map)) if remaining > 0 => {
                if is_map {
                    reader.skip_map_key()?;
                }
                open.push(OpenContainer { remaining, is_map });
            }
            _ => {
                // One value is complete; close every container it finishes.
                loop {
                    let Some(top) = open.last_mut() else {
                        return Ok(());
                    };
                    top.remaining -= 1;
                    if top.remaining > 0 {
                        if top.is_map {
                            reader.skip_map_key()?;
                        }
                        break;
                    }
                    open.pop();
                }
            }
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8], CodecError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| CodecError::new("buffer ends inside a value"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: u64) -> Result<(), CodecError> {
        let len = usize::try_from(len).map_err(|_| CodecError::new("length out of range"))?;
        self.take(len).map(|_| ())
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a bincode varint: one byte below 251, otherwise a marker byte
    /// followed by a little-endian integer of 2, 4, 8, or 16 bytes.
    fn varint(&mut self) -> Result<u64, CodecError> {
        match self.fixed::<1>()?[0] {
            small @ 0..=250 => Ok(u64::from(small)),
            251 => Ok(u64::from(u16::from_le_bytes(self.fixed()?))),
            252 => Ok(u64::from(u32::from_le_bytes(self.fixed()?))),
            253 => Ok(u64::from_le_bytes(self.fixed()?)),
            254 => u64::try_from(u128::from_le_bytes(self.fixed()?))
                .map_err(|_| CodecError::new("varint out of range")),
            marker => Err(CodecError::new(format!("invalid varint marker {marker}"))),
        }
    }

    fn skip_map_key(&mut self) -> Result<(), CodecError> {
        match self.varint()? {
            KEY_BOOL => self.skip(1),
            KEY_INT => self.varint().map(|_| ()),
            KEY_STR => {
                let len = self.varint()?;
                self.skip(len)
            }
            other => Err(CodecError::new(format!("unknown map key variant {other}"))),
        }
    }
}
