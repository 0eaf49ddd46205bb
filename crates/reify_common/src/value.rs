//! Runtime values that can be fingerprinted, reconstructed, and specialized on.
//!
//! [`Value`] is a closed tree of scalars and containers. Two variants exist
//! only to be rejected by the fingerprint engine: [`Value::Shared`] cells can
//! form cycles, and [`Value::Resource`] stands for live process state such as
//! an open file or a lock.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// The kind of live resource a [`Value::Resource`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// An open file handle.
    File,
    /// A network socket.
    Socket,
    /// A mutex or other lock.
    Lock,
    /// A channel endpoint.
    Channel,
    /// A running thread.
    Thread,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::File => "file",
            ResourceKind::Socket => "socket",
            ResourceKind::Lock => "lock",
            ResourceKind::Channel => "channel",
            ResourceKind::Thread => "thread",
        };
        f.write_str(name)
    }
}

/// A live, process-local resource. Never encodable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    /// What kind of resource this is.
    pub kind: ResourceKind,
    /// Human-readable label used in error messages.
    pub label: String,
}

/// Key of a [`Value::Map`] entry.
///
/// Keys are restricted to totally ordered scalars so that mappings iterate in
/// one canonical order and encode to identical bytes every time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MapKey {
    /// A boolean key.
    Bool(bool),
    /// An integer key.
    Int(i64),
    /// A string key.
    Str(String),
}

impl From<bool> for MapKey {
    fn from(b: bool) -> Self {
        MapKey::Bool(b)
    }
}

impl From<i64> for MapKey {
    fn from(i: i64) -> Self {
        MapKey::Int(i)
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::Str(s.to_string())
    }
}

impl From<String> for MapKey {
    fn from(s: String) -> Self {
        MapKey::Str(s)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{b}"),
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// The top-level variant of a value.
///
/// Stored next to every fingerprint buffer and checked again after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// [`Value::Unit`].
    Unit,
    /// [`Value::Bool`].
    Bool,
    /// [`Value::Int`].
    Int,
    /// [`Value::Float`].
    Float,
    /// [`Value::Str`].
    Str,
    /// [`Value::Seq`].
    Seq,
    /// [`Value::Tuple`].
    Tuple,
    /// [`Value::Map`].
    Map,
    /// [`Value::Shared`].
    Shared,
    /// [`Value::Resource`].
    Resource,
}

impl TypeTag {
    /// Returns the lower-case name of this tag.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Unit => "unit",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::Seq => "seq",
            TypeTag::Tuple => "tuple",
            TypeTag::Map => "map",
            TypeTag::Shared => "shared",
            TypeTag::Resource => "resource",
        }
    }

    /// Returns the structural class of values carrying this tag.
    pub fn shape(self) -> Shape {
        match self {
            TypeTag::Unit | TypeTag::Bool | TypeTag::Int | TypeTag::Float | TypeTag::Str => {
                Shape::Scalar
            }
            TypeTag::Seq => Shape::Sequence,
            TypeTag::Tuple => Shape::Tuple,
            TypeTag::Map => Shape::Mapping,
            TypeTag::Shared | TypeTag::Resource => Shape::Other,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse structural class of a value.
///
/// The set is closed: generators that branch on the structure of a value
/// pick one of these five arms instead of inspecting values ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// An ordered, homogeneous-by-convention sequence.
    Sequence,
    /// A key/value mapping.
    Mapping,
    /// A single unit, bool, int, float, or string.
    Scalar,
    /// A fixed-arity tuple.
    Tuple,
    /// Anything else (shared cells, resources).
    Other,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Sequence => "sequence",
            Shape::Mapping => "mapping",
            Shape::Scalar => "scalar",
            Shape::Tuple => "tuple",
            Shape::Other => "other",
        };
        f.write_str(name)
    }
}

/// Default bound on container nesting, shared by encoding and decoding.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// A runtime value.
///
/// Equality is structural. Floats compare by bit pattern, so `NaN == NaN`
/// holds and `0.0 != -0.0`. Shared cells compare by content.
#[derive(Clone, Serialize, Deserialize)]
pub enum Value {
    /// The unit value.
    Unit,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// An ordered sequence.
    Seq(Vec<Value>),
    /// A fixed-arity tuple.
    Tuple(Vec<Value>),
    /// A mapping with canonically ordered keys.
    Map(BTreeMap<MapKey, Value>),
    /// A shared, mutable cell. Sharing without a cycle encodes by value.
    Shared(Rc<RefCell<Value>>),
    /// A live resource.
    #[serde(skip)]
    Resource(Resource),
}

impl Value {
    /// Builds a sequence from anything convertible to values.
    pub fn seq<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Builds a tuple from anything convertible to values.
    pub fn tuple<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Builds a mapping from key/value pairs. Later duplicates win.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<MapKey>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wraps a value in a fresh shared cell.
    pub fn shared(inner: Value) -> Self {
        Value::Shared(Rc::new(RefCell::new(inner)))
    }

    /// Creates a resource value.
    pub fn resource(kind: ResourceKind, label: impl Into<String>) -> Self {
        Value::Resource(Resource {
            kind,
            label: label.into(),
        })
    }

    /// Returns the top-level variant tag.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Unit => TypeTag::Unit,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::Seq(_) => TypeTag::Seq,
            Value::Tuple(_) => TypeTag::Tuple,
            Value::Map(_) => TypeTag::Map,
            Value::Shared(_) => TypeTag::Shared,
            Value::Resource(_) => TypeTag::Resource,
        }
    }

    /// Returns the structural class of this value.
    pub fn shape(&self) -> Shape {
        self.type_tag().shape()
    }

    /// Returns `true` if the value contains no shared cells and no resources.
    ///
    /// A plain value cannot change after construction, so a copy of it stays
    /// equal to its fingerprint forever.
    pub fn is_plain(&self) -> bool {
        let mut pending = vec![self];
        while let Some(value) = pending.pop() {
            match value {
                Value::Shared(_) | Value::Resource(_) => return false,
                Value::Seq(items) | Value::Tuple(items) => pending.extend(items),
                Value::Map(entries) => pending.extend(entries.values()),
                _ => {}
            }
        }
        true
    }

    fn fmt_inner(
        &self,
        f: &mut fmt::Formatter<'_>,
        open_cells: &mut Vec<*const RefCell<Value>>,
    ) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Seq(items) => {
                f.write_str("[")?;
                fmt_items(items, f, open_cells)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                fmt_items(items, f, open_cells)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: ")?;
                    v.fmt_inner(f, open_cells)?;
                }
                f.write_str("}")
            }
            Value::Shared(cell) => {
                let ptr = Rc::as_ptr(cell);
                if open_cells.contains(&ptr) {
                    return f.write_str("&<cycle>");
                }
                let Ok(inner) = cell.try_borrow() else {
                    return f.write_str("&<borrowed>");
                };
                f.write_str("&")?;
                open_cells.push(ptr);
                let result = inner.fmt_inner(f, open_cells);
                open_cells.pop();
                result
            }
            Value::Resource(r) => write!(f, "<{} {}>", r.kind, r.label),
        }
    }
}

fn fmt_items(
    items: &[Value],
    f: &mut fmt::Formatter<'_>,
    open_cells: &mut Vec<*const RefCell<Value>>,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.fmt_inner(f, open_cells)?;
    }
    Ok(())
}

impl PartialEq for Value {
    /// Structural equality.
    ///
    /// Two distinct cyclic structures never compare equal in finite time;
    /// only compare values the fingerprint engine accepted. A shared cell
    /// that is mutably borrowed compares unequal.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Shared(a), Value::Shared(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                match (a.try_borrow(), b.try_borrow()) {
                    (Ok(a), Ok(b)) => *a == *b,
                    _ => false,
                }
            }
            (Value::Resource(a), Value::Resource(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_inner(f, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({self})")
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::seq(items)
    }
}
