//! Dispatch on the structural shape of a reconstructed value.

use std::collections::BTreeMap;

use reify_common::{MapKey, Shape, Value};
use reify_fingerprint::{FingerprintEngine, Reconstruct};

use crate::cache::SpecializationCache;
use crate::error::{BoxError, CacheError};

type SliceArm<'a, A> = Box<dyn Fn(&[Value]) -> Result<A, BoxError> + 'a>;
type MapArm<'a, A> = Box<dyn Fn(&BTreeMap<MapKey, Value>) -> Result<A, BoxError> + 'a>;
type ValueArm<'a, A> = Box<dyn Fn(&Value) -> Result<A, BoxError> + 'a>;

/// No generator was registered for the shape of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no generator registered for {shape} values")]
pub struct MissingShapeArm {
    /// The shape that had no arm.
    pub shape: Shape,
}

/// A closed set of per-shape generators.
///
/// Every value falls in exactly one [`Shape`]. Shared cells are looked
/// through, so a shared sequence dispatches to the sequence arm. Arms left
/// unset fail with [`MissingShapeArm`].
pub struct ShapeDispatch<'a, A> {
    sequence: Option<SliceArm<'a, A>>,
    mapping: Option<MapArm<'a, A>>,
    scalar: Option<ValueArm<'a, A>>,
    tuple: Option<SliceArm<'a, A>>,
    other: Option<ValueArm<'a, A>>,
}

impl<'a, A> Default for ShapeDispatch<'a, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, A> ShapeDispatch<'a, A> {
    /// Creates a dispatcher with no arms.
    pub fn new() -> Self {
        Self {
            sequence: None,
            mapping: None,
            scalar: None,
            tuple: None,
            other: None,
        }
    }

    /// Handles sequences.
    pub fn on_sequence<F, E>(mut self, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<A, E> + 'a,
        E: Into<BoxError>,
    {
        self.sequence = Some(Box::new(move |items: &[Value]| -> Result<A, BoxError> {
            f(items).map_err(Into::into)
        }));
        self
    }

    /// Handles mappings.
    pub fn on_mapping<F, E>(mut self, f: F) -> Self
    where
        F: Fn(&BTreeMap<MapKey, Value>) -> Result<A, E> + 'a,
        E: Into<BoxError>,
    {
        self.mapping = Some(Box::new(
            move |entries: &BTreeMap<MapKey, Value>| -> Result<A, BoxError> {
                f(entries).map_err(Into::into)
            },
        ));
        self
    }

    /// Handles unit, booleans, integers, floats and strings.
    pub fn on_scalar<F, E>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<A, E> + 'a,
        E: Into<BoxError>,
    {
        self.scalar = Some(Box::new(move |value: &Value| -> Result<A, BoxError> {
            f(value).map_err(Into::into)
        }));
        self
    }

    /// Handles tuples.
    pub fn on_tuple<F, E>(mut self, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<A, E> + 'a,
        E: Into<BoxError>,
    {
        self.tuple = Some(Box::new(move |items: &[Value]| -> Result<A, BoxError> {
            f(items).map_err(Into::into)
        }));
        self
    }

    /// Handles everything else.
    pub fn on_other<F, E>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<A, E> + 'a,
        E: Into<BoxError>,
    {
        self.other = Some(Box::new(move |value: &Value| -> Result<A, BoxError> {
            f(value).map_err(Into::into)
        }));
        self
    }

    /// Runs the arm matching the value's shape.
    pub fn dispatch(&self, value: &Value) -> Result<A, BoxError> {
        if let Value::Shared(cell) = value {
            let inner = cell
                .try_borrow()
                .map_err(|_| BoxError::from("shared cell is mutably borrowed"))?;
            return self.dispatch(&inner);
        }
        let missing = |shape| -> BoxError { Box::new(MissingShapeArm { shape }) };
        match value {
            Value::Seq(items) => match &self.sequence {
                Some(arm) => arm(items),
                None => Err(missing(Shape::Sequence)),
            },
            Value::Tuple(items) => match &self.tuple {
                Some(arm) => arm(items),
                None => Err(missing(Shape::Tuple)),
            },
            Value::Map(entries) => match &self.mapping {
                Some(arm) => arm(entries),
                None => Err(missing(Shape::Mapping)),
            },
            _ if value.shape() == Shape::Scalar => match &self.scalar {
                Some(arm) => arm(value),
                None => Err(missing(Shape::Scalar)),
            },
            _ => match &self.other {
                Some(arm) => arm(value),
                None => Err(missing(Shape::Other)),
            },
        }
    }
}

impl<A: Clone> SpecializationCache<A> {
    /// Generates through a [`ShapeDispatch`], caching per value as usual.
    pub fn generate_by_shape(
        &mut self,
        engine: &FingerprintEngine,
        operation: &str,
        handle: &dyn Reconstruct,
        dispatch: &ShapeDispatch<'_, A>,
    ) -> Result<A, CacheError> {
        self.generate(engine, operation, &[handle], |values| match values {
            [value] => dispatch.dispatch(value),
            _ => Err(BoxError::from("shape dispatch expects exactly one value")),
        })
    }
}
