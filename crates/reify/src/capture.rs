//! Runtime environments for converted closures.
//!
//! A converted closure starts with `rebind` statements. [`CaptureEnv`] is
//! what those statements read from: reconstructable names hold a
//! [`CaptureRecord`], everything else holds its value.

use std::collections::BTreeMap;

use reify_common::{Ident, Value};
use reify_fingerprint::{CaptureRecord, Fingerprint, FingerprintEngine, FingerprintError, Reconstruct};
use reify_scope::{ExprId, Rebinding};

/// What a name in a closure environment is bound to.
#[derive(Debug)]
pub enum Binding {
    /// A fingerprinted value, reconstructed on first read.
    Captured(CaptureRecord),
    /// An ordinary value, passed through unchanged.
    Plain(Value),
}

impl Binding {
    /// Captures a handle by identity.
    pub fn captured(handle: &dyn Reconstruct) -> Self {
        Binding::Captured(CaptureRecord::from_handle(handle))
    }
}

/// Explicit environment passed to a converted closure.
#[derive(Debug, Default)]
pub struct CaptureEnv {
    bindings: BTreeMap<Ident, Binding>,
}

impl CaptureEnv {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the environment for `closure` from the rebindings a conversion
    /// inserted there. `lookup` supplies the binding for each rebound name;
    /// names it returns `None` for are left unbound.
    pub fn for_closure(
        rebindings: &[Rebinding],
        closure: ExprId,
        mut lookup: impl FnMut(Ident) -> Option<Binding>,
    ) -> Self {
        let mut env = Self::new();
        for rebinding in rebindings.iter().filter(|r| r.closure == closure) {
            if let Some(binding) = lookup(rebinding.name) {
                env.bind(rebinding.name, binding);
            }
        }
        env
    }

    /// Binds a name, replacing any previous binding.
    pub fn bind(&mut self, name: Ident, binding: Binding) {
        self.bindings.insert(name, binding);
    }

    /// Returns `true` if the name is bound.
    pub fn contains(&self, name: Ident) -> bool {
        self.bindings.contains_key(&name)
    }

    /// Returns the number of bound names.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Executes `rebind name`.
    ///
    /// A captured name yields its reconstructed value; a plain binding is
    /// returned as is. `None` means the name is unbound here.
    pub fn rebind(
        &self,
        name: Ident,
        engine: &FingerprintEngine,
    ) -> Result<Option<Value>, FingerprintError> {
        match self.bindings.get(&name) {
            None => Ok(None),
            Some(Binding::Plain(value)) => Ok(Some(value.clone())),
            Some(Binding::Captured(record)) => record.reconstruct_value(engine).map(Some),
        }
    }

    /// Returns the fingerprint a name was captured under, if it was captured.
    pub fn identity(&self, name: Ident) -> Option<&Fingerprint> {
        match self.bindings.get(&name) {
            Some(Binding::Captured(record)) => Some(record.fingerprint()),
            _ => None,
        }
    }
}
