//! Names declared reconstructable.

use std::collections::{BTreeSet, HashSet};

use reify_common::Ident;

/// The set of names whose values are fingerprinted handles.
///
/// Only [`mark`](Self::mark) adds to it and nothing removes from it. The
/// analyzer consults it and never infers membership.
#[derive(Debug, Default, Clone)]
pub struct ReconstructableRegistry {
    names: HashSet<Ident>,
}

impl ReconstructableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a name reconstructable. Returns `false` if it already was.
    pub fn mark(&mut self, name: Ident) -> bool {
        self.names.insert(name)
    }

    /// Returns `true` if the name was marked.
    pub fn is_reconstructable(&self, name: Ident) -> bool {
        self.names.contains(&name)
    }

    /// Returns the marked names among `names`.
    pub fn filter(&self, names: &BTreeSet<Ident>) -> BTreeSet<Ident> {
        names
            .iter()
            .copied()
            .filter(|n| self.is_reconstructable(*n))
            .collect()
    }

    /// Iterates over the marked names in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = Ident> + '_ {
        self.names.iter().copied()
    }

    /// Returns the number of marked names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if nothing was marked.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
