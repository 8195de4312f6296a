//! Interning table for relational dependencies.
//!
//! Every abstract ground graph built against the same table tags its edges with
//! the same [`DepId`] for the same dependency, so removing a dependency from one
//! graph can be mirrored in all others by id.

use rcd_core::RelationalDependency;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Handle to a dependency interned in a [`DependencyTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DepId(usize);

impl DepId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dep#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyTable {
    deps: Vec<RelationalDependency>,
    index: HashMap<RelationalDependency, DepId>,
}

impl DependencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of `dep`, adding it if it is not yet known.
    pub fn intern(&mut self, dep: &RelationalDependency) -> DepId {
        if let Some(&id) = self.index.get(dep) {
            return id;
        }
        let id = DepId(self.deps.len());
        self.deps.push(dep.clone());
        self.index.insert(dep.clone(), id);
        id
    }

    pub fn id(&self, dep: &RelationalDependency) -> Option<DepId> {
        self.index.get(dep).copied()
    }

    /// The dependency behind `id`, or `None` for an id this table never issued.
    pub fn resolve(&self, id: DepId) -> Option<&RelationalDependency> {
        self.deps.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DepId, &RelationalDependency)> {
        self.deps.iter().enumerate().map(|(i, d)| (DepId(i), d))
    }
}
