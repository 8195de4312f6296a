//! Separating sets found during skeleton discovery and orientation.

use rcd_core::{ModelError, RelationalVariable};
use std::collections::{BTreeMap, BTreeSet};

pub type Sepset = BTreeSet<RelationalVariable>;

/// Map from ordered variable pairs to the set that separated them.
///
/// Learned sepsets are stored under both orderings; injected ones are kept
/// exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SepsetMap {
    entries: BTreeMap<(RelationalVariable, RelationalVariable), Sepset>,
}

impl SepsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, a: RelationalVariable, b: RelationalVariable, sepset: Sepset) {
        self.entries.insert((a, b), sepset);
    }

    /// [`SepsetMap::insert`] from textual variables.
    pub fn insert_str(&mut self, a: &str, b: &str, sepset: &[&str]) -> Result<(), ModelError> {
        let sepset = sepset.iter().map(|s| s.parse()).collect::<Result<Sepset, _>>()?;
        self.insert(a.parse()?, b.parse()?, sepset);
        Ok(())
    }

    /// Record `sepset` under `(a, b)` and `(b, a)`.
    pub fn insert_symmetric(&mut self, a: &RelationalVariable, b: &RelationalVariable, sepset: Sepset) {
        self.entries.insert((b.clone(), a.clone()), sepset.clone());
        self.entries.insert((a.clone(), b.clone()), sepset);
    }

    pub fn get(&self, a: &RelationalVariable, b: &RelationalVariable) -> Option<&Sepset> {
        self.entries.get(&(a.clone(), b.clone()))
    }

    pub fn contains(&self, a: &RelationalVariable, b: &RelationalVariable) -> bool {
        self.get(a, b).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelationalVariable, &RelationalVariable, &Sepset)> {
        self.entries.iter().map(|((a, b), s)| (a, b, s))
    }
}
