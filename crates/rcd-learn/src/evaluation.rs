//! Precision and recall of learned dependencies against a known model.

use rcd_core::{Model, RelationalDependency};
use std::collections::HashSet;
use std::hash::Hash;

/// Share of `learned` that is in `truth`; 1.0 when nothing was learned.
pub fn precision<'a, T: Eq + Hash + 'a>(
    truth: impl IntoIterator<Item = &'a T>,
    learned: impl IntoIterator<Item = &'a T>,
) -> f64 {
    let truth: HashSet<&T> = truth.into_iter().collect();
    let learned: HashSet<&T> = learned.into_iter().collect();
    if learned.is_empty() {
        return 1.0;
    }
    learned.intersection(&truth).count() as f64 / learned.len() as f64
}

/// Share of `truth` that was learned; 1.0 when there is nothing to learn.
pub fn recall<'a, T: Eq + Hash + 'a>(
    truth: impl IntoIterator<Item = &'a T>,
    learned: impl IntoIterator<Item = &'a T>,
) -> f64 {
    let truth: HashSet<&T> = truth.into_iter().collect();
    let learned: HashSet<&T> = learned.into_iter().collect();
    if truth.is_empty() {
        return 1.0;
    }
    learned.intersection(&truth).count() as f64 / truth.len() as f64
}

fn with_reverses<'a>(deps: impl IntoIterator<Item = &'a RelationalDependency>) -> HashSet<RelationalDependency> {
    deps.into_iter()
        .flat_map(|dep| [dep.clone(), dep.reverse()])
        .collect()
}

/// Learned dependencies whose reverse was not also learned.
fn oriented_only<'a>(learned: impl IntoIterator<Item = &'a RelationalDependency>) -> HashSet<RelationalDependency> {
    let learned: HashSet<&RelationalDependency> = learned.into_iter().collect();
    learned
        .iter()
        .filter(|dep| !learned.contains(&dep.reverse()))
        .map(|dep| (*dep).clone())
        .collect()
}

/// Precision ignoring orientation.
pub fn skeleton_precision<'a>(model: &Model, learned: impl IntoIterator<Item = &'a RelationalDependency>) -> f64 {
    precision(&with_reverses(model.dependencies()), &with_reverses(learned))
}

/// Recall ignoring orientation.
pub fn skeleton_recall<'a>(model: &Model, learned: impl IntoIterator<Item = &'a RelationalDependency>) -> f64 {
    recall(&with_reverses(model.dependencies()), &with_reverses(learned))
}

/// Precision over the learned dependencies that carry an orientation.
pub fn oriented_precision<'a>(model: &Model, learned: impl IntoIterator<Item = &'a RelationalDependency>) -> f64 {
    precision(model.dependencies(), &oriented_only(learned))
}

/// Recall over the learned dependencies that carry an orientation.
pub fn oriented_recall<'a>(model: &Model, learned: impl IntoIterator<Item = &'a RelationalDependency>) -> f64 {
    recall(model.dependencies(), &oriented_only(learned))
}
