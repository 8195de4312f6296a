//! Relational variables, dependencies and variable intersections.
//!
//! Textual forms follow the bracket syntax used throughout the crate:
//! `[A, AB, B].Y` for a variable and `[A, AB, B].Y -> [A].X` for a dependency.

use crate::error::ModelError;
use crate::schema::EXISTS_ATTR_NAME;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An attribute reached by following `path` from its first item (the base item).
///
/// Equality, hashing and ordering are structural over `(path, attr)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RelationalVariable {
    path: Vec<String>,
    attr: String,
}

impl RelationalVariable {
    pub fn new<I, S>(path: I, attr: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            attr: attr.into(),
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn attr_name(&self) -> &str {
        &self.attr
    }

    pub fn path_len(&self) -> usize {
        self.path.len()
    }

    pub fn base_item(&self) -> &str {
        self.path.first().map_or("", String::as_str)
    }

    pub fn terminal_item(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    pub fn is_existence(&self) -> bool {
        self.attr == EXISTS_ATTR_NAME
    }

    /// The singleton-path variable for this variable's terminal item and attribute.
    pub fn canonical(&self) -> RelationalVariable {
        RelationalVariable::new([self.terminal_item()], self.attr.as_str())
    }

    /// True when both variables share base item, terminal item and attribute
    /// but their paths differ at some position.
    pub fn intersects(&self, other: &RelationalVariable) -> bool {
        self.base_item() == other.base_item()
            && self.terminal_item() == other.terminal_item()
            && self.attr == other.attr
            && self.path.iter().zip(&other.path).any(|(a, b)| a != b)
    }
}

impl fmt::Display for RelationalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}].{}", self.path.join(", "), self.attr)
    }
}

impl FromStr for RelationalVariable {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ModelError::Parse {
            input: s.to_string(),
            reason,
        };
        if s.matches('.').count() != 1 {
            return Err(err("expected exactly one dot"));
        }
        if s.matches('[').count() != 1 {
            return Err(err("expected exactly one left square bracket"));
        }
        if s.matches(']').count() != 1 {
            return Err(err("expected exactly one right square bracket"));
        }
        let (path_str, attr) = s.split_once('.').ok_or_else(|| err("expected exactly one dot"))?;
        let inner = path_str
            .trim()
            .strip_prefix('[')
            .and_then(|p| p.strip_suffix(']'))
            .ok_or_else(|| err("path must start and end with square brackets"))?;
        Ok(RelationalVariable::new(
            inner.split(',').map(str::trim),
            attr.trim(),
        ))
    }
}

impl From<RelationalVariable> for String {
    fn from(v: RelationalVariable) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for RelationalVariable {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A claimed causal edge `cause -> effect`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RelationalDependency {
    pub cause: RelationalVariable,
    pub effect: RelationalVariable,
}

impl RelationalDependency {
    pub fn new(cause: RelationalVariable, effect: RelationalVariable) -> Self {
        Self { cause, effect }
    }

    /// The same edge viewed from the cause's terminal item with roles swapped.
    ///
    /// `[A, AB, B].Y -> [A].X` reverses to `[B, AB, A].X -> [B].Y`.
    pub fn reverse(&self) -> RelationalDependency {
        let mut path = self.cause.path.clone();
        path.reverse();
        RelationalDependency {
            cause: RelationalVariable {
                path,
                attr: self.effect.attr.clone(),
            },
            effect: RelationalVariable::new([self.cause.terminal_item()], self.cause.attr.as_str()),
        }
    }
}

impl fmt::Display for RelationalDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.cause, self.effect)
    }
}

impl FromStr for RelationalDependency {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.matches("->").count() != 1 {
            return Err(ModelError::Parse {
                input: s.to_string(),
                reason: "expected exactly one '->' arrow",
            });
        }
        let (cause, effect) = s.split_once("->").ok_or_else(|| ModelError::Parse {
            input: s.to_string(),
            reason: "expected exactly one '->' arrow",
        })?;
        Ok(RelationalDependency::new(
            cause.trim().parse()?,
            effect.trim().parse()?,
        ))
    }
}

impl From<RelationalDependency> for String {
    fn from(d: RelationalDependency) -> Self {
        d.to_string()
    }
}

impl TryFrom<String> for RelationalDependency {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Two intersecting variables treated as one ambiguous node.
///
/// The pair is stored sorted, so construction order does not affect identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationalVariableIntersection {
    first: RelationalVariable,
    second: RelationalVariable,
}

impl RelationalVariableIntersection {
    pub fn new(a: RelationalVariable, b: RelationalVariable) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> &RelationalVariable {
        &self.first
    }

    pub fn second(&self) -> &RelationalVariable {
        &self.second
    }

    pub fn sources(&self) -> [&RelationalVariable; 2] {
        [&self.first, &self.second]
    }

    pub fn contains(&self, var: &RelationalVariable) -> bool {
        &self.first == var || &self.second == var
    }
}

impl fmt::Display for RelationalVariableIntersection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} & {}>", self.first, self.second)
    }
}
