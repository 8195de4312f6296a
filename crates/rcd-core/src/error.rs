//! Error type shared by the schema, variable, validity and model layers.

/// Errors raised while building schemas and models or while checking
/// relational paths, variables and dependencies against a schema.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("schema already has an item named {0:?}")]
    DuplicateItem(String),
    #[error("schema item {0:?} does not exist")]
    UnknownItem(String),
    #[error("entity {0:?} does not exist")]
    UnknownEntity(String),
    #[error("relationship {relationship:?} references unknown entity {entity:?}")]
    UnknownEndpoint { relationship: String, entity: String },
    #[error("cannot add attribute with reserved name {0:?}")]
    ReservedAttribute(String),
    #[error("schema item {item:?} already has attribute {attr:?}")]
    DuplicateAttribute { item: String, attr: String },
    #[error("cannot parse {input:?}: {reason}")]
    Parse { input: String, reason: &'static str },
    #[error("invalid relational path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("schema item {item:?} has no attribute {attr:?} in relational variable {variable}")]
    UnknownAttribute {
        item: String,
        attr: String,
        variable: String,
    },
    #[error("dependency {0} is not canonical")]
    NonCanonicalDependency(String),
    #[error("dependency {0} has inconsistent base items")]
    InconsistentBaseItems(String),
    #[error("relational variable set is empty")]
    EmptyVariableSet,
    #[error("perspective is not consistent across all relational variables")]
    InconsistentPerspective,
    #[error("relational variable {variable} is longer than the hop threshold {hop}")]
    ExceedsHopThreshold { variable: String, hop: usize },
    #[error("found duplicate dependency {0}")]
    DuplicateDependency(String),
    #[error("dependencies encodes a cycle among relational variables")]
    Cycle,
    #[error("schema JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
