use rcd_core::ModelError;

/// Errors from building abstract ground graphs and answering d-separation queries.
#[derive(Debug, thiserror::Error)]
pub enum DSeparationError {
    #[error("perspective must be a valid schema item name: found {0:?}")]
    UnknownPerspective(String),
    #[error("relational variable {0} is not a node in the abstract ground graph")]
    NotANode(String),
    #[error("{0} must be a non-empty set of relational variables")]
    EmptyVariableSet(&'static str),
    #[error(transparent)]
    Model(#[from] ModelError),
}
