use rcd_core::ModelError;
use rcd_dsep::DSeparationError;

/// Failure of a conditional independence test.
#[derive(Debug, thiserror::Error)]
pub enum CiTestError {
    #[error(transparent)]
    DSeparation(#[from] DSeparationError),
    /// Errors from caller-provided tests.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised by the RCD learning engine.
#[derive(Debug, thiserror::Error)]
pub enum RcdError {
    #[error("{0}")]
    PrerequisiteMissing(&'static str),
    #[error("undirected skeleton's nodes must match schema attributes")]
    SkeletonNodeMismatch,
    #[error("conditional independence test failed: {0}")]
    CiTest(#[from] CiTestError),
    #[error(transparent)]
    DSeparation(#[from] DSeparationError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
