//! Abstract ground graphs and relational d-separation.
//!
//! [`AbstractGroundGraph`] unrolls a set of relational dependencies from one
//! perspective; [`DSeparation`] answers conditional independence queries of a
//! model against it.

pub mod agg;
pub mod dseparation;
pub mod error;
pub mod table;

pub use agg::{AbstractGroundGraph, AggNode, DependencyTags, extend_path};
pub use dseparation::DSeparation;
pub use error::DSeparationError;
pub use petgraph::stable_graph::NodeIndex;
pub use table::{DepId, DependencyTable};
