//! Core types for relational causal discovery.
//!
//! Provides the relational schema ([`schema::Schema`]), relational variables and
//! dependencies with their textual syntax, structural validity rules, enumeration
//! of the relational space bounded by a hop threshold, generative models with an
//! acyclicity check, and run configuration.

pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod space;
pub mod validity;
pub mod variable;

pub use error::ModelError;
pub use model::Model;
pub use schema::{Cardinality, DataType, EXISTS_ATTR_NAME, Schema};
pub use variable::{RelationalDependency, RelationalVariable, RelationalVariableIntersection};
