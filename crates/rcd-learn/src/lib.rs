//! Relational causal discovery (RCD).
//!
//! [`Rcd`] learns a partially oriented set of relational dependencies from a
//! schema and a [`CiTest`]. [`Oracle`] answers tests from a known model, which
//! makes it the reference test for checking the learner. [`Pc`] is the
//! single-entity front end over the same learner.

pub mod citest;
pub mod error;
pub mod evaluation;
pub mod orientation;
pub mod pc;
pub mod rcd;
pub mod sepset;

pub use citest::{CiTest, Oracle};
pub use error::{CiTestError, RcdError};
pub use orientation::{OrientationUsage, Rule};
pub use pc::{Pc, VariableGraph};
pub use rcd::{AggStats, CiRecord, Rcd, run_rcd};
pub use sepset::{Sepset, SepsetMap};
