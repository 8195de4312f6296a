//! Conditional independence tests.

use crate::error::CiTestError;
use rcd_core::{Model, RelationalVariable};
use rcd_dsep::DSeparation;
use std::collections::HashMap;
use tracing::trace;

/// A test of `cause _||_ effect | conditioning`.
///
/// All three arguments share the base item of `effect`.
pub trait CiTest {
    fn is_conditionally_independent(
        &mut self,
        cause: &RelationalVariable,
        effect: &RelationalVariable,
        conditioning: &[RelationalVariable],
    ) -> Result<bool, CiTestError>;
}

impl<T: CiTest + ?Sized> CiTest for &mut T {
    fn is_conditionally_independent(
        &mut self,
        cause: &RelationalVariable,
        effect: &RelationalVariable,
        conditioning: &[RelationalVariable],
    ) -> Result<bool, CiTestError> {
        (**self).is_conditionally_independent(cause, effect, conditioning)
    }
}

type OracleKey = (RelationalVariable, RelationalVariable, Vec<RelationalVariable>);

/// Ground-truth test answering from relational d-separation on a known model.
pub struct Oracle {
    dsep: DSeparation,
    hop_threshold: usize,
    cache: HashMap<OracleKey, bool>,
}

impl Oracle {
    /// `hop_threshold` bounds the abstract ground graphs queried; RCD reasons
    /// at twice its own hop threshold, so this should be at least that.
    pub fn new(model: Model, hop_threshold: usize) -> Self {
        Self {
            dsep: DSeparation::new(model),
            hop_threshold,
            cache: HashMap::new(),
        }
    }

    pub fn model(&self) -> &Model {
        self.dsep.model()
    }

    pub fn hop_threshold(&self) -> usize {
        self.hop_threshold
    }

    /// Textual convenience over [`CiTest::is_conditionally_independent`].
    pub fn is_conditionally_independent_str(
        &mut self,
        cause: &str,
        effect: &str,
        conditioning: &[&str],
    ) -> Result<bool, CiTestError> {
        let cause: RelationalVariable = cause.parse().map_err(rcd_dsep::DSeparationError::from)?;
        let effect: RelationalVariable = effect.parse().map_err(rcd_dsep::DSeparationError::from)?;
        let conditioning = conditioning
            .iter()
            .map(|s| s.parse().map_err(rcd_dsep::DSeparationError::from))
            .collect::<Result<Vec<RelationalVariable>, _>>()?;
        self.is_conditionally_independent(&cause, &effect, &conditioning)
    }
}

impl CiTest for Oracle {
    fn is_conditionally_independent(
        &mut self,
        cause: &RelationalVariable,
        effect: &RelationalVariable,
        conditioning: &[RelationalVariable],
    ) -> Result<bool, CiTestError> {
        let mut sorted = conditioning.to_vec();
        sorted.sort();
        let key = (cause.clone(), effect.clone(), sorted);
        if let Some(&cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        let independent = self.dsep.d_separated(
            self.hop_threshold,
            std::slice::from_ref(cause),
            std::slice::from_ref(effect),
            &key.2,
        )?;
        trace!(%cause, %effect, independent, "oracle query");
        self.cache.insert(key, independent);
        Ok(independent)
    }
}
