//! Stage plan and the stage resolver.
//!
//! Stages own consecutive runs of terms in ARRAY ORDER. The stored
//! `stage_number` is informational only and never used for ordering.

use crate::{
    error::{SimError, SimResult},
    types::{GrowthRate, ParameterId, Term},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageGrowthRate {
    pub parameter_id: ParameterId,
    pub growth_rate:  GrowthRate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub stage_number: u32,
    pub terms:        Term,
    pub parameters:   Vec<StageGrowthRate>,
}

impl Stage {
    pub fn new(stage_number: u32, terms: Term) -> Self {
        Self { stage_number, terms, parameters: Vec::new() }
    }

    pub fn with_rate(mut self, parameter_id: ParameterId, growth_rate: GrowthRate) -> Self {
        self.parameters.push(StageGrowthRate { parameter_id, growth_rate });
        self
    }

    /// Rate in force for `parameter_id` during this stage.
    /// Parameters the stage does not list grow at 0, not at their default rate.
    pub fn growth_rate(&self, parameter_id: &ParameterId) -> GrowthRate {
        self.parameters
            .iter()
            .rev() // later entries win, as with a map built in order
            .find(|p| &p.parameter_id == parameter_id)
            .map(|p| p.growth_rate)
            .unwrap_or(0.0)
    }
}

/// Saturates instead of wrapping; `validate_plan` rejects plans that would.
pub fn total_terms(stages: &[Stage]) -> Term {
    stages.iter().fold(0, |acc: Term, s| acc.saturating_add(s.terms))
}

/// Where a term sits in the stage plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePosition<'a> {
    pub stage_index: usize,
    pub stage:       &'a Stage,
    /// Terms consumed by all strictly preceding stages.
    pub term_offset: Term,
}

/// Find the stage owning `term` by a linear walk over the plan.
pub fn resolve(stages: &[Stage], term: Term) -> SimResult<StagePosition<'_>> {
    let out_of_range = || SimError::OutOfRange { term, total_terms: total_terms(stages) };
    if term < 1 {
        return Err(out_of_range());
    }

    let mut term_offset: Term = 0;
    for (stage_index, stage) in stages.iter().enumerate() {
        let end = term_offset.saturating_add(stage.terms);
        if term <= end {
            return Ok(StagePosition { stage_index, stage, term_offset });
        }
        term_offset = end;
    }
    Err(out_of_range())
}

/// Reject plans the engine cannot walk. Divergent stage numbers are kept.
pub fn validate_plan(stages: &[Stage]) -> SimResult<()> {
    if stages.is_empty() {
        return Err(SimError::InvalidStagePlan { reason: "a snapshot needs at least one stage".into() });
    }
    let mut total: Term = 0;
    for (i, stage) in stages.iter().enumerate() {
        if stage.terms == 0 {
            return Err(SimError::InvalidStagePlan {
                reason: format!("stage {} at position {} has zero terms", stage.stage_number, i + 1),
            });
        }
        total = total.checked_add(stage.terms).ok_or_else(|| SimError::InvalidStagePlan {
            reason: format!("total term count overflows at stage position {}", i + 1),
        })?;
        if stage.stage_number as usize != i + 1 {
            log::warn!(
                "stage_number {} stored at position {}; terms are assigned by position",
                stage.stage_number,
                i + 1
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<Stage> {
        vec![Stage::new(1, 6), Stage::new(2, 4), Stage::new(3, 2)]
    }

    #[test]
    fn resolves_boundaries() {
        let stages = plan();

        let first = resolve(&stages, 1).unwrap();
        assert_eq!((first.stage_index, first.term_offset), (0, 0));

        let last_of_first = resolve(&stages, 6).unwrap();
        assert_eq!((last_of_first.stage_index, last_of_first.term_offset), (0, 0));

        let first_of_second = resolve(&stages, 7).unwrap();
        assert_eq!((first_of_second.stage_index, first_of_second.term_offset), (1, 6));

        let last = resolve(&stages, 12).unwrap();
        assert_eq!((last.stage_index, last.term_offset), (2, 10));
    }

    #[test]
    fn rejects_terms_outside_plan() {
        let stages = plan();
        assert!(matches!(
            resolve(&stages, 0),
            Err(SimError::OutOfRange { term: 0, total_terms: 12 })
        ));
        assert!(matches!(
            resolve(&stages, 13),
            Err(SimError::OutOfRange { term: 13, total_terms: 12 })
        ));
    }

    #[test]
    fn array_order_wins_over_stage_number() {
        let stages = vec![Stage::new(2, 3), Stage::new(1, 3)];
        let pos = resolve(&stages, 2).unwrap();
        assert_eq!(pos.stage.stage_number, 2);
        assert!(validate_plan(&stages).is_ok());
    }

    #[test]
    fn unlisted_parameter_grows_at_zero() {
        let gdp = ParameterId::from("gdp");
        let stage = Stage::new(1, 1).with_rate(gdp.clone(), 3.5);
        assert_eq!(stage.growth_rate(&gdp), 3.5);
        assert_eq!(stage.growth_rate(&ParameterId::from("unemp")), 0.0);
    }

    #[test]
    fn zero_term_stage_is_invalid() {
        let stages = vec![Stage::new(1, 2), Stage::new(2, 0)];
        assert!(matches!(validate_plan(&stages), Err(SimError::InvalidStagePlan { .. })));
        assert!(matches!(validate_plan(&[]), Err(SimError::InvalidStagePlan { .. })));
    }

    #[test]
    fn overflowing_term_count_is_invalid() {
        let stages = vec![Stage::new(1, Term::MAX), Stage::new(2, 1)];
        assert!(matches!(validate_plan(&stages), Err(SimError::InvalidStagePlan { .. })));
        assert_eq!(total_terms(&stages), Term::MAX);

        let fits = vec![Stage::new(1, Term::MAX - 1), Stage::new(2, 1)];
        assert!(validate_plan(&fits).is_ok());
        assert_eq!(resolve(&fits, Term::MAX).unwrap().stage_index, 1);
    }
}
