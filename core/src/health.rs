//! Economic health scoring — maps a term's readings to a score in [0, 100].
//!
//! Each parameter contributes `sign * |relative_change| * 50` against its
//! city baseline, where the sign comes from the parameter's score
//! direction. Every contributing parameter carries the same weight.
//! Parameters without a baseline, or with a zero baseline, are skipped.

use crate::{city::CityProfile, snapshot::ParameterReading};

pub const NEUTRAL_SCORE: f64 = 50.0;
const CHANGE_SCALE: f64 = 50.0;

pub fn score(readings: &[ParameterReading], profile: &CityProfile) -> f64 {
    let mut weighted_sum = 0.0f64;
    let mut total_weight = 0.0f64;

    for reading in readings {
        let Some(baseline) = profile.baseline(&reading.parameter_id) else {
            continue;
        };
        if baseline.base_value == 0.0 {
            continue;
        }

        let relative_change = reading.value / baseline.base_value - 1.0;
        let weight = 1.0;
        total_weight += weight;
        weighted_sum += baseline.direction.sign(relative_change) * weight * relative_change.abs() * CHANGE_SCALE;
    }

    if total_weight == 0.0 {
        return NEUTRAL_SCORE;
    }

    (NEUTRAL_SCORE + weighted_sum / total_weight).clamp(0.0, 100.0)
}
