//! Countries, cities and the per-city economic baseline (CityProfile).

use crate::{
    parameter::ScoreDirection,
    types::{CityId, CountryId, GrowthRate, ParameterId, Term},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Country {
    pub id:          CountryId,
    pub name:        String,
    pub code:        String,
    pub flag_url:    Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct City {
    pub id:          CityId,
    pub country_id:  CountryId,
    pub name:        String,
    pub description: Option<String>,
    pub population:  Option<i64>,
    pub image_url:   Option<String>,
}

/// One past observation of a parameter, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalObservation {
    pub term:        Term,
    pub value:       f64,
    pub growth_rate: GrowthRate,
    pub date:        String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityParameterBaseline {
    pub parameter_id:        ParameterId,
    pub base_value:          f64,
    pub default_growth_rate: GrowthRate,
    #[serde(default)]
    pub historical_values:   Vec<HistoricalObservation>,
    /// Filled from the parameter row when the profile is read back.
    #[serde(default)]
    pub direction:           ScoreDirection,
}

impl CityParameterBaseline {
    pub fn new(parameter_id: ParameterId, base_value: f64, default_growth_rate: GrowthRate) -> Self {
        Self {
            parameter_id,
            base_value,
            default_growth_rate,
            historical_values: Vec::new(),
            direction: ScoreDirection::default(),
        }
    }

    pub fn with_direction(mut self, direction: ScoreDirection) -> Self {
        self.direction = direction;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityProfile {
    pub city_id:               CityId,
    pub last_updated:          DateTime<Utc>,
    pub parameters:            Vec<CityParameterBaseline>,
    /// Descriptive score recorded with the profile; simulation never touches it.
    pub economic_health_score: f64,
    pub summary:               Option<String>,
}

impl CityProfile {
    pub fn new(city_id: CityId, parameters: Vec<CityParameterBaseline>) -> Self {
        Self {
            city_id,
            last_updated: Utc::now(),
            parameters,
            economic_health_score: 50.0,
            summary: None,
        }
    }

    pub fn baseline(&self, parameter_id: &ParameterId) -> Option<&CityParameterBaseline> {
        self.parameters.iter().find(|p| &p.parameter_id == parameter_id)
    }
}
