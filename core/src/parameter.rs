//! Economic parameter metadata.
//!
//! A parameter's score direction is resolved once from its code when the
//! parameter is created. Nothing downstream inspects identifier strings.

use crate::types::ParameterId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    /// Output/investment-like: a rise improves economic health.
    #[default]
    HigherIsBetter,
    /// Unemployment/inflation-like: a fall improves economic health.
    LowerIsBetter,
}

impl ScoreDirection {
    pub fn for_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "GDP" | "INVEST" => Self::HigherIsBetter,
            "UNEMP" | "INFL" => Self::LowerIsBetter,
            _ => Self::HigherIsBetter,
        }
    }

    /// +1 when the move improves health, -1 otherwise.
    pub fn sign(&self, relative_change: f64) -> f64 {
        let rose = relative_change > 0.0;
        match (self, rose) {
            (Self::HigherIsBetter, true) | (Self::LowerIsBetter, false) => 1.0,
            _ => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HigherIsBetter => "higher_is_better",
            Self::LowerIsBetter  => "lower_is_better",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "lower_is_better" => Self::LowerIsBetter,
            _ => Self::HigherIsBetter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub id:          ParameterId,
    pub name:        String,
    pub code:        String,
    pub unit:        String,
    pub description: Option<String>,
    pub category:    String,
    pub direction:   ScoreDirection,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        unit: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            id: ParameterId::generate(),
            name: name.into(),
            direction: ScoreDirection::for_code(&code),
            code,
            unit: unit.into(),
            description: None,
            category: category.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn meta(&self) -> ParameterMeta {
        ParameterMeta {
            name:     self.name.clone(),
            unit:     self.unit.clone(),
            category: self.category.clone(),
        }
    }
}

/// The slice of a parameter the narrative analyzer needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterMeta {
    pub name:     String,
    pub unit:     String,
    pub category: String,
}
