//! Store methods for city profiles and their parameter baselines.

use super::{parse_json, parse_timestamp, SimStore};
use crate::{
    city::{CityParameterBaseline, CityProfile},
    error::{SimError, SimResult},
    parameter::ScoreDirection,
    types::{CityId, ParameterId},
};
use rusqlite::{params, OptionalExtension};

impl SimStore {
    /// Insert (or replace) a city's profile and all of its baselines.
    pub fn insert_city_profile(&self, profile: &CityProfile) -> SimResult<()> {
        self.get_city(&profile.city_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO city_profile (city_id, last_updated, economic_health_score, summary)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                profile.city_id.as_str(),
                profile.last_updated.to_rfc3339(),
                profile.economic_health_score,
                profile.summary,
            ],
        )?;
        tx.execute(
            "DELETE FROM city_parameter WHERE city_id = ?1",
            params![profile.city_id.as_str()],
        )?;
        for (position, p) in profile.parameters.iter().enumerate() {
            tx.execute(
                "INSERT INTO city_parameter (
                    city_id, position, parameter_id, base_value, default_growth_rate, historical_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    profile.city_id.as_str(),
                    position as i64,
                    p.parameter_id.as_str(),
                    p.base_value,
                    p.default_growth_rate,
                    serde_json::to_string(&p.historical_values)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Load a city's profile. Each baseline's score direction is taken from
    /// its parameter row; baselines with no parameter row keep the default.
    pub fn get_city_profile(&self, city_id: &CityId) -> SimResult<CityProfile> {
        let header = self
            .conn
            .query_row(
                "SELECT last_updated, economic_health_score, summary
                 FROM city_profile WHERE city_id = ?1",
                params![city_id.as_str()],
                |row| {
                    Ok((
                        parse_timestamp(0, row.get(0)?)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| SimError::not_found("city profile", city_id))?;

        let mut stmt = self.conn.prepare(
            "SELECT cp.parameter_id, cp.base_value, cp.default_growth_rate,
                    cp.historical_json, p.direction
             FROM city_parameter cp
             LEFT JOIN parameter p ON p.parameter_id = cp.parameter_id
             WHERE cp.city_id = ?1
             ORDER BY cp.position ASC",
        )?;
        let parameters = stmt
            .query_map(params![city_id.as_str()], |row| {
                let historical: String = row.get(3)?;
                Ok(CityParameterBaseline {
                    parameter_id:        ParameterId::from(row.get::<_, String>(0)?),
                    base_value:          row.get(1)?,
                    default_growth_rate: row.get(2)?,
                    historical_values:   parse_json(3, &historical)?,
                    direction:           row
                        .get::<_, Option<String>>(4)?
                        .map(|d| ScoreDirection::parse(&d))
                        .unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let (last_updated, economic_health_score, summary) = header;
        Ok(CityProfile {
            city_id: city_id.clone(),
            last_updated,
            parameters,
            economic_health_score,
            summary,
        })
    }
}
