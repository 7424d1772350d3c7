//! Store methods for countries, cities and parameter metadata.

use super::SimStore;
use crate::{
    city::{City, Country},
    error::{SimError, SimResult},
    parameter::{Parameter, ParameterMeta, ScoreDirection},
    types::{CityId, CountryId, ParameterId},
};
use rusqlite::{params, OptionalExtension, Row};

fn country_from_row(row: &Row<'_>) -> rusqlite::Result<Country> {
    Ok(Country {
        id:          CountryId::from(row.get::<_, String>(0)?),
        name:        row.get(1)?,
        code:        row.get(2)?,
        flag_url:    row.get(3)?,
        description: row.get(4)?,
    })
}

fn city_from_row(row: &Row<'_>) -> rusqlite::Result<City> {
    Ok(City {
        id:          CityId::from(row.get::<_, String>(0)?),
        country_id:  CountryId::from(row.get::<_, String>(1)?),
        name:        row.get(2)?,
        description: row.get(3)?,
        population:  row.get(4)?,
        image_url:   row.get(5)?,
    })
}

fn parameter_from_row(row: &Row<'_>) -> rusqlite::Result<Parameter> {
    Ok(Parameter {
        id:          ParameterId::from(row.get::<_, String>(0)?),
        name:        row.get(1)?,
        code:        row.get(2)?,
        unit:        row.get(3)?,
        description: row.get(4)?,
        category:    row.get(5)?,
        direction:   ScoreDirection::parse(&row.get::<_, String>(6)?),
    })
}

const COUNTRY_COLUMNS: &str = "country_id, name, code, flag_url, description";
const CITY_COLUMNS: &str = "city_id, country_id, name, description, population, image_url";
const PARAMETER_COLUMNS: &str = "parameter_id, name, code, unit, description, category, direction";

impl SimStore {
    // ── Country ────────────────────────────────────────────────

    pub fn insert_country(&self, c: &Country) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO country (country_id, name, code, flag_url, description)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![c.id.as_str(), c.name, c.code, c.flag_url, c.description],
        )?;
        Ok(())
    }

    pub fn get_country(&self, id: &CountryId) -> SimResult<Country> {
        self.conn
            .query_row(
                &format!("SELECT {COUNTRY_COLUMNS} FROM country WHERE country_id = ?1"),
                params![id.as_str()],
                country_from_row,
            )
            .optional()?
            .ok_or_else(|| SimError::not_found("country", id))
    }

    pub fn list_countries(&self) -> SimResult<Vec<Country>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COUNTRY_COLUMNS} FROM country ORDER BY rowid"))?;
        let rows = stmt
            .query_map([], country_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── City ───────────────────────────────────────────────────

    pub fn insert_city(&self, c: &City) -> SimResult<()> {
        // Surface a missing country as NotFound rather than a constraint error.
        self.get_country(&c.country_id)?;
        self.conn.execute(
            "INSERT INTO city (city_id, country_id, name, description, population, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                c.id.as_str(),
                c.country_id.as_str(),
                c.name,
                c.description,
                c.population,
                c.image_url,
            ],
        )?;
        Ok(())
    }

    pub fn get_city(&self, id: &CityId) -> SimResult<City> {
        self.conn
            .query_row(
                &format!("SELECT {CITY_COLUMNS} FROM city WHERE city_id = ?1"),
                params![id.as_str()],
                city_from_row,
            )
            .optional()?
            .ok_or_else(|| SimError::not_found("city", id))
    }

    pub fn list_cities(&self, country_id: Option<&CountryId>) -> SimResult<Vec<City>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CITY_COLUMNS} FROM city
             WHERE ?1 IS NULL OR country_id = ?1
             ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params![country_id.map(|c| c.as_str())], city_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Parameter ──────────────────────────────────────────────

    pub fn insert_parameter(&self, p: &Parameter) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO parameter (parameter_id, name, code, unit, description, category, direction)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                p.id.as_str(),
                p.name,
                p.code,
                p.unit,
                p.description,
                p.category,
                p.direction.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_parameter(&self, id: &ParameterId) -> SimResult<Parameter> {
        self.conn
            .query_row(
                &format!("SELECT {PARAMETER_COLUMNS} FROM parameter WHERE parameter_id = ?1"),
                params![id.as_str()],
                parameter_from_row,
            )
            .optional()?
            .ok_or_else(|| SimError::not_found("parameter", id))
    }

    pub fn list_parameters(&self, category: Option<&str>) -> SimResult<Vec<Parameter>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PARAMETER_COLUMNS} FROM parameter
             WHERE ?1 IS NULL OR category = ?1
             ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map(params![category], parameter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn lookup_parameter_meta(&self, id: &ParameterId) -> SimResult<ParameterMeta> {
        self.get_parameter(id).map(|p| p.meta())
    }
}
