//! Sample data import — countries, cities, parameters, city profiles and
//! a starter snapshot, loaded from `data/sample_data.json`.
//!
//! Fixtures refer to each other by natural keys (country code, city name,
//! parameter code); ids are minted at import time. Historical observations
//! and baseline health scores are drawn from seeded fixture streams, so an
//! import with the same seed is reproducible.

use crate::{
    city::{City, CityParameterBaseline, CityProfile, Country, HistoricalObservation},
    error::{SimError, SimResult},
    parameter::Parameter,
    rng::{FixtureRng, FixtureStream},
    snapshot::NewSnapshot,
    stage::Stage,
    store::SimStore,
    types::{round2, CityId, CountryId, GrowthRate, ParameterId, Term},
};
use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryFixture {
    pub name:        String,
    pub code:        String,
    pub flag_url:    Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityFixture {
    pub name:         String,
    pub country_code: String,
    pub description:  Option<String>,
    pub population:   Option<i64>,
    pub image_url:    Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterFixture {
    pub name:                String,
    pub code:                String,
    pub unit:                String,
    pub category:            String,
    pub default_growth_rate: GrowthRate,
    #[serde(default)]
    pub description:         Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileFixture {
    pub city:        String,
    pub summary:     Option<String>,
    /// Base value per parameter code. Codes absent here get no baseline.
    pub base_values: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRateFixture {
    pub code:        String,
    pub growth_rate: GrowthRate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFixture {
    pub stage_number: u32,
    pub terms:        Term,
    pub rates:        Vec<StageRateFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFixture {
    pub name:   String,
    pub city:   String,
    pub stages: Vec<StageFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDataset {
    pub countries:  Vec<CountryFixture>,
    pub cities:     Vec<CityFixture>,
    pub parameters: Vec<ParameterFixture>,
    pub profiles:   Vec<ProfileFixture>,
    #[serde(default)]
    pub snapshots:  Vec<SnapshotFixture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub countries:     usize,
    pub cities:        usize,
    pub parameters:    usize,
    pub city_profiles: usize,
    pub snapshots:     usize,
}

impl SampleDataset {
    /// Load from the data/ directory.
    /// In tests, use SampleDataset::builtin().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/sample_data.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let dataset: SampleDataset = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(dataset)
    }

    /// The sample dataset shipped with the repository, compiled in.
    pub fn builtin() -> anyhow::Result<Self> {
        Ok(serde_json::from_str(include_str!("../../data/sample_data.json"))?)
    }
}

/// Walk backwards from `base_value`, newest observation first, then return
/// the history oldest-first with terms 1..=n. The newest observation is the
/// base value itself.
fn generate_history(base_value: f64, terms: u32, rng: &mut FixtureRng) -> Vec<HistoricalObservation> {
    let newest = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap_or_default();
    let mut history = Vec::with_capacity(terms as usize);
    let mut current = base_value;

    for back in 0..terms {
        let growth_rate = rng.uniform(-2.0, 5.0);
        if back > 0 {
            current /= 1.0 + growth_rate / 100.0;
        }
        let date = newest
            .checked_sub_months(Months::new(back))
            .unwrap_or(newest)
            .format("%Y-%m-%d")
            .to_string();
        history.push(HistoricalObservation {
            term: terms - back,
            value: round2(current),
            growth_rate: round2(growth_rate),
            date,
        });
    }
    history.reverse();
    history
}

/// Clear the store and import `dataset`. Every table is emptied first,
/// snapshots included.
pub fn import_sample_data(
    store: &SimStore,
    dataset: &SampleDataset,
    seed: u64,
    history_terms: u32,
) -> SimResult<ImportSummary> {
    store.clear_all()?;

    let mut history_rng = FixtureStream::History.rng(seed);
    let mut health_rng = FixtureStream::ProfileHealth.rng(seed);
    let mut summary = ImportSummary::default();

    let mut country_ids: HashMap<&str, CountryId> = HashMap::new();
    for c in &dataset.countries {
        let country = Country {
            id:          CountryId::generate(),
            name:        c.name.clone(),
            code:        c.code.clone(),
            flag_url:    c.flag_url.clone(),
            description: c.description.clone(),
        };
        store.insert_country(&country)?;
        country_ids.insert(c.code.as_str(), country.id);
        summary.countries += 1;
    }

    let mut city_ids: HashMap<&str, CityId> = HashMap::new();
    for c in &dataset.cities {
        let country_id = country_ids
            .get(c.country_code.as_str())
            .cloned()
            .ok_or_else(|| SimError::not_found("country code", &c.country_code))?;
        let city = City {
            id:          CityId::generate(),
            country_id,
            name:        c.name.clone(),
            description: c.description.clone(),
            population:  c.population,
            image_url:   c.image_url.clone(),
        };
        store.insert_city(&city)?;
        city_ids.insert(c.name.as_str(), city.id);
        summary.cities += 1;
    }

    let mut parameters: Vec<(&ParameterFixture, Parameter)> = Vec::new();
    for p in &dataset.parameters {
        let mut parameter = Parameter::new(&p.name, &p.code, &p.unit, &p.category);
        parameter.description = p.description.clone();
        store.insert_parameter(&parameter)?;
        parameters.push((p, parameter));
        summary.parameters += 1;
    }
    let parameter_ids: HashMap<&str, ParameterId> = parameters
        .iter()
        .map(|(f, p)| (f.code.as_str(), p.id.clone()))
        .collect();

    for pf in &dataset.profiles {
        let city_id = city_ids
            .get(pf.city.as_str())
            .cloned()
            .ok_or_else(|| SimError::not_found("city", &pf.city))?;

        let baselines = parameters
            .iter()
            .filter_map(|(fixture, parameter)| {
                let base_value = *pf.base_values.get(&fixture.code)?;
                let mut baseline = CityParameterBaseline::new(
                    parameter.id.clone(),
                    base_value,
                    fixture.default_growth_rate,
                )
                .with_direction(parameter.direction);
                baseline.historical_values = generate_history(base_value, history_terms, &mut history_rng);
                Some(baseline)
            })
            .collect();

        let profile = CityProfile {
            city_id,
            last_updated: Utc::now(),
            parameters: baselines,
            economic_health_score: round2(50.0 + health_rng.uniform(-10.0, 10.0)),
            summary: pf.summary.clone(),
        };
        store.insert_city_profile(&profile)?;
        summary.city_profiles += 1;
    }

    for sf in &dataset.snapshots {
        let city_id = city_ids
            .get(sf.city.as_str())
            .cloned()
            .ok_or_else(|| SimError::not_found("city", &sf.city))?;
        let stages = sf
            .stages
            .iter()
            .map(|st| {
                st.rates.iter().try_fold(Stage::new(st.stage_number, st.terms), |stage, r| {
                    let id = parameter_ids
                        .get(r.code.as_str())
                        .cloned()
                        .ok_or_else(|| SimError::not_found("parameter code", &r.code))?;
                    Ok::<_, SimError>(stage.with_rate(id, r.growth_rate))
                })
            })
            .collect::<SimResult<Vec<_>>>()?;

        let snapshot = store.insert_snapshot(&NewSnapshot {
            name: sf.name.clone(),
            city_id,
            stages,
        })?;
        store.append_event(&crate::event::SimEvent::SnapshotCreated {
            total_terms: snapshot.total_terms(),
            snapshot_id: snapshot.id,
        })?;
        summary.snapshots += 1;
    }

    log::info!(
        "imported sample data: {} countries, {} cities, {} parameters, {} profiles, {} snapshots",
        summary.countries,
        summary.cities,
        summary.parameters,
        summary.city_profiles,
        summary.snapshots
    );
    Ok(summary)
}
