//! Full-simulation tests: term numbering, compounding, stage switching,
//! idempotence.

use citysim_core::{
    city::{City, CityParameterBaseline, CityProfile, Country},
    engine::ScenarioEngine,
    parameter::Parameter,
    snapshot::NewSnapshot,
    stage::Stage,
    types::{round2, CityId, CountryId, ParameterId},
};

/// Create a country, a city, the given parameters and a profile with their
/// base values. Returns the city id and parameter ids in input order.
fn seed_city(engine: &ScenarioEngine, params: &[(&str, f64)]) -> (CityId, Vec<ParameterId>) {
    engine
        .with_store(|s| {
            let country = Country {
                id: CountryId::generate(),
                name: "Testland".into(),
                code: "TL".into(),
                flag_url: None,
                description: None,
            };
            s.insert_country(&country)?;
            let city = City {
                id: CityId::generate(),
                country_id: country.id.clone(),
                name: "Test City".into(),
                description: None,
                population: Some(1_000),
                image_url: None,
            };
            s.insert_city(&city)?;

            let mut ids = Vec::new();
            let mut baselines = Vec::new();
            for (code, base) in params {
                let p = Parameter::new(format!("{code} param"), *code, "%", "Test");
                s.insert_parameter(&p)?;
                baselines.push(CityParameterBaseline::new(p.id.clone(), *base, 1.0));
                ids.push(p.id);
            }
            s.insert_city_profile(&CityProfile::new(city.id.clone(), baselines))?;
            Ok((city.id, ids))
        })
        .expect("seed city")
}

#[test]
fn simulate_produces_every_term_in_order() {
    let engine = ScenarioEngine::build_test().unwrap();
    let (city, ids) = seed_city(&engine, &[("GDP", 2.8), ("UNEMP", 5.2)]);

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "three stages".into(),
            city_id: city,
            stages: vec![
                Stage::new(1, 3).with_rate(ids[0].clone(), 2.0),
                Stage::new(2, 4).with_rate(ids[1].clone(), -1.0),
                Stage::new(3, 5),
            ],
        })
        .unwrap();

    let done = engine.simulate(&snapshot.id).unwrap();

    assert_eq!(done.results.len(), 12);
    let terms: Vec<u32> = done.results.iter().map(|r| r.term).collect();
    assert_eq!(terms, (1..=12).collect::<Vec<_>>(), "terms must be dense and ordered");
    assert!(done.is_completed);

    for result in &done.results {
        assert_eq!(result.parameters.len(), 2, "term {} dropped a parameter", result.term);
        assert!(
            (0.0..=100.0).contains(&result.economic_health_score),
            "health out of range at term {}: {}",
            result.term,
            result.economic_health_score
        );
    }
}

#[test]
fn gdp_example_compounds_on_rounded_values() {
    let engine = ScenarioEngine::build_test().unwrap();
    let (city, ids) = seed_city(&engine, &[("GDP", 2.8)]);
    let gdp = ids[0].clone();

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "gdp".into(),
            city_id: city,
            stages: vec![Stage::new(1, 2).with_rate(gdp.clone(), 3.5)],
        })
        .unwrap();
    let done = engine.simulate(&snapshot.id).unwrap();

    assert_eq!(done.results[0].value_of(&gdp), Some(2.90));
    assert_eq!(done.results[1].value_of(&gdp), Some(3.00));
    assert_eq!(done.results[0].parameters[0].growth_rate, 3.5);

    // Single growth-positive parameter: 50 + 50 * relative_change.
    let expected = 50.0 + (2.90 / 2.8 - 1.0) * 50.0;
    assert!((done.results[0].economic_health_score - expected).abs() < 1e-9);
}

#[test]
fn each_term_compounds_from_its_predecessor() {
    let engine = ScenarioEngine::build_test().unwrap();
    let (city, ids) = seed_city(&engine, &[("GDP", 120.5), ("INFL", 2.1), ("HOUSE", 180.5)]);

    let stages = vec![
        Stage::new(1, 6)
            .with_rate(ids[0].clone(), 4.0)
            .with_rate(ids[1].clone(), -1.2),
        Stage::new(2, 6)
            .with_rate(ids[0].clone(), 3.0)
            .with_rate(ids[2].clone(), 2.5),
    ];
    let snapshot = engine
        .create_snapshot(&NewSnapshot { name: "compound".into(), city_id: city, stages: stages.clone() })
        .unwrap();
    let done = engine.simulate(&snapshot.id).unwrap();

    for t in 1..done.results.len() {
        let stage = if t < 6 { &stages[0] } else { &stages[1] };
        for id in &ids {
            let prev = done.results[t - 1].value_of(id).unwrap();
            let rate = stage.growth_rate(id);
            let expected = round2(prev * (1.0 + rate / 100.0));
            assert_eq!(
                done.results[t].value_of(id),
                Some(expected),
                "term {} parameter {id}",
                t + 1
            );
        }
    }
}

#[test]
fn unlisted_parameter_ignores_default_growth_rate() {
    let engine = ScenarioEngine::build_test().unwrap();
    let (city, ids) = seed_city(&engine, &[("GDP", 2.8), ("TAX", 85.3)]);

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "gdp only".into(),
            city_id: city,
            stages: vec![Stage::new(1, 4).with_rate(ids[0].clone(), 1.0)],
        })
        .unwrap();
    let done = engine.simulate(&snapshot.id).unwrap();

    for r in &done.results {
        assert_eq!(r.value_of(&ids[1]), Some(85.3), "TAX must stay flat at term {}", r.term);
    }
}

#[test]
fn simulate_is_idempotent() {
    let engine = ScenarioEngine::build_test().unwrap();
    let (city, ids) = seed_city(&engine, &[("GDP", 2.8), ("UNEMP", 5.2), ("INVEST", 120.5)]);

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "again".into(),
            city_id: city,
            stages: vec![
                Stage::new(1, 6).with_rate(ids[0].clone(), 3.5).with_rate(ids[1].clone(), -1.2),
                Stage::new(2, 6).with_rate(ids[2].clone(), 3.0),
            ],
        })
        .unwrap();

    let first = engine.simulate(&snapshot.id).unwrap();
    let second = engine.simulate(&snapshot.id).unwrap();

    assert_eq!(first.results, second.results);
    assert_eq!(second.revision, first.revision + 1);
}

#[test]
fn simulate_overwrites_partial_results() {
    let engine = ScenarioEngine::build_test().unwrap();
    let (city, ids) = seed_city(&engine, &[("GDP", 10.0)]);

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "partial".into(),
            city_id: city,
            stages: vec![Stage::new(1, 3).with_rate(ids[0].clone(), 10.0)],
        })
        .unwrap();

    // Term 3 from baseline: a stale, out-of-sequence value.
    engine.advance(&snapshot.id, 3).unwrap();
    let done = engine.simulate(&snapshot.id).unwrap();

    let stored = engine.snapshot(&snapshot.id).unwrap();
    assert_eq!(stored.results, done.results);
    let values: Vec<f64> = stored.results.iter().map(|r| r.value_of(&ids[0]).unwrap()).collect();
    assert_eq!(values, vec![11.0, 12.1, 13.31]);
}
