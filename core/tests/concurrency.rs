//! Concurrent calls through one engine: same-snapshot calls serialize and
//! never lose a write; different snapshots proceed independently.

use citysim_core::{
    city::{City, CityParameterBaseline, CityProfile, Country},
    engine::ScenarioEngine,
    error::SimError,
    parameter::Parameter,
    snapshot::NewSnapshot,
    stage::Stage,
    types::{round2, CityId, CountryId, ParameterId, SnapshotId},
};
use std::{sync::Arc, thread};

fn seed_city(engine: &ScenarioEngine) -> (CityId, ParameterId) {
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
                country_id: country.id,
                name: "Test City".into(),
                description: None,
                population: None,
                image_url: None,
            };
            s.insert_city(&city)?;
            let gdp = Parameter::new("GDP Growth Rate", "GDP", "%", "Growth");
            s.insert_parameter(&gdp)?;
            s.insert_city_profile(&CityProfile::new(
                city.id.clone(),
                vec![CityParameterBaseline::new(gdp.id.clone(), 100.0, 0.0)],
            ))?;
            Ok((city.id, gdp.id))
        })
        .expect("seed city")
}

#[test]
fn parallel_advances_on_one_snapshot_lose_no_writes() {
    let engine = Arc::new(ScenarioEngine::build_test().unwrap());
    let (city, gdp) = seed_city(&engine);
    let terms = 8u32;

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "parallel".into(),
            city_id: city,
            stages: vec![Stage::new(1, terms).with_rate(gdp.clone(), 1.0)],
        })
        .unwrap();

    let handles: Vec<_> = (1..=terms)
        .map(|term| {
            let engine = Arc::clone(&engine);
            let id = snapshot.id.clone();
            thread::spawn(move || engine.advance(&id, term))
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked").expect("advance failed");
    }

    let stored = engine.snapshot(&snapshot.id).unwrap();
    let stored_terms: Vec<u32> = stored.results.iter().map(|r| r.term).collect();
    assert_eq!(stored_terms, (1..=terms).collect::<Vec<_>>(), "every advance must survive");
    assert_eq!(stored.revision, u64::from(terms), "one revision per write");

    let advanced = engine
        .events(&snapshot.id)
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == "term_advanced")
        .count();
    assert_eq!(advanced, terms as usize);
}

#[test]
fn simulate_and_advance_interleave_cleanly() {
    let engine = Arc::new(ScenarioEngine::build_test().unwrap());
    let (city, gdp) = seed_city(&engine);

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "mixed".into(),
            city_id: city,
            stages: vec![Stage::new(1, 4).with_rate(gdp.clone(), 2.0)],
        })
        .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let id = snapshot.id.clone();
            thread::spawn(move || {
                if i % 2 == 0 {
                    engine.simulate(&id).map(|_| ())
                } else {
                    engine.advance(&id, 2).map(|_| ())
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked").expect("call failed");
    }

    let stored = engine.snapshot(&snapshot.id).unwrap();
    assert_eq!(stored.revision, 6);
    // The last writer either recomputed everything or advanced from a stored term 1.
    assert_eq!(stored.result_for(2).unwrap().value_of(&gdp), Some(104.04));
}

#[test]
fn different_snapshots_progress_independently() {
    let engine = Arc::new(ScenarioEngine::build_test().unwrap());
    let (city, gdp) = seed_city(&engine);

    let ids: Vec<_> = (0..4)
        .map(|i| {
            engine
                .create_snapshot(&NewSnapshot {
                    name: format!("independent {i}"),
                    city_id: city.clone(),
                    stages: vec![Stage::new(1, 3).with_rate(gdp.clone(), f64::from(i))],
                })
                .unwrap()
                .id
        })
        .collect();

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.simulate(&id))
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked").expect("simulate failed");
    }

    for (i, id) in ids.iter().enumerate() {
        let stored = engine.snapshot(id).unwrap();
        assert!(stored.is_completed);
        assert_eq!(stored.revision, 1);
        let expected = (0..3).fold(100.0, |v, _| round2(v * (1.0 + i as f64 / 100.0)));
        assert_eq!(stored.result_for(3).unwrap().value_of(&gdp), Some(expected));
    }
}

#[test]
fn lock_entries_do_not_outlive_their_calls() {
    let engine = Arc::new(ScenarioEngine::build_test().unwrap());
    let (city, gdp) = seed_city(&engine);

    for i in 0..200 {
        let err = engine.advance(&SnapshotId::from(format!("missing-{i}")), 1).unwrap_err();
        assert!(matches!(err, SimError::NotFound { .. }), "unexpected error: {err}");
    }
    assert_eq!(engine.busy_snapshots(), 0, "unknown ids must not leave lock entries behind");

    let snapshot = engine
        .create_snapshot(&NewSnapshot {
            name: "leases".into(),
            city_id: city,
            stages: vec![Stage::new(1, 4).with_rate(gdp, 1.0)],
        })
        .unwrap();
    let handles: Vec<_> = (1..=4)
        .map(|term| {
            let engine = Arc::clone(&engine);
            let id = snapshot.id.clone();
            thread::spawn(move || engine.advance(&id, term))
        })
        .collect();
    for h in handles {
        h.join().expect("worker panicked").expect("advance failed");
    }
    engine.simulate(&snapshot.id).unwrap();

    assert_eq!(engine.busy_snapshots(), 0);
}
