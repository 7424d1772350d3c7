//! scenario-runner: headless driver for city policy snapshots.
//!
//! Usage:
//!   scenario-runner --import-sample --simulate
//!   scenario-runner --db city.db --snapshot "NYC Growth Plan 2024" --advance 3
//!   scenario-runner --db city.db --ipc-mode

use anyhow::Result;
use citysim_core::{
    config::EngineConfig,
    engine::ScenarioEngine,
    error::{SimError, SimResult},
    fixtures::{import_sample_data, SampleDataset},
    snapshot::Snapshot,
    store::SimStore,
    types::{SnapshotId, Term},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Simulate { snapshot_id: String },
    Advance { snapshot_id: String, term: Term },
    GetSnapshot { snapshot_id: String },
    ListSnapshots,
    Quit,
}

#[derive(serde::Serialize)]
struct SnapshotListing {
    id:          SnapshotId,
    name:        String,
    total_terms: Term,
    results:     usize,
    status:      citysim_core::snapshot::SnapshotStatus,
}

impl From<&Snapshot> for SnapshotListing {
    fn from(s: &Snapshot) -> Self {
        Self {
            id:          s.id.clone(),
            name:        s.name.clone(),
            total_terms: s.total_terms(),
            results:     s.results.len(),
            status:      s.status(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let simulate = args.iter().any(|a| a == "--simulate");
    let import = args.iter().any(|a| a == "--import-sample");
    let advance: Option<Term> = args
        .windows(2)
        .find(|w| w[0] == "--advance")
        .and_then(|w| w[1].parse().ok());
    let db = arg_str(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_str(&args, "--data-dir").unwrap_or("./data");
    let snapshot_arg = arg_str(&args, "--snapshot");

    let config = EngineConfig::load(data_dir)?;
    let seed = parse_arg(&args, "--seed", config.fixture_seed);

    if !ipc_mode {
        println!("City Economy Simulator: scenario-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  seed:      {seed}");
        println!();
    }

    // A private in-memory database per process run.
    let db_effective: String = if db == ":memory:" {
        format!("file:citysim_{}?mode=memory&cache=shared", chrono::Utc::now().timestamp())
    } else {
        db.to_string()
    };
    let store = SimStore::open(&db_effective)?;
    store.migrate()?;

    let history_terms = config.history_terms;
    let engine = ScenarioEngine::build(store, config);

    // An empty database has nothing to simulate; seed it.
    let empty = engine.with_store(|s| Ok(s.list_countries()?.is_empty()))?;
    if import || empty {
        let dataset = SampleDataset::load(data_dir).or_else(|e| {
            log::warn!("{e}; falling back to the bundled sample data");
            SampleDataset::builtin()
        })?;
        let summary = engine.with_store(|s| import_sample_data(s, &dataset, seed, history_terms))?;
        if !ipc_mode {
            println!(
                "Imported {} countries, {} cities, {} parameters, {} profiles, {} snapshots",
                summary.countries, summary.cities, summary.parameters, summary.city_profiles, summary.snapshots
            );
            println!();
        }
    }

    if ipc_mode {
        return run_ipc_loop(&engine);
    }

    let snapshot = select_snapshot(&engine, snapshot_arg)?;
    let snapshot = match (simulate, advance) {
        (_, Some(term)) => with_retry(|| engine.advance(&snapshot.id, term))?,
        (true, None) => with_retry(|| engine.simulate(&snapshot.id))?,
        (false, None) => snapshot,
    };
    print_snapshot(&snapshot);
    Ok(())
}

/// Retry once when another writer committed first; the second attempt
/// reads the fresh revision.
fn with_retry<T>(mut call: impl FnMut() -> SimResult<T>) -> SimResult<T> {
    match call() {
        Err(e) if e.is_retryable() => {
            log::warn!("{e}; retrying once");
            call()
        }
        other => other,
    }
}

/// Pick a snapshot by id or name; the first stored one when none is given.
fn select_snapshot(engine: &ScenarioEngine, wanted: Option<&str>) -> Result<Snapshot> {
    let snapshots = engine.with_store(|s| s.list_snapshots(None))?;
    let found = match wanted {
        Some(w) => snapshots.into_iter().find(|s| s.id.as_str() == w || s.name == w),
        None => snapshots.into_iter().next(),
    };
    found.ok_or_else(|| anyhow::anyhow!("no snapshot matching {}", wanted.unwrap_or("(any)")))
}

fn run_ipc_loop(engine: &ScenarioEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Simulate { snapshot_id } => {
                let id = SnapshotId::from(snapshot_id);
                with_retry(|| engine.simulate(&id)).and_then(to_json)
            }
            IpcCommand::Advance { snapshot_id, term } => {
                let id = SnapshotId::from(snapshot_id);
                with_retry(|| engine.advance(&id, term)).and_then(to_json)
            }
            IpcCommand::GetSnapshot { snapshot_id } => {
                engine.snapshot(&SnapshotId::from(snapshot_id)).and_then(to_json)
            }
            IpcCommand::ListSnapshots => engine
                .with_store(|s| s.list_snapshots(None))
                .map(|all| all.iter().map(SnapshotListing::from).collect::<Vec<_>>())
                .and_then(to_json),
        };

        match reply {
            Ok(value) => writeln!(stdout, "{}", value)?,
            Err(e) => writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?,
        }
        stdout.flush()?;
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: T) -> SimResult<serde_json::Value> {
    serde_json::to_value(value).map_err(SimError::from)
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("=== SNAPSHOT ===");
    println!("  id:          {}", snapshot.id);
    println!("  name:        {}", snapshot.name);
    println!("  stages:      {}", snapshot.stages.len());
    println!("  total terms: {}", snapshot.total_terms());
    println!("  status:      {:?}", snapshot.status());
    println!("  revision:    {}", snapshot.revision);

    println!();
    println!("=== TRAJECTORY ===");
    if snapshot.results.is_empty() {
        println!("  (No terms computed yet)");
    } else {
        for r in &snapshot.results {
            let values: Vec<String> = r.parameters.iter().map(|p| format!("{:.2}", p.value)).collect();
            println!("  term {:>3} | health {:>6.2} | {}", r.term, r.economic_health_score, values.join(" "));
        }
    }

    if let Some(analysis) = &snapshot.ai_analysis {
        println!();
        println!("=== ANALYSIS ===");
        println!("  {}", analysis.summary);
        for impact in &analysis.impacts {
            println!("  - {}", impact.impact);
        }
        println!("  {}", analysis.recommendations.replace('\n', "\n  "));
        println!("  {}", analysis.comparison_to_default);
    }
}

fn arg_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
