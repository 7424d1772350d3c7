//! The scenario engine — entry points for simulating and advancing snapshots.
//!
//! EVERY CALL (fixed order, never reordered):
//!   1. Take the snapshot's lock.
//!   2. Read the snapshot and its city profile.
//!   3. Compute (trajectory + health scoring). Pure; nothing is written yet.
//!   4. Write results with a revision compare-and-swap, then log the event.
//!   5. Release the snapshot's lock.
//!   6. If the snapshot is now complete, run the narrative analysis and
//!      attach it to the revision written in step 4. Failures here are
//!      contained and never touch results; if a newer write landed in the
//!      meantime the analysis is dropped.
//!
//! RULES:
//!   - Calls on the same snapshot are serialized through steps 1-5 only;
//!     analysis never holds the snapshot lock.
//!   - Calls on different snapshots only share the store connection, one
//!     statement batch at a time.
//!   - Out-of-range requests fail before anything is written.
//!   - advance() never invalidates later terms; re-advancing an early term
//!     leaves successors stale and recomputes `is_completed` from the term.

use crate::{
    analysis::{self, AnalysisRequest, NarrativeAnalysis, NarrativeAnalyzer, TemplateAnalyzer},
    city::CityProfile,
    config::EngineConfig,
    error::SimResult,
    event::{EventLogEntry, SimEvent},
    snapshot::{NewSnapshot, Snapshot},
    store::SimStore,
    trajectory,
    types::{SnapshotId, Term},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One mutex per snapshot id. Entries live only while a call holds or
/// waits on them, so the map stays as small as the set of busy snapshots.
#[derive(Default)]
pub struct SnapshotLocks {
    locks: Mutex<HashMap<SnapshotId, Arc<Mutex<()>>>>,
}

/// A claim on one snapshot's mutex. Dropping it evicts the entry when no
/// other call holds a claim.
struct LockLease<'a> {
    locks: &'a SnapshotLocks,
    id:    SnapshotId,
    entry: Option<Arc<Mutex<()>>>,
}

impl LockLease<'_> {
    /// The entry is only taken out in Drop, so this is always Some.
    fn hold(&self) -> Option<MutexGuard<'_, ()>> {
        self.entry.as_deref().map(lock)
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut map = lock(&self.locks.locks);
        // Clones are only made under the map lock, so the count is stable here.
        drop(self.entry.take());
        if map.get(&self.id).is_some_and(|e| Arc::strong_count(e) == 1) {
            map.remove(&self.id);
        }
    }
}

impl SnapshotLocks {
    fn lease(&self, id: &SnapshotId) -> LockLease<'_> {
        let entry = lock(&self.locks)
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        LockLease { locks: self, id: id.clone(), entry: Some(entry) }
    }

    /// Run `f` with the snapshot's mutex held.
    pub fn with_lock<T>(&self, id: &SnapshotId, f: impl FnOnce() -> T) -> T {
        let lease = self.lease(id);
        let _held = lease.hold();
        f()
    }

    /// Number of snapshots with a live entry.
    pub fn len(&self) -> usize {
        lock(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ScenarioEngine {
    store:    Mutex<SimStore>,
    analyzer: Arc<dyn NarrativeAnalyzer>,
    config:   EngineConfig,
    locks:    SnapshotLocks,
}

impl ScenarioEngine {
    pub fn new(store: SimStore, analyzer: Arc<dyn NarrativeAnalyzer>, config: EngineConfig) -> Self {
        Self {
            store: Mutex::new(store),
            analyzer,
            config,
            locks: SnapshotLocks::default(),
        }
    }

    /// Engine wired with the built-in template analyzer.
    pub fn build(store: SimStore, config: EngineConfig) -> Self {
        Self::new(store, Arc::new(TemplateAnalyzer), config)
    }

    /// In-memory, migrated engine with test settings.
    pub fn build_test() -> SimResult<Self> {
        let store = SimStore::in_memory()?;
        store.migrate()?;
        Ok(Self::build(store, EngineConfig::default_test()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` with the store connection held. The connection is released
    /// when `f` returns, on success and error alike.
    pub fn with_store<T>(&self, f: impl FnOnce(&SimStore) -> SimResult<T>) -> SimResult<T> {
        let store = lock(&self.store);
        f(&store)
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn snapshot(&self, id: &SnapshotId) -> SimResult<Snapshot> {
        self.with_store(|s| s.get_snapshot(id))
    }

    pub fn events(&self, id: &SnapshotId) -> SimResult<Vec<EventLogEntry>> {
        self.with_store(|s| s.events_for_snapshot(id))
    }

    // ── Commands ───────────────────────────────────────────────

    pub fn create_snapshot(&self, new: &NewSnapshot) -> SimResult<Snapshot> {
        self.with_store(|s| {
            let snapshot = s.insert_snapshot(new)?;
            s.append_event(&SimEvent::SnapshotCreated {
                snapshot_id: snapshot.id.clone(),
                total_terms: snapshot.total_terms(),
            })?;
            Ok(snapshot)
        })
    }

    /// Recompute every term from the baselines, overwrite all results and
    /// mark the snapshot complete.
    pub fn simulate(&self, id: &SnapshotId) -> SimResult<Snapshot> {
        let (mut snapshot, profile) = self.locks.with_lock(id, || -> SimResult<(Snapshot, CityProfile)> {
            let (mut snapshot, profile) = self.load(id)?;
            let results = trajectory::simulate(&snapshot.stages, &profile);
            let final_health = results.last().map(|r| r.economic_health_score).unwrap_or(50.0);
            let terms = results.len() as Term;

            snapshot.revision = self.with_store(|s| {
                let revision = s.put_snapshot_results(id, &results, true, snapshot.revision)?;
                s.append_event(&SimEvent::SnapshotSimulated {
                    snapshot_id: id.clone(),
                    terms,
                    final_health,
                })?;
                Ok(revision)
            })?;
            snapshot.results = results;
            snapshot.is_completed = true;

            log::info!("snapshot {id}: simulated {terms} terms, final health {final_health:.2}");
            Ok((snapshot, profile))
        })?;

        self.attach_analysis(&mut snapshot, &profile);
        Ok(snapshot)
    }

    /// Compute a single term from its predecessor (or the baselines) and
    /// write it into that term's slot.
    pub fn advance(&self, id: &SnapshotId, term: Term) -> SimResult<Snapshot> {
        let (mut snapshot, profile) = self.locks.with_lock(id, || -> SimResult<(Snapshot, CityProfile)> {
            let (mut snapshot, profile) = self.load(id)?;
            let result = trajectory::advance_term(&snapshot, &profile, term)?;
            let health = result.economic_health_score;
            let was_completed = snapshot.is_completed;

            snapshot.put_result(result);
            snapshot.is_completed = term == snapshot.total_terms();

            snapshot.revision = self.with_store(|s| {
                let revision =
                    s.put_snapshot_results(id, &snapshot.results, snapshot.is_completed, snapshot.revision)?;
                s.append_event(&SimEvent::TermAdvanced {
                    snapshot_id:  id.clone(),
                    term,
                    health,
                    is_completed: snapshot.is_completed,
                })?;
                Ok(revision)
            })?;

            log::debug!(
                "snapshot {id}: advanced term {term}/{} health={health:.2} completed={}",
                snapshot.total_terms(),
                snapshot.is_completed
            );
            if was_completed && !snapshot.is_completed {
                log::debug!("snapshot {id}: term {term} re-advanced, no longer complete");
            }
            if snapshot.is_completed {
                log::info!("snapshot {id}: completed at term {term}, health {health:.2}");
            }
            Ok((snapshot, profile))
        })?;

        if snapshot.is_completed {
            // Re-advancing the last term of a finished run re-attaches.
            self.attach_analysis(&mut snapshot, &profile);
        }
        Ok(snapshot)
    }

    /// Snapshots that currently have a call in flight.
    pub fn busy_snapshots(&self) -> usize {
        self.locks.len()
    }

    // ── Internals ──────────────────────────────────────────────

    fn load(&self, id: &SnapshotId) -> SimResult<(Snapshot, CityProfile)> {
        self.with_store(|s| {
            let snapshot = s.get_snapshot(id)?;
            let profile = s.get_city_profile(&snapshot.city_id)?;
            Ok((snapshot, profile))
        })
    }

    /// Best-effort: results are already committed and the snapshot lock is
    /// released when this runs, so every failure is logged and swallowed.
    fn attach_analysis(&self, snapshot: &mut Snapshot, profile: &CityProfile) {
        if !self.config.analysis_enabled {
            return;
        }

        let request = self.with_store(|s| {
            Ok(AnalysisRequest::build(&*snapshot, profile, |pid| s.lookup_parameter_meta(pid).ok()))
        });
        let (analysis, placeholder) = match request {
            Ok(Some(request)) => {
                let analysis = analysis::run_contained(
                    Arc::clone(&self.analyzer),
                    request,
                    self.config.analysis_timeout(),
                );
                let placeholder = analysis == NarrativeAnalysis::unavailable();
                (analysis, placeholder)
            }
            Ok(None) => (NarrativeAnalysis::insufficient_data(), true),
            Err(e) => {
                log::warn!("snapshot {}: could not prepare analysis: {e}", snapshot.id);
                (NarrativeAnalysis::unavailable(), true)
            }
        };

        let attached = self.with_store(|s| {
            if !s.attach_analysis(&snapshot.id, &analysis, snapshot.revision)? {
                return Ok(false);
            }
            s.append_event(&SimEvent::AnalysisAttached {
                snapshot_id: snapshot.id.clone(),
                placeholder,
            })?;
            Ok(true)
        });
        match attached {
            Ok(true) => snapshot.ai_analysis = Some(analysis),
            Ok(false) => log::debug!("snapshot {}: superseded before analysis finished", snapshot.id),
            Err(e) => log::warn!("snapshot {}: analysis not attached: {e}", snapshot.id),
        }
    }
}
