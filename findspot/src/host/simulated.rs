//! Simulated observed program.
//!
//! A handful of worker threads repeatedly "call" a fixed set of demo
//! routines, each call going through [`Profiler::hit`] exactly as an
//! instrumentation hook would. The same type implements [`TargetControl`]:
//! freezing parks every worker at its next checkpoint and only reports
//! success once all of them are parked. A checkpoint precedes every routine
//! call, so a freeze never waits for the rest of an iteration.
//!
//! ```text
//!   worker ──▶ ◆ r0 ◆ malloc ◆ [r1] ◆ [r2] ◆ r3 ◆ r3 ◆ write ◆ free ──▶ sleep(tick) ─┐
//!     ▲                                                                              │
//!     └──────────────────────────────────────────────────────────────────────────────┘
//!                                                                   ◆ = checkpoint
//! ```

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::agent::{HitOutcome, Profiler, TargetControl};
use crate::domain::{AgentError, Address};
use crate::store::RoutineHandle;

/// Path reported as the main image of the simulated program.
pub const MAIN_IMAGE: &str = "/opt/demo/example-1";

const LIBC: &str = "/usr/lib/x86_64-linux-gnu/libc.so.6";

struct DemoRoutine {
    address: u64,
    name: &'static str,
    module: &'static str,
}

static DEMO_ROUTINES: [DemoRoutine; 7] = [
    DemoRoutine { address: 0x40_1126, name: "r0", module: MAIN_IMAGE },
    DemoRoutine { address: 0x40_1136, name: "r1", module: MAIN_IMAGE },
    DemoRoutine { address: 0x40_1146, name: "r2", module: MAIN_IMAGE },
    DemoRoutine { address: 0x40_1156, name: "r3", module: MAIN_IMAGE },
    DemoRoutine { address: 0x7f3a_1c2e_5870, name: "write", module: LIBC },
    DemoRoutine { address: 0x7f3a_1c2a_10e0, name: "malloc", module: LIBC },
    DemoRoutine { address: 0x7f3a_1c2a_16d0, name: "free", module: LIBC },
];

const R0: usize = 0;
const R1: usize = 1;
const R2: usize = 2;
const R3: usize = 3;
const WRITE: usize = 4;
const MALLOC: usize = 5;
const FREE: usize = 6;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub threads: usize,
    /// Pause between two iterations of a worker
    pub tick: Duration,
    /// How long a freeze may wait for every worker to park
    pub freeze_timeout: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            tick: Duration::from_millis(10),
            freeze_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default)]
struct GateState {
    frozen: bool,
    parked: usize,
    workers: usize,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct FreezeGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl FreezeGate {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park while frozen. Returns false once the simulation is shutting down.
    fn checkpoint(&self) -> bool {
        let mut state = self.lock();
        if state.frozen && !state.shutdown {
            state.parked += 1;
            self.changed.notify_all();
            state = self
                .changed
                .wait_while(state, |s| s.frozen && !s.shutdown)
                .unwrap_or_else(PoisonError::into_inner);
            state.parked -= 1;
        }
        !state.shutdown
    }

    fn leave(&self) {
        let mut state = self.lock();
        state.workers = state.workers.saturating_sub(1);
        self.changed.notify_all();
    }
}

#[derive(Debug, Default)]
struct Shared {
    gate: FreezeGate,
    detached: AtomicBool,
    iterations: AtomicU64,
}

/// Per-worker handle cache, dropped whenever the profiler is cleared.
struct HandleCache {
    generation: u64,
    handles: Vec<Option<RoutineHandle>>,
}

impl HandleCache {
    fn new() -> Self {
        Self { generation: 0, handles: vec![None; DEMO_ROUTINES.len()] }
    }

    fn call(&mut self, profiler: &Profiler, routine: usize) -> HitOutcome {
        let generation = profiler.generation();
        if generation != self.generation {
            self.handles.fill(None);
            self.generation = generation;
        }

        let demo = &DEMO_ROUTINES[routine];
        let handle = self.handles[routine].get_or_insert_with(|| {
            profiler.discover(Address(demo.address), demo.name, demo.module)
        });
        profiler.hit(handle)
    }
}

pub struct SimulatedTarget {
    config: SimulationConfig,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SimulatedTarget {
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self { config, shared: Arc::new(Shared::default()), workers: Mutex::new(Vec::new()) }
    }

    #[must_use]
    pub fn main_image(&self) -> &'static str {
        MAIN_IMAGE
    }

    /// Completed worker iterations across all threads.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.shared.iterations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.shared.detached.load(Ordering::Acquire)
    }

    /// Spawn the worker threads.
    ///
    /// Workers are registered with the freeze gate before they run, so a
    /// freeze issued right after `start` waits for all of them.
    ///
    /// # Errors
    /// Returns [`AgentError::SpawnFailed`] if a worker thread cannot be spawned.
    pub fn start(&self, profiler: &Arc<Profiler>) -> Result<(), AgentError> {
        let threads = self.config.threads;
        self.shared.gate.lock().workers += threads;

        let mut workers = self.lock_workers();
        for id in 0..threads {
            let shared = Arc::clone(&self.shared);
            let profiler = Arc::clone(profiler);
            let tick = self.config.tick;

            let spawned = thread::Builder::new()
                .name(format!("findspot-worker-{id}"))
                .spawn(move || worker_loop(&shared, &profiler, tick));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    let mut gate = self.shared.gate.lock();
                    gate.workers = gate.workers.saturating_sub(threads - id);
                    return Err(AgentError::SpawnFailed(e));
                }
            }
        }
        info!("simulated target running with {threads} threads");
        Ok(())
    }

    /// Stop and join every worker. Safe to call more than once.
    pub fn shutdown(&self) {
        {
            let mut gate = self.shared.gate.lock();
            gate.shutdown = true;
            self.shared.gate.changed.notify_all();
        }

        let handles = std::mem::take(&mut *self.lock_workers());
        let current = thread::current().id();
        for handle in handles {
            // The last profiler reference may be dropped on a worker
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("simulated worker panicked");
            }
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SimulatedTarget {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl TargetControl for SimulatedTarget {
    fn freeze_all(&self) -> bool {
        let gate = &self.shared.gate;
        let mut state = gate.lock();
        state.frozen = true;
        gate.changed.notify_all();

        let (mut state, timeout) = gate
            .changed
            .wait_timeout_while(state, self.config.freeze_timeout, |s| {
                s.parked < s.workers && !s.shutdown
            })
            .unwrap_or_else(PoisonError::into_inner);

        if timeout.timed_out() {
            state.frozen = false;
            gate.changed.notify_all();
            warn!("workers did not park within {:?}", self.config.freeze_timeout);
            return false;
        }
        debug!("target frozen ({} workers parked)", state.parked);
        true
    }

    fn resume_all(&self) {
        let gate = &self.shared.gate;
        gate.lock().frozen = false;
        gate.changed.notify_all();
        debug!("target resumed");
    }

    fn detach(&self) {
        self.shared.detached.store(true, Ordering::Release);
        info!("instrumentation released, workers keep running unobserved");
    }
}

fn worker_loop(shared: &Shared, profiler: &Profiler, tick: Duration) {
    let mut cache = HandleCache::new();
    let mut iteration = 0u64;

    while shared.gate.checkpoint() {
        if !run_iteration(&mut cache, profiler, iteration, shared) {
            break;
        }
        iteration += 1;
        shared.iterations.fetch_add(1, Ordering::Relaxed);
        thread::sleep(tick);
    }
    shared.gate.leave();
}

/// One pass over the demo call sequence. Returns false if the simulation
/// shut down while the worker was parked mid-iteration.
fn run_iteration(cache: &mut HandleCache, profiler: &Profiler, iteration: u64, shared: &Shared) -> bool {
    let mut calls = vec![R0, MALLOC];
    if iteration % 5 == 0 {
        calls.push(R1);
    }
    if iteration % 7 == 0 {
        calls.push(R2);
    }
    calls.extend([R3, R3, WRITE, FREE]);

    for routine in calls {
        // Hooks are gone once detach ran, even mid-iteration
        if shared.detached.load(Ordering::Acquire) {
            break;
        }
        if !shared.gate.checkpoint() {
            return false;
        }
        cache.call(profiler, routine);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CollectionMode;
    use std::time::Instant;

    fn fast_config(threads: usize) -> SimulationConfig {
        SimulationConfig {
            threads,
            tick: Duration::from_millis(1),
            freeze_timeout: Duration::from_secs(5),
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_freeze_without_workers() {
        let target = SimulatedTarget::new(fast_config(0));
        assert!(target.freeze_all());
        target.resume_all();
    }

    #[test]
    fn test_workers_record_hits() {
        let target = Arc::new(SimulatedTarget::new(fast_config(2)));
        let profiler = Arc::new(Profiler::new(target.clone()));
        profiler.set_mode(CollectionMode::Collect);
        target.start(&profiler).unwrap();

        wait_for(|| profiler.snapshot().len() == DEMO_ROUTINES.len());
        target.shutdown();

        let records = profiler.snapshot();
        let r0 = records.iter().find(|r| r.name == "r0").unwrap();
        let r3 = records.iter().find(|r| r.name == "r3").unwrap();
        assert_eq!(r0.module, "example-1");
        assert!(r3.hit_count >= r0.hit_count);
        assert!(records.iter().any(|r| r.module == "libc.so.6"));
    }

    #[test]
    fn test_freeze_stops_progress() {
        let target = Arc::new(SimulatedTarget::new(fast_config(3)));
        let profiler = Arc::new(Profiler::new(target.clone()));
        target.start(&profiler).unwrap();
        wait_for(|| target.iterations() > 10);

        assert!(target.freeze_all());
        let frozen_at = target.iterations();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(target.iterations(), frozen_at);

        target.resume_all();
        wait_for(|| target.iterations() > frozen_at);
        target.shutdown();
    }

    #[test]
    fn test_rediscovers_after_clear() {
        let target = Arc::new(SimulatedTarget::new(fast_config(1)));
        let profiler = Arc::new(Profiler::new(target.clone()));
        profiler.set_mode(CollectionMode::Collect);
        target.start(&profiler).unwrap();
        wait_for(|| !profiler.store().is_empty());

        assert!(profiler.freeze().with_frozen(|| profiler.clear()).is_ok());
        wait_for(|| profiler.snapshot().iter().any(|r| r.name == "r0"));
        target.shutdown();
    }

    #[test]
    fn test_detach_stops_hooks() {
        let target = Arc::new(SimulatedTarget::new(fast_config(2)));
        let profiler = Arc::new(Profiler::new(target.clone()));
        profiler.set_mode(CollectionMode::Collect);
        target.start(&profiler).unwrap();
        wait_for(|| !profiler.snapshot().is_empty());

        profiler.request_detach();
        wait_for(|| target.is_detached());

        let before: u64 = profiler.snapshot().iter().map(|r| r.hit_count).sum();
        let iterations = target.iterations();
        wait_for(|| target.iterations() > iterations + 5);
        let after: u64 = profiler.snapshot().iter().map(|r| r.hit_count).sum();
        target.shutdown();

        // Workers keep running but nothing is counted any more
        assert!(after <= before + 2 * DEMO_ROUTINES.len() as u64);
    }

    #[test]
    fn test_iteration_parks_before_each_call() {
        let target = Arc::new(SimulatedTarget::new(fast_config(0)));
        let profiler = Profiler::new(target);
        profiler.set_mode(CollectionMode::Collect);

        let shared = Shared::default();
        {
            let mut gate = shared.gate.lock();
            gate.frozen = true;
            gate.workers = 1;
        }

        thread::scope(|scope| {
            let worker = scope.spawn(|| run_iteration(&mut HandleCache::new(), &profiler, 0, &shared));

            wait_for(|| shared.gate.lock().parked == 1);
            assert!(profiler.store().is_empty());

            shared.gate.lock().shutdown = true;
            shared.gate.changed.notify_all();
            assert!(!worker.join().unwrap());
        });
        assert!(profiler.store().is_empty());
    }

    #[test]
    fn test_open_gate_iteration_makes_every_call() {
        let target = Arc::new(SimulatedTarget::new(fast_config(0)));
        let profiler = Profiler::new(target);
        profiler.set_mode(CollectionMode::Collect);

        let shared = Shared::default();
        assert!(run_iteration(&mut HandleCache::new(), &profiler, 0, &shared));

        // Iteration 0 takes every optional branch
        let records = profiler.snapshot();
        assert_eq!(records.len(), DEMO_ROUTINES.len());
        let r3 = records.iter().find(|r| r.name == "r3").unwrap();
        assert_eq!(r3.hit_count, 2);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let target = Arc::new(SimulatedTarget::new(fast_config(1)));
        let profiler = Arc::new(Profiler::new(target.clone()));
        target.start(&profiler).unwrap();
        target.shutdown();
        target.shutdown();
        assert!(target.freeze_all());
    }
}
