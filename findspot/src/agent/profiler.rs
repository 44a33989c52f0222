//! # Profiler Context
//!
//! One [`Profiler`] owns all state of an attached agent: the routine store,
//! module filter, collection mode, report sort order, the pending detach
//! request and the freeze coordinator. It is shared as `Arc<Profiler>` between
//! the instrumentation callbacks and the control thread, so several
//! independent agents (or tests) can live in one process.
//!
//! ## Instrumentation Entry Points
//!
//! - [`Profiler::discover`] - once per routine, when the host first sees it
//! - [`Profiler::hit`] - before every execution of an instrumented routine
//!
//! `hit` is the hot path. It reads two atomics, then updates one counter
//! owned by the routine; it never allocates and never touches the store map.

use log::{debug, trace};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::freeze::{FreezeCoordinator, TargetControl};
use crate::domain::{Address, CollectionMode, SortOrder};
use crate::report;
use crate::store::{RoutineHandle, RoutineRecord, RoutineStore};
use crate::tracking::{short_module_name, ModeSwitch, ModuleFilter};

/// What a single [`Profiler::hit`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Mode is OFF or the routine's module is not tracked
    Ignored,
    Counted,
    Trimmed,
    /// A pending detach request was consumed; the hit itself was dropped
    Detached,
}

pub struct Profiler {
    store: RoutineStore,
    filter: RwLock<ModuleFilter>,
    mode: ModeSwitch,
    chronological: AtomicBool,
    detach_requested: AtomicBool,
    /// Bumped by every clear so hosts know cached handles were dropped.
    generation: AtomicU64,
    freeze: FreezeCoordinator,
}

impl Profiler {
    #[must_use]
    pub fn new(target: Arc<dyn TargetControl>) -> Self {
        Self {
            store: RoutineStore::new(),
            filter: RwLock::new(ModuleFilter::new()),
            mode: ModeSwitch::default(),
            chronological: AtomicBool::new(false),
            detach_requested: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            freeze: FreezeCoordinator::new(target),
        }
    }

    // =========================================================================
    // INSTRUMENTATION SIDE
    // =========================================================================

    /// Register a routine the first time the host encounters it.
    ///
    /// `module_path` may be a full path; only the file name is kept. The
    /// module filter is evaluated here, once, and the verdict stays with the
    /// record for its whole life.
    pub fn discover(&self, address: Address, name: &str, module_path: &str) -> RoutineHandle {
        let module = short_module_name(module_path);
        let tracked = self.filter().tracked(module);
        let handle = self.store.discover(address, name, module, tracked);

        if tracked {
            debug!("hook routine: {address} {module} {name}");
        } else {
            debug!("ignored module: {address} {module}");
        }
        handle
    }

    /// Hook body, run before every execution of an instrumented routine.
    pub fn hit(&self, routine: &RoutineHandle) -> HitOutcome {
        // Plain load first so the common case never writes the shared line
        if self.detach_requested.load(Ordering::Relaxed)
            && self.detach_requested.swap(false, Ordering::AcqRel)
        {
            self.freeze.detach();
            return HitOutcome::Detached;
        }

        match self.mode.current() {
            CollectionMode::Off => {
                trace!("ignored: {} {} {}", routine.address(), routine.module(), routine.name());
                HitOutcome::Ignored
            }
            _ if !routine.is_tracked() => HitOutcome::Ignored,
            CollectionMode::Trim => {
                routine.reset();
                trace!("trimmed: {} {} {}", routine.address(), routine.module(), routine.name());
                HitOutcome::Trimmed
            }
            CollectionMode::Collect => {
                routine.increment();
                trace!("collect: {} {} {}", routine.address(), routine.module(), routine.name());
                HitOutcome::Counted
            }
        }
    }

    // =========================================================================
    // CONTROL SIDE
    // =========================================================================

    #[must_use]
    pub fn store(&self) -> &RoutineStore {
        &self.store
    }

    #[must_use]
    pub fn freeze(&self) -> &FreezeCoordinator {
        &self.freeze
    }

    #[must_use]
    pub fn mode(&self) -> CollectionMode {
        self.mode.current()
    }

    pub fn set_mode(&self, mode: CollectionMode) -> CollectionMode {
        self.mode.set(mode)
    }

    #[must_use]
    pub fn filter(&self) -> RwLockReadGuard<'_, ModuleFilter> {
        self.filter.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn filter_mut(&self) -> RwLockWriteGuard<'_, ModuleFilter> {
        self.filter.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn sort_order(&self) -> SortOrder {
        if self.chronological.load(Ordering::Relaxed) {
            SortOrder::Chronological
        } else {
            SortOrder::HitCount
        }
    }

    pub fn set_sort_order(&self, order: SortOrder) {
        self.chronological.store(order == SortOrder::Chronological, Ordering::Relaxed);
    }

    /// Arm the one-shot detach flag consumed by the next hit.
    pub fn request_detach(&self) {
        self.detach_requested.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn detach_pending(&self) -> bool {
        self.detach_requested.load(Ordering::Acquire)
    }

    /// Drop every record and advance the generation.
    pub fn clear(&self) -> usize {
        let removed = self.store.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!("cleared {removed} routines");
        removed
    }

    /// Number of clears so far. Hosts that cache handles re-discover when it moves.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<RoutineRecord> {
        self.store.snapshot()
    }

    /// Render the current table with the configured sort order.
    #[must_use]
    pub fn report(&self, limit: Option<usize>) -> String {
        report::format_table(self.snapshot(), self.sort_order(), limit)
    }

    /// Write the full table plus separator, as used for dumps and the output file.
    ///
    /// # Errors
    /// Returns any error from the writer.
    pub fn write_dump<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        report::write_dump(writer, self.snapshot(), self.sort_order())
    }
}
