//! Concurrent routine store.
//!
//! The map itself sits behind a mutex that only discovery, clear and
//! snapshot take. Each entry owns its hit counter as an atomic, so the hook
//! path updates counts through a [`RoutineHandle`] without ever touching the
//! map or allocating.
//!
//! ```text
//!  discover()  ──lock──▶ HashMap<Address, RoutineHandle> ◀──lock── snapshot()/clear()
//!                                  │ Arc clone
//!                                  ▼
//!  hook thread ───────────▶ RoutineEntry.hits (AtomicU64)
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::Address;

/// Point-in-time copy of one routine, as handed to the formatter and exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineRecord {
    pub address: Address,
    pub name: String,
    pub module: String,
    pub hit_count: u64,
    pub discovery_order: u64,
}

/// Live entry shared between the store and the instrumentation layer.
#[derive(Debug)]
struct RoutineEntry {
    address: Address,
    name: String,
    module: String,
    discovery_order: u64,
    /// Module filter verdict at discovery time; never re-evaluated.
    tracked: bool,
    hits: AtomicU64,
}

/// Reference to a discovered routine, handed to the hook once per routine.
///
/// Cloning is an `Arc` bump. The entry stays valid for as long as any handle
/// exists, even after the store has been cleared.
#[derive(Debug, Clone)]
pub struct RoutineHandle(Arc<RoutineEntry>);

impl RoutineHandle {
    #[must_use]
    pub fn address(&self) -> Address {
        self.0.address
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.0.module
    }

    #[must_use]
    pub fn discovery_order(&self) -> u64 {
        self.0.discovery_order
    }

    /// Whether hits on this routine are counted at all.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.0.tracked
    }

    #[must_use]
    pub fn hit_count(&self) -> u64 {
        self.0.hits.load(Ordering::Relaxed)
    }

    /// True if both handles refer to the same stored record.
    #[must_use]
    pub fn same_record(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn increment(&self) {
        self.0.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.0.hits.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn record(&self) -> RoutineRecord {
        RoutineRecord {
            address: self.0.address,
            name: self.0.name.clone(),
            module: self.0.module.clone(),
            hit_count: self.hit_count(),
            discovery_order: self.0.discovery_order,
        }
    }
}

/// Map of every discovered routine, keyed by entry address.
#[derive(Debug, Default)]
pub struct RoutineStore {
    routines: Mutex<HashMap<Address, RoutineHandle>>,
    /// Survives `clear()` so orders are never handed out twice.
    next_order: AtomicU64,
}

impl RoutineStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a routine the first time it is seen.
    ///
    /// Idempotent per address: a known address returns the existing handle
    /// with its name, module, order and count untouched.
    pub fn discover(&self, address: Address, name: &str, module: &str, tracked: bool) -> RoutineHandle {
        let mut routines = self.lock();
        if let Some(existing) = routines.get(&address) {
            return existing.clone();
        }

        let handle = RoutineHandle(Arc::new(RoutineEntry {
            address,
            name: name.to_owned(),
            module: module.to_owned(),
            discovery_order: self.next_order.fetch_add(1, Ordering::Relaxed),
            tracked,
            hits: AtomicU64::new(0),
        }));
        routines.insert(address, handle.clone());
        handle
    }

    /// Copy out every record with at least one hit, in discovery order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RoutineRecord> {
        let mut records: Vec<RoutineRecord> = self
            .lock()
            .values()
            .map(RoutineHandle::record)
            .filter(|r| r.hit_count > 0)
            .collect();
        records.sort_by_key(|r| r.discovery_order);
        records
    }

    /// Drop every record. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut routines = self.lock();
        let removed = routines.len();
        routines.clear();
        removed
    }

    #[must_use]
    pub fn get(&self, address: Address) -> Option<RoutineHandle> {
        self.lock().get(&address).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Address, RoutineHandle>> {
        // A panicking holder cannot leave the map half-updated
        self.routines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
