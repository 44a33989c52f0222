//! JSON snapshot of the routine table.
//!
//! ```json
//! {
//!   "mode": "COLLECT",
//!   "sort": "hitcount",
//!   "total_count": 2,
//!   "routines": [
//!     { "index": 0, "address": "0x401126", "name": "r0", "module": "example-1",
//!       "hits": 12, "discovery_order": 0 }
//!   ]
//! }
//! ```
//!
//! Routines appear in the same order as in the text report.

use serde::Serialize;
use std::io::Write;

use crate::agent::Profiler;
use crate::domain::{CollectionMode, ExportError, SortOrder};
use crate::report::{sort_for_display, DisplayRow};
use crate::store::RoutineRecord;

#[derive(Debug, Serialize)]
struct ExportedRoutine<'a> {
    index: usize,
    address: String,
    name: &'a str,
    module: &'a str,
    hits: u64,
    discovery_order: u64,
}

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    mode: CollectionMode,
    sort: &'static str,
    total_count: usize,
    routines: Vec<ExportedRoutine<'a>>,
}

/// Captures the table once, writes it as pretty-printed JSON.
#[derive(Debug)]
pub struct SnapshotExporter {
    mode: CollectionMode,
    order: SortOrder,
    rows: Vec<DisplayRow>,
}

impl SnapshotExporter {
    #[must_use]
    pub fn new(records: Vec<RoutineRecord>, mode: CollectionMode, order: SortOrder) -> Self {
        Self { mode, order, rows: sort_for_display(records, order) }
    }

    #[must_use]
    pub fn from_profiler(profiler: &Profiler) -> Self {
        Self::new(profiler.snapshot(), profiler.mode(), profiler.sort_order())
    }

    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        let snapshot = Snapshot {
            mode: self.mode,
            sort: match self.order {
                SortOrder::HitCount => "hitcount",
                SortOrder::Chronological => "chrono",
            },
            total_count: self.rows.len(),
            routines: self
                .rows
                .iter()
                .map(|row| ExportedRoutine {
                    index: row.index,
                    address: format!("{:#x}", row.record.address),
                    name: &row.record.name,
                    module: &row.record.module,
                    hits: row.record.hit_count,
                    discovery_order: row.record.discovery_order,
                })
                .collect(),
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
