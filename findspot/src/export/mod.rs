//! Snapshot export
//!
//! Writes the final routine table as JSON for tooling that should not have
//! to parse the fixed-width text report.

pub mod snapshot;

pub use snapshot::SnapshotExporter;
