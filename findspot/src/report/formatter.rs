//! Fixed-width routine table.
//!
//! ```text
//! #            Address       Hits               Module Symbol
//! 0             401136          3            example-1 r3
//! 1             401126          1            example-1 r1
//! Total Count: 2
//! ```
//!
//! Rows are numbered by discovery order (dense, 0-based). Unless the
//! chronological order is requested, rows are then stably re-sorted by hit
//! count descending, so equal counts keep their discovery order.

use std::fmt::Write as _;
use std::io;

use crate::domain::SortOrder;
use crate::store::RoutineRecord;

/// Row cap used by `show` and `clear`.
pub const SHOW_ROW_LIMIT: usize = 20;

/// Line terminating every dump written to a file.
pub const DUMP_SEPARATOR: &str = "------------------";

/// Printed in place of the rows beyond the row limit.
pub const TRUNCATION_MARKER: &str = "<...>";

const ADDRESS_WIDTH: usize = 18;
const HITS_WIDTH: usize = 10;
const MODULE_WIDTH: usize = 20;

/// A record with its display index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub index: usize,
    pub record: RoutineRecord,
}

/// Order records for display and assign their indices.
#[must_use]
pub fn sort_for_display(mut records: Vec<RoutineRecord>, order: SortOrder) -> Vec<DisplayRow> {
    records.sort_by_key(|r| r.discovery_order);

    let mut rows: Vec<DisplayRow> = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| DisplayRow { index, record })
        .collect();

    if order == SortOrder::HitCount {
        // Stable: equal counts stay in discovery order
        rows.sort_by_key(|row| std::cmp::Reverse(row.record.hit_count));
    }
    rows
}

/// Render the table. `limit` caps the number of rows, not the total line.
#[must_use]
pub fn format_table(records: Vec<RoutineRecord>, order: SortOrder, limit: Option<usize>) -> String {
    let rows = sort_for_display(records, order);
    let total = rows.len();
    let index_width = total.to_string().len();

    let mut out = String::new();
    push_row(&mut out, index_width, "#", "Address", "Hits", "Module", "Symbol");

    let shown = limit.unwrap_or(usize::MAX);
    for row in rows.iter().take(shown) {
        push_row(
            &mut out,
            index_width,
            &row.index.to_string(),
            &row.record.address.to_string(),
            &row.record.hit_count.to_string(),
            &row.record.module,
            &row.record.name,
        );
    }
    if total > shown {
        out.push_str(TRUNCATION_MARKER);
        out.push('\n');
    }

    let _ = writeln!(out, "Total Count: {total}");
    out
}

/// Write the full, untruncated table followed by [`DUMP_SEPARATOR`].
///
/// # Errors
/// Returns any error from the underlying writer.
pub fn write_dump<W: io::Write>(
    writer: &mut W,
    records: Vec<RoutineRecord>,
    order: SortOrder,
) -> io::Result<()> {
    writer.write_all(format_table(records, order, None).as_bytes())?;
    writeln!(writer, "{DUMP_SEPARATOR}")?;
    writer.flush()
}

fn push_row(
    out: &mut String,
    index_width: usize,
    index: &str,
    address: &str,
    hits: &str,
    module: &str,
    symbol: &str,
) {
    let _ = writeln!(
        out,
        "{index:>index_width$} {address:>ADDRESS_WIDTH$} {hits:>HITS_WIDTH$} {module:>MODULE_WIDTH$} {symbol} "
    );
}
