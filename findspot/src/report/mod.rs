//! Report rendering
//!
//! - `formatter`: the fixed-width table used by `show`, `clear`, `dump` and
//!   the final output file

pub mod formatter;

pub use formatter::{
    format_table, sort_for_display, write_dump, DisplayRow, DUMP_SEPARATOR, SHOW_ROW_LIMIT,
    TRUNCATION_MARKER,
};
