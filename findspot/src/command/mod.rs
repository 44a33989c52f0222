//! Operator command language
//!
//! - `grammar`: whitespace normalization and parsing into [`Command`]
//! - `interpreter`: executes a parsed command against a profiler

pub mod grammar;
pub mod interpreter;

pub use grammar::{normalize_whitespace, parse_line, Command};
pub use interpreter::{Interpreter, Reply, UNKNOWN_COMMAND};
