//! Routine bookkeeping
//!
//! - `routine_store`: address-keyed map of discovered routines and their
//!   lock-free hit counters

pub mod routine_store;

pub use routine_store::{RoutineHandle, RoutineRecord, RoutineStore};
