//! Instrumentation hosts
//!
//! A host discovers routines, calls the profiler's hook on every execution
//! and implements [`TargetControl`](crate::agent::TargetControl) for the
//! observed program's threads. The bundled host simulates a small program.

pub mod simulated;

pub use simulated::{SimulatedTarget, SimulationConfig, MAIN_IMAGE};
