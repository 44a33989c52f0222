//! # findspot - Live Function-Call Profiler
//!
//! findspot answers "which functions run when I do X?". An agent inside the
//! observed program counts routine executions; an operator connected over TCP
//! switches collection on right before the interesting event, off right
//! after, and reads back the routines that fired, with their hit counts.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  Observed Program Threads                    │
//! │        discover() once per routine, hit() on every call      │
//! └───────────────────────┬──────────────────────────────────────┘
//!                         │ RoutineHandle (atomic counter)
//!                         ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Profiler (Arc-shared)                     │
//! │  ┌────────────┐  ┌────────────┐  ┌────────┐  ┌────────────┐  │
//! │  │   Store    │  │   Filter   │  │  Mode  │  │   Freeze   │  │
//! │  └────────────┘  └────────────┘  └────────┘  └────────────┘  │
//! └───────────────────────▲──────────────────────────────────────┘
//!                         │ freeze / execute / resume
//! ┌───────────────────────┴──────────────────────────────────────┐
//! │          Control Thread: Session → Grammar → Interpreter     │
//! │                     → Report Formatter                       │
//! └───────────────────────▲──────────────────────────────────────┘
//!                         │ hex-length frames (findspot-common)
//!                         ▼
//!                    findspot-cli (operator)
//! ```
//!
//! ## Module Structure
//!
//! - [`agent`]: the [`Profiler`](agent::Profiler) context, freeze policy,
//!   control channel and session loop
//! - [`store`]: concurrent routine records with lock-free hit counters
//! - [`tracking`]: collection mode and module whitelist/blacklist
//! - [`command`]: command grammar and interpreter
//! - [`report`]: fixed-width table rendering
//! - [`export`]: JSON snapshot of the final table
//! - [`host`]: simulated observed program implementing the host contract
//! - [`cli`]: command-line configuration
//! - [`domain`]: shared types and errors
//!
//! ## Typical Session
//!
//! ```text
//! findspot> unfreeze
//! target resumed
//! findspot> mode trim          # everything that runs idle gets dropped
//! findspot> mode collect       # now trigger the event in the program
//! findspot> mode off
//! findspot> show
//! ```

pub mod agent;
pub mod cli;
pub mod command;
pub mod domain;
pub mod export;
pub mod host;
pub mod report;
pub mod store;
pub mod tracking;
