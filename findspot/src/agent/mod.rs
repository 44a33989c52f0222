//! The in-process agent
//!
//! - `profiler`: shared state and the instrumentation entry points
//! - `freeze`: stop-the-world policy on top of the host's [`TargetControl`]
//! - `channel`: listening socket and framed controller connection
//! - `session`: greeting, control thread and command loop

pub mod channel;
pub mod freeze;
pub mod profiler;
pub mod session;

pub use channel::{ControlChannel, ControlListener};
pub use freeze::{FreezeCoordinator, TargetControl};
pub use profiler::{HitOutcome, Profiler};
pub use session::{run_control_loop, start_session, SessionEnd, SessionHandle, MAX_RECV_FAILURES};
