//! # Control Session
//!
//! ```text
//!   controller                         agent
//!   ----------                         -----
//!   connect  ------------------------> accept
//!            <------------------------ greeting
//!                                      freeze target
//!                                      spawn "findspot-control"
//!   command  ------------------------> parse
//!                                      freeze / execute / resume
//!            <------------------------ reply
//!   ...
//!   kill     ------------------------> "not implemented", session ends
//! ```
//!
//! The control thread is the only thread that mutates the store, the filter
//! and the mode while the target is stopped. `freeze`, `unfreeze` and `kill`
//! run without the automatic freeze bracket; everything else is executed with
//! the target frozen, and dropped with an explicit failure text if the host
//! refuses to freeze.
//!
//! Transport failures show up as empty command strings. After more than
//! [`MAX_RECV_FAILURES`] in a row the session ends as
//! [`SessionEnd::ChannelDead`] and a frozen target is resumed so the observed
//! program is never left stopped without a controller.

use crossbeam_channel::{bounded, Receiver};
use findspot_common::GREETING;
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::channel::ControlChannel;
use super::profiler::Profiler;
use crate::command::{normalize_whitespace, Command, Interpreter, Reply};
use crate::domain::{AgentError, FreezeState};

/// Consecutive empty receives tolerated before the channel is declared dead.
pub const MAX_RECV_FAILURES: u32 = 10;

const CONTROL_THREAD_NAME: &str = "findspot-control";

/// Why a control session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The operator sent `kill`
    Killed,
    /// Too many consecutive receive failures
    ChannelDead,
}

/// Running control thread plus a channel that reports how it ended.
pub struct SessionHandle {
    thread: JoinHandle<SessionEnd>,
    events: Receiver<SessionEnd>,
}

impl SessionHandle {
    /// Non-blocking check for the end of the session.
    #[must_use]
    pub fn try_end(&self) -> Option<SessionEnd> {
        self.events.try_recv().ok()
    }

    /// Wait for the control thread to exit.
    pub fn join(self) -> SessionEnd {
        match self.thread.join() {
            Ok(end) => end,
            Err(_) => {
                warn!("control thread panicked");
                SessionEnd::ChannelDead
            }
        }
    }
}

/// Greet the controller, freeze the target and hand the channel to a new
/// control thread.
///
/// # Errors
/// Returns an error if the greeting cannot be sent or the thread cannot be
/// spawned.
pub fn start_session<S>(
    mut channel: ControlChannel<S>,
    profiler: Arc<Profiler>,
) -> Result<SessionHandle, AgentError>
where
    S: Read + Write + Send + 'static,
{
    channel.send(GREETING)?;

    // Races the program start, good enough for an interactive tool
    if !profiler.freeze().freeze_all() {
        warn!("initial freeze failed, target keeps running");
    }

    let (tx, events) = bounded(1);
    let thread = thread::Builder::new()
        .name(CONTROL_THREAD_NAME.to_string())
        .spawn(move || {
            let end = run_control_loop(&mut channel, &profiler);
            info!("control session ended: {end:?}");
            // Receiver may already be gone during shutdown
            let _ = tx.send(end);
            end
        })
        .map_err(AgentError::SpawnFailed)?;

    Ok(SessionHandle { thread, events })
}

/// Serve commands until `kill` or a dead channel.
pub fn run_control_loop<S: Read + Write>(
    channel: &mut ControlChannel<S>,
    profiler: &Profiler,
) -> SessionEnd {
    let interpreter = Interpreter::new(profiler);
    let mut failures = 0u32;

    let end = loop {
        let line = normalize_whitespace(&channel.recv_command());
        if line.is_empty() {
            failures += 1;
            if failures > MAX_RECV_FAILURES {
                break SessionEnd::ChannelDead;
            }
            continue;
        }
        failures = 0;

        let reply = respond(&interpreter, profiler, &line);
        if let Err(e) = channel.send(&reply.text) {
            warn!("failed to send reply: {e}");
        }
        if reply.end_session {
            break SessionEnd::Killed;
        }
    };

    if end == SessionEnd::ChannelDead && profiler.freeze().state() == FreezeState::Frozen {
        info!("controller gone, resuming target");
        profiler.freeze().resume_all();
    }
    end
}

fn respond(interpreter: &Interpreter<'_>, profiler: &Profiler, line: &str) -> Reply {
    let Some(command) = Command::parse(line) else {
        info!("command {line:?} returned error: unknown command");
        return Reply::unknown();
    };

    if command.bypasses_freeze() {
        return interpreter.execute(&command);
    }

    match profiler.freeze().with_frozen(|| interpreter.execute(&command)) {
        Ok(reply) => {
            debug!("command {line:?} returned: {}", reply.text);
            reply
        }
        Err(e) => {
            warn!("{e}");
            Reply { handled: false, text: e.to_string(), end_session: false }
        }
    }
}
