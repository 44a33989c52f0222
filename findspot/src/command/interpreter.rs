//! Command execution against a [`Profiler`].
//!
//! The interpreter itself knows nothing about freezing: the control loop
//! decides whether a command runs bracketed by freeze/resume (see
//! [`Command::bypasses_freeze`]) and only then calls [`Interpreter::execute`].

use log::{debug, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::grammar::{self, Command};
use crate::agent::Profiler;
use crate::report::SHOW_ROW_LIMIT;

pub const UNKNOWN_COMMAND: &str = "unknown command";

const HELP_TEXT: &str = "\
help          -- print this help.
kill          -- end the control session.
freeze        -- freeze the target program (all threads).
unfreeze      -- unfreeze the target program.
detach        -- release all instrumentation.
clear         -- clear all collected data.
show          -- show stats on collected data.
dump <file>   -- dump current data to file.
mode collect  -- collect all functions called from now on.
mode trim     -- remove all functions called from now on.
mode off      -- dont touch collected data.
mode          -- show current mode.
sort chrono   -- sort output in the order the functions were encountered.
sort hitcount -- sort output by number of times the functions were encountered.
mod           -- display white/blacklist.
mod blacklist <mod> -- add module to blacklist.
mod whitelist <mod> -- add module to whitelist.
mod blacklist remove <mod> -- remove module from blacklist.
mod whitelist remove <mod> -- remove module from whitelist.
";

/// Result of interpreting one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// False only for input the grammar does not recognize
    pub handled: bool,
    pub text: String,
    /// Set by `kill`: the session ends after this reply is sent
    pub end_session: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self { handled: true, text: text.into(), end_session: false }
    }

    fn empty() -> Self {
        Self::text(String::new())
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self { handled: false, text: UNKNOWN_COMMAND.to_owned(), end_session: false }
    }
}

pub struct Interpreter<'a> {
    profiler: &'a Profiler,
}

impl<'a> Interpreter<'a> {
    #[must_use]
    pub fn new(profiler: &'a Profiler) -> Self {
        Self { profiler }
    }

    /// Normalize, parse and execute a raw line in one go.
    ///
    /// Freeze handling is the caller's job; this is the entry point used by
    /// callers that already hold the target still.
    pub fn execute_line(&self, line: &str) -> Reply {
        match grammar::parse_line(line) {
            Some(command) => self.execute(&command),
            None => Reply::unknown(),
        }
    }

    pub fn execute(&self, command: &Command) -> Reply {
        debug!("executing {command:?}");
        let profiler = self.profiler;

        match command {
            Command::Help => Reply::text(HELP_TEXT),
            Command::Freeze => {
                if profiler.freeze().freeze_all() {
                    Reply::text("application frozen")
                } else {
                    Reply::text("freezing application failed")
                }
            }
            Command::Unfreeze => {
                profiler.freeze().resume_all();
                Reply::text("target resumed")
            }
            Command::Kill => Reply {
                handled: true,
                text: "not implemented".to_owned(),
                end_session: true,
            },
            Command::Detach => {
                profiler.request_detach();
                Reply::text("detach request registered\n")
            }
            Command::Show => Reply::text(profiler.report(Some(SHOW_ROW_LIMIT))),
            Command::ModeQuery => Reply::text(format!("current mode: {}\n", profiler.mode())),
            Command::SetMode(mode) => {
                profiler.set_mode(*mode);
                Reply::text(format!("new mode: {mode}\n"))
            }
            Command::Dump(path) => {
                self.dump_to(path);
                Reply::empty()
            }
            Command::Clear => {
                profiler.clear();
                Reply::text(profiler.report(Some(SHOW_ROW_LIMIT)))
            }
            Command::ModuleQuery => Reply::text(profiler.filter().describe()),
            Command::ModuleAdd(list, module) => {
                profiler.filter_mut().add(*list, module);
                Reply::empty()
            }
            Command::ModuleRemove(list, module) => {
                profiler.filter_mut().remove(*list, module);
                Reply::empty()
            }
            Command::Sort(order) => {
                profiler.set_sort_order(*order);
                Reply::empty()
            }
        }
    }

    // Failures stay on the agent console; the operator gets an empty reply either way.
    fn dump_to(&self, path: &Path) {
        let file = match File::create(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Could not open file {}: {e}", path.display());
                return;
            }
        };
        let mut writer = BufWriter::new(file);
        if let Err(e) = self.profiler.write_dump(&mut writer) {
            warn!("Could not write dump to {}: {e}", path.display());
        }
    }
}
