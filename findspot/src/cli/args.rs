//! CLI argument definitions

use clap::Parser;
use findspot_common::DEFAULT_PORT;
use std::path::PathBuf;

/// Options for the `findspot` agent host.
#[derive(Parser, Debug)]
#[command(
    name = "findspot",
    version,
    about = "Find the functions executed by some event in a running program",
    after_help = "\
EXAMPLES:
    findspot                                 Listen on 8022, report to findspot.log
    findspot -p 9000 -o run.log              Custom port and output file
    findspot --export snapshot.json          Also write a JSON snapshot at exit
    findspot -d debug.log                    Trace every hook decision to a file

Connect with `findspot-cli [PORT]`; the target starts frozen until `unfreeze`."
)]
pub struct AgentArgs {
    /// Control port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// File receiving the final report
    #[arg(short, long, value_name = "FILE", default_value = "findspot.log")]
    pub output: PathBuf,

    /// Write a trace-level debug log to this file instead of stderr
    #[arg(short, long, value_name = "FILE")]
    pub debug_log: Option<PathBuf>,

    /// Export the final table as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Worker threads in the simulated target
    #[arg(long, default_value = "2")]
    pub threads: usize,

    /// Stop N seconds after startup, controller or not (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Options for the `findspot-cli` operator console.
#[derive(Parser, Debug)]
#[command(name = "findspot-cli", version, about = "Interactive console for a findspot agent")]
pub struct ClientArgs {
    /// Agent control port
    #[arg(value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Agent host
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_defaults() {
        let args = AgentArgs::parse_from(["findspot"]);
        assert_eq!(args.port, 8022);
        assert_eq!(args.output, PathBuf::from("findspot.log"));
        assert!(args.debug_log.is_none());
        assert_eq!(args.threads, 2);
        assert_eq!(args.duration, 0);
    }

    #[test]
    fn test_agent_short_flags() {
        let args = AgentArgs::parse_from(["findspot", "-p", "9000", "-o", "run.log", "-d", "dbg.log", "-q"]);
        assert_eq!(args.port, 9000);
        assert_eq!(args.output, PathBuf::from("run.log"));
        assert_eq!(args.debug_log, Some(PathBuf::from("dbg.log")));
        assert!(args.quiet);
    }

    #[test]
    fn test_client_port_positional() {
        assert_eq!(ClientArgs::parse_from(["findspot-cli"]).port, 8022);
        let args = ClientArgs::parse_from(["findspot-cli", "9001", "--host", "10.0.0.2"]);
        assert_eq!(args.port, 9001);
        assert_eq!(args.host, "10.0.0.2");
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(AgentArgs::try_parse_from(["findspot", "-p", "70000"]).is_err());
    }
}
