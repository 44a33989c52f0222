//! # findspot - Agent Host
//!
//! Runs the simulated observed program with a findspot agent attached:
//!
//! 1. open the output file, bind the control port
//! 2. wait for a controller, greet it, freeze the target
//! 3. start the workload (frozen until the operator sends `unfreeze`)
//! 4. serve commands on the control thread until `kill` or a dead channel,
//!    then write the table to the output file
//! 5. keep the workload running until the duration limit or Ctrl+C, which
//!    may also arrive before any controller connects
//! 6. write the final table to the output file (and the JSON snapshot)

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{info, LevelFilter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use findspot::agent::{start_session, ControlListener, Profiler, SessionEnd, SessionHandle};
use findspot::cli::AgentArgs;
use findspot::export::SnapshotExporter;
use findspot::host::{SimulatedTarget, SimulationConfig};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where the host stands with respect to its single control session.
enum Phase {
    AwaitingController,
    Serving(SessionHandle),
    Unattended,
}

fn main() {
    let args = AgentArgs::parse();
    if let Err(e) = init_logging(args.debug_log.as_deref()) {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_ERROR);
    }

    std::process::exit(match run(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

/// `RUST_LOG`-driven stderr logging, or everything down to `trace` into the
/// debug log file when one is given.
fn init_logging(debug_log: Option<&Path>) -> Result<()> {
    let Some(path) = debug_log else {
        env_logger::init();
        return Ok(());
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create debug log {}", path.display()))?;
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Trace)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn run(args: AgentArgs) -> Result<()> {
    let quiet = args.quiet;

    let mut output = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create output file {}", args.output.display()))?,
    );
    let timestamp = Local::now().format("%a %b %e %H:%M:%S %Y");
    writeln!(output, "time: {timestamp}")?;
    info!("time: {timestamp}");

    let target = Arc::new(SimulatedTarget::new(SimulationConfig {
        threads: args.threads,
        ..SimulationConfig::default()
    }));
    writeln!(output, "Loaded main Image: {}", target.main_image())?;
    output.flush()?;
    info!("Loaded main Image: {}", target.main_image());

    let profiler = Arc::new(Profiler::new(target.clone()));

    let listener = ControlListener::bind(args.port)?;
    let addr = listener.local_addr().context("Failed to query control address")?;
    if !quiet {
        println!("listening: {addr}");
        println!("output: {}", args.output.display());
        if let Some(ref export_path) = args.export {
            println!("export: {}", export_path.display());
        }
    }

    // Setup Ctrl+C handler
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let started = Instant::now();
    let duration_limit =
        if args.duration > 0 { Some(Duration::from_secs(args.duration)) } else { None };

    // The program does not run before the controller shows up; once the
    // session ends it keeps running unobserved until Ctrl+C or the limit
    let mut phase = Phase::AwaitingController;
    let exit_reason = loop {
        match &phase {
            Phase::AwaitingController => {
                if let Some(channel) = listener.poll_accept()? {
                    let session = start_session(channel, Arc::clone(&profiler))?;
                    target.start(&profiler).context("Failed to start simulated target")?;
                    phase = Phase::Serving(session);
                    continue;
                }
            }
            Phase::Serving(session) => {
                if let Some(end) = session.try_end() {
                    let reason = match end {
                        SessionEnd::Killed => "killed by controller",
                        SessionEnd::ChannelDead => "controller disconnected",
                    };
                    info!("session ended: {reason}");
                    profiler.write_dump(&mut output).context("Failed to write session report")?;
                    if !quiet {
                        eprintln!("session ended ({reason}), target keeps running");
                    }
                    phase = Phase::Unattended;
                    continue;
                }
            }
            Phase::Unattended => {}
        }

        if let Some(limit) = duration_limit {
            if started.elapsed() >= limit {
                break "duration limit reached";
            }
        }

        tokio::select! {
            () = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = &mut ctrl_c => break "interrupted",
        }
    };
    info!("stopping: {exit_reason}");

    // Shutdown also releases a frozen workload
    target.shutdown();

    profiler.write_dump(&mut output).context("Failed to write final report")?;

    if let Some(ref export_path) = args.export {
        let file = File::create(export_path).context("Failed to create snapshot file")?;
        SnapshotExporter::from_profiler(&profiler)
            .export(BufWriter::new(file))
            .context("Failed to export snapshot")?;
        if !quiet {
            println!("saved: {}", export_path.display());
        }
    }

    if !quiet {
        eprintln!(
            "\n{}: {:.1}s, {} routines discovered, {} with hits, {} iterations",
            exit_reason,
            started.elapsed().as_secs_f64(),
            profiler.store().len(),
            profiler.snapshot().len(),
            target.iterations(),
        );
        println!("saved: {}", args.output.display());
    }

    Ok(())
}
