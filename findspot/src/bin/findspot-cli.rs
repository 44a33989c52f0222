//! # findspot-cli - Operator Console
//!
//! Connects to a findspot agent, prints its greeting, then sends every stdin
//! line as one command frame and prints the reply. Blank lines are not sent:
//! the agent does not answer empty frames.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::net::TcpStream;

use findspot::cli::ClientArgs;
use findspot_common::FrameStream;

const PROMPT: &str = "findspot> ";

fn main() {
    env_logger::init();
    std::process::exit(match run(&ClientArgs::parse()) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    });
}

fn run(args: &ClientArgs) -> Result<()> {
    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .with_context(|| format!("Failed to connect to {}:{}", args.host, args.port))?;
    let mut frames = FrameStream::new(stream);

    let greeting = frames.recv().context("Agent closed the connection before greeting")?;
    println!("{greeting}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{PROMPT}");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line.context("Failed to read stdin")?;
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        frames.send(command).context("Failed to send command")?;
        let reply = match frames.recv() {
            Ok(reply) => reply,
            Err(e) => bail!("agent connection lost: {e}"),
        };
        if !reply.is_empty() {
            print!("{reply}");
            if !reply.ends_with('\n') {
                println!();
            }
        }

        if command == "kill" {
            return Ok(());
        }
    }
}
