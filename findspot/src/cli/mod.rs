//! Command-line configuration for the agent host and the operator console

pub mod args;

pub use args::{AgentArgs, ClientArgs};
