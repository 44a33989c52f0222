//! Structured error types for findspot
//!
//! Using thiserror for automatic Display implementation and error chaining.

use findspot_common::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// The host rejected the stop-the-world request; the command was not run.
    #[error("failed to freeze, dropping command")]
    FreezeFailed,

    #[error("Failed to bind control port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept controller connection: {0}")]
    AcceptFailed(#[source] std::io::Error),

    #[error("Failed to spawn control thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize snapshot: {0}")]
    Json(#[from] serde_json::Error),
}
