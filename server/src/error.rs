//! Error types for the HTTP server lifecycle.
//!
//! Failures after a successful `start` are not represented here: they are
//! logged by the serving task and show up as `ServerState::Failed`.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

use crate::server::ServerState;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The operation is not valid in the current lifecycle state.
    #[error("cannot {op} server in state {state}")]
    InvalidState { op: &'static str, state: ServerState },

    /// The listener could not be bound (port taken, permission denied, ...).
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read bound address: {0}")]
    LocalAddr(#[source] io::Error),

    /// In-flight requests were still running when the drain deadline passed.
    #[error("graceful shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    /// The serving task panicked or was aborted.
    #[error("serving task failed: {0}")]
    Task(#[from] JoinError),
}
