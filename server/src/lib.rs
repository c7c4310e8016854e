//! HTTP server with sensible defaults and a bounded graceful shutdown.
//!
//! # Overview
//! `Server` binds a TCP listener, serves an `axum::Router` on a background
//! task and shuts down on an interrupt signal, a cancelled stop token or an
//! explicit `stop`, giving in-flight requests up to `shutdown_timeout` to
//! finish.
//!
//! # Design
//! - `Server::new` never touches the network; `start` binds and returns as
//!   soon as the listener exists.
//! - Each server walks `NotStarted -> Starting -> Running -> Stopping ->
//!   Stopped` once. A second `start` is an error, not a hang.
//! - Running out of descriptors pauses accepting instead of ending it.
//!   Other errors after startup are logged and surface only as
//!   `ServerState::Failed`.

pub mod config;
pub mod error;
mod listener;
pub mod server;

pub use config::{ServerConfig, ServerTlsConfig};
pub use error::ServerError;
pub use server::{Server, ServerState};
