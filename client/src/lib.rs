//! HTTP client with recommended defaults over a pooled `reqwest` engine.
//!
//! # Overview
//! `Client` issues GET and POST requests bound to a caller-supplied
//! [`Context`] and attaches any configured default headers. Every knob lives
//! in [`ClientConfig`] and is set through [`ClientBuilder`] before the engine
//! exists; zero values fall back to the documented defaults.
//!
//! # Design
//! - The connection pool is built once in `ClientBuilder::build` and shared
//!   by every clone of the `Client`.
//! - Requests are described as plain data (`RequestSpec`) before they are
//!   turned into engine requests, so URL and header validation happen before
//!   any network I/O.
//! - No retries. Engine errors are returned as-is inside
//!   `ClientError::Transport`.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod http;

pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, TlsConfig};
pub use context::{Context, ContextError};
pub use error::ClientError;
pub use http::Header;
