//! Server configuration and its defaults.

use std::time::Duration;

pub const DEFAULT_ADDR: &str = "localhost";
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_HEADER_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on. 0 lets the OS pick a free port.
    pub port: u16,

    /// Host name or IP address to bind.
    pub addr: String,

    /// Recorded but not acted on: the server always speaks plain HTTP.
    pub enable_tls: bool,
    pub tls: Option<ServerTlsConfig>,

    /// Upper bound on how long `stop` waits for in-flight requests.
    pub shutdown_timeout: Duration,

    /// Time allowed for a client to send the request line and headers.
    pub read_header_timeout: Duration,

    /// Time allowed for a client to send the request body.
    pub read_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerTlsConfig {
    pub port: u16,
}

impl ServerConfig {
    /// Replace every empty or zero-duration field with its default.
    pub fn with_defaults(mut self) -> Self {
        if self.addr.is_empty() {
            self.addr = DEFAULT_ADDR.to_string();
        }
        if self.shutdown_timeout.is_zero() {
            self.shutdown_timeout = DEFAULT_SHUTDOWN_TIMEOUT;
        }
        if self.read_header_timeout.is_zero() {
            self.read_header_timeout = DEFAULT_READ_HEADER_TIMEOUT;
        }
        if self.read_timeout.is_zero() {
            self.read_timeout = DEFAULT_READ_TIMEOUT;
        }
        self
    }

    /// The host to bind, with any IPv6 brackets removed.
    pub fn host(&self) -> &str {
        self.addr
            .strip_prefix('[')
            .and_then(|addr| addr.strip_suffix(']'))
            .unwrap_or(&self.addr)
    }

    /// `addr:port` as configured, for logs and errors.
    pub fn bind_address(&self) -> String {
        if self.addr.contains(':') && !self.addr.starts_with('[') {
            format!("[{}]:{}", self.addr, self.port)
        } else {
            format!("{}:{}", self.addr, self.port)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            addr: DEFAULT_ADDR.to_string(),
            enable_tls: false,
            tls: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            read_header_timeout: DEFAULT_READ_HEADER_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}
