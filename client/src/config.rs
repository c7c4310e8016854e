//! Client configuration and its defaults.

use std::time::Duration;

use reqwest::tls::Version;
use reqwest::Certificate;

use crate::error::ClientError;
use crate::http::Header;

pub const DEFAULT_MAX_IDLE_CONNS: usize = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
pub const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EXPECT_CONTINUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a `Client`.
///
/// Zero-valued counts and durations mean "use the default"; see
/// [`ClientConfig::with_defaults`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum idle keep-alive connections kept per host.
    pub max_idle_conns: usize,

    /// Time limit for a whole request, from connect to the last body byte.
    pub timeout: Duration,

    /// Interval between TCP keep-alive probes.
    pub keep_alive: Duration,

    /// How long an idle pooled connection is kept open.
    pub idle_conn_timeout: Duration,

    /// Time limit for establishing a connection, TLS handshake included.
    pub tls_handshake_timeout: Duration,

    /// Time to wait for a `100 Continue` from the server. Kept for
    /// completeness; the engine does not send `Expect: 100-continue`.
    pub expect_continue_timeout: Duration,

    pub tls_config: Option<TlsConfig>,

    /// Negotiate HTTP/2 when the server offers it. `false` pins HTTP/1.1.
    pub enable_http2: bool,

    /// Attached, in order, to every request made through `get` and `post`.
    pub default_headers: Vec<Header>,
}

impl ClientConfig {
    /// A config with every defaultable field at its zero value.
    pub(crate) fn unset() -> Self {
        Self {
            max_idle_conns: 0,
            timeout: Duration::ZERO,
            keep_alive: Duration::ZERO,
            idle_conn_timeout: Duration::ZERO,
            tls_handshake_timeout: Duration::ZERO,
            expect_continue_timeout: Duration::ZERO,
            tls_config: None,
            enable_http2: true,
            default_headers: Vec::new(),
        }
    }

    /// Replace every zero-valued field with its default, leaving the rest
    /// untouched.
    pub fn with_defaults(mut self) -> Self {
        if self.max_idle_conns == 0 {
            self.max_idle_conns = DEFAULT_MAX_IDLE_CONNS;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.keep_alive.is_zero() {
            self.keep_alive = DEFAULT_KEEP_ALIVE;
        }
        if self.idle_conn_timeout.is_zero() {
            self.idle_conn_timeout = DEFAULT_IDLE_CONN_TIMEOUT;
        }
        if self.tls_handshake_timeout.is_zero() {
            self.tls_handshake_timeout = DEFAULT_TLS_HANDSHAKE_TIMEOUT;
        }
        if self.expect_continue_timeout.is_zero() {
            self.expect_continue_timeout = DEFAULT_EXPECT_CONTINUE_TIMEOUT;
        }
        self
    }

    /// Translate the config into an engine builder.
    pub(crate) fn engine_builder(&self) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(self.max_idle_conns)
            .timeout(self.timeout)
            .tcp_keepalive(self.keep_alive)
            .pool_idle_timeout(self.idle_conn_timeout)
            .connect_timeout(self.tls_handshake_timeout);

        if !self.enable_http2 {
            builder = builder.http1_only();
        }
        if let Some(tls) = &self.tls_config {
            builder = tls.apply(builder);
        }
        builder
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::unset().with_defaults()
    }
}

/// TLS settings handed to the engine unchanged.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    root_certificates: Vec<Certificate>,
    accept_invalid_certs: bool,
    min_version: Option<Version>,
}

impl TlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust an additional root certificate.
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.root_certificates.push(cert);
        self
    }

    /// Trust an additional PEM-encoded root certificate.
    pub fn add_root_certificate_pem(self, pem: &[u8]) -> Result<Self, ClientError> {
        let cert = Certificate::from_pem(pem).map_err(ClientError::Build)?;
        Ok(self.add_root_certificate(cert))
    }

    /// Skip certificate verification. Only for tests against self-signed
    /// servers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn min_version(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }

    pub fn root_certificates(&self) -> &[Certificate] {
        &self.root_certificates
    }

    pub fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    fn apply(&self, mut builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        for cert in &self.root_certificates {
            builder = builder.add_root_certificate(cert.clone());
        }
        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(version) = self.min_version {
            builder = builder.min_tls_version(version);
        }
        builder
    }
}
