//! The pooled HTTP client and its builder.
//!
//! # Design
//! Options are builder methods applied in call order before the engine is
//! built; a `Client` never changes configuration afterwards. `get` and `post`
//! go through `RequestSpec` so that default headers are attached in one
//! place, while `execute` sends a caller-built request untouched.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Body, Request, Response};
use tracing::debug;

use crate::config::{ClientConfig, TlsConfig};
use crate::context::Context;
use crate::error::ClientError;
use crate::http::{Header, RequestSpec};

/// HTTP client over a shared connection pool. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    engine: reqwest::Client,
    config: ClientConfig,
}

impl Client {
    /// A client with every option at its default.
    pub fn new() -> Result<Self, ClientError> {
        Self::builder().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Build a client from an explicit config. Zero values are defaulted.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let config = config.with_defaults();
        let engine = config.engine_builder().build().map_err(ClientError::Build)?;
        debug!(
            max_idle_conns = config.max_idle_conns,
            timeout = ?config.timeout,
            http2 = config.enable_http2,
            default_headers = config.default_headers.len(),
            "http client built"
        );
        Ok(Self {
            inner: Arc::new(ClientInner { engine, config }),
        })
    }

    /// The effective, defaulted configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Issue a GET request. `headers` are sent before the configured
    /// default headers.
    pub async fn get(
        &self,
        ctx: &Context,
        url: &str,
        headers: &[Header],
    ) -> Result<Response, ClientError> {
        self.send(ctx, RequestSpec::get(url, headers)).await
    }

    /// Issue a POST request with `body`. An empty `content_type` sends no
    /// `Content-Type` header.
    pub async fn post(
        &self,
        ctx: &Context,
        url: &str,
        content_type: &str,
        body: impl Into<Body>,
        headers: &[Header],
    ) -> Result<Response, ClientError> {
        self.send(ctx, RequestSpec::post(url, content_type, body.into(), headers))
            .await
    }

    /// Send a fully built request as-is, bound to `ctx`.
    ///
    /// Default headers are not added here; build the request with
    /// [`Client::request`] to get them.
    pub async fn execute(&self, ctx: &Context, request: Request) -> Result<Response, ClientError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let method = request.method().clone();
        let url = request.url().clone();

        tokio::select! {
            biased;
            err = ctx.done() => {
                debug!(%method, %url, error = %err, "request abandoned");
                Err(err.into())
            }
            result = self.inner.engine.execute(request) => {
                match &result {
                    Ok(response) => debug!(%method, %url, status = %response.status(), "request completed"),
                    Err(err) => debug!(%method, %url, error = %err, "request failed"),
                }
                result.map_err(ClientError::Transport)
            }
        }
    }

    /// Start a request on the underlying engine, for methods or bodies not
    /// covered by `get`/`post`. The configured default headers are already
    /// attached.
    pub fn request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let url = reqwest::Url::parse(url).map_err(|source| ClientError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let mut builder = self.inner.engine.request(method, url);
        for header in &self.inner.config.default_headers {
            builder = builder.header(header.key(), header.value());
        }
        Ok(builder)
    }

    async fn send(&self, ctx: &Context, spec: RequestSpec<'_>) -> Result<Response, ClientError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        let request = spec.build(&self.inner.engine, &self.inner.config.default_headers)?;
        self.execute(ctx, request).await
    }
}

/// Builder for `Client`. Each method sets one option; later calls override
/// earlier ones, except `default_header`, which accumulates.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::unset(),
        }
    }

    pub fn max_idle_conns(mut self, max: usize) -> Self {
        self.config.max_idle_conns = max;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.config.keep_alive = interval;
        self
    }

    pub fn idle_conn_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_conn_timeout = timeout;
        self
    }

    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.tls_handshake_timeout = timeout;
        self
    }

    pub fn expect_continue_timeout(mut self, timeout: Duration) -> Self {
        self.config.expect_continue_timeout = timeout;
        self
    }

    pub fn tls_config(mut self, tls: TlsConfig) -> Self {
        self.config.tls_config = Some(tls);
        self
    }

    pub fn enable_http2(mut self, enable: bool) -> Self {
        self.config.enable_http2 = enable;
        self
    }

    /// Append a header sent with every `get`/`post` request.
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push(Header::new(key, value));
        self
    }

    /// The configuration as it stands, before defaults are applied.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build(self) -> Result<Client, ClientError> {
        Client::from_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_has_defaults() {
        let client = Client::new().unwrap();
        let config = client.config();
        assert_eq!(config.max_idle_conns, 100);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.enable_http2);
    }

    #[test]
    fn builder_options_are_applied() {
        let client = Client::builder()
            .max_idle_conns(5)
            .timeout(Duration::from_secs(1))
            .keep_alive(Duration::from_secs(2))
            .idle_conn_timeout(Duration::from_secs(3))
            .tls_handshake_timeout(Duration::from_secs(4))
            .expect_continue_timeout(Duration::from_secs(5))
            .enable_http2(false)
            .build()
            .unwrap();

        let config = client.config();
        assert_eq!(config.max_idle_conns, 5);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.keep_alive, Duration::from_secs(2));
        assert_eq!(config.idle_conn_timeout, Duration::from_secs(3));
        assert_eq!(config.tls_handshake_timeout, Duration::from_secs(4));
        assert_eq!(config.expect_continue_timeout, Duration::from_secs(5));
        assert!(!config.enable_http2);
    }

    #[test]
    fn later_option_wins() {
        let builder = Client::builder()
            .timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(7));
        assert_eq!(builder.config().timeout, Duration::from_secs(7));
    }

    #[test]
    fn zero_option_falls_back_to_default() {
        let client = Client::builder()
            .timeout(Duration::ZERO)
            .max_idle_conns(0)
            .build()
            .unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(30));
        assert_eq!(client.config().max_idle_conns, 100);
    }

    #[test]
    fn default_headers_keep_configuration_order() {
        let client = Client::builder()
            .default_header("x-b", "2")
            .default_header("x-a", "1")
            .default_header("x-b", "3")
            .build()
            .unwrap();
        let keys: Vec<_> = client
            .config()
            .default_headers
            .iter()
            .map(|h| (h.key(), h.value()))
            .collect();
        assert_eq!(keys, [("x-b", "2"), ("x-a", "1"), ("x-b", "3")]);
    }

    #[test]
    fn tls_config_is_stored() {
        let client = Client::builder()
            .tls_config(TlsConfig::new().danger_accept_invalid_certs(true))
            .build()
            .unwrap();
        let tls = client.config().tls_config.as_ref().unwrap();
        assert!(tls.accepts_invalid_certs());
    }

    #[test]
    fn request_builder_carries_default_headers() {
        let client = Client::builder().default_header("x-api", "v1").build().unwrap();
        let request = client
            .request(reqwest::Method::PUT, "http://localhost/items/1")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers()["x-api"], "v1");
    }

    #[tokio::test]
    async fn canceled_context_fails_before_io() {
        let client = Client::new().unwrap();
        let ctx = Context::background();
        ctx.cancel();
        // Port 9 on the loopback has nothing listening; the call must not get
        // far enough to find out.
        let err = client.get(&ctx, "http://127.0.0.1:9/", &[]).await.unwrap_err();
        assert!(err.is_canceled());
    }

    #[tokio::test]
    async fn malformed_url_fails_without_io() {
        let client = Client::new().unwrap();
        let err = client
            .get(&Context::background(), "::not a url::", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }
}
