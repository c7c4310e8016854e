//! Request description and header types.
//!
//! # Design
//! `RequestSpec` describes a request as plain data. `build` is the only
//! place that turns it into an engine request, so URL parsing, header
//! validation and header ordering are decided here and nowhere else.
//!
//! Headers are appended, never set: per-call headers go first, configured
//! default headers after them in configuration order, and a key present in
//! both lists is transmitted with both values.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Method, Url};

use crate::error::ClientError;

/// An immutable header key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    key: String,
    value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for Header {
    fn from((key, value): (K, V)) -> Self {
        Header::new(key, value)
    }
}

/// A request described as plain data, before it touches the engine.
#[derive(Debug)]
pub(crate) struct RequestSpec<'a> {
    pub method: Method,
    pub url: &'a str,
    /// Skipped when empty.
    pub content_type: &'a str,
    pub body: Option<Body>,
    pub headers: &'a [Header],
}

impl<'a> RequestSpec<'a> {
    pub fn get(url: &'a str, headers: &'a [Header]) -> Self {
        RequestSpec {
            method: Method::GET,
            url,
            content_type: "",
            body: None,
            headers,
        }
    }

    pub fn post(url: &'a str, content_type: &'a str, body: Body, headers: &'a [Header]) -> Self {
        RequestSpec {
            method: Method::POST,
            url,
            content_type,
            body: Some(body),
            headers,
        }
    }

    pub fn build(
        self,
        engine: &reqwest::Client,
        default_headers: &[Header],
    ) -> Result<reqwest::Request, ClientError> {
        let url = Url::parse(self.url).map_err(|source| ClientError::InvalidUrl {
            url: self.url.to_string(),
            source,
        })?;

        let mut builder = engine.request(self.method, url);
        if !self.content_type.is_empty() {
            builder = builder.header(CONTENT_TYPE, self.content_type);
        }
        for header in self.headers.iter().chain(default_headers) {
            builder = builder.header(header.key(), header.value());
        }
        if let Some(body) = self.body {
            builder = builder.body(body);
        }

        builder.build().map_err(ClientError::InvalidRequest)
    }
}
