//! HTTP exchange with the remote end.
//!
//! The protocol client never talks to `reqwest` directly; it goes through
//! [`Transport`] so the wire layer can be replaced in tests.

use crate::{DriverConfig, Error, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

/// HTTP methods used by the WebDriver wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Raw status + body as returned by the remote end
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the `{ "value": ... }` envelope.
    pub fn value(&self, command: &'static str) -> Result<Value> {
        let mut envelope: Value =
            serde_json::from_slice(&self.body).map_err(|e| Error::decode(command, e))?;
        match envelope.get_mut("value") {
            Some(v) => Ok(v.take()),
            None => Err(Error::decode(command, "missing `value` field")),
        }
    }

    /// Best-effort extraction of `value.message` from an error body.
    pub fn error_message(&self) -> Option<String> {
        let body: Value = serde_json::from_slice(&self.body).ok()?;
        body.get("value")?
            .get("message")?
            .as_str()
            .map(|s| s.to_string())
    }
}

/// One request/response exchange with the remote end.
///
/// `path` is relative to the endpoint base URL and always starts with `/`.
/// Implementations report connection-level failures as [`Error::Transport`]
/// and must not interpret the status code.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        command: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<WireResponse>;

    /// Like [`Transport::send`], but the exchange must finish within
    /// `timeout`. Used by waits so one slow check cannot outlive the deadline.
    fn send_within(
        &self,
        command: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<WireResponse> {
        let _ = timeout;
        self.send(command, method, path, body)
    }
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &DriverConfig) -> Result<Self> {
        let base = url::Url::parse(&config.base_url).map_err(|e| {
            Error::InvalidArgument(format!("invalid base url '{}': {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .map_err(|e| Error::Transport {
                command: "build http client",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn exchange(
        &self,
        command: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<WireResponse> {
        let url = format!("{}{}", self.base_url, path);
        let req = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        let req = match body {
            Some(b) => req.json(b),
            None => req,
        };
        // overrides the client-wide timeout for this request only
        let req = match timeout {
            Some(t) => req.timeout(t),
            None => req,
        };

        let res = req.send().map_err(|e| Error::Transport {
            command,
            message: e.to_string(),
        })?;
        let status = res.status().as_u16();
        let body = res.bytes().map_err(|e| Error::Transport {
            command,
            message: format!("failed to read response body: {}", e),
        })?;

        log::debug!("{} {} -> {}", method.as_str(), path, status);

        Ok(WireResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        command: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<WireResponse> {
        self.exchange(command, method, path, body, None)
    }

    fn send_within(
        &self,
        command: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<WireResponse> {
        self.exchange(command, method, path, body, Some(timeout))
    }
}
