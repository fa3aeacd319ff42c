use std::time::Duration;

use reqwest::Method;
use serde::Serialize;

use crate::abort::AbortSignal;
use crate::errors::ClientError;

/// Per-call knobs accepted by every entry point.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
    /// Deadline for this call; overrides the client default.
    pub timeout: Option<Duration>,
    /// Correlation id to send; a UUID v4 is generated when absent.
    pub request_id: Option<String>,
    /// Extra headers, applied over the defaults (caller wins).
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
    /// Cancellation signal checked before the request and before each stream read.
    pub abort: Option<AbortSignal>,
}

impl CallOptions {
    /// Sets the per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the correlation id.
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Adds a header override.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Attaches a cancellation signal.
    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }
}

/// One HTTP call to the gateway.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) options: CallOptions,
}

impl OutboundRequest {
    /// Creates a request for `method` and a path relative to the base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            options: CallOptions::default(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Serializes `body` as the JSON payload.
    ///
    /// Serialization failures are reported here, before anything is sent.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let value =
            serde_json::to_value(body).map_err(|e| ClientError::Serialize(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Replaces the per-call options.
    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the correlation id.
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.options.request_id = Some(id.into());
        self
    }

    /// Adds a header override.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((name.into(), value.into()));
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path relative to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the serialized body, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.path.trim().is_empty() {
            return Err(ClientError::validation("path", "must not be empty"));
        }
        if self.path.contains("://") {
            return Err(ClientError::validation(
                "path",
                "must be relative to the configured base URL",
            ));
        }
        if let Some(id) = &self.options.request_id
            && id.trim().is_empty()
        {
            return Err(ClientError::validation("request_id", "must not be blank"));
        }
        Ok(())
    }
}
