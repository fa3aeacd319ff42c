use std::time::Duration;

/// Local validation failure detected before any network I/O.
///
/// Never produced from a gateway response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field (for example `model` or `headers`).
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Fields shared by every error classified from a gateway response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiErrorDetail {
    /// HTTP status of the failed response.
    pub status: u16,
    /// Message from the envelope, or a synthesized `HTTP <status>: <reason>`.
    pub message: String,
    /// Envelope `type` (empty when absent).
    pub error_type: String,
    /// Envelope `code` (empty when absent).
    pub code: String,
    /// Envelope `param` (empty when absent).
    pub param: String,
    /// Correlation id echoed by the server.
    pub request_id: Option<String>,
    /// Provider-specific structured detail.
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Typed error classified from a failed gateway response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Any failure without a more specific classification.
    #[error("gateway error (status {}): {}", .0.status, .0.message)]
    Generic(ApiErrorDetail),
    /// The account lacks the credits needed for the request.
    #[error("insufficient credits (status {}): {}", .detail.status, .detail.message)]
    InsufficientCredits {
        detail: ApiErrorDetail,
        credits_required: f64,
        credits_remaining: f64,
        reset_date: String,
    },
    /// The caller's tier does not grant access to the requested model band.
    #[error("band access denied (status {}): {}", .detail.status, .detail.message)]
    BandAccess {
        detail: ApiErrorDetail,
        band: String,
        required_tier: String,
        current_tier: String,
    },
    /// The caller was throttled; `retry_after_seconds` is zero when unknown.
    #[error("rate limit exceeded (retry after {retry_after_seconds}s): {}", .detail.message)]
    RateLimit {
        detail: ApiErrorDetail,
        retry_after_seconds: u64,
    },
}

impl ApiError {
    /// Returns the shared envelope fields.
    pub fn detail(&self) -> &ApiErrorDetail {
        match self {
            Self::Generic(detail)
            | Self::InsufficientCredits { detail, .. }
            | Self::BandAccess { detail, .. }
            | Self::RateLimit { detail, .. } => detail,
        }
    }

    pub(crate) fn detail_mut(&mut self) -> &mut ApiErrorDetail {
        match self {
            Self::Generic(detail)
            | Self::InsufficientCredits { detail, .. }
            | Self::BandAccess { detail, .. }
            | Self::RateLimit { detail, .. } => detail,
        }
    }

    /// Returns the HTTP status of the failed response.
    pub fn status(&self) -> u16 {
        self.detail().status
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.detail().message
    }

    /// Returns the correlation id: the server echo, else the id that was sent.
    pub fn request_id(&self) -> Option<&str> {
        self.detail().request_id.as_deref()
    }

    /// Returns the server-advised backoff for rate-limit errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit {
                retry_after_seconds,
                ..
            } if *retry_after_seconds > 0 => Some(Duration::from_secs(*retry_after_seconds)),
            _ => None,
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Request rejected locally before any network I/O.
    #[error(transparent)]
    Validation(ValidationError),
    /// Request body could not be serialized.
    #[error("failed to serialize request body: {0}")]
    Serialize(String),
    /// No response from the server (connect, DNS, I/O).
    #[error("transport error: {0}")]
    Transport(String),
    /// The request deadline elapsed, during the handshake or mid-stream.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The call was aborted by the caller.
    #[error("cancelled")]
    Cancelled,
    /// The gateway returned an error response.
    #[error(transparent)]
    Api(ApiError),
    /// A stream payload or success body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The stream violated its protocol (for example it ended early).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Maps a reqwest failure to a transport-class error.
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Returns the classified API error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Local errors, decode errors and client-side API errors are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Api(ApiError::RateLimit { .. }) => true,
            Self::Api(ApiError::Generic(detail)) => detail.status >= 500 || detail.status == 408,
            _ => false,
        }
    }

    /// Server-advised backoff, when the gateway supplied one.
    pub fn retry_after(&self) -> Option<Duration> {
        self.api_error().and_then(ApiError::retry_after)
    }
}

impl From<ValidationError> for ClientError {
    fn from(value: ValidationError) -> Self {
        ClientError::Validation(value)
    }
}

impl From<ApiError> for ClientError {
    fn from(value: ApiError) -> Self {
        ClientError::Api(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(status: u16) -> ApiErrorDetail {
        ApiErrorDetail {
            status,
            message: "boom".into(),
            ..ApiErrorDetail::default()
        }
    }

    #[test]
    fn retry_after_only_for_rate_limits_with_a_window() {
        let limited = ClientError::Api(ApiError::RateLimit {
            detail: detail(429),
            retry_after_seconds: 30,
        });
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(30)));
        assert!(limited.is_retryable());

        let unknown_window = ClientError::Api(ApiError::RateLimit {
            detail: detail(429),
            retry_after_seconds: 0,
        });
        assert_eq!(unknown_window.retry_after(), None);
    }

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(ClientError::Api(ApiError::Generic(detail(503))).is_retryable());
        assert!(!ClientError::Api(ApiError::Generic(detail(400))).is_retryable());
        assert!(!ClientError::validation("model", "must not be empty").is_retryable());
        assert!(!ClientError::decode("bad json").is_retryable());
        assert!(ClientError::Timeout("deadline".into()).is_retryable());
    }

    #[test]
    fn display_includes_status_and_message() {
        let err = ClientError::Api(ApiError::Generic(detail(500)));
        assert_eq!(err.to_string(), "gateway error (status 500): boom");
        let err = ClientError::validation("headers", "bad name");
        assert_eq!(err.to_string(), "invalid headers: bad name");
    }
}
