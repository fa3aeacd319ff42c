//! Classification of failed gateway responses into `ApiError` variants.
//!
//! Classification is total: malformed bodies, missing fields and mistyped
//! `details` entries all degrade to defaults instead of failing.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::errors::{ApiError, ApiErrorDetail};

/// Header carrying the correlation id on requests and responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Header carrying the rate-limit window in seconds.
pub const RETRY_AFTER_HEADER: &str = "retry-after";

pub const INSUFFICIENT_CREDITS: &str = "insufficient_credits";
pub const BAND_ACCESS_DENIED: &str = "band_access_denied";
pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";

/// A response with status >= 400, fully buffered.
#[derive(Clone, Debug)]
pub struct FailedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response-level signals available to the specialized constructors.
struct ResponseSignals {
    retry_after_header: Option<u64>,
}

type Constructor = fn(ApiErrorDetail, &ResponseSignals) -> ApiError;

/// Ordered by precedence: the first marker matching `type` or `code` wins.
const DISPATCH: [(&str, Constructor); 3] = [
    (INSUFFICIENT_CREDITS, insufficient_credits),
    (BAND_ACCESS_DENIED, band_access),
    (RATE_LIMIT_EXCEEDED, rate_limit),
];

/// Classifies a failed response.
pub fn classify(response: &FailedResponse) -> ApiError {
    let request_id = header_str(&response.headers, REQUEST_ID_HEADER).map(ToOwned::to_owned);
    let signals = ResponseSignals {
        retry_after_header: header_str(&response.headers, RETRY_AFTER_HEADER)
            .and_then(parse_seconds_str),
    };

    let envelope = serde_json::from_slice::<Value>(&response.body).ok();
    match envelope.as_ref().and_then(error_object) {
        Some(error) => dispatch(detail_from_error(response.status, request_id, error), &signals),
        None => ApiError::Generic(ApiErrorDetail {
            status: response.status,
            message: synthesized_message(response.status),
            request_id,
            ..ApiErrorDetail::default()
        }),
    }
}

/// Classifies an error envelope that arrived inside a stream payload.
///
/// Returns `None` when `payload` carries no `error` object.
pub(crate) fn classify_in_band(
    status: u16,
    request_id: Option<String>,
    payload: &Value,
) -> Option<ApiError> {
    let error = error_object(payload)?;
    let signals = ResponseSignals {
        retry_after_header: None,
    };
    Some(dispatch(detail_from_error(status, request_id, error), &signals))
}

fn dispatch(detail: ApiErrorDetail, signals: &ResponseSignals) -> ApiError {
    let constructor = DISPATCH
        .iter()
        .find(|(marker, _)| detail.error_type == *marker || detail.code == *marker)
        .map(|(_, constructor)| *constructor);
    match constructor {
        Some(constructor) => constructor(detail, signals),
        None => ApiError::Generic(detail),
    }
}

fn insufficient_credits(detail: ApiErrorDetail, _signals: &ResponseSignals) -> ApiError {
    let credits_required = number_field(&detail.details, "credits_required");
    let credits_remaining = number_field(&detail.details, "credits_remaining");
    let reset_date = text(detail.details.get("reset_date"));
    ApiError::InsufficientCredits {
        detail,
        credits_required,
        credits_remaining,
        reset_date,
    }
}

fn band_access(detail: ApiErrorDetail, _signals: &ResponseSignals) -> ApiError {
    let band = text(detail.details.get("band"));
    let required_tier = text(detail.details.get("required_tier"));
    let current_tier = text(detail.details.get("current_tier"));
    ApiError::BandAccess {
        detail,
        band,
        required_tier,
        current_tier,
    }
}

fn rate_limit(detail: ApiErrorDetail, signals: &ResponseSignals) -> ApiError {
    let retry_after_seconds = signals
        .retry_after_header
        .or_else(|| detail.details.get("retry_after").and_then(parse_seconds))
        .unwrap_or(0);
    ApiError::RateLimit {
        detail,
        retry_after_seconds,
    }
}

fn error_object(envelope: &Value) -> Option<&Map<String, Value>> {
    envelope.get("error").and_then(Value::as_object)
}

fn detail_from_error(
    status: u16,
    request_id: Option<String>,
    error: &Map<String, Value>,
) -> ApiErrorDetail {
    ApiErrorDetail {
        status,
        message: text(error.get("message")),
        error_type: text(error.get("type")),
        code: text(error.get("code")),
        param: text(error.get("param")),
        request_id,
        details: error
            .get("details")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}

fn synthesized_message(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status");
    format!("HTTP {status}: {reason}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn number_field(details: &Map<String, Value>, key: &str) -> f64 {
    match details.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64)),
        Value::String(s) => parse_seconds_str(s),
        _ => None,
    }
}

fn parse_seconds_str(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.ceil() as u64)
    })
}
