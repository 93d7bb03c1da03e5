use std::error::Error as StdError;
use std::fmt;

use reqwest::{Method, StatusCode};
use serde_json::{Error as JsonError, Value};

use crate::retry::is_retryable_http_error;

/// Failure taxonomy shared by every client operation and the event stream.
#[derive(Debug)]
pub enum ApiError {
    /// The configured origin or a header value could not be turned into a request.
    InvalidBaseUrl(String),
    /// Connection, DNS, timeout, or mid-body transport failure.
    Network(String),
    /// The server answered with a non-2xx status.
    Http { status: StatusCode, message: String },
    /// A structurally-required part of the payload had the wrong shape.
    Decode(String),
    /// The server ended the event stream.
    StreamClosed,
    /// The caller cancelled the operation. Not a failure.
    Cancelled,
}

impl ApiError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status for [`ApiError::Http`] failures.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a caller-side policy may retry the request that produced this error.
    ///
    /// Transport failures are retryable for any method. Status failures are only
    /// retryable for idempotent reads, and only for transient statuses.
    #[must_use]
    pub fn is_retryable(&self, method: &Method) -> bool {
        match self {
            Self::Network(_) | Self::StreamClosed => true,
            Self::Http { status, message } => {
                *method == Method::GET && is_retryable_http_error(status.as_u16(), message)
            }
            Self::InvalidBaseUrl(_) | Self::Decode(_) | Self::Cancelled => false,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid server URL: {value}"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Http { status, message } => write!(f, "HTTP {}: {message}", status.as_u16()),
            Self::Decode(message) => write!(f, "malformed response: {message}"),
            Self::StreamClosed => write!(f, "event stream closed by server"),
            Self::Cancelled => write!(f, "request was cancelled"),
        }
    }
}

impl StdError for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::InvalidBaseUrl(error_chain(&error));
        }
        if error.is_decode() {
            return Self::Decode(error_chain(&error));
        }
        Self::Network(error_chain(&error))
    }
}

impl From<JsonError> for ApiError {
    fn from(error: JsonError) -> Self {
        Self::Decode(error.to_string())
    }
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Extract a human-readable message from a non-2xx response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = message_from_value(&value) {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn message_from_value(value: &Value) -> Option<String> {
    let candidates = [
        value.pointer("/error/message"),
        value.pointer("/data/message"),
        value.get("message"),
        value.get("error"),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(ToOwned::to_owned)
}
