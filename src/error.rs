//! Error types for the dev2gis client

use crate::validators::ValidationError;
use serde_json::Value;
use thiserror::Error;

/// Message surfaced when a request is rejected after the one refresh-and-retry cycle
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";

/// Client error types
///
/// Every failure of an outbound call is normalized into one of these variants.
/// [`ClientError::status`] reports `0` for failures that never produced an HTTP response.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Malformed response (status {status}): {message}")]
    MalformedResponse { status: u16, message: String },

    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,

    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Job {id} did not finish after {attempts} status checks")]
    PollTimeout { id: String, attempts: u32 },
}

impl ClientError {
    /// Numeric status code, `0` when no HTTP response was involved
    pub fn status(&self) -> u16 {
        match self {
            ClientError::Http { status, .. } | ClientError::MalformedResponse { status, .. } => {
                *status
            }
            ClientError::SessionExpired | ClientError::Refresh(_) => 401,
            _ => 0,
        }
    }

    /// Human-readable message suitable for showing to a user
    pub fn message(&self) -> String {
        match self {
            ClientError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }

    /// Build an HTTP error from a response body and its status
    pub fn from_response(status: u16, body: &Value) -> Self {
        ClientError::Http {
            status,
            message: extract_error_message(body, status),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

/// Failure of the shared refresh procedure
///
/// Cloneable so the single outcome can be handed to every waiting caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("network error during refresh: {0}")]
    Network(String),

    #[error("malformed refresh response: {0}")]
    Malformed(String),

    #[error("could not persist refreshed tokens: {0}")]
    Storage(String),
}

/// Pick the server-provided message from an error body, falling back to a
/// canonical message for the status code
pub fn extract_error_message(body: &Value, status: u16) -> String {
    ["error", "message", "detail"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|message| !message.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| canonical_message(status).to_string())
}

/// Canonical message for an HTTP status code
pub fn canonical_message(status: u16) -> &'static str {
    match status {
        400 => "Invalid input data",
        401 => "Invalid credentials",
        403 => "Access forbidden",
        404 => "Resource not found",
        409 => "Resource already exists",
        422 => "Validation failed",
        429 => "Too many requests, please try again later",
        500 => "Internal server error",
        503 => "Service temporarily unavailable",
        _ => "Something went wrong, please try again",
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
