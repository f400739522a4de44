// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Error taxonomy and HTTP error classification
//
// Responsibilities:
// - Library-wide `Error` enum with one variant per failure kind
// - `ApiError`: structured error reported by the API for a non-2xx response
// - Classify a non-2xx body into an `ApiError`, degrading to the raw text
//   when the body is not the documented JSON envelope

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::transport::{HttpError, HttpResponse};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error codes the API is known to return, plus the two produced locally
/// by the classifier.
pub mod codes {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const NOT_FOUND: &str = "not_found";
    pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";
    pub const SERVER_ERROR: &str = "server_error";
    pub const TIMEOUT: &str = "timeout";

    /// The error body was not the documented JSON envelope.
    pub const PARSE_ERROR: &str = "parse_error";
    /// The error body could not be read from the connection.
    pub const READ_ERROR: &str = "read_error";

    /// Type assigned to errors synthesized on the client side.
    pub const CLIENT_ERROR_TYPE: &str = "client_error";
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// All errors returned by the client.
///
/// Clean end of a stream is not an error: stream reads return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network failure, timeout, or cancellation.
    #[error(transparent)]
    Transport(#[from] HttpError),

    /// The API answered with a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// A read was attempted on a stream that already ended or was closed.
    #[error("stream is closed")]
    StreamClosed,

    /// A stream line grew past the limit without a newline; the stream
    /// was aborted.
    #[error("stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The per-event callback failed; the stream was aborted.
    #[error("stream handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the API error if this is one.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Transport(HttpError::Cancelled))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(HttpError::Timeout(_)))
    }
}

/// Structured error returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    /// HTTP status of the response that carried the error.
    #[serde(skip)]
    pub status_code: u16,
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        self.status_code == 429 || self.code == codes::RATE_LIMIT_EXCEEDED
    }

    pub fn is_authentication(&self) -> bool {
        self.status_code == 401 || self.code == codes::AUTHENTICATION_ERROR
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "moonshot api error (status {}): {} - {}",
            self.status_code, self.code, self.message
        )
    }
}

impl std::error::Error for ApiError {}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Classify an already-read error body.
///
/// A body without an `error` object, or that is not JSON at all, becomes a
/// `parse_error` whose message is the raw body text.
pub fn classify_error_body(status: u16, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError {
            code: envelope.error.code.unwrap_or_default(),
            message: envelope.error.message.unwrap_or_default(),
            error_type: envelope.error.error_type.unwrap_or_default(),
            status_code: status,
        },
        Err(_) => ApiError {
            code: codes::PARSE_ERROR.to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
            error_type: codes::CLIENT_ERROR_TYPE.to_string(),
            status_code: status,
        },
    }
}

/// Read the whole body of a non-2xx response and classify it.
pub async fn classify_response(response: HttpResponse) -> ApiError {
    let status = response.status.as_u16();
    match response.body.collect().await {
        Ok(body) => classify_error_body(status, &body),
        Err(e) => read_failure(status, e),
    }
}

/// `read_error` for an error body that could not be read in full.
pub(crate) fn read_failure(status: u16, cause: impl std::fmt::Display) -> ApiError {
    ApiError {
        code: codes::READ_ERROR.to_string(),
        message: format!("failed to read error response: {cause}"),
        error_type: codes::CLIENT_ERROR_TYPE.to_string(),
        status_code: status,
    }
}
