// src/error.rs
//! Application error types with structured error handling.
//!
//! Each variant names a failure class the collector or token lifecycle can
//! hit. Only two of them are ever recovered from inside the crate: rate
//! limiting (bounded sleep-and-retry) and an expired access token (one
//! refresh, then one re-run). Everything else propagates to `main`.

use crate::constants::ERROR_BODY_PREVIEW_LENGTH;
use crate::types::mask_token;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a PKCE handshake ended in the failed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeFailure {
    /// No valid callback arrived before the deadline.
    TimedOut { seconds: u64 },
    /// The callback's `state` did not match the nonce issued at start.
    StateMismatch,
    /// The callback carried a matching `state` but no `code`.
    MissingCode,
    /// The authorization server redirected back with an `error` parameter.
    ProviderDenied {
        error: String,
        description: Option<String>,
    },
    /// The waiter abandoned the handshake (e.g. Ctrl-C).
    Cancelled,
    /// The listener died without reporting a result.
    ListenerClosed,
    /// The token endpoint refused or could not be reached for the code.
    ExchangeFailed { reason: String },
    /// An operation was invoked in a state that does not allow it.
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut { seconds } => {
                write!(f, "no authorization callback within {}s", seconds)
            }
            Self::StateMismatch => write!(f, "callback state does not match the issued nonce"),
            Self::MissingCode => write!(f, "callback is missing the code parameter"),
            Self::ProviderDenied { error, description } => match description {
                Some(description) => write!(f, "authorization denied: {} ({})", error, description),
                None => write!(f, "authorization denied: {}", error),
            },
            Self::Cancelled => write!(f, "authorization was cancelled"),
            Self::ListenerClosed => write!(f, "callback listener stopped without a result"),
            Self::ExchangeFailed { reason } => write!(f, "code exchange failed: {}", reason),
            Self::InvalidTransition { operation, state } => {
                write!(f, "cannot {} while handshake is {}", operation, state)
            }
        }
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Access token rejected by {url} (401 Unauthorized); refresh required")]
    AuthExpired { url: String },

    #[error("Still rate limited after {attempts} retries; next reset in {retry_after_secs}s")]
    RateLimited { attempts: u32, retry_after_secs: u64 },

    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP {status} from {url}: {}", preview(body))]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Malformed response: {message}; payload: {}", preview(payload))]
    Protocol { message: String, payload: String },

    #[error("Token endpoint returned HTTP {status}: {}", redacted_preview(body))]
    TokenExchange { status: u16, body: String },

    #[error("Persisted state at {path} is corrupt ({reason}); refusing to reset it")]
    StateCorruption { path: PathBuf, reason: String },

    #[error("Authorization handshake failed: {0}")]
    Handshake(HandshakeFailure),

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    ValidationError(#[from] crate::types::ValidationError),
}

impl AppError {
    /// Builds a protocol error carrying the offending payload.
    pub fn protocol(message: impl Into<String>, payload: impl Into<String>) -> Self {
        AppError::Protocol {
            message: message.into(),
            payload: payload.into(),
        }
    }

    /// Whether the caller may recover by refreshing the access token.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, AppError::AuthExpired { .. })
    }
}

impl From<HandshakeFailure> for AppError {
    fn from(failure: HandshakeFailure) -> Self {
        AppError::Handshake(failure)
    }
}

// Allow converting from anyhow::Error, preserving error chain
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalError {
            message: err.to_string(),
            source: None,
        }
    }
}

impl From<tempfile::PersistError> for AppError {
    fn from(err: tempfile::PersistError) -> Self {
        AppError::Io(err.error)
    }
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW_LENGTH).collect()
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    key.contains("token") || key.contains("secret") || key == "authorization"
}

fn redact_sensitive_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_token(raw));
                        continue;
                    }
                }
                redact_sensitive_fields(nested);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_sensitive_fields),
        _ => {}
    }
}

/// Token endpoint bodies may echo secrets back; mask them before display.
/// The raw body stays on the error value for programmatic inspection.
fn redacted_preview(body: &str) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return preview(&encoded);
        }
    }
    preview(body)
}

/// Result type alias for convenience
pub type Result<T, E = AppError> = std::result::Result<T, E>;
