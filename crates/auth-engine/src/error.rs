//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid email or password at login
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Server explicitly rejected the bearer token (401/403)
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// Request payload rejected with field-level messages (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate resource, e.g. email already registered (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server-side throttling (429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Session not found
    #[error("Not logged in")]
    NotLoggedIn,

    /// Session was invalidated server-side (revoked, logged out elsewhere, etc.)
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// Non-auth server failure (5xx); transient, never a rejection
    #[error("Server error: {0}")]
    ServerError(String),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Biometric assertion failed or is unavailable
    #[error("Biometric assertion failed: {0}")]
    Biometric(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] client_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be
    /// retried without re-authenticating.
    ///
    /// Transient errors include:
    /// - Network unavailable
    /// - Connection timeouts
    /// - HTTP errors with 5xx status codes
    /// - Server-side rate limiting
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable => true,
            AuthError::Timeout => true,
            AuthError::RateLimited(_) => true,
            AuthError::ServerError(_) => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }

    /// Classify a non-success HTTP response into the error taxonomy.
    ///
    /// The body is kept for logging and (where safe) user display; 4xx
    /// classes map onto distinct variants so callers can branch on them
    /// without re-parsing status codes.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = extract_message(body).unwrap_or_else(|| format!("HTTP {}", status));
        match status.as_u16() {
            400 => AuthError::Validation(detail),
            401 | 403 => AuthError::AuthRejected(detail),
            409 => AuthError::Conflict(detail),
            429 => AuthError::RateLimited(detail),
            500..=599 => AuthError::ServerError(detail),
            _ => AuthError::AuthRejected(detail),
        }
    }

    /// A single stable user-facing string for this error.
    ///
    /// This is the only form in which login/register failures cross the
    /// session-manager boundary; raw transport errors never leak to the
    /// UI layer.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials(_) | AuthError::AuthRejected(_) => {
                "Invalid email or password. Please try again.".to_string()
            }
            AuthError::Validation(detail) => detail.clone(),
            AuthError::Conflict(_) => {
                "An account with this email already exists. Try logging in instead, or use a different email.".to_string()
            }
            AuthError::RateLimited(_) => {
                "Too many attempts. Please wait a moment and try again.".to_string()
            }
            AuthError::Storage(_) => {
                "Could not save your session on this device. Please try again.".to_string()
            }
            AuthError::Biometric(_) => {
                "Biometric verification failed.".to_string()
            }
            AuthError::NotLoggedIn => "You are not logged in.".to_string(),
            AuthError::NetworkUnavailable
            | AuthError::Timeout
            | AuthError::ServerError(_)
            | AuthError::Http(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Backends return either `{"message": "..."}` or
/// `{"errors": [{"msg": "..."}]}`; anything else falls through to None.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }

    if let Some(errors) = value.get("errors").and_then(|e| e.as_array()) {
        let msgs: Vec<&str> = errors
            .iter()
            .filter_map(|e| e.get("msg").and_then(|m| m.as_str()))
            .collect();
        if !msgs.is_empty() {
            return Some(msgs.join("; "));
        }
    }

    None
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
