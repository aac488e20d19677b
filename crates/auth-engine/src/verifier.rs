//! Startup session verification.
//!
//! Answers "is the stored session still good?" with exactly four
//! outcomes. A timeout or connection failure is never treated as a
//! rejection: only an explicit auth refusal (after the pipeline's one
//! refresh attempt) invalidates the session.

use std::sync::Arc;

use client_storage::CredentialStore;

use crate::api::ApiClient;
use crate::error::{AuthError, AuthResult};
use crate::models::UserRecord;

/// Outcome of a session verification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Backend confirmed the session; carries the authoritative record.
    Fresh(UserRecord),
    /// Backend explicitly rejected the credentials.
    Invalid,
    /// Backend throttled the check; the local session stands, unverified.
    RateLimited,
    /// Backend could not be reached; no judgement on the session.
    Unreachable,
}

/// Verifies a stored session against the profile endpoint.
pub struct SessionVerifier {
    api: Arc<ApiClient>,
    credentials: Arc<CredentialStore>,
}

impl SessionVerifier {
    pub fn new(api: Arc<ApiClient>, credentials: Arc<CredentialStore>) -> Self {
        Self { api, credentials }
    }

    /// Classify the stored session.
    ///
    /// Goes through the request pipeline, so an expired-but-refreshable
    /// token is refreshed once and still verifies as `Fresh`. On a
    /// `Fresh` outcome the backend record overwrites the local cache.
    /// `Unreachable` with no cached user degrades to `Invalid`: there
    /// is nothing local to fall back on.
    pub async fn verify(&self) -> AuthResult<VerifyOutcome> {
        if !self.credentials.has_tokens()? {
            tracing::debug!("no stored credentials, nothing to verify");
            return Ok(VerifyOutcome::Invalid);
        }

        match self.api.fetch_profile().await {
            Ok(user) => {
                self.credentials.store_user(&user)?;
                tracing::info!(user_id = %user.id, "session verified");
                Ok(VerifyOutcome::Fresh(user))
            }
            Err(err) => self.classify_failure(err),
        }
    }

    fn classify_failure(&self, err: AuthError) -> AuthResult<VerifyOutcome> {
        match err {
            AuthError::RateLimited(_) => {
                tracing::warn!("verification throttled, keeping local session");
                Ok(VerifyOutcome::RateLimited)
            }
            AuthError::AuthRejected(_)
            | AuthError::InvalidCredentials(_)
            | AuthError::TokenRefresh(_)
            | AuthError::SessionInvalid(_) => {
                tracing::info!("session explicitly rejected");
                Ok(VerifyOutcome::Invalid)
            }
            // Only a local storage failure is a real error: the check
            // could not run. Everything else that is not an explicit
            // rejection is ambiguous, not a verdict on the session.
            // Timeouts, connect failures, 5xx, and garbled responses
            // from an intercepting proxy all land here.
            err @ AuthError::Storage(_) => Err(err),
            err => {
                let cached: Option<UserRecord> = self.credentials.user()?;
                if cached.is_some() {
                    tracing::warn!(error = %err, "verification inconclusive, using cached session");
                    Ok(VerifyOutcome::Unreachable)
                } else {
                    tracing::warn!(error = %err, "verification inconclusive and no cached user");
                    Ok(VerifyOutcome::Invalid)
                }
            }
        }
    }
}
