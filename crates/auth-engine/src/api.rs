//! HTTP client for the auth endpoints.
//!
//! All authorized traffic goes through one dispatch path that attaches
//! the stored bearer token and, on a 401, performs at most one token
//! refresh followed by at most one retry of the original request.
//! Concurrent 401s coalesce behind a single in-flight refresh: waiters
//! re-check the stored token after acquiring the gate and reuse a pair
//! another caller already rotated.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use client_storage::CredentialStore;

use crate::error::{AuthError, AuthResult};
use crate::models::{
    AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest, UserRecord,
};

/// Client for the `/api/auth` endpoints.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<CredentialStore>,
    /// Serializes token refresh so concurrent 401s share one attempt.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Create a client against `base_url` with a bounded request
    /// timeout.
    pub fn new(
        base_url: Url,
        request_timeout: Duration,
        credentials: Arc<CredentialStore>,
    ) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            credentials,
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Log in with email and password. Does not touch the credential
    /// store; the session manager persists the result.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<AuthResponse> {
        let url = self.endpoint("/api/auth/login")?;
        tracing::debug!(%url, "sending login request");

        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "login rejected");
            // A 401 on login means wrong credentials, not a stale token.
            if status == StatusCode::UNAUTHORIZED {
                return Err(AuthError::InvalidCredentials(
                    "email or password incorrect".to_string(),
                ));
            }
            return Err(AuthError::from_response(status, &body));
        }

        Ok(response.json().await.map_err(transport_error)?)
    }

    /// Register a new account. Same response shape as login.
    pub async fn register(&self, payload: &RegisterRequest) -> AuthResult<AuthResponse> {
        let url = self.endpoint("/api/auth/register")?;
        tracing::debug!(%url, role = ?payload.role, "sending register request");

        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "registration rejected");
            return Err(AuthError::from_response(status, &body));
        }

        Ok(response.json().await.map_err(transport_error)?)
    }

    /// Exchange a refresh token for a new pair. Does not store the
    /// result; callers decide what to persist.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshResponse> {
        let url = self.endpoint("/api/auth/refresh-token")?;
        tracing::debug!(%url, "sending token refresh request");

        let response = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "token refresh rejected");
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(AuthError::TokenRefresh(format!(
                    "refresh token rejected ({})",
                    status
                )));
            }
            return Err(AuthError::from_response(status, &body));
        }

        Ok(response.json().await.map_err(transport_error)?)
    }

    /// Fetch the current user's profile with the stored bearer token,
    /// refreshing once on 401.
    pub async fn fetch_profile(&self) -> AuthResult<UserRecord> {
        self.get_json("/api/auth/profile").await
    }

    /// Authorized GET returning deserialized JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AuthResult<T> {
        let response = self.dispatch_authorized(Method::GET, path, None).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_response(status, &body));
        }

        Ok(response.json().await.map_err(transport_error)?)
    }

    /// Authorized POST returning deserialized JSON.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> AuthResult<T> {
        let response = self
            .dispatch_authorized(Method::POST, path, Some(body))
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::from_response(status, &text));
        }

        Ok(response.json().await.map_err(transport_error)?)
    }

    /// Best-effort remote session invalidation. Failures are logged
    /// and swallowed so local cleanup always proceeds.
    pub async fn logout_remote(&self) {
        let refresh_token = match self.credentials.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "could not read refresh token for remote logout");
                return;
            }
        };

        let url = match self.endpoint("/api/auth/logout") {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(error = %err, "bad logout endpoint");
                return;
            }
        };

        let mut request = self.http.post(url).json(&RefreshRequest { refresh_token });
        if let Ok(Some(token)) = self.credentials.access_token() {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("remote session invalidated");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "remote logout rejected, continuing");
            }
            Err(err) => {
                tracing::warn!(error = %err, "remote logout unreachable, continuing");
            }
        }
    }

    /// Send an authorized request; on 401, refresh the token once and
    /// retry the original request once. Never more than one refresh
    /// and one retry per call.
    async fn dispatch_authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> AuthResult<reqwest::Response> {
        let token = self.credentials.access_token()?;
        let response = self
            .send_once(method.clone(), path, body, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(path, "got 401, attempting one token refresh");
        let fresh = self.refresh_stored_token(token.as_deref()).await?;
        self.send_once(method, path, body, Some(&fresh)).await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        bearer: Option<&str>,
    ) -> AuthResult<reqwest::Response> {
        let url = self.endpoint(path)?;
        let mut request = self.http.request(method, url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(transport_error)
    }

    /// Single-flight refresh of the stored pair. Returns the access
    /// token to retry with.
    ///
    /// `rejected_token` is the bearer the server just refused; if the
    /// stored token already differs once the gate is held, another
    /// caller rotated the pair while we waited and no network refresh
    /// is needed.
    async fn refresh_stored_token(&self, rejected_token: Option<&str>) -> AuthResult<String> {
        let _guard = self.refresh_gate.lock().await;

        if let Some(current) = self.credentials.access_token()? {
            if Some(current.as_str()) != rejected_token {
                tracing::debug!("token already rotated by a concurrent refresh");
                return Ok(current);
            }
        }

        let refresh_token = self
            .credentials
            .refresh_token()?
            .ok_or_else(|| AuthError::AuthRejected("no refresh token stored".to_string()))?;

        match self.refresh(&refresh_token).await {
            Ok(pair) => {
                self.credentials.store_tokens(&pair.token, &pair.refresh_token)?;
                tracing::info!("access token refreshed");
                Ok(pair.token)
            }
            Err(err) => {
                // A transient transport failure is not a revoked
                // session; keep the stored pair so a later attempt or
                // a cached-session fallback can still use it.
                if err.is_transient() {
                    tracing::warn!(error = %err, "token refresh unreachable");
                    return Err(err);
                }
                tracing::warn!(error = %err, "token refresh rejected, clearing credentials");
                self.credentials.clear_all()?;
                Err(err)
            }
        }
    }
}

/// Map reqwest transport failures onto the error taxonomy so timeouts
/// are never conflated with explicit rejection.
fn transport_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Timeout
    } else if err.is_connect() {
        AuthError::NetworkUnavailable
    } else {
        AuthError::Http(err)
    }
}
