//! Session lifecycle orchestration.
//!
//! `SessionManager` owns the authoritative in-memory session state and
//! drives it through an explicit FSM rather than deriving it from
//! storage checks. Transient states (logging in, validating, logging
//! out) live only in the FSM; tokens and the cached user live in the
//! credential store and are mirrored here on every mutation.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use client_storage::CredentialStore;

use crate::api::ApiClient;
use crate::biometric::{BiometricCapability, BiometricProvider};
use crate::error::{AuthError, AuthResult};
use crate::fsm::{
    SessionMachine, SessionMachineInput, SessionState, SessionStateChangedPayload,
};
use crate::models::{RegisterRequest, UserRecord};
use crate::token::TokenProvider;
use crate::verifier::{SessionVerifier, VerifyOutcome};

/// Callback type for session state change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionStateChangedPayload) + Send + Sync>;

/// Point-in-time view of the session for consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub is_authenticated: bool,
    pub is_stale: bool,
    pub is_loading: bool,
    pub is_initializing: bool,
    pub user: Option<UserRecord>,
    pub error: Option<String>,
}

/// Mutable session fields guarded together.
struct SessionFields {
    user: Option<UserRecord>,
    error: Option<String>,
    is_loading: bool,
    is_initializing: bool,
}

/// Session manager with FSM-based state tracking.
pub struct SessionManager {
    api: Arc<ApiClient>,
    credentials: Arc<CredentialStore>,
    tokens: TokenProvider,
    verifier: SessionVerifier,
    biometrics: Box<dyn BiometricProvider>,
    /// Internal FSM for tracking session state transitions.
    fsm: Mutex<SessionMachine>,
    fields: Mutex<SessionFields>,
    /// Optional callback for state change notifications.
    state_callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionManager {
    pub fn new(
        api: Arc<ApiClient>,
        credentials: Arc<CredentialStore>,
        biometrics: Box<dyn BiometricProvider>,
    ) -> Self {
        Self {
            tokens: TokenProvider::new(credentials.clone()),
            verifier: SessionVerifier::new(api.clone(), credentials.clone()),
            api,
            credentials,
            biometrics,
            fsm: Mutex::new(SessionMachine::new()),
            fields: Mutex::new(SessionFields {
                user: None,
                error: None,
                is_loading: false,
                is_initializing: true,
            }),
            state_callback: Mutex::new(None),
        }
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        let mut cb = self.state_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Current FSM state.
    pub fn state(&self) -> SessionState {
        let fsm = self.fsm.lock().unwrap();
        SessionState::from(fsm.state())
    }

    /// Point-in-time view for consumers.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        let fields = self.fields.lock().unwrap();
        SessionSnapshot {
            is_authenticated: state.is_authenticated(),
            is_stale: state.is_stale(),
            state,
            is_loading: fields.is_loading,
            is_initializing: fields.is_initializing,
            user: fields.user.clone(),
            error: fields.error.clone(),
        }
    }

    /// The stored access token, without any network call.
    pub fn access_token(&self) -> AuthResult<Option<String>> {
        self.tokens.access_token()
    }

    /// Log in with email and password.
    ///
    /// On success the token pair and user record are persisted
    /// together and the session becomes authenticated. On failure any
    /// partial credentials are cleared and the surfaced error text is
    /// the stable user-facing message, never a raw transport error.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<UserRecord> {
        self.transition(&SessionMachineInput::LoginAttempt)?;
        self.set_loading(true);

        let result = self.api.login(email, password).await;
        match self.settle_authentication(result) {
            Ok(user) => {
                info!(user_id = %user.id, "login successful");
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, "login failed");
                Err(err)
            }
        }
    }

    /// Register a new account. Same contract as [`Self::login`]; a
    /// duplicate email surfaces as a distinct, actionable message.
    pub async fn register(&self, payload: RegisterRequest) -> AuthResult<UserRecord> {
        self.transition(&SessionMachineInput::RegisterAttempt)?;
        self.set_loading(true);

        let result = self.api.register(&payload).await;
        match self.settle_authentication(result) {
            Ok(user) => {
                info!(user_id = %user.id, "registration successful");
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, "registration failed");
                Err(err)
            }
        }
    }

    /// Settle a login/register attempt from `LoggingIn`/`Registering`.
    ///
    /// The FSM always leaves the transient state: a successful response
    /// whose persistence fails is driven through `LoginFailed` like any
    /// other failure, so a storage fault can never wedge the machine.
    fn settle_authentication(
        &self,
        result: AuthResult<crate::models::AuthResponse>,
    ) -> AuthResult<UserRecord> {
        let persisted = result.and_then(|resp| {
            self.credentials
                .store_tokens(&resp.token, &resp.refresh_token)?;
            self.credentials.store_user(&resp.user)?;
            Ok(resp.user)
        });

        match persisted {
            Ok(user) => {
                self.adopt_user(user.clone());
                self.transition(&SessionMachineInput::LoginSuccess)?;
                self.enforce_session_integrity()?;
                Ok(user)
            }
            Err(err) => {
                let _ = self.credentials.clear_all();
                self.fail_pending(&err);
                self.transition(&SessionMachineInput::LoginFailed)?;
                Err(err)
            }
        }
    }

    /// Verify the stored session and settle the startup state.
    ///
    /// Drives `is_initializing` from true to false exactly once per
    /// lifecycle; downstream consumers gate on that edge. The verifier
    /// outcome maps onto the four validation transitions:
    /// fresh profile, explicit rejection, throttled, unreachable.
    pub async fn check_auth_status(&self) -> AuthResult<SessionState> {
        self.transition(&SessionMachineInput::ValidateSession)?;
        self.set_loading(true);

        let outcome = match self.verifier.verify().await {
            Ok(outcome) => outcome,
            Err(err) => {
                // The check could not run (storage fault). The stored
                // pair stays put; settle the FSM so the check can be
                // retried, and degrade to stale when a session is held
                // in memory.
                warn!(error = %err, "session verification errored, keeping stored session");
                let has_user = self.fields.lock().unwrap().user.is_some();
                let settle = if has_user {
                    SessionMachineInput::Unreachable
                } else {
                    SessionMachineInput::NoSession
                };
                let _ = self.transition(&settle);
                self.fail_pending(&err);
                self.finish_initializing();
                return Err(err);
            }
        };

        // Transition first: from Validating each settling input is
        // always legal, so a fallible effect afterwards can no longer
        // strand the machine mid-validation.
        let (state, effect) = match outcome {
            VerifyOutcome::Fresh(user) => {
                self.adopt_user(user);
                (self.transition(&SessionMachineInput::ProfileFresh)?, Ok(()))
            }
            VerifyOutcome::Invalid => {
                let state = self.transition(&SessionMachineInput::TokenRejected)?;
                self.drop_user();
                let effect = self.credentials.clear_all().map_err(AuthError::from);
                (state, effect)
            }
            VerifyOutcome::RateLimited => {
                let state = self.transition(&SessionMachineInput::Throttled)?;
                (state, self.adopt_cached_user())
            }
            VerifyOutcome::Unreachable => {
                let state = self.transition(&SessionMachineInput::Unreachable)?;
                (state, self.adopt_cached_user())
            }
        };

        self.finish_initializing();
        effect?;
        if state.is_authenticated() {
            self.enforce_session_integrity()?;
        }
        Ok(self.state())
    }

    /// Log out.
    ///
    /// Remote invalidation is best-effort and never blocks local
    /// cleanup: after this resolves, no token, refresh token, or user
    /// data remains, even if the backend call failed.
    pub async fn logout(&self) -> AuthResult<()> {
        let _ = self.transition(&SessionMachineInput::LogoutRequested);

        self.api.logout_remote().await;

        // Settle the FSM before surfacing a cleanup failure so a
        // storage fault cannot strand the machine in LoggingOut.
        let cleared = self.credentials.clear_all();
        self.drop_user();
        let _ = self.transition(&SessionMachineInput::LogoutComplete);

        cleared?;
        info!("logged out");
        Ok(())
    }

    /// Log in via a local biometric assertion over stored credentials.
    ///
    /// The assertion must positively succeed before the stored
    /// credentials are used; an unavailable capability, a disabled
    /// enrollment, or a failed assertion never falls through to a
    /// credential release.
    pub async fn login_with_biometrics(&self) -> AuthResult<SessionState> {
        if self.biometrics.capability() == BiometricCapability::Unavailable {
            return Err(AuthError::Biometric(
                "biometric hardware unavailable".to_string(),
            ));
        }
        if !self.credentials.biometric_enabled()? {
            return Err(AuthError::Biometric(
                "biometric login not enabled for this account".to_string(),
            ));
        }
        if !self.credentials.has_tokens()? {
            return Err(AuthError::NotLoggedIn);
        }

        self.biometrics.authenticate("Unlock your session")?;
        debug!("biometric assertion succeeded, verifying stored session");

        let state = self.check_auth_status().await?;
        if !state.is_authenticated() {
            return Err(AuthError::SessionInvalid(
                "stored session no longer valid".to_string(),
            ));
        }
        Ok(state)
    }

    /// Opt the account in or out of biometric login.
    pub fn set_biometric_enabled(&self, enabled: bool) -> AuthResult<()> {
        if enabled && self.biometrics.capability() == BiometricCapability::Unavailable {
            return Err(AuthError::Biometric(
                "biometric hardware unavailable".to_string(),
            ));
        }
        Ok(self.credentials.set_biometric_enabled(enabled)?)
    }

    /// Transition the FSM and notify the callback if the state changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionState> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_state = SessionState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = SessionState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "session state transition");
            self.notify_state_change(&new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: &SessionState) {
        let cb = self.state_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            let (user_id, email) = {
                let fields = self.fields.lock().unwrap();
                match fields.user.as_ref() {
                    Some(user) => (Some(user.id.clone()), user.email.clone()),
                    None => (None, None),
                }
            };

            callback(SessionStateChangedPayload {
                state: state.clone(),
                user_id,
                email,
            });
        }
    }

    /// An authenticated state requires a stored token pair and a user
    /// record both in memory and in the store; any deviation forces a
    /// local logout rather than limping along half-authenticated.
    fn enforce_session_integrity(&self) -> AuthResult<()> {
        let pair_ok = self.credentials.token_pair()?.is_some();
        let user_in_memory = self.fields.lock().unwrap().user.is_some();
        let user_in_store = self.credentials.has_user()?;

        if pair_ok && user_in_memory && user_in_store {
            return Ok(());
        }

        warn!(
            pair_ok,
            user_in_memory, user_in_store, "session integrity violated, forcing logout"
        );
        let _ = self.credentials.clear_all();
        self.drop_user();
        let _ = self.transition(&SessionMachineInput::LogoutRequested);
        let _ = self.transition(&SessionMachineInput::LogoutComplete);
        Err(AuthError::SessionInvalid(
            "inconsistent session state".to_string(),
        ))
    }

    fn adopt_user(&self, user: UserRecord) {
        let mut fields = self.fields.lock().unwrap();
        fields.user = Some(user);
        fields.error = None;
        fields.is_loading = false;
    }

    /// Pull the cached user into memory for stale sessions.
    fn adopt_cached_user(&self) -> AuthResult<()> {
        let cached: Option<UserRecord> = self.credentials.user()?;
        let mut fields = self.fields.lock().unwrap();
        fields.user = cached;
        fields.is_loading = false;
        Ok(())
    }

    fn drop_user(&self) {
        let mut fields = self.fields.lock().unwrap();
        fields.user = None;
        fields.error = None;
        fields.is_loading = false;
    }

    fn fail_pending(&self, err: &AuthError) {
        let mut fields = self.fields.lock().unwrap();
        fields.error = Some(err.user_message());
        fields.is_loading = false;
    }

    fn set_loading(&self, loading: bool) {
        let mut fields = self.fields.lock().unwrap();
        fields.is_loading = loading;
        if loading {
            fields.error = None;
        }
    }

    fn finish_initializing(&self) {
        let mut fields = self.fields.lock().unwrap();
        if fields.is_initializing {
            fields.is_initializing = false;
            debug!("session initialization settled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_storage::{SecureStorage, StorageResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    struct MemoryStorage {
        data: Mutex<HashMap<String, String>>,
    }

    impl MemoryStorage {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    impl SecureStorage for MemoryStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    fn create_test_manager() -> SessionManager {
        let credentials = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
        let api = Arc::new(
            ApiClient::new(
                Url::parse("http://127.0.0.1:9").unwrap(),
                Duration::from_millis(200),
                credentials.clone(),
            )
            .unwrap(),
        );
        SessionManager::new(api, credentials, Box::new(crate::biometric::NoopBiometrics))
    }

    #[test]
    fn test_initial_state() {
        let manager = create_test_manager();
        assert_eq!(manager.state(), SessionState::NotLoggedIn);

        let snap = manager.snapshot();
        assert!(!snap.is_authenticated);
        assert!(!snap.is_stale);
        assert!(!snap.is_loading);
        assert!(snap.is_initializing);
        assert!(snap.user.is_none());
        assert!(snap.error.is_none());
    }

    #[test]
    fn test_access_token_none_when_logged_out() {
        let manager = create_test_manager();
        assert_eq!(manager.access_token().unwrap(), None);
    }

    #[test]
    fn test_state_callback_invoked_on_transition() {
        let manager = create_test_manager();
        let callback_count = Arc::new(AtomicUsize::new(0));
        let callback_count_clone = callback_count.clone();

        manager.set_state_callback(Box::new(move |_payload| {
            callback_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        manager
            .transition(&SessionMachineInput::LoginAttempt)
            .unwrap();
        manager
            .transition(&SessionMachineInput::LoginFailed)
            .unwrap();

        assert_eq!(callback_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_transition_is_error() {
        let manager = create_test_manager();
        let err = manager
            .transition(&SessionMachineInput::LogoutComplete)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn test_logout_when_not_logged_in_is_total() {
        let manager = create_test_manager();
        manager.logout().await.unwrap();

        assert_eq!(manager.state(), SessionState::NotLoggedIn);
        assert_eq!(manager.access_token().unwrap(), None);
        assert!(manager.credentials.refresh_token().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_stored_session_despite_unreachable_backend() {
        let manager = create_test_manager();
        manager
            .credentials
            .store_tokens("acc-1", "ref-1")
            .unwrap();

        // Backend at port 9 is unreachable; cleanup must proceed.
        manager.logout().await.unwrap();

        assert_eq!(manager.access_token().unwrap(), None);
        assert!(manager.credentials.refresh_token().unwrap().is_none());
        let cached: Option<UserRecord> = manager.credentials.user().unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_biometric_login_blocked_without_capability() {
        let manager = create_test_manager();
        manager.credentials.store_tokens("acc", "ref").unwrap();
        manager.credentials.set_biometric_enabled(true).unwrap();

        // NoopBiometrics reports Unavailable; no credential release,
        // no network traffic.
        let err = manager.login_with_biometrics().await.unwrap_err();
        assert!(matches!(err, AuthError::Biometric(_)));
        assert_eq!(manager.state(), SessionState::NotLoggedIn);
    }

    #[test]
    fn test_enabling_biometrics_requires_capability() {
        let manager = create_test_manager();
        let err = manager.set_biometric_enabled(true).unwrap_err();
        assert!(matches!(err, AuthError::Biometric(_)));
        assert!(!manager.credentials.biometric_enabled().unwrap());
    }

    #[tokio::test]
    async fn test_check_auth_status_no_session_settles_initialization() {
        let manager = create_test_manager();
        assert!(manager.snapshot().is_initializing);

        // No stored credentials: verifier classifies Invalid without
        // touching the network.
        let state = manager.check_auth_status().await.unwrap();
        assert_eq!(state, SessionState::NotLoggedIn);
        assert!(!manager.snapshot().is_initializing);
    }
}
