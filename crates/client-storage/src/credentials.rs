//! High-level API for the credential store.

use crate::{SecureStorage, StorageKeys, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;
use tracing::warn;

/// High-level credential store over a storage backend.
///
/// The access/refresh token pair is only ever replaced as a unit: all
/// pair mutations and pair reads go through one lock, so no caller can
/// observe an access token from one login paired with a refresh token
/// from another.
pub struct CredentialStore {
    storage: Box<dyn SecureStorage>,
    pair_lock: Mutex<()>,
}

impl CredentialStore {
    /// Create a new credential store with the given storage backend.
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self {
            storage,
            pair_lock: Mutex::new(()),
        }
    }

    // ==========================================
    // Token pair
    // ==========================================

    /// Store the access/refresh token pair atomically.
    pub fn store_tokens(&self, access_token: &str, refresh_token: &str) -> StorageResult<()> {
        let _guard = self.pair_lock.lock().unwrap();
        self.storage.set(StorageKeys::ACCESS_TOKEN, access_token)?;
        self.storage.set(StorageKeys::REFRESH_TOKEN, refresh_token)?;
        Ok(())
    }

    /// Retrieve the stored access token.
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        let _guard = self.pair_lock.lock().unwrap();
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    /// Retrieve the stored refresh token.
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        let _guard = self.pair_lock.lock().unwrap();
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    /// Retrieve both tokens under one lock acquisition. Both values
    /// always come from the same `store_tokens` call.
    pub fn token_pair(&self) -> StorageResult<Option<(String, String)>> {
        let _guard = self.pair_lock.lock().unwrap();
        let access = self.storage.get(StorageKeys::ACCESS_TOKEN)?;
        let refresh = self.storage.get(StorageKeys::REFRESH_TOKEN)?;
        Ok(match (access, refresh) {
            (Some(a), Some(r)) => Some((a, r)),
            _ => None,
        })
    }

    /// Check whether a token pair exists.
    pub fn has_tokens(&self) -> StorageResult<bool> {
        Ok(self.token_pair()?.is_some())
    }

    // ==========================================
    // Cached user record
    // ==========================================

    /// Store the user record as JSON.
    pub fn store_user<T: Serialize>(&self, user: &T) -> StorageResult<()> {
        let json = serde_json::to_string(user)
            .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::USER_DATA, &json)
    }

    /// Retrieve the cached user record.
    ///
    /// Malformed stored JSON is treated as "no data" rather than an
    /// error; the caller must re-authenticate.
    pub fn user<T: DeserializeOwned>(&self) -> StorageResult<Option<T>> {
        match self.storage.get(StorageKeys::USER_DATA)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(user) => Ok(Some(user)),
                Err(e) => {
                    warn!(error = %e, "Cached user record is malformed, treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Check whether a cached user record exists (well-formed or not).
    pub fn has_user(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::USER_DATA)
    }

    // ==========================================
    // Biometric flag
    // ==========================================

    /// Record whether biometric unlock is enabled.
    pub fn set_biometric_enabled(&self, enabled: bool) -> StorageResult<()> {
        self.storage
            .set(StorageKeys::BIOMETRIC_ENABLED, if enabled { "true" } else { "false" })
    }

    /// Whether biometric unlock is enabled. Absent means disabled.
    pub fn biometric_enabled(&self) -> StorageResult<bool> {
        Ok(self
            .storage
            .get(StorageKeys::BIOMETRIC_ENABLED)?
            .map(|v| v == "true")
            .unwrap_or(false))
    }

    // ==========================================
    // Clear all
    // ==========================================

    /// Remove the token pair, user data, and derived flags in one
    /// logical operation. Safe to call when nothing is stored: a
    /// missing key deletes as `Ok(false)`. Medium failures propagate
    /// so a clear that did not happen is never reported as done.
    pub fn clear_all(&self) -> StorageResult<()> {
        let _guard = self.pair_lock.lock().unwrap();
        self.storage.delete(StorageKeys::ACCESS_TOKEN)?;
        self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
        self.storage.delete(StorageKeys::USER_DATA)?;
        self.storage.delete(StorageKeys::BIOMETRIC_ENABLED)?;
        Ok(())
    }
}
