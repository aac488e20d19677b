//! Read-only view of the stored access token.

use std::sync::Arc;

use client_storage::CredentialStore;

use crate::error::AuthResult;

/// Hands out the currently stored access token.
///
/// This never performs a network call and never refreshes: refresh has
/// a single choke point in the request pipeline, which keeps duplicate
/// concurrent refreshes impossible by construction.
#[derive(Clone)]
pub struct TokenProvider {
    credentials: Arc<CredentialStore>,
}

impl TokenProvider {
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self { credentials }
    }

    /// The stored access token, or None when logged out.
    pub fn access_token(&self) -> AuthResult<Option<String>> {
        Ok(self.credentials.access_token()?)
    }

    /// Whether a full credential pair is stored.
    pub fn has_tokens(&self) -> AuthResult<bool> {
        Ok(self.credentials.has_tokens()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_storage::{CredentialStore, SecureStorage, StorageResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

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

    #[test]
    fn test_access_token_reads_store() {
        let store = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
        store.store_tokens("acc-1", "ref-1").unwrap();

        let provider = TokenProvider::new(store);
        assert_eq!(provider.access_token().unwrap().as_deref(), Some("acc-1"));
        assert!(provider.has_tokens().unwrap());
    }

    #[test]
    fn test_access_token_none_when_logged_out() {
        let store = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
        let provider = TokenProvider::new(store);
        assert_eq!(provider.access_token().unwrap(), None);
        assert!(!provider.has_tokens().unwrap());
    }
}
