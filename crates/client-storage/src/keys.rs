//! Storage key constants.

/// Storage keys used by the session core.
///
/// Each key is independently addressable, but the token pair is only
/// ever mutated together through `CredentialStore::store_tokens`.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token (short-lived bearer credential)
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token (long-lived, only used to mint new access tokens)
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Cached user record (JSON)
    pub const USER_DATA: &'static str = "user_data";

    /// Whether biometric unlock is enabled for this install
    pub const BIOMETRIC_ENABLED: &'static str = "biometric_enabled";
}
