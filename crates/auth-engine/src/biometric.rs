//! Biometric gating for credential release.
//!
//! The session manager depends only on the trait; platform bindings
//! live behind it. The shipped default reports no capability, which
//! keeps biometric login disabled without touching session logic.

use crate::error::{AuthError, AuthResult};

/// What the device can assert with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricCapability {
    Unavailable,
    FaceId,
    Fingerprint,
}

/// Local biometric assertion.
pub trait BiometricProvider: Send + Sync {
    /// Hardware capability of this device.
    fn capability(&self) -> BiometricCapability;

    /// Run a local assertion, showing `reason` to the user. Must return
    /// an error unless the assertion positively succeeded.
    fn authenticate(&self, reason: &str) -> AuthResult<()>;
}

/// Provider for devices without biometric hardware (or with the
/// feature switched off).
pub struct NoopBiometrics;

impl BiometricProvider for NoopBiometrics {
    fn capability(&self) -> BiometricCapability {
        BiometricCapability::Unavailable
    }

    fn authenticate(&self, _reason: &str) -> AuthResult<()> {
        Err(AuthError::Biometric(
            "biometric hardware unavailable".to_string(),
        ))
    }
}
