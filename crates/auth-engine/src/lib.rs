//! Authentication engine for the Dentalink client.
//!
//! This crate provides:
//! - An HTTP client for the auth endpoints with bearer injection and a
//!   single-flight refresh-and-retry pipeline
//! - Startup session verification with explicit four-way classification
//! - Session lifecycle orchestration over an explicit FSM
//! - Biometric gating for releasing stored credentials

mod api;
mod biometric;
mod error;
mod fsm;
mod models;
mod session;
mod token;
mod verifier;

pub use api::ApiClient;
pub use biometric::{BiometricCapability, BiometricProvider, NoopBiometrics};
pub use error::{AuthError, AuthResult};
pub use fsm::session_machine;
pub use fsm::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
    SessionStateChangedPayload,
};
pub use models::{
    AuthResponse, DoctorProfile, EmergencyContact, LoginRequest, PatientProfile, Profile,
    RefreshRequest, RefreshResponse, RegisterRequest, Role, UserRecord,
};
pub use session::{SessionManager, SessionSnapshot, SessionStateCallback};
pub use token::TokenProvider;
pub use verifier::{SessionVerifier, VerifyOutcome};
