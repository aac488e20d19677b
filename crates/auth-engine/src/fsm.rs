//! Session state machine using rust-fsm.
//!
//! This module defines an explicit finite state machine for the
//! authentication session, replacing implicit state derivation from
//! storage checks.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │   NotLoggedIn   │ (initial)
//! └────────┬────────┘
//!          │ LoginAttempt / RegisterAttempt / ValidateSession
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ LoggingIn /     │     │   Validating    │
//! │ Registering     │     └────────┬────────┘
//! └────────┬────────┘              │ ProfileFresh ──────────► LoggedIn
//!          │                       │ TokenRejected/NoSession ► NotLoggedIn
//!          │ LoginSuccess          │ Throttled/Unreachable ──► Stale
//!          ▼                       ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │    LoggedIn     │◄─────│      Stale      │ (authenticated, unverified)
//! └─────────────────┘ Fresh└─────────────────┘
//!
//!          LogoutRequested ► LoggingOut ► LogoutComplete ► NotLoggedIn
//! ```
//!
//! Token refresh does not surface here: the request pipeline rotates
//! an expired pair transparently and the session only changes state
//! when a subsequent validation settles.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Define the FSM using rust-fsm's declarative macro.
// This generates a module `session_machine` with:
// - session_machine::State (enum)
// - session_machine::Input (enum)
// - session_machine::StateMachine (type alias)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(NotLoggedIn)

    NotLoggedIn => {
        ValidateSession => Validating,
        LoginAttempt => LoggingIn,
        RegisterAttempt => Registering
    },
    Validating => {
        // Backend returned a fresh profile - adopt it as ground truth
        ProfileFresh => LoggedIn,
        // Backend explicitly rejected the token - unrecoverable
        TokenRejected => NotLoggedIn,
        // Backend is throttling - keep the local session, unverified
        Throttled => Stale,
        // Backend unreachable and a cached session exists
        Unreachable => Stale,
        // No stored session (or unreachable with nothing cached)
        NoSession => NotLoggedIn
    },
    LoggingIn => {
        LoginSuccess => LoggedIn,
        LoginFailed => NotLoggedIn
    },
    Registering => {
        LoginSuccess => LoggedIn,
        LoginFailed => NotLoggedIn
    },
    LoggedIn => {
        ValidateSession => Validating,
        LogoutRequested => LoggingOut
    },
    Stale => {
        ValidateSession => Validating,
        ProfileFresh => LoggedIn,
        LogoutRequested => LoggingOut
    },
    LoggingOut => {
        LogoutComplete => NotLoggedIn
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// User-friendly session state for external consumption.
///
/// This is the simplified view of the FSM state the UI layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not logged in.
    NotLoggedIn,
    /// Reconciling the stored session against the backend.
    Validating,
    /// Currently logging in.
    LoggingIn,
    /// Currently registering a new account.
    Registering,
    /// Logged in with a session verified this run.
    LoggedIn,
    /// Logged in on a cached session whose validity could not be
    /// reconfirmed this run.
    Stale,
    /// Currently logging out.
    LoggingOut,
}

impl SessionState {
    /// Returns true if the user has a usable session (verified or stale).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::LoggedIn | SessionState::Stale)
    }

    /// Returns true for a session kept optimistically active without
    /// verification this run. A stale state is always authenticated.
    pub fn is_stale(&self) -> bool {
        matches!(self, SessionState::Stale)
    }

    /// Returns true if the state is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionState::Validating
                | SessionState::LoggingIn
                | SessionState::Registering
                | SessionState::LoggingOut
        )
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::NotLoggedIn => SessionState::NotLoggedIn,
            SessionMachineState::Validating => SessionState::Validating,
            SessionMachineState::LoggingIn => SessionState::LoggingIn,
            SessionMachineState::Registering => SessionState::Registering,
            SessionMachineState::LoggedIn => SessionState::LoggedIn,
            SessionMachineState::Stale => SessionState::Stale,
            SessionMachineState::LoggingOut => SessionState::LoggingOut,
        }
    }
}

/// Payload for session state change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStateChangedPayload {
    /// Current session state.
    pub state: SessionState,
    /// User ID if logged in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email if available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
