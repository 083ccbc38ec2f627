//! Login state machine using rust-fsm.
//!
//! One machine is created per `ensure_authenticated` call and records where
//! the login dance currently is.
//!
//! ```text
//!                 ┌─────────────────┐
//!      ┌─────────►│ CheckingSession │ (initial)
//!      │          └───┬────────┬────┘
//!      │  SessionValid│        │ NeedsLogin          Unreachable ──► Unreachable
//!      │              │        ▼
//!      │              │  ┌──────────────────┐
//!      │              │  │ ChoosingProvider │◄──────────┐ Back
//!      │              │  └────────┬─────────┘           │
//!      │              │           │ ProviderChosen      │
//!      │              │           ▼                     │
//!      │              │  ┌──────────────────┐───────────┘
//!      │              │  │ EnteringUsername │◄──────────┐ Back
//!      │              │  └────────┬─────────┘           │
//!      │              │           │ UsernameEntered     │
//!      │              │           ▼                     │
//!      │              │  ┌──────────────────┐───────────┘
//!      │              │  │ EnteringPassword │
//!      │              │  └────────┬─────────┘
//!      │              │           │ PasswordEntered
//!      │              │           ▼
//!      │              │  ┌──────────────────┐
//!      │              │  │    Verifying     │
//!      │              │  └───┬──────────┬───┘
//!      │              │      │ Verified │ Rejected
//!      │              ▼      ▼          ▼
//!      │          ┌───────────────┐  ┌─────────────────┐
//!      │          │ Authenticated │  │ RestartChecking │
//!      │          └───────────────┘  └────────┬────────┘
//!      └──────────────────────────────────────┘ Restart
//!
//!  Cancel from any prompt state ──► Cancelled
//! ```

use crate::{AuthError, AuthResult};
use rust_fsm::*;
use tracing::{debug, info};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub login_machine(CheckingSession)

    CheckingSession => {
        SessionValid => Authenticated,
        NeedsLogin => ChoosingProvider,
        Unreachable => Unreachable
    },
    ChoosingProvider => {
        ProviderChosen => EnteringUsername,
        Cancel => Cancelled
    },
    EnteringUsername => {
        UsernameEntered => EnteringPassword,
        Back => ChoosingProvider,
        Cancel => Cancelled
    },
    EnteringPassword => {
        PasswordEntered => Verifying,
        Back => EnteringUsername,
        Cancel => Cancelled
    },
    Verifying => {
        Verified => Authenticated,
        Rejected => RestartChecking
    },
    RestartChecking => {
        Restart => CheckingSession
    }
}

pub use login_machine::Input as LoginMachineInput;
pub use login_machine::State as LoginMachineState;
pub use login_machine::StateMachine as LoginMachine;

/// Phase of the login dance, for callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    CheckingSession,
    ChoosingProvider,
    EnteringUsername,
    EnteringPassword,
    Verifying,
    RestartChecking,
    Authenticated,
    Cancelled,
    Unreachable,
}

impl LoginPhase {
    /// True once the machine can no longer move.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoginPhase::Authenticated | LoginPhase::Cancelled | LoginPhase::Unreachable
        )
    }
}

impl From<&LoginMachineState> for LoginPhase {
    fn from(state: &LoginMachineState) -> Self {
        match state {
            LoginMachineState::CheckingSession => LoginPhase::CheckingSession,
            LoginMachineState::ChoosingProvider => LoginPhase::ChoosingProvider,
            LoginMachineState::EnteringUsername => LoginPhase::EnteringUsername,
            LoginMachineState::EnteringPassword => LoginPhase::EnteringPassword,
            LoginMachineState::Verifying => LoginPhase::Verifying,
            LoginMachineState::RestartChecking => LoginPhase::RestartChecking,
            LoginMachineState::Authenticated => LoginPhase::Authenticated,
            LoginMachineState::Cancelled => LoginPhase::Cancelled,
            LoginMachineState::Unreachable => LoginPhase::Unreachable,
        }
    }
}

/// Owns a [`LoginMachine`] and logs every transition.
pub struct LoginTracker {
    machine: LoginMachine,
}

impl Default for LoginTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginTracker {
    pub fn new() -> Self {
        Self {
            machine: LoginMachine::new(),
        }
    }

    pub fn phase(&self) -> LoginPhase {
        LoginPhase::from(self.machine.state())
    }

    /// Apply `input`, failing with `InvalidStateTransition` when the current
    /// state does not accept it.
    pub fn transition(&mut self, input: LoginMachineInput) -> AuthResult<LoginPhase> {
        let old_phase = self.phase();

        self.machine.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input, old_phase
            ))
        })?;

        let new_phase = self.phase();
        debug!(
            old_state = ?old_phase,
            new_state = ?new_phase,
            input = ?input,
            "Login state transition"
        );
        if new_phase.is_terminal() {
            info!(phase = ?new_phase, "Login finished");
        }

        Ok(new_phase)
    }
}
