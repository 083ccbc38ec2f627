//! Authentication for the Template Library client.
//!
//! This crate provides:
//! - Session probing against `users/current`
//! - Discovery of the identity broker's login page through the service's
//!   redirect chain, and scraping of its provider links and login form
//! - Interactive provider/username/password prompts run on the step-flow
//!   engine, with bounded retries on rejected credentials
//! - Persistence of the `_forward_auth` session cookie across invocations
//! - Explicit FSM-based login state tracking

mod auth_fsm;
mod error;
mod flow;
pub mod login_form;
mod session;

pub use auth_fsm::login_machine;
pub use auth_fsm::{LoginMachine, LoginMachineInput, LoginMachineState, LoginPhase, LoginTracker};
pub use error::{AuthError, AuthResult};
pub use login_form::{IdentityProvider, LoginPage};
pub use session::{
    AuthSessionManager, ProviderChoice, Session, SessionStatus, SESSION_COOKIE_NAME,
};
