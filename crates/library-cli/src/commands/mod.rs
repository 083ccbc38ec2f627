//! CLI command implementations.

mod auth;
mod config;
mod templates;

pub use auth::{login, logout, status};
pub use config::set_endpoint;
pub use templates::{download, run_config, templates_list, upload, versions_list};

use crate::output::{self, OutputFormat};
use crate::terminal_prompt::TerminalPrompts;
use anyhow::Result;
use auth_engine::{AuthSessionManager, Session};
use library_config_and_utils::{Config, Paths};
use session_storage::SessionRecords;

/// Paths and configuration for one invocation.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub format: OutputFormat,
}

impl Context {
    /// Load the configuration from `~/.template-library`.
    pub fn load(format: OutputFormat) -> Result<Self> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        let config = Config::load(&paths)?;
        Ok(Self {
            paths,
            config,
            format,
        })
    }

    fn session_records(&self) -> Result<SessionRecords> {
        Ok(session_storage::create_session_records(
            &self.paths,
            self.config.session_store,
        )?)
    }

    fn auth_manager(&self) -> Result<AuthSessionManager> {
        let prompts = Box::new(TerminalPrompts::new(self.format));
        Ok(AuthSessionManager::new(
            &self.config,
            self.session_records()?,
            prompts,
        )?)
    }
}

/// Restore the session and log in if needed.
///
/// Returns `None` when the user cancelled the login.
async fn authenticated_session(ctx: &Context) -> Result<Option<(AuthSessionManager, Session)>> {
    let mut manager = ctx.auth_manager()?;
    let mut session = manager.start_session()?;

    match manager.ensure_authenticated(&mut session).await {
        Ok(()) => Ok(Some((manager, session))),
        Err(err) if err.is_quiet() => {
            output::print_success("Login cancelled.", &ctx.format);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
