//! Authentication commands.

use super::{authenticated_session, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_engine::{AuthError, SessionStatus, SESSION_COOKIE_NAME};

/// Log in, prompting only when the stored session is no longer valid.
pub async fn login(ctx: &Context) -> Result<()> {
    let Some((_, session)) = authenticated_session(ctx).await? else {
        return Ok(());
    };

    let message = match &session.provider {
        Some(provider) => format!(
            "Logged in to {} as a {} user",
            ctx.config.api_endpoint,
            provider.label()
        ),
        None => format!("Already logged in to {}", ctx.config.api_endpoint),
    };
    output::print_success(&message, &ctx.format);
    Ok(())
}

/// Delete the stored session.
pub async fn logout(ctx: &Context) -> Result<()> {
    let mut manager = ctx.auth_manager()?;
    let mut session = manager.start_session()?;
    manager.delete_session(&mut session)?;

    output::print_success("Logged out successfully", &ctx.format);
    Ok(())
}

/// Report whether the stored session is still accepted, without prompting.
pub async fn status(ctx: &Context) -> Result<()> {
    let manager = ctx.auth_manager()?;
    let mut session = manager.start_session()?;
    let stored = session.jar.find(SESSION_COOKIE_NAME).is_some();

    let state = match manager.check_session(&mut session).await {
        Ok(SessionStatus::Valid) => "valid",
        Ok(SessionStatus::NeedsLogin) => "login required",
        Err(AuthError::ServiceUnreachable { reason }) => {
            tracing::warn!(reason = %reason, "Status probe failed");
            "unreachable"
        }
        Err(err) => return Err(err.into()),
    };

    match ctx.format {
        OutputFormat::Text => {
            output::print_row("Endpoint", &ctx.config.api_endpoint);
            output::print_row("Stored session", if stored { "yes" } else { "no" });
            output::print_row("Session", state);
        }
        OutputFormat::Json => {
            output::print_json(&serde_json::json!({
                "endpoint": ctx.config.api_endpoint,
                "stored_session": stored,
                "session": state,
            }))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use library_config_and_utils::{Config, Paths, SessionStoreKind};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(dir: &TempDir, endpoint: &str) -> Context {
        let mut config = Config::default();
        config.set_api_endpoint(endpoint).unwrap();
        config.session_store = SessionStoreKind::File;
        Context {
            paths: Paths::with_base_dir(dir.path().to_path_buf()),
            config,
            format: OutputFormat::Json,
        }
    }

    #[tokio::test]
    async fn test_logout_clears_stored_session() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "https://library.example/api");
        let records = ctx.session_records().unwrap();
        records
            .set_session_cookie("_forward_auth=tok; Domain=library.example; Path=/")
            .unwrap();

        logout(&ctx).await.unwrap();

        assert!(!ctx.session_records().unwrap().has_session_cookie().unwrap());
    }

    #[tokio::test]
    async fn test_status_never_prompts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/current"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/templates"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/auth"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &format!("{}/api", server.uri()));

        status(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_reports_unreachable_service() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "http://127.0.0.1:9/api");

        status(&ctx).await.unwrap();
    }
}
