//! Configuration commands.

use super::Context;
use crate::output;
use anyhow::Result;
use tracing::info;

/// Validate and save a new REST API endpoint.
///
/// The stored session belongs to the previous endpoint and is dropped.
pub async fn set_endpoint(ctx: &Context, endpoint: &str) -> Result<()> {
    let mut config = ctx.config.clone();
    config.set_api_endpoint(endpoint)?;
    config.save(&ctx.paths)?;

    if ctx.config.api_endpoint != config.api_endpoint {
        let cleared = ctx.session_records()?.clear_session_cookie()?;
        info!(endpoint = %config.api_endpoint, cleared, "API endpoint changed");
    }

    output::print_success(
        &format!(
            "Template library REST API endpoint set to {}",
            config.api_endpoint
        ),
        &ctx.format,
    );
    Ok(())
}
