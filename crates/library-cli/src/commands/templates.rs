//! Template browsing, upload and download commands.

use super::{authenticated_session, Context};
use crate::config_file::run_config_file;
use crate::download_flow::{DownloadFlow, DownloadStep};
use crate::library_client::LibraryClient;
use crate::output::{self, OutputFormat};
use crate::upload_flow::{UploadFlow, UploadStep};
use anyhow::Result;
use std::path::Path;
use step_flow::{FlowController, FlowExit};

/// List templates.
pub async fn templates_list(ctx: &Context) -> Result<()> {
    let Some((_, mut session)) = authenticated_session(ctx).await? else {
        return Ok(());
    };
    let client = LibraryClient::new(&ctx.config)?;
    let templates = client.list_templates(&mut session).await?;

    match ctx.format {
        OutputFormat::Text => {
            if templates.is_empty() {
                println!("No templates found.");
                return Ok(());
            }
            output::print_heading("Templates");
            for template in &templates {
                output::print_row(
                    &template.name,
                    template.description.as_deref().unwrap_or("-"),
                );
            }
        }
        OutputFormat::Json => output::print_json(&templates)?,
    }
    Ok(())
}

/// List the versions of one template.
pub async fn versions_list(ctx: &Context, template: &str) -> Result<()> {
    let Some((_, mut session)) = authenticated_session(ctx).await? else {
        return Ok(());
    };
    let client = LibraryClient::new(&ctx.config)?;
    let versions = client.list_versions(&mut session, template).await?;

    match ctx.format {
        OutputFormat::Text => {
            if versions.is_empty() {
                println!("Template '{}' has no versions.", template);
                return Ok(());
            }
            output::print_heading(&format!("Versions of {}", template));
            for version in &versions {
                println!("  {}", version.version_name);
            }
        }
        OutputFormat::Json => output::print_json(&versions)?,
    }
    Ok(())
}

/// Pick a template, a version and a destination, then download the files.
pub async fn download(ctx: &Context) -> Result<()> {
    let Some((mut manager, mut session)) = authenticated_session(ctx).await? else {
        return Ok(());
    };
    let client = LibraryClient::new(&ctx.config)?;
    let base_dir = std::env::current_dir()?;

    let mut handler = DownloadFlow::new(&client, &mut session, base_dir);
    let exit = FlowController::new(manager.prompts_mut())
        .run(&mut handler, DownloadStep::Template)
        .await?;

    match (exit, handler.into_downloaded()) {
        (FlowExit::Completed, Some(downloaded)) => match ctx.format {
            OutputFormat::Text => output::print_success(
                &format!(
                    "Downloaded {} {} to {} ({} bytes)",
                    downloaded.template,
                    downloaded.version,
                    downloaded.destination.display(),
                    downloaded.bytes
                ),
                &ctx.format,
            ),
            OutputFormat::Json => output::print_json(&downloaded)?,
        },
        (FlowExit::Completed, None) => output::print_success("Nothing was downloaded.", &ctx.format),
        _ => output::print_success("Download cancelled.", &ctx.format),
    }
    Ok(())
}

/// Create a template or a template version interactively.
pub async fn upload(ctx: &Context) -> Result<()> {
    let Some((mut manager, mut session)) = authenticated_session(ctx).await? else {
        return Ok(());
    };
    let client = LibraryClient::new(&ctx.config)?;

    let mut handler = UploadFlow::new(&client, &mut session);
    let exit = FlowController::new(manager.prompts_mut())
        .run(&mut handler, UploadStep::Action)
        .await?;

    match (exit, handler.into_uploaded()) {
        (FlowExit::Completed, Some(uploaded)) => match ctx.format {
            OutputFormat::Text => output::print_success(
                &format!("Uploaded {} {}", uploaded.template, uploaded.version),
                &ctx.format,
            ),
            OutputFormat::Json => output::print_json(&uploaded)?,
        },
        (FlowExit::Completed, None) => output::print_success("Nothing was uploaded.", &ctx.format),
        _ => output::print_success("Upload cancelled.", &ctx.format),
    }
    Ok(())
}

/// Run the actions of a JSON config file.
pub async fn run_config(ctx: &Context, config_path: &Path) -> Result<()> {
    let Some((mut manager, mut session)) = authenticated_session(ctx).await? else {
        return Ok(());
    };
    let client = LibraryClient::new(&ctx.config)?;
    let base_dir = std::env::current_dir()?;

    let report = run_config_file(
        &client,
        &mut session,
        manager.prompts_mut(),
        config_path,
        &base_dir,
    )
    .await;

    if ctx.format == OutputFormat::Json {
        output::print_json(&report)?;
    }
    Ok(())
}
