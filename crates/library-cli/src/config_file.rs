//! Non-interactive actions driven by a JSON config file.
//!
//! One file can ask for any of three actions, run in this order:
//! create a template, upload a version, download version files. An action
//! runs only when all of its keys are present. Relative paths resolve
//! against the working directory.

use crate::download_flow::Downloaded;
use crate::library_client::{LibraryClient, LibraryError, NewTemplate, NewVersion};
use auth_engine::Session;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use step_flow::{NoticeLevel, PromptSession};
use tracing::{info, warn};

const READ_ERROR: &str = "There was an error when reading JSON config file.";
const FINISHED: &str = "Template library config action has finished.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    upload_template_name: Option<String>,
    upload_template_description: Option<String>,
    upload_template_type_name: Option<String>,
    upload_public_access: Option<bool>,
    upload_version_name: Option<String>,
    upload_readme_file: Option<PathBuf>,
    upload_template_file: Option<PathBuf>,
    download_template_name: Option<String>,
    download_version_name: Option<String>,
    download_path: Option<PathBuf>,
}

/// What the config file got done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<Downloaded>,
}

/// Actions found in a config file, with paths resolved.
#[derive(Debug, Default, PartialEq, Eq)]
struct ConfigPlan {
    template: Option<NewTemplate>,
    version: Option<(String, NewVersion)>,
    download: Option<(String, String, PathBuf)>,
    /// Problems to report before anything runs.
    errors: Vec<String>,
}

/// Keys named in `keys` whose value is missing.
fn missing<'k>(keys: &[(&'k str, bool)]) -> Vec<&'k str> {
    keys.iter()
        .filter(|(_, present)| !present)
        .map(|(key, _)| *key)
        .collect()
}

/// Only an action with some of its keys set is worth complaining about.
fn partially_set(keys: &[(&str, bool)]) -> bool {
    let present = keys.iter().filter(|(_, present)| *present).count();
    present > 0 && present < keys.len()
}

impl ConfigFile {
    fn plan(self, base_dir: &Path) -> ConfigPlan {
        let mut plan = ConfigPlan::default();

        let version_keys = [
            ("uploadTemplateName", self.upload_template_name.is_some()),
            ("uploadVersionName", self.upload_version_name.is_some()),
            ("uploadTemplateFile", self.upload_template_file.is_some()),
        ];
        let template_keys = [
            ("uploadTemplateName", self.upload_template_name.is_some()),
            ("uploadTemplateDescription", self.upload_template_description.is_some()),
            ("uploadTemplateTypeName", self.upload_template_type_name.is_some()),
            ("uploadPublicAccess", self.upload_public_access.is_some()),
        ];
        let download_keys = [
            ("downloadTemplateName", self.download_template_name.is_some()),
            ("downloadVersionName", self.download_version_name.is_some()),
            ("downloadPath", self.download_path.is_some()),
        ];

        match (
            &self.upload_template_name,
            &self.upload_template_description,
            &self.upload_template_type_name,
            self.upload_public_access,
        ) {
            (Some(name), Some(description), Some(type_name), Some(public_access)) => {
                plan.template = Some(NewTemplate {
                    name: name.clone(),
                    description: description.clone(),
                    template_type_name: type_name.clone(),
                    public_access,
                });
            }
            // A version-only file names the template too; that alone is fine.
            _ if partially_set(&template_keys) && !missing(&version_keys).is_empty() => {
                plan.errors.push(format!(
                    "JSON config file create template action has missing keys: {}.",
                    missing(&template_keys).join(", ")
                ));
            }
            _ => {}
        }

        match (
            &self.upload_template_name,
            &self.upload_version_name,
            &self.upload_template_file,
        ) {
            (Some(template), Some(version_name), Some(template_file)) => {
                let mut valid = true;
                let readme_file = self.upload_readme_file.as_ref().map(|p| base_dir.join(p));
                if let Some(readme) = &readme_file {
                    if !readme.is_file() {
                        plan.errors.push(format!(
                            "File path '{}' from key 'uploadReadmeFile' does not exist.",
                            readme.display()
                        ));
                        valid = false;
                    }
                }
                let template_file = base_dir.join(template_file);
                if template_file.is_dir() {
                    plan.errors.push(format!(
                        "File path '{}' from key 'uploadTemplateFile' is a directory. Pack it into an archive first.",
                        template_file.display()
                    ));
                    valid = false;
                } else if !template_file.is_file() {
                    plan.errors.push(format!(
                        "File path '{}' from key 'uploadTemplateFile' does not exist.",
                        template_file.display()
                    ));
                    valid = false;
                }
                if valid {
                    plan.version = Some((
                        template.clone(),
                        NewVersion {
                            version_name: version_name.clone(),
                            template_file,
                            readme_file,
                            implementation_files: Vec::new(),
                        },
                    ));
                }
            }
            _ if partially_set(&version_keys) && plan.template.is_none() => {
                plan.errors.push(format!(
                    "JSON config file upload version action has missing keys: {}.",
                    missing(&version_keys).join(", ")
                ));
            }
            _ => {}
        }

        match (
            self.download_template_name,
            self.download_version_name,
            self.download_path,
        ) {
            (Some(template), Some(version), Some(destination)) => {
                let destination = base_dir.join(destination);
                if destination.exists() {
                    plan.errors.push(format!(
                        "File path '{}' from key 'downloadPath' already exists. Please pick a new one.",
                        destination.display()
                    ));
                } else {
                    plan.download = Some((template, version, destination));
                }
            }
            _ if partially_set(&download_keys) => {
                plan.errors.push(format!(
                    "JSON config file download template action has missing keys: {}.",
                    missing(&download_keys).join(", ")
                ));
            }
            _ => {}
        }

        plan
    }
}

async fn read_config(path: &Path) -> Option<ConfigFile> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Config file unreadable");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Config file is not valid");
            None
        }
    }
}

fn failure_message(err: &LibraryError, fallback: &str) -> String {
    err.service_message().unwrap_or_else(|| fallback.to_string())
}

/// Run the actions `config_path` asks for. Failures are reported through
/// `prompts` and do not stop later actions.
pub async fn run_config_file(
    client: &LibraryClient,
    session: &mut Session,
    prompts: &mut dyn PromptSession,
    config_path: &Path,
    base_dir: &Path,
) -> ConfigReport {
    let mut report = ConfigReport::default();

    let Some(config) = read_config(config_path).await else {
        prompts.notify(NoticeLevel::Error, READ_ERROR);
        prompts.notify(NoticeLevel::Info, FINISHED);
        return report;
    };
    let plan = config.plan(base_dir);
    for error in &plan.errors {
        prompts.notify(NoticeLevel::Error, error);
    }

    if let Some(template) = &plan.template {
        match client.create_template(session, template).await {
            Ok(()) => {
                prompts.notify(
                    NoticeLevel::Info,
                    &format!("Template '{}' was added successfully!", template.name),
                );
                report.created_template = Some(template.name.clone());
            }
            Err(err) => {
                warn!(error = %err, template = %template.name, "Creating template failed");
                prompts.notify(
                    NoticeLevel::Error,
                    &failure_message(&err, "Adding template has failed! Please try again."),
                );
            }
        }
    }

    if let Some((template, version)) = &plan.version {
        match client.create_version(session, template, version).await {
            Ok(()) => {
                prompts.notify(
                    NoticeLevel::Info,
                    &format!(
                        "New version '{}' for template '{}' was successfully inserted!",
                        version.version_name, template
                    ),
                );
                report.uploaded_version = Some(version.version_name.clone());
            }
            Err(err) => {
                warn!(error = %err, template = %template, "Uploading version failed");
                prompts.notify(
                    NoticeLevel::Error,
                    &failure_message(&err, "Adding a version has failed! Please try again."),
                );
            }
        }
    }

    if let Some((template, version, destination)) = plan.download {
        match client
            .download_version_files(session, &template, &version, &destination)
            .await
        {
            Ok(bytes) => {
                prompts.notify(
                    NoticeLevel::Info,
                    &format!(
                        "Template '{}' was downloaded successfully to '{}'!",
                        template,
                        destination.display()
                    ),
                );
                report.downloaded = Some(Downloaded {
                    template,
                    version,
                    destination,
                    bytes,
                });
            }
            Err(err) => {
                warn!(error = %err, template = %template, "Download failed");
                prompts.notify(
                    NoticeLevel::Error,
                    &failure_message(
                        &err,
                        "Downloading template version files has failed! Please try again.",
                    ),
                );
            }
        }
    }

    info!(?report, "Config file actions finished");
    prompts.notify(NoticeLevel::Info, FINISHED);
    report
}
