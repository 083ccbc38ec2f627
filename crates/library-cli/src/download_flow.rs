//! Interactive template download: template, version, destination.

use crate::library_client::{LibraryClient, LibraryError, LibraryResult};
use async_trait::async_trait;
use auth_engine::Session;
use library_config_and_utils::validate_non_empty;
use std::path::PathBuf;
use step_flow::{
    validator, Answer, ChoiceItem, ChoiceSpec, FlowController, FlowSignal, NoticeLevel,
    StepHandler, StepOutcome, TextSpec,
};
use tracing::{debug, warn};

const DOWNLOAD_TITLE: &str = "Download template files";
const TOTAL_STEPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStep {
    Template,
    Version,
    Destination,
}

/// What ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Downloaded {
    pub template: String,
    pub version: String,
    pub destination: PathBuf,
    pub bytes: u64,
}

pub struct DownloadFlow<'a> {
    client: &'a LibraryClient,
    session: &'a mut Session,
    base_dir: PathBuf,
    template: Option<String>,
    version: Option<String>,
    downloaded: Option<Downloaded>,
}

impl<'a> DownloadFlow<'a> {
    /// Destinations default to `<base_dir>/<template>`.
    pub fn new(client: &'a LibraryClient, session: &'a mut Session, base_dir: PathBuf) -> Self {
        Self {
            client,
            session,
            base_dir,
            template: None,
            version: None,
            downloaded: None,
        }
    }

    pub fn into_downloaded(self) -> Option<Downloaded> {
        self.downloaded
    }

    async fn pick_template(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<DownloadStep>> {
        let templates = self.client.list_templates(self.session).await?;
        if templates.is_empty() {
            flow.notify(NoticeLevel::Warning, "There are no templates to download.");
            return Ok(StepOutcome::Done);
        }

        let active = self
            .template
            .as_ref()
            .and_then(|chosen| templates.iter().position(|t| &t.name == chosen))
            .or(Some(0));
        let items = templates
            .iter()
            .map(|template| match &template.description {
                Some(description) => ChoiceItem::new(&template.name).with_description(description),
                None => ChoiceItem::new(&template.name),
            })
            .collect();
        let spec = ChoiceSpec::new(DOWNLOAD_TITLE, items)
            .step(1, TOTAL_STEPS)
            .placeholder("Pick an existing template")
            .active_item(active);

        match flow.show_choice(spec).await? {
            Answer::Value(indices) => match indices.first().and_then(|i| templates.get(*i)) {
                Some(template) => {
                    if self.template.as_ref() != Some(&template.name) {
                        self.version = None;
                    }
                    self.template = Some(template.name.clone());
                    Ok(StepOutcome::Next(DownloadStep::Version))
                }
                None => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            },
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn pick_version(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<DownloadStep>> {
        let template = self.chosen_template();
        let versions = self.client.list_versions(self.session, &template).await?;
        if versions.is_empty() {
            flow.notify(
                NoticeLevel::Warning,
                &format!("Template '{}' has no versions yet.", template),
            );
            return Ok(StepOutcome::Next(DownloadStep::Template));
        }

        let active = self
            .version
            .as_ref()
            .and_then(|chosen| versions.iter().position(|v| &v.version_name == chosen))
            .or(Some(0));
        let items = versions
            .iter()
            .map(|version| ChoiceItem::new(&version.version_name))
            .collect();
        let spec = ChoiceSpec::new(DOWNLOAD_TITLE, items)
            .step(2, TOTAL_STEPS)
            .placeholder("Pick an existing template version")
            .active_item(active);

        match flow.show_choice(spec).await? {
            Answer::Value(indices) => match indices.first().and_then(|i| versions.get(*i)) {
                Some(version) => {
                    self.version = Some(version.version_name.clone());
                    Ok(StepOutcome::Next(DownloadStep::Destination))
                }
                None => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            },
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn enter_destination(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<DownloadStep>> {
        let template = self.chosen_template();
        let version = self.version.clone().unwrap_or_default();
        let default = self.base_dir.join(&template);

        let spec = TextSpec::new(DOWNLOAD_TITLE)
            .step(3, TOTAL_STEPS)
            .value(default.display().to_string())
            .prompt("Type in a path where template version files will be downloaded to")
            .validate(validator(|text: String| async move {
                validate_non_empty(&text)
            }));

        let destination = match flow.show_text(spec).await? {
            Answer::Value(text) => PathBuf::from(text),
            Answer::Button(_) => return Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => return Ok(StepOutcome::Signal(signal)),
        };

        match self
            .client
            .download_version_files(self.session, &template, &version, &destination)
            .await
        {
            Ok(bytes) => {
                flow.notify(
                    NoticeLevel::Info,
                    &format!(
                        "Template '{}' was downloaded successfully to '{}'!",
                        template,
                        destination.display()
                    ),
                );
                self.downloaded = Some(Downloaded {
                    template,
                    version,
                    destination,
                    bytes,
                });
                Ok(StepOutcome::Done)
            }
            Err(err) => {
                warn!(error = %err, template = %template, version = %version, "Download failed");
                flow.notify(
                    NoticeLevel::Error,
                    "Downloading template version files has failed! Please try again.",
                );
                Ok(StepOutcome::Next(DownloadStep::Template))
            }
        }
    }

    fn chosen_template(&self) -> String {
        self.template.clone().unwrap_or_default()
    }
}

#[async_trait]
impl<'a> StepHandler for DownloadFlow<'a> {
    type Step = DownloadStep;
    type Error = LibraryError;

    async fn run_step(
        &mut self,
        step: DownloadStep,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<DownloadStep>> {
        debug!(?step, "Download step");
        match step {
            DownloadStep::Template => self.pick_template(flow).await,
            DownloadStep::Version => self.pick_version(flow).await,
            DownloadStep::Destination => self.enter_destination(flow).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use library_config_and_utils::Config;
    use step_flow::testing::{ScriptedPrompts, Shown};
    use step_flow::FlowExit;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn library_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/templates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"[{"name":"web","description":"Web stack"},{"name":"db"}]"#),
            )
            .mount(&server)
            .await;
        for name in ["web", "db"] {
            Mock::given(method("GET"))
                .and(path(format!("/api/templates/{}/versions", name)))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"[{"versionName":"1.0"},{"versionName":"2.0"}]"#,
                ))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/api/templates/db/versions/2.0/files"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"db-2.0".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/templates/web/versions/1.0/files"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> LibraryClient {
        let mut config = Config::default();
        config
            .set_api_endpoint(&format!("{}/api", server.uri()))
            .unwrap();
        LibraryClient::new(&config).unwrap()
    }

    async fn run(
        server: &MockServer,
        prompts: &mut ScriptedPrompts,
        base_dir: PathBuf,
    ) -> (FlowExit, Option<Downloaded>) {
        let client = client_for(server);
        let mut session = Session::new();
        let mut handler = DownloadFlow::new(&client, &mut session, base_dir);
        let exit = FlowController::new(prompts)
            .run(&mut handler, DownloadStep::Template)
            .await
            .unwrap();
        (exit, handler.into_downloaded())
    }

    #[tokio::test]
    async fn test_download_writes_chosen_version() {
        let server = library_server().await;
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("db.bin");
        let mut prompts = ScriptedPrompts::new()
            .select(1)
            .select(1)
            .accept(destination.to_str().unwrap());
        let recorded = prompts.clone();

        let (exit, downloaded) = run(&server, &mut prompts, dir.path().to_path_buf()).await;

        assert_eq!(exit, FlowExit::Completed);
        let downloaded = downloaded.unwrap();
        assert_eq!(downloaded.template, "db");
        assert_eq!(downloaded.version, "2.0");
        assert_eq!(downloaded.bytes, 6);
        assert_eq!(std::fs::read(&destination).unwrap(), b"db-2.0");

        let shown = recorded.shown();
        assert_eq!(shown.len(), 3);
        match &shown[2] {
            Shown::Text(view) => {
                assert_eq!(view.value, dir.path().join("db").display().to_string());
                assert!(view.buttons.iter().any(|b| b.is_back()));
            }
            other => panic!("unexpected prompt {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_back_from_version_returns_to_template_list() {
        let server = library_server().await;
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("db.bin");
        let mut prompts = ScriptedPrompts::new()
            .select(0)
            .back()
            .select(1)
            .select(1)
            .accept(destination.to_str().unwrap());
        let recorded = prompts.clone();

        let (exit, downloaded) = run(&server, &mut prompts, dir.path().to_path_buf()).await;

        assert_eq!(exit, FlowExit::Completed);
        assert_eq!(downloaded.unwrap().template, "db");
        let titles = recorded.titles();
        assert_eq!(titles.len(), 5);
        match &recorded.shown()[2] {
            Shown::Choice(view) => {
                assert_eq!(view.placeholder, "Pick an existing template");
                assert_eq!(view.active_item, Some(0));
            }
            other => panic!("unexpected prompt {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_download_restarts_at_template_choice() {
        let server = library_server().await;
        let dir = TempDir::new().unwrap();
        let web = dir.path().join("web.bin");
        let db = dir.path().join("db.bin");
        let mut prompts = ScriptedPrompts::new()
            .select(0)
            .select(0)
            .accept(web.to_str().unwrap())
            .select(1)
            .select(1)
            .accept(db.to_str().unwrap());
        let recorded = prompts.clone();

        let (exit, downloaded) = run(&server, &mut prompts, dir.path().to_path_buf()).await;

        assert_eq!(exit, FlowExit::Completed);
        assert_eq!(downloaded.unwrap().template, "db");
        assert!(!web.exists());
        assert!(recorded.notices().iter().any(|(level, message)| {
            *level == NoticeLevel::Error && message.contains("has failed")
        }));
        assert_eq!(recorded.shown().len(), 6);
    }

    #[tokio::test]
    async fn test_dismissing_destination_cancels() {
        let server = library_server().await;
        let dir = TempDir::new().unwrap();
        let mut prompts = ScriptedPrompts::new().select(1).select(0).dismiss();

        let (exit, downloaded) = run(&server, &mut prompts, dir.path().to_path_buf()).await;

        assert_eq!(exit, FlowExit::Cancelled);
        assert!(downloaded.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
