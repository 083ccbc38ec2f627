//! Interactive upload: create a template and its first version, or add a
//! version to an existing template.

use crate::library_client::{
    LibraryClient, LibraryError, LibraryResult, NewTemplate, NewVersion,
};
use async_trait::async_trait;
use auth_engine::Session;
use library_config_and_utils::validate_non_empty;
use std::path::PathBuf;
use step_flow::{
    validator, Answer, ChoiceItem, ChoiceSpec, FlowController, FlowSignal, NoticeLevel,
    PromptButton, StepHandler, StepOutcome, TextSpec,
};
use tracing::{debug, warn};

const ACTION_TITLE: &str = "Pick your desired template action";
const TEMPLATE_TITLE: &str = "Create a new template";
const VERSION_TITLE: &str = "Create a new template version";
const TEMPLATE_STEPS: usize = 4;
const VERSION_STEPS: usize = 4;

const CREATE_TEMPLATE: &str = "create a whole new template";
const CREATE_VERSION: &str = "create just a new template version";
const README_EMPTY: &str = "send empty";
const README_PICK: &str = "pick from filesystem";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    Action,
    TemplateName,
    Description,
    TemplateType,
    PublicAccess,
    VersionTemplate,
    VersionName,
    Readme,
    ReadmePath,
    TemplateFile,
}

/// What the service accepted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Uploaded {
    pub template: String,
    pub version: String,
    pub created_template: bool,
}

pub struct UploadFlow<'a> {
    client: &'a LibraryClient,
    session: &'a mut Session,
    template: NewTemplate,
    version: NewVersion,
    created_template: bool,
    uploaded: Option<Uploaded>,
}

impl<'a> UploadFlow<'a> {
    pub fn new(client: &'a LibraryClient, session: &'a mut Session) -> Self {
        Self {
            client,
            session,
            template: NewTemplate {
                name: String::new(),
                description: String::new(),
                template_type_name: String::new(),
                public_access: true,
            },
            version: NewVersion::default(),
            created_template: false,
            uploaded: None,
        }
    }

    pub fn into_uploaded(self) -> Option<Uploaded> {
        self.uploaded
    }

    async fn pick_action(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let spec = ChoiceSpec::new(
            ACTION_TITLE,
            vec![ChoiceItem::new(CREATE_TEMPLATE), ChoiceItem::new(CREATE_VERSION)],
        )
        .step(1, 1)
        .placeholder("Pick the desired action")
        .active_item(Some(0));

        match flow.show_choice(spec).await? {
            Answer::Value(indices) => match indices.first() {
                Some(0) => Ok(StepOutcome::Next(UploadStep::TemplateName)),
                Some(1) => Ok(StepOutcome::Next(UploadStep::VersionTemplate)),
                _ => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            },
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn enter_template_name(
        &mut self,
        flow: &mut FlowController<'_>,
        title: &str,
        step: (usize, usize),
        prompt: &str,
        next: UploadStep,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let spec = TextSpec::new(title)
            .step(step.0, step.1)
            .value(self.template.name.clone())
            .prompt(prompt)
            .button(PromptButton::back())
            .validate(validator(|text: String| async move {
                validate_non_empty(&text)
            }));

        match flow.show_text(spec).await? {
            Answer::Value(name) => {
                self.template.name = name;
                Ok(StepOutcome::Next(next))
            }
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn enter_description(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let spec = TextSpec::new(TEMPLATE_TITLE)
            .step(2, TEMPLATE_STEPS)
            .value(self.template.description.clone())
            .prompt("Template description")
            .button(PromptButton::back())
            .validate(validator(|text: String| async move {
                validate_non_empty(&text)
            }));

        match flow.show_text(spec).await? {
            Answer::Value(description) => {
                self.template.description = description;
                Ok(StepOutcome::Next(UploadStep::TemplateType))
            }
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn pick_template_type(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let types = match self.client.list_template_types(self.session).await {
            Ok(types) => types,
            Err(err) => {
                warn!(error = %err, "Listing template types failed");
                let message = err.service_message().unwrap_or_else(|| {
                    "There was an error when retrieving template types.".to_string()
                });
                flow.notify(NoticeLevel::Error, &message);
                return Ok(StepOutcome::Done);
            }
        };
        if types.is_empty() {
            flow.notify(NoticeLevel::Warning, "The library offers no template types.");
            return Ok(StepOutcome::Done);
        }

        let active = types
            .iter()
            .position(|t| t.name == self.template.template_type_name)
            .or(Some(0));
        let items = types.iter().map(|t| ChoiceItem::new(&t.name)).collect();
        let spec = ChoiceSpec::new(TEMPLATE_TITLE, items)
            .step(3, TEMPLATE_STEPS)
            .placeholder("Pick a template type")
            .active_item(active)
            .button(PromptButton::back());

        match flow.show_choice(spec).await? {
            Answer::Value(indices) => match indices.first().and_then(|i| types.get(*i)) {
                Some(template_type) => {
                    self.template.template_type_name = template_type.name.clone();
                    Ok(StepOutcome::Next(UploadStep::PublicAccess))
                }
                None => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            },
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn pick_public_access(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let active = if self.template.public_access { 0 } else { 1 };
        let spec = ChoiceSpec::new(
            TEMPLATE_TITLE,
            vec![ChoiceItem::new("true"), ChoiceItem::new("false")],
        )
        .step(4, TEMPLATE_STEPS)
        .placeholder("Do you want your template to be publicly accessible?")
        .active_item(Some(active))
        .button(PromptButton::back());

        match flow.show_choice(spec).await? {
            Answer::Value(indices) => match indices.first() {
                Some(index @ (0 | 1)) => {
                    self.template.public_access = *index == 0;
                }
                _ => return Ok(StepOutcome::Signal(FlowSignal::Resume)),
            },
            Answer::Button(_) => return Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => return Ok(StepOutcome::Signal(signal)),
        }

        match self.client.create_template(self.session, &self.template).await {
            Ok(()) => {
                flow.notify(
                    NoticeLevel::Info,
                    &format!("Template '{}' was added successfully!", self.template.name),
                );
                self.created_template = true;
                Ok(StepOutcome::Next(UploadStep::VersionName))
            }
            Err(err) => {
                warn!(error = %err, template = %self.template.name, "Creating template failed");
                let message = err
                    .service_message()
                    .unwrap_or_else(|| "Adding template has failed! Please try again.".to_string());
                flow.notify(NoticeLevel::Error, &message);
                Ok(StepOutcome::Next(UploadStep::TemplateName))
            }
        }
    }

    async fn enter_version_name(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let spec = TextSpec::new(VERSION_TITLE)
            .step(1, VERSION_STEPS)
            .value(self.version.version_name.clone())
            .prompt("Version name")
            .validate(validator(|text: String| async move {
                validate_non_empty(&text)
            }));

        match flow.show_text(spec).await? {
            Answer::Value(name) => {
                self.version.version_name = name;
                Ok(StepOutcome::Next(UploadStep::Readme))
            }
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn pick_readme(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let active = if self.version.readme_file.is_some() { 1 } else { 0 };
        let spec = ChoiceSpec::new(
            VERSION_TITLE,
            vec![ChoiceItem::new(README_EMPTY), ChoiceItem::new(README_PICK)],
        )
        .step(2, VERSION_STEPS)
        .placeholder("Pick a README file")
        .active_item(Some(active))
        .button(PromptButton::back());

        match flow.show_choice(spec).await? {
            Answer::Value(indices) => match indices.first() {
                Some(0) => {
                    self.version.readme_file = None;
                    Ok(StepOutcome::Next(UploadStep::TemplateFile))
                }
                Some(1) => Ok(StepOutcome::Next(UploadStep::ReadmePath)),
                _ => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            },
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn enter_readme_path(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let current = self
            .version
            .readme_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        let spec = TextSpec::new(VERSION_TITLE)
            .step(2, VERSION_STEPS)
            .value(current)
            .prompt("Type in the path to the README file")
            .button(PromptButton::back())
            .validate(validator(|text: String| async move { validate_file(&text).await }));

        match flow.show_text(spec).await? {
            Answer::Value(path) => {
                self.version.readme_file = Some(PathBuf::from(path));
                Ok(StepOutcome::Next(UploadStep::TemplateFile))
            }
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => Ok(StepOutcome::Signal(signal)),
        }
    }

    async fn enter_template_file(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        let spec = TextSpec::new(VERSION_TITLE)
            .step(3, VERSION_STEPS)
            .value(self.version.template_file.display().to_string())
            .prompt("Type in the path to the template file (CSAR archive or TOSCA YAML)")
            .button(PromptButton::back())
            .validate(validator(|text: String| async move { validate_file(&text).await }));

        match flow.show_text(spec).await? {
            Answer::Value(path) => self.version.template_file = PathBuf::from(path),
            Answer::Button(_) => return Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => return Ok(StepOutcome::Signal(signal)),
        }

        let template = self.template.name.clone();
        match self
            .client
            .create_version(self.session, &template, &self.version)
            .await
        {
            Ok(()) => {
                flow.notify(
                    NoticeLevel::Info,
                    &format!(
                        "New version '{}' for template '{}' was successfully inserted!",
                        self.version.version_name, template
                    ),
                );
                self.uploaded = Some(Uploaded {
                    template,
                    version: self.version.version_name.clone(),
                    created_template: self.created_template,
                });
                Ok(StepOutcome::Done)
            }
            Err(err) => {
                warn!(error = %err, template = %template, "Uploading version failed");
                let message = err
                    .service_message()
                    .unwrap_or_else(|| "Adding a version has failed! Please try again.".to_string());
                flow.notify(NoticeLevel::Error, &message);
                Ok(StepOutcome::Next(UploadStep::VersionName))
            }
        }
    }
}

/// Validation message unless `text` names an existing regular file.
async fn validate_file(text: &str) -> Option<String> {
    if let Some(message) = validate_non_empty(text) {
        return Some(message);
    }
    match tokio::fs::metadata(text).await {
        Ok(metadata) if metadata.is_file() => None,
        Ok(_) => Some(format!("'{}' is not a file.", text)),
        Err(_) => Some(format!("File '{}' does not exist.", text)),
    }
}

#[async_trait]
impl<'a> StepHandler for UploadFlow<'a> {
    type Step = UploadStep;
    type Error = LibraryError;

    async fn run_step(
        &mut self,
        step: UploadStep,
        flow: &mut FlowController<'_>,
    ) -> LibraryResult<StepOutcome<UploadStep>> {
        debug!(?step, "Upload step");
        match step {
            UploadStep::Action => self.pick_action(flow).await,
            UploadStep::TemplateName => {
                self.enter_template_name(
                    flow,
                    TEMPLATE_TITLE,
                    (1, TEMPLATE_STEPS),
                    "Template name",
                    UploadStep::Description,
                )
                .await
            }
            UploadStep::Description => self.enter_description(flow).await,
            UploadStep::TemplateType => self.pick_template_type(flow).await,
            UploadStep::PublicAccess => self.pick_public_access(flow).await,
            UploadStep::VersionTemplate => {
                self.enter_template_name(
                    flow,
                    VERSION_TITLE,
                    (1, VERSION_STEPS),
                    "Type in the template name to create version for",
                    UploadStep::VersionName,
                )
                .await
            }
            UploadStep::VersionName => self.enter_version_name(flow).await,
            UploadStep::Readme => self.pick_readme(flow).await,
            UploadStep::ReadmePath => self.enter_readme_path(flow).await,
            UploadStep::TemplateFile => self.enter_template_file(flow).await,
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
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn library_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/template_types"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"[{"name":"tosca"},{"name":"ansible"}]"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/templates"))
            .and(body_string_contains("\"taken\""))
            .respond_with(ResponseTemplate::new(409).set_body_string("Template 'taken' already exists"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/templates"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/templates/web/versions"))
            .respond_with(ResponseTemplate::new(201))
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

    fn template_file(dir: &TempDir) -> String {
        let file = dir.path().join("service.yaml");
        std::fs::write(&file, "tosca_definitions_version: tosca_simple_yaml_1_3").unwrap();
        file.display().to_string()
    }

    async fn run(server: &MockServer, prompts: &mut ScriptedPrompts) -> (FlowExit, Option<Uploaded>) {
        let client = client_for(server);
        let mut session = Session::new();
        let mut handler = UploadFlow::new(&client, &mut session);
        let exit = FlowController::new(prompts)
            .run(&mut handler, UploadStep::Action)
            .await
            .unwrap();
        (exit, handler.into_uploaded())
    }

    #[tokio::test]
    async fn test_create_template_then_first_version() {
        let server = library_server().await;
        let dir = TempDir::new().unwrap();
        let mut prompts = ScriptedPrompts::new()
            .select(0)
            .accept("web")
            .accept("Web stack")
            .select(1)
            .select(1)
            .accept("1.0")
            .select(0)
            .accept(&template_file(&dir));
        let recorded = prompts.clone();

        let (exit, uploaded) = run(&server, &mut prompts).await;

        assert_eq!(exit, FlowExit::Completed);
        assert_eq!(
            uploaded,
            Some(Uploaded {
                template: "web".to_string(),
                version: "1.0".to_string(),
                created_template: true,
            })
        );

        let requests = server.received_requests().await.unwrap();
        let created = requests
            .iter()
            .find(|r| r.method.as_str() == "POST" && r.url.path() == "/api/templates")
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&created.body).unwrap();
        assert_eq!(body["template_type_name"], "ansible");
        assert_eq!(body["public_access"], false);

        let notices = recorded.notices();
        assert!(notices.iter().any(|(_, m)| m == "Template 'web' was added successfully!"));
        assert!(notices
            .iter()
            .any(|(_, m)| m == "New version '1.0' for template 'web' was successfully inserted!"));
    }

    #[tokio::test]
    async fn test_rejected_template_returns_to_name_with_service_message() {
        let server = library_server().await;
        let dir = TempDir::new().unwrap();
        let mut prompts = ScriptedPrompts::new()
            .select(0)
            .accept("taken")
            .accept("Web stack")
            .select(0)
            .select(0)
            .accept("web")
            .accept("Web stack")
            .select(0)
            .select(0)
            .accept("1.0")
            .select(0)
            .accept(&template_file(&dir));
        let recorded = prompts.clone();

        let (exit, uploaded) = run(&server, &mut prompts).await;

        assert_eq!(exit, FlowExit::Completed);
        assert_eq!(uploaded.unwrap().template, "web");
        assert!(recorded.notices().iter().any(|(level, message)| {
            *level == NoticeLevel::Error && message == "Template 'taken' already exists"
        }));
        match &recorded.shown()[5] {
            Shown::Text(view) => {
                assert_eq!(view.title, TEMPLATE_TITLE);
                assert_eq!(view.value, "taken");
            }
            other => panic!("unexpected prompt {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_version_only_upload_with_readme() {
        let server = library_server().await;
        let dir = TempDir::new().unwrap();
        let readme = dir.path().join("README.md");
        std::fs::write(&readme, "# Web").unwrap();
        let mut prompts = ScriptedPrompts::new()
            .select(1)
            .accept("web")
            .accept("2.0")
            .select(1)
            .accept(readme.to_str().unwrap())
            .accept(&template_file(&dir));

        let (exit, uploaded) = run(&server, &mut prompts).await;

        assert_eq!(exit, FlowExit::Completed);
        let uploaded = uploaded.unwrap();
        assert_eq!(uploaded.version, "2.0");
        assert!(!uploaded.created_template);

        let requests = server.received_requests().await.unwrap();
        assert!(!requests.iter().any(|r| r.url.path() == "/api/templates"));
        let upload = requests
            .iter()
            .find(|r| r.url.path() == "/api/templates/web/versions")
            .unwrap();
        let body = String::from_utf8_lossy(&upload.body);
        assert!(body.contains("name=\"readme_file\""));
        assert!(body.contains("# Web"));
    }

    #[tokio::test]
    async fn test_failed_version_upload_returns_to_version_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/templates/web/versions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/templates/web/versions"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file = template_file(&dir);
        let mut prompts = ScriptedPrompts::new()
            .select(1)
            .accept("web")
            .accept("1.0")
            .select(0)
            .accept(&file)
            .accept("1.1")
            .select(0)
            .accept(&file);
        let recorded = prompts.clone();

        let (exit, uploaded) = run(&server, &mut prompts).await;

        assert_eq!(exit, FlowExit::Completed);
        assert_eq!(uploaded.unwrap().version, "1.1");
        assert!(recorded.notices().iter().any(|(level, message)| {
            *level == NoticeLevel::Error && message == "Adding a version has failed! Please try again."
        }));
    }

    #[tokio::test]
    async fn test_missing_template_file_is_a_validation_error() {
        let message = validate_file("/definitely/not/here.yaml").await;
        assert!(message.unwrap().contains("does not exist"));

        let dir = TempDir::new().unwrap();
        let message = validate_file(dir.path().to_str().unwrap()).await;
        assert!(message.unwrap().contains("is not a file"));
        assert_eq!(validate_file(&template_file(&dir)).await, None);
    }

    #[tokio::test]
    async fn test_dismissing_action_cancels() {
        let server = library_server().await;
        let mut prompts = ScriptedPrompts::new().dismiss();

        let (exit, uploaded) = run(&server, &mut prompts).await;

        assert_eq!(exit, FlowExit::Cancelled);
        assert!(uploaded.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
