//! Template library REST calls over an authenticated session.

use auth_engine::Session;
use bytes::Bytes;
use cookie_http::{CookieHttpClient, HttpError, HttpExchange, HttpRequest, MultipartField};
use library_config_and_utils::{Config, CoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use step_flow::PromptError;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Statuses the service uses for successful calls.
pub const SUCCESS_STATUS_CODES: [u16; 3] = [200, 201, 202];

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Unexpected HTTP {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Endpoint {0} cannot take path segments")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Config(#[from] CoreError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is a directory, pick an archive or a single template file")]
    NotAFile(PathBuf),

    #[error("Could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LibraryError {
    /// Body of the service's error response, when it sent one.
    pub fn service_message(&self) -> Option<String> {
        match self {
            LibraryError::Http(http) => http
                .exchange()
                .map(|exchange| exchange.text().trim().to_string())
                .filter(|text| !text.is_empty()),
            _ => None,
        }
    }
}

pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVersion {
    #[serde(rename = "versionName")]
    pub version_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateType {
    pub name: String,
}

/// Body of a template creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTemplate {
    pub name: String,
    pub description: String,
    pub template_type_name: String,
    pub public_access: bool,
}

/// Files of a new template version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewVersion {
    pub version_name: String,
    pub template_file: PathBuf,
    pub readme_file: Option<PathBuf>,
    pub implementation_files: Vec<PathBuf>,
}

pub struct LibraryClient {
    http: CookieHttpClient,
    base: Url,
    download_timeout: Duration,
}

impl LibraryClient {
    pub fn new(config: &Config) -> LibraryResult<Self> {
        Ok(Self {
            http: CookieHttpClient::new()?.with_max_redirects(config.max_redirects),
            base: config.api_base()?,
            download_timeout: config.download_timeout(),
        })
    }

    pub async fn list_templates(&self, session: &mut Session) -> LibraryResult<Vec<TemplateSummary>> {
        let url = self.endpoint(&["templates"])?;
        let exchange = self.get(session, url, None).await?;
        Ok(exchange.json()?)
    }

    pub async fn list_versions(
        &self,
        session: &mut Session,
        template: &str,
    ) -> LibraryResult<Vec<TemplateVersion>> {
        let url = self.endpoint(&["templates", template, "versions"])?;
        let exchange = self.get(session, url, None).await?;
        Ok(exchange.json()?)
    }

    pub async fn list_template_types(&self, session: &mut Session) -> LibraryResult<Vec<TemplateType>> {
        let url = self.endpoint(&["template_types"])?;
        let exchange = self.get(session, url, None).await?;
        Ok(exchange.json()?)
    }

    pub async fn create_template(
        &self,
        session: &mut Session,
        template: &NewTemplate,
    ) -> LibraryResult<()> {
        let url = self.endpoint(&["templates"])?;
        let request = HttpRequest::post_json(url, serde_json::to_value(template)?);
        self.send(session, request).await?;
        info!(template = %template.name, "Template created");
        Ok(())
    }

    /// Upload a new version of `template` as a multipart form.
    pub async fn create_version(
        &self,
        session: &mut Session,
        template: &str,
        version: &NewVersion,
    ) -> LibraryResult<()> {
        let mut fields = vec![MultipartField::text("version_name", &version.version_name)];
        if let Some(readme) = &version.readme_file {
            fields.push(file_field("readme_file", readme).await?);
        }
        fields.push(file_field("template_file", &version.template_file).await?);
        for implementation in &version.implementation_files {
            fields.push(file_field("implementation_file", implementation).await?);
        }

        let url = self.endpoint(&["templates", template, "versions"])?;
        let request =
            HttpRequest::post_multipart(url, fields).with_timeout(self.download_timeout);
        self.send(session, request).await?;
        info!(template, version = %version.version_name, "Template version uploaded");
        Ok(())
    }

    /// Download the files of one version to `destination`; returns the
    /// number of bytes written.
    pub async fn download_version_files(
        &self,
        session: &mut Session,
        template: &str,
        version: &str,
        destination: &Path,
    ) -> LibraryResult<u64> {
        let url = self.endpoint(&["templates", template, "versions", version, "files"])?;
        let exchange = self
            .get(session, url, Some(self.download_timeout))
            .await?;

        let write_err = |source| LibraryError::Write {
            path: destination.to_path_buf(),
            source,
        };
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(destination, &exchange.body)
            .await
            .map_err(write_err)?;

        let written = exchange.body.len() as u64;
        info!(template, version, bytes = written, "Template files downloaded");
        Ok(written)
    }

    async fn get(
        &self,
        session: &mut Session,
        url: Url,
        timeout: Option<Duration>,
    ) -> LibraryResult<HttpExchange> {
        let mut request = HttpRequest::get(url);
        if let Some(timeout) = timeout {
            request = request.with_timeout(timeout);
        }
        self.send(session, request).await
    }

    async fn send(&self, session: &mut Session, request: HttpRequest) -> LibraryResult<HttpExchange> {
        let request = session.authorize(request);
        let exchange = self.http.do_request(&request, &mut session.jar).await?;
        debug!(url = %exchange.url, status = exchange.status, "Library call");
        if !SUCCESS_STATUS_CODES.contains(&exchange.status) {
            return Err(LibraryError::UnexpectedStatus {
                url: exchange.url.to_string(),
                status: exchange.status,
            });
        }
        Ok(exchange)
    }

    /// Endpoint URL with percent-encoded path segments appended.
    fn endpoint(&self, segments: &[&str]) -> LibraryResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LibraryError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn file_field(name: &str, path: &Path) -> LibraryResult<MultipartField> {
    let read_err = |source| LibraryError::Read {
        path: path.to_path_buf(),
        source,
    };
    if tokio::fs::metadata(path).await.map_err(read_err)?.is_dir() {
        return Err(LibraryError::NotAFile(path.to_path_buf()));
    }
    let contents = tokio::fs::read(path).await.map_err(read_err)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    Ok(MultipartField::file(name, file_name, Bytes::from(contents)))
}
