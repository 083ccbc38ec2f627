//! Session probing, broker discovery and persistence.

use crate::auth_fsm::{LoginMachineInput, LoginPhase, LoginTracker};
use crate::flow::{LoginFlow, LoginStep};
use crate::login_form::{IdentityProvider, LoginPage};
use crate::{AuthError, AuthResult};
use cookie_http::{Cookie, CookieHttpClient, CookieJar, HttpError, HttpRequest};
use library_config_and_utils::Config;
use session_storage::SessionRecords;
use std::time::Duration;
use step_flow::{FlowController, FlowExit, NoticeLevel, PromptSession};
use tracing::{debug, info, warn};
use url::Url;

/// Cookie that carries the authenticated session.
pub const SESSION_COOKIE_NAME: &str = "_forward_auth";

/// Where the credentials go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderChoice {
    /// The broker's own username/password form.
    Native,
    Broker(IdentityProvider),
}

impl ProviderChoice {
    pub fn label(&self) -> &str {
        match self {
            ProviderChoice::Native => "native",
            ProviderChoice::Broker(provider) => &provider.display_text,
        }
    }
}

/// Per-command session state.
#[derive(Debug, Default)]
pub struct Session {
    pub jar: CookieJar,
    pub bearer_token: Option<String>,
    pub provider: Option<ProviderChoice>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the bearer token, if any, to a request.
    pub fn authorize(&self, request: HttpRequest) -> HttpRequest {
        match &self.bearer_token {
            Some(token) => request.with_header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    fn reset(&mut self) {
        self.jar.clear();
        self.bearer_token = None;
        self.provider = None;
    }
}

/// Result of probing `users/current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Valid,
    NeedsLogin,
}

/// Service URLs and timeouts used during login.
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    pub probe: Url,
    pub login_entry: Url,
    pub probe_timeout: Duration,
}

impl Endpoints {
    fn from_config(config: &Config) -> AuthResult<Self> {
        let base = config.api_base()?;
        Ok(Self {
            probe: base.join("users/current")?,
            login_entry: base.join(config.login_entry_path.trim_start_matches('/'))?,
            probe_timeout: config.probe_timeout(),
        })
    }
}

/// Ask the service whether the session's cookies are still good.
///
/// 2xx with a JSON object body is a valid session. 3xx, 4xx and any other
/// 2xx body mean a login is needed. No response or a 5xx means the service
/// is unreachable.
pub(crate) async fn probe_session(
    http: &CookieHttpClient,
    endpoints: &Endpoints,
    session: &mut Session,
) -> AuthResult<SessionStatus> {
    let request = session
        .authorize(HttpRequest::get(endpoints.probe.clone()))
        .with_timeout(endpoints.probe_timeout);

    match http.do_request(&request, &mut session.jar).await {
        Ok(exchange) if exchange.is_success() && exchange.has_json_object_body() => {
            Ok(SessionStatus::Valid)
        }
        Ok(exchange) => {
            debug!(status = exchange.status, "Session probe needs login");
            Ok(SessionStatus::NeedsLogin)
        }
        Err(HttpError::Status(exchange)) if exchange.status >= 500 => {
            Err(AuthError::ServiceUnreachable {
                reason: format!("HTTP {} from {}", exchange.status, exchange.url),
            })
        }
        Err(HttpError::Status(exchange)) => {
            debug!(status = exchange.status, "Session probe needs login");
            Ok(SessionStatus::NeedsLogin)
        }
        Err(err @ HttpError::Transport { .. }) => Err(AuthError::ServiceUnreachable {
            reason: err.to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}

/// Drives the login dance and owns the persisted session record.
pub struct AuthSessionManager {
    http: CookieHttpClient,
    records: SessionRecords,
    prompts: Box<dyn PromptSession>,
    endpoints: Endpoints,
    max_login_attempts: u32,
    tracker: LoginTracker,
}

impl AuthSessionManager {
    pub fn new(
        config: &Config,
        records: SessionRecords,
        prompts: Box<dyn PromptSession>,
    ) -> AuthResult<Self> {
        let http = CookieHttpClient::new()?.with_max_redirects(config.max_redirects);

        Ok(Self {
            http,
            records,
            prompts,
            endpoints: Endpoints::from_config(config)?,
            max_login_attempts: config.max_login_attempts,
            tracker: LoginTracker::new(),
        })
    }

    /// The prompt session, for flows that run after authentication.
    pub fn prompts_mut(&mut self) -> &mut dyn PromptSession {
        self.prompts.as_mut()
    }

    pub fn phase(&self) -> LoginPhase {
        self.tracker.phase()
    }

    /// Create the session for a command, restoring the persisted cookie.
    ///
    /// A stored record that does not parse as a cookie, or whose Domain does
    /// not cover the API host, is deleted.
    pub fn start_session(&self) -> AuthResult<Session> {
        let mut session = Session::new();

        let Some(record) = self.records.get_session_cookie()? else {
            debug!("No stored session");
            return Ok(session);
        };

        let restored = match Cookie::parse(record) {
            Ok(cookie) => session.jar.inject(cookie.into_owned(), &self.endpoints.probe),
            Err(_) => false,
        };

        if restored {
            debug!(name = SESSION_COOKIE_NAME, "Restored stored session cookie");
        } else {
            warn!("Discarding unreadable stored session");
            self.records.clear_session_cookie()?;
        }

        Ok(session)
    }

    /// Probe the session without prompting.
    pub async fn check_session(&self, session: &mut Session) -> AuthResult<SessionStatus> {
        probe_session(&self.http, &self.endpoints, session).await
    }

    /// Make sure `session` is logged in, prompting for credentials if needed.
    ///
    /// Rejected credentials clear the stored session and restart from the
    /// probe, at most `max_login_attempts` times.
    pub async fn ensure_authenticated(&mut self, session: &mut Session) -> AuthResult<()> {
        let max_attempts = self.max_login_attempts.max(1);
        let mut last_username = String::new();

        for attempt in 1..=max_attempts {
            self.tracker = LoginTracker::new();

            match probe_session(&self.http, &self.endpoints, session).await {
                Ok(SessionStatus::Valid) => {
                    self.tracker.transition(LoginMachineInput::SessionValid)?;
                    info!(attempt, "Session is valid");
                    if attempt == 1 {
                        self.prompts
                            .notify(NoticeLevel::Info, "Template library session is valid.");
                    }
                    return Ok(());
                }
                Ok(SessionStatus::NeedsLogin) => {
                    self.tracker.transition(LoginMachineInput::NeedsLogin)?;
                }
                Err(err @ AuthError::ServiceUnreachable { .. }) => {
                    self.tracker.transition(LoginMachineInput::Unreachable)?;
                    self.prompts.notify(
                        NoticeLevel::Error,
                        "It looks like the Template library REST API is not accessible!",
                    );
                    return Err(err);
                }
                Err(err) => return Err(err),
            }

            if attempt == 1 {
                self.prompts.notify(
                    NoticeLevel::Info,
                    "You will need to log in as a KeyCloak or native Template library user!",
                );
            }

            let page = self.discover_login_page(session).await?;

            let mut handler = LoginFlow::new(
                &self.http,
                &self.endpoints,
                session,
                &mut self.tracker,
                &page,
                last_username.clone(),
            );
            let result = FlowController::new(self.prompts.as_mut())
                .run(&mut handler, LoginStep::Provider)
                .await;
            let (username, choice) = handler.into_parts();
            last_username = username;

            match result {
                Ok(FlowExit::Completed) => {
                    let Some(choice) = choice else {
                        return Err(AuthError::InvalidStateTransition(
                            "login flow completed without a provider".to_string(),
                        ));
                    };
                    info!(provider = %choice.label(), attempt, "Login succeeded");
                    self.prompts.notify(
                        NoticeLevel::Info,
                        &format!("{} login has been successful!", choice.label()),
                    );
                    session.provider = Some(choice);
                    self.persist(session)?;
                    return Ok(());
                }
                Ok(FlowExit::Cancelled) | Ok(FlowExit::BackedOut) => {
                    info!("Login cancelled by user");
                    return Err(AuthError::UserCancelled);
                }
                Err(err) if err.is_recoverable() => {
                    warn!(attempt, max_attempts, error = %err, "Login rejected");
                    self.prompts.notify(
                        NoticeLevel::Error,
                        &format!("{}! Please try again.", err),
                    );
                    self.records.clear_session_cookie()?;
                    session.reset();
                    if attempt < max_attempts {
                        self.tracker.transition(LoginMachineInput::Restart)?;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(AuthError::LoginAttemptsExhausted(max_attempts))
    }

    /// Forget the session: persisted record and in-memory state.
    pub fn delete_session(&mut self, session: &mut Session) -> AuthResult<()> {
        let existed = self.records.clear_session_cookie()?;
        session.reset();
        self.tracker = LoginTracker::new();
        info!(existed, "Session deleted");
        Ok(())
    }

    /// Follow the protected resource's redirect to the broker's login page.
    async fn discover_login_page(&self, session: &mut Session) -> AuthResult<LoginPage> {
        let entry = &self.endpoints.login_entry;
        let exchange = self
            .http
            .do_request(&HttpRequest::get(entry.clone()), &mut session.jar)
            .await?;

        let location = exchange
            .is_redirect()
            .then(|| exchange.location())
            .flatten()
            .ok_or_else(|| AuthError::MissingLoginRedirect {
                url: entry.to_string(),
            })?;

        let broker = self
            .http
            .do_request_follow_redirects(HttpRequest::get(location), &mut session.jar)
            .await?;

        let page = LoginPage::scrape(&broker.text(), &broker.url);
        if page.providers.is_empty() {
            let err = AuthError::ProviderPageUnparseable {
                url: page.url.to_string(),
            };
            debug!(error = %err, "Offering native login only");
        }
        debug!(
            url = %page.url,
            providers = page.providers.len(),
            has_form = page.form_action.is_some(),
            "Discovered login page"
        );

        Ok(page)
    }

    fn persist(&self, session: &Session) -> AuthResult<()> {
        match session.jar.export(&self.endpoints.probe, SESSION_COOKIE_NAME) {
            Some(cookie) => {
                self.records.set_session_cookie(&cookie.to_string())?;
                info!(name = SESSION_COOKIE_NAME, "Session cookie persisted");
            }
            None => warn!(
                name = SESSION_COOKIE_NAME,
                "Login succeeded without a session cookie; nothing persisted"
            ),
        }
        Ok(())
    }
}
