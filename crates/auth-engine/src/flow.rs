//! The interactive login steps: provider, username, password, verify.

use crate::auth_fsm::{LoginMachineInput, LoginTracker};
use crate::login_form::LoginPage;
use crate::session::{probe_session, Endpoints, ProviderChoice, Session, SessionStatus};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use cookie_http::{CookieHttpClient, HttpError, HttpExchange, HttpRequest};
use library_config_and_utils::validate_non_empty;
use step_flow::{
    validator, Answer, ChoiceItem, ChoiceSpec, FlowController, FlowSignal, StepHandler,
    StepOutcome, TextSpec,
};
use tracing::{debug, warn};
use url::Url;

const LOGIN_TITLE: &str = "Login to Template library";
const TOTAL_STEPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginStep {
    Provider,
    Username,
    Password,
    Verify,
}

/// Context of one pass through the login prompts.
pub(crate) struct LoginFlow<'a> {
    http: &'a CookieHttpClient,
    endpoints: &'a Endpoints,
    session: &'a mut Session,
    tracker: &'a mut LoginTracker,
    page: &'a LoginPage,
    username: String,
    password: String,
    choice: Option<ProviderChoice>,
}

impl<'a> LoginFlow<'a> {
    pub(crate) fn new(
        http: &'a CookieHttpClient,
        endpoints: &'a Endpoints,
        session: &'a mut Session,
        tracker: &'a mut LoginTracker,
        page: &'a LoginPage,
        username: String,
    ) -> Self {
        Self {
            http,
            endpoints,
            session,
            tracker,
            page,
            username,
            password: String::new(),
            choice: None,
        }
    }

    /// Last entered username and the chosen provider.
    pub(crate) fn into_parts(self) -> (String, Option<ProviderChoice>) {
        (self.username, self.choice)
    }

    fn menu(&self) -> Vec<ProviderChoice> {
        std::iter::once(ProviderChoice::Native)
            .chain(self.page.providers.iter().cloned().map(ProviderChoice::Broker))
            .collect()
    }

    fn signal(&mut self, signal: FlowSignal) -> AuthResult<StepOutcome<LoginStep>> {
        match signal {
            FlowSignal::Cancel => {
                self.tracker.transition(LoginMachineInput::Cancel)?;
            }
            FlowSignal::Back => {
                self.tracker.transition(LoginMachineInput::Back)?;
            }
            FlowSignal::Resume => {}
        }
        Ok(StepOutcome::Signal(signal))
    }

    async fn choose_provider(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> AuthResult<StepOutcome<LoginStep>> {
        let menu = self.menu();
        let items = menu
            .iter()
            .map(|choice| match choice {
                ProviderChoice::Native => {
                    ChoiceItem::new("native").with_description("Template library user")
                }
                ProviderChoice::Broker(provider) => {
                    let item = ChoiceItem::new(provider.display_text.clone());
                    match provider.href.host_str() {
                        Some(host) => item.with_description(host),
                        None => item,
                    }
                }
            })
            .collect();
        let active = self
            .choice
            .as_ref()
            .and_then(|chosen| menu.iter().position(|choice| choice == chosen));

        let spec = ChoiceSpec::new(LOGIN_TITLE, items)
            .step(1, TOTAL_STEPS)
            .placeholder("Pick an identity provider")
            .active_item(active);

        match flow.show_choice(spec).await? {
            Answer::Value(indices) => {
                let Some(choice) = indices.first().and_then(|index| menu.get(*index)) else {
                    return Ok(StepOutcome::Signal(FlowSignal::Resume));
                };
                debug!(provider = %choice.label(), "Provider chosen");
                self.choice = Some(choice.clone());
                self.tracker.transition(LoginMachineInput::ProviderChosen)?;
                Ok(StepOutcome::Next(LoginStep::Username))
            }
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => self.signal(signal),
        }
    }

    async fn enter_username(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> AuthResult<StepOutcome<LoginStep>> {
        let spec = TextSpec::new(LOGIN_TITLE)
            .step(2, TOTAL_STEPS)
            .value(self.username.clone())
            .prompt("Username")
            .validate(validator(|text: String| async move {
                validate_non_empty(&text)
            }));

        match flow.show_text(spec).await? {
            Answer::Value(username) => {
                self.username = username;
                self.tracker.transition(LoginMachineInput::UsernameEntered)?;
                Ok(StepOutcome::Next(LoginStep::Password))
            }
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => self.signal(signal),
        }
    }

    async fn enter_password(
        &mut self,
        flow: &mut FlowController<'_>,
    ) -> AuthResult<StepOutcome<LoginStep>> {
        let spec = TextSpec::new(LOGIN_TITLE)
            .step(3, TOTAL_STEPS)
            .prompt("Password")
            .password()
            .validate(validator(|text: String| async move {
                validate_non_empty(&text)
            }));

        match flow.show_text(spec).await? {
            Answer::Value(password) => {
                self.password = password;
                self.tracker.transition(LoginMachineInput::PasswordEntered)?;
                Ok(StepOutcome::Next(LoginStep::Verify))
            }
            Answer::Button(_) => Ok(StepOutcome::Signal(FlowSignal::Resume)),
            Answer::Signal(signal) => self.signal(signal),
        }
    }

    async fn verify(&mut self) -> AuthResult<StepOutcome<LoginStep>> {
        let choice = self
            .choice
            .clone()
            .ok_or_else(|| AuthError::InvalidStateTransition("no provider chosen".to_string()))?;

        let verified = self.submit(&choice).await;
        self.password.clear();
        let verified = verified?;

        if verified {
            self.tracker.transition(LoginMachineInput::Verified)?;
            Ok(StepOutcome::Done)
        } else {
            self.tracker.transition(LoginMachineInput::Rejected)?;
            Err(AuthError::LoginRejected {
                provider: choice.label().to_string(),
            })
        }
    }

    /// Post the credentials to the right login form and re-probe.
    async fn submit(&mut self, choice: &ProviderChoice) -> AuthResult<bool> {
        let action = match choice {
            ProviderChoice::Native => self.page.form_action.clone().ok_or_else(|| {
                AuthError::LoginFormNotFound {
                    url: self.page.url.to_string(),
                }
            })?,
            ProviderChoice::Broker(provider) => {
                let request = HttpRequest::get(provider.href.clone());
                let Some(exchange) = self.follow(request).await? else {
                    return Ok(false);
                };
                provider_form_action(&exchange)?
            }
        };

        debug!(provider = %choice.label(), action = %action, "Submitting credentials");
        let form = HttpRequest::post_form(
            action,
            [
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("credentialId", ""),
            ],
        );
        let Some(exchange) = self.follow(form).await? else {
            return Ok(false);
        };
        if let Some(token) = bearer_token(&exchange) {
            self.session.bearer_token = Some(token);
        }

        // Anything but a valid session here is a rejected login.
        match probe_session(self.http, self.endpoints, self.session).await {
            Ok(status) => Ok(status == SessionStatus::Valid),
            Err(err) => {
                warn!(error = %err, "Session probe after login failed");
                Ok(false)
            }
        }
    }

    /// Follow a redirect chain; an error status counts as a rejection.
    async fn follow(&mut self, request: HttpRequest) -> AuthResult<Option<HttpExchange>> {
        match self
            .http
            .do_request_follow_redirects(request, &mut self.session.jar)
            .await
        {
            Ok(exchange) => Ok(Some(exchange)),
            Err(HttpError::Status(exchange)) => {
                warn!(status = exchange.status, url = %exchange.url, "Login request rejected");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn provider_form_action(exchange: &HttpExchange) -> AuthResult<Url> {
    LoginPage::scrape(&exchange.text(), &exchange.url)
        .form_action
        .ok_or_else(|| AuthError::LoginFormNotFound {
            url: exchange.url.to_string(),
        })
}

/// Token from a JSON login response of the form `{"token": "..."}`.
fn bearer_token(exchange: &HttpExchange) -> Option<String> {
    exchange
        .json::<serde_json::Value>()
        .ok()?
        .get("token")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl<'a> StepHandler for LoginFlow<'a> {
    type Step = LoginStep;
    type Error = AuthError;

    async fn run_step(
        &mut self,
        step: LoginStep,
        flow: &mut FlowController<'_>,
    ) -> AuthResult<StepOutcome<LoginStep>> {
        match step {
            LoginStep::Provider => self.choose_provider(flow).await,
            LoginStep::Username => self.enter_username(flow).await,
            LoginStep::Password => self.enter_password(flow).await,
            LoginStep::Verify => self.verify().await,
        }
    }
}
