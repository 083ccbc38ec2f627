//! Step-side descriptions of the widgets to show.

use crate::prompt::{ChoiceItem, PromptButton};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Async text validator. `None` means the value is acceptable.
pub type Validator = Arc<dyn Fn(String) -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Decides whether a dismissed widget resumes (`true`) or cancels the flow.
pub type ResumePredicate = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Wrap an async closure as a [`Validator`].
pub fn validator<F, Fut>(f: F) -> Validator
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    Arc::new(move |text| f(text).boxed())
}

/// Wrap an async closure as a [`ResumePredicate`].
pub fn resume_when<F, Fut>(f: F) -> ResumePredicate
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// A choice prompt as a step describes it.
#[derive(Clone)]
pub struct ChoiceSpec {
    pub title: String,
    pub step: usize,
    pub total_steps: usize,
    pub placeholder: String,
    pub items: Vec<ChoiceItem>,
    pub active_item: Option<usize>,
    pub buttons: Vec<PromptButton>,
    pub can_select_many: bool,
    pub should_resume: Option<ResumePredicate>,
}

impl ChoiceSpec {
    pub fn new(title: impl Into<String>, items: Vec<ChoiceItem>) -> Self {
        Self {
            title: title.into(),
            step: 1,
            total_steps: 1,
            placeholder: String::new(),
            items,
            active_item: None,
            buttons: Vec::new(),
            can_select_many: false,
            should_resume: None,
        }
    }

    pub fn step(mut self, step: usize, total_steps: usize) -> Self {
        self.step = step;
        self.total_steps = total_steps;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn active_item(mut self, index: Option<usize>) -> Self {
        self.active_item = index;
        self
    }

    pub fn button(mut self, button: PromptButton) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn select_many(mut self) -> Self {
        self.can_select_many = true;
        self
    }

    pub fn should_resume(mut self, predicate: ResumePredicate) -> Self {
        self.should_resume = Some(predicate);
        self
    }
}

impl fmt::Debug for ChoiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChoiceSpec")
            .field("title", &self.title)
            .field("step", &self.step)
            .field("total_steps", &self.total_steps)
            .field("items", &self.items.len())
            .field("should_resume", &self.should_resume.is_some())
            .finish()
    }
}

/// A text prompt as a step describes it.
#[derive(Clone)]
pub struct TextSpec {
    pub title: String,
    pub step: usize,
    pub total_steps: usize,
    pub value: String,
    pub prompt: String,
    pub password: bool,
    pub buttons: Vec<PromptButton>,
    pub validate: Option<Validator>,
    pub should_resume: Option<ResumePredicate>,
}

impl TextSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            step: 1,
            total_steps: 1,
            value: String::new(),
            prompt: String::new(),
            password: false,
            buttons: Vec::new(),
            validate: None,
            should_resume: None,
        }
    }

    pub fn step(mut self, step: usize, total_steps: usize) -> Self {
        self.step = step;
        self.total_steps = total_steps;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn password(mut self) -> Self {
        self.password = true;
        self
    }

    pub fn button(mut self, button: PromptButton) -> Self {
        self.buttons.push(button);
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate = Some(validator);
        self
    }

    pub fn should_resume(mut self, predicate: ResumePredicate) -> Self {
        self.should_resume = Some(predicate);
        self
    }

    pub(crate) async fn run_validator(&self, text: String) -> Option<String> {
        match &self.validate {
            Some(validate) => validate(text).await,
            None => None,
        }
    }
}

impl fmt::Debug for TextSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextSpec")
            .field("title", &self.title)
            .field("step", &self.step)
            .field("total_steps", &self.total_steps)
            .field("password", &self.password)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}
