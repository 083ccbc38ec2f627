//! Contract with the component that renders prompt widgets.

use crate::PromptResult;
use async_trait::async_trait;

/// Id of the synthetic back button the engine adds after the first step.
pub const BACK_BUTTON_ID: &str = "back";

/// Extra action button shown on a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptButton {
    pub id: String,
    pub tooltip: String,
}

impl PromptButton {
    pub fn new(id: impl Into<String>, tooltip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tooltip: tooltip.into(),
        }
    }

    pub fn back() -> Self {
        Self::new(BACK_BUTTON_ID, "Back")
    }

    pub fn is_back(&self) -> bool {
        self.id == BACK_BUTTON_ID
    }
}

/// One entry of a choice list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceItem {
    pub label: String,
    pub description: Option<String>,
}

impl ChoiceItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// What a choice widget must render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceView {
    pub title: String,
    pub step: usize,
    pub total_steps: usize,
    pub placeholder: String,
    pub items: Vec<ChoiceItem>,
    pub active_item: Option<usize>,
    pub buttons: Vec<PromptButton>,
    pub can_select_many: bool,
}

/// What a text widget must render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextView {
    pub title: String,
    pub step: usize,
    pub total_steps: usize,
    pub value: String,
    pub prompt: String,
    pub password: bool,
    pub buttons: Vec<PromptButton>,
}

/// User interaction reported by a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// Choice widgets: the accepted selection.
    Selected(Vec<usize>),
    ButtonPressed(String),
    /// Text widgets: the value was edited.
    ValueChanged(String),
    /// Text widgets: the user submitted the value.
    Accepted(String),
    /// The widget was dismissed without an answer.
    Hidden,
}

/// Severity of a [`PromptSession::notify`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A live widget.
#[async_trait]
pub trait Widget: Send {
    /// Wait for the next user interaction.
    ///
    /// Must be cancel safe: the engine polls this inside `tokio::select!`
    /// and drops the future when a validation result arrives first. No
    /// event may be lost when that happens.
    async fn next_event(&mut self) -> PromptResult<WidgetEvent>;

    fn set_busy(&mut self, _busy: bool) {}

    fn set_enabled(&mut self, _enabled: bool) {}

    /// Show or clear the inline validation message of a text widget.
    fn set_validation_message(&mut self, _message: Option<&str>) {}

    /// Release the widget. Called exactly once.
    fn dispose(&mut self);
}

/// Renders one widget at a time and shows notifications.
pub trait PromptSession: Send {
    fn open_choice(&mut self, view: ChoiceView) -> PromptResult<Box<dyn Widget>>;

    fn open_text(&mut self, view: TextView) -> PromptResult<Box<dyn Widget>>;

    fn notify(&mut self, level: NoticeLevel, message: &str);
}
