//! Scripted prompt session for tests.
//!
//! Widgets replay a shared queue of events in order and record everything
//! the engine shows them. When the queue runs dry every widget reports
//! [`WidgetEvent::Hidden`], which lets tests assert that no further prompts
//! were answered.

use crate::prompt::{ChoiceView, NoticeLevel, PromptSession, TextView, Widget, WidgetEvent};
use crate::{PromptError, PromptResult, BACK_BUTTON_ID};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One scripted user action.
#[derive(Debug, Clone)]
pub enum Scripted {
    Event(WidgetEvent),
    /// Let time pass before the next event, e.g. for validators to finish.
    Pause(Duration),
}

/// A widget as it was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Choice(ChoiceView),
    Text(TextView),
}

impl Shown {
    pub fn title(&self) -> &str {
        match self {
            Shown::Choice(view) => &view.title,
            Shown::Text(view) => &view.title,
        }
    }
}

#[derive(Default)]
struct ScriptState {
    script: VecDeque<Scripted>,
    shown: Vec<Shown>,
    notices: Vec<(NoticeLevel, String)>,
    validation_messages: Vec<Option<String>>,
    disposed: usize,
}

/// A [`PromptSession`] driven by a script. Clones share state, so a test can
/// hand one clone to the code under test and inspect another.
#[derive(Clone, Default)]
pub struct ScriptedPrompts {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPrompts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, action: Scripted) -> Self {
        self.state.lock().script.push_back(action);
        self
    }

    pub fn event(self, event: WidgetEvent) -> Self {
        self.then(Scripted::Event(event))
    }

    pub fn select(self, index: usize) -> Self {
        self.event(WidgetEvent::Selected(vec![index]))
    }

    pub fn select_many(self, indices: Vec<usize>) -> Self {
        self.event(WidgetEvent::Selected(indices))
    }

    pub fn change(self, text: &str) -> Self {
        self.event(WidgetEvent::ValueChanged(text.to_string()))
    }

    pub fn accept(self, text: &str) -> Self {
        self.event(WidgetEvent::Accepted(text.to_string()))
    }

    pub fn press(self, id: &str) -> Self {
        self.event(WidgetEvent::ButtonPressed(id.to_string()))
    }

    pub fn back(self) -> Self {
        self.press(BACK_BUTTON_ID)
    }

    pub fn dismiss(self) -> Self {
        self.event(WidgetEvent::Hidden)
    }

    pub fn pause(self, duration: Duration) -> Self {
        self.then(Scripted::Pause(duration))
    }

    /// Every widget opened so far, in order.
    pub fn shown(&self) -> Vec<Shown> {
        self.state.lock().shown.clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.state
            .lock()
            .shown
            .iter()
            .map(|shown| shown.title().to_string())
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().shown.len()
    }

    pub fn disposed(&self) -> usize {
        self.state.lock().disposed
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.state.lock().notices.clone()
    }

    pub fn validation_messages(&self) -> Vec<Option<String>> {
        self.state.lock().validation_messages.clone()
    }

    /// Scripted actions not consumed yet.
    pub fn remaining(&self) -> usize {
        self.state.lock().script.len()
    }

    fn open(&self, shown: Shown) -> Box<dyn Widget> {
        self.state.lock().shown.push(shown);
        Box::new(ScriptedWidget {
            state: self.state.clone(),
            disposed: false,
        })
    }
}

impl PromptSession for ScriptedPrompts {
    fn open_choice(&mut self, view: ChoiceView) -> PromptResult<Box<dyn Widget>> {
        Ok(self.open(Shown::Choice(view)))
    }

    fn open_text(&mut self, view: TextView) -> PromptResult<Box<dyn Widget>> {
        Ok(self.open(Shown::Text(view)))
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.state.lock().notices.push((level, message.to_string()));
    }
}

struct ScriptedWidget {
    state: Arc<Mutex<ScriptState>>,
    disposed: bool,
}

#[async_trait]
impl Widget for ScriptedWidget {
    async fn next_event(&mut self) -> PromptResult<WidgetEvent> {
        if self.disposed {
            return Err(PromptError::Closed);
        }

        loop {
            let front = self.state.lock().script.front().cloned();
            match front {
                None => return Ok(WidgetEvent::Hidden),
                Some(Scripted::Pause(duration)) => {
                    // Popped only once the sleep completes so a dropped
                    // future leaves the script untouched.
                    tokio::time::sleep(duration).await;
                    self.state.lock().script.pop_front();
                }
                Some(Scripted::Event(event)) => {
                    self.state.lock().script.pop_front();
                    return Ok(event);
                }
            }
        }
    }

    fn set_validation_message(&mut self, message: Option<&str>) {
        self.state
            .lock()
            .validation_messages
            .push(message.map(str::to_string));
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.state.lock().disposed += 1;
        }
    }
}
