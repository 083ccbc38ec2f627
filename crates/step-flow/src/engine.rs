//! The flow controller: step stack, signal handling and widget lifecycle.

use crate::prompt::{
    ChoiceView, NoticeLevel, PromptButton, PromptSession, TextView, Widget, WidgetEvent,
    BACK_BUTTON_ID,
};
use crate::spec::{ChoiceSpec, ResumePredicate, TextSpec};
use crate::{Answer, FlowExit, FlowSignal, PromptResult, StepOutcome};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::fmt;
use tracing::{debug, trace};

/// Maps step identifiers to behaviour. The handler owns the flow context.
#[async_trait]
pub trait StepHandler: Send {
    type Step: Clone + fmt::Debug + Send;
    type Error: Send;

    async fn run_step(
        &mut self,
        step: Self::Step,
        flow: &mut FlowController<'_>,
    ) -> Result<StepOutcome<Self::Step>, Self::Error>;
}

/// Widget owned by the controller; disposed when dropped.
struct ActiveWidget {
    widget: Box<dyn Widget>,
}

impl ActiveWidget {
    fn new(widget: Box<dyn Widget>) -> Self {
        Self { widget }
    }
}

impl Drop for ActiveWidget {
    fn drop(&mut self) {
        self.widget.dispose();
        trace!("Prompt widget disposed");
    }
}

/// Runs a [`StepHandler`] and gives its steps access to one prompt widget at
/// a time.
///
/// Dropping the controller disposes the active widget, so an abandoned `run`
/// never leaks one.
pub struct FlowController<'p> {
    prompts: &'p mut dyn PromptSession,
    current: Option<ActiveWidget>,
    depth: usize,
}

impl<'p> FlowController<'p> {
    pub fn new(prompts: &'p mut dyn PromptSession) -> Self {
        Self {
            prompts,
            current: None,
            depth: 0,
        }
    }

    /// Number of entries on the step stack of the running flow.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn notify(&mut self, level: NoticeLevel, message: &str) {
        self.prompts.notify(level, message);
    }

    /// Run `handler` from `initial` until no step remains.
    ///
    /// Back pops the current entry and then the previous one, which is run
    /// again. With fewer than two entries the flow ends as
    /// [`FlowExit::BackedOut`]. Resume pops only the current entry and runs it
    /// again. Handler errors are returned unchanged.
    pub async fn run<H>(&mut self, handler: &mut H, initial: H::Step) -> Result<FlowExit, H::Error>
    where
        H: StepHandler + ?Sized,
    {
        let mut steps: Vec<H::Step> = Vec::new();
        let mut next = Some(initial);
        let mut exit = FlowExit::Completed;

        while let Some(step) = next.take() {
            steps.push(step.clone());
            self.depth = steps.len();

            if let Some(active) = self.current.as_mut() {
                active.widget.set_enabled(false);
                active.widget.set_busy(true);
            }

            debug!(step = ?step, depth = steps.len(), "Running flow step");

            let outcome = match handler.run_step(step, self).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.finish();
                    return Err(err);
                }
            };

            next = match outcome {
                StepOutcome::Next(step) => Some(step),
                StepOutcome::Done => {
                    steps.clear();
                    None
                }
                StepOutcome::Signal(FlowSignal::Back) => {
                    steps.pop();
                    let previous = steps.pop();
                    if previous.is_none() {
                        debug!("Back on the first step, leaving flow");
                        exit = FlowExit::BackedOut;
                    }
                    previous
                }
                StepOutcome::Signal(FlowSignal::Cancel) => {
                    debug!(depth = steps.len(), "Flow cancelled");
                    steps.clear();
                    exit = FlowExit::Cancelled;
                    None
                }
                StepOutcome::Signal(FlowSignal::Resume) => steps.pop(),
            };
        }

        self.finish();
        Ok(exit)
    }

    /// Show a choice list and wait for a selection, a button or dismissal.
    ///
    /// The returned indices are never empty and refer to `spec.items`.
    pub async fn show_choice(&mut self, spec: ChoiceSpec) -> PromptResult<Answer<Vec<usize>>> {
        let back_offered = self.offers_back();
        let view = ChoiceView {
            title: spec.title.clone(),
            step: spec.step,
            total_steps: spec.total_steps,
            placeholder: spec.placeholder.clone(),
            items: spec.items.clone(),
            active_item: spec.active_item,
            buttons: self.buttons_for(&spec.buttons),
            can_select_many: spec.can_select_many,
        };

        self.dispose_current();
        let mut active = ActiveWidget::new(self.prompts.open_choice(view)?);
        let answer = choice_loop(&mut active, &spec, back_offered).await;
        self.current = Some(active);
        answer
    }

    /// Show a text box and wait for an accepted value, a button or dismissal.
    ///
    /// Edits are validated concurrently with waiting for the next event. Each
    /// validation is tagged with a generation and only the newest one may
    /// update the widget. A submitted value is validated once more and
    /// rejected while the validator reports a message.
    pub async fn show_text(&mut self, spec: TextSpec) -> PromptResult<Answer<String>> {
        let back_offered = self.offers_back();
        let view = TextView {
            title: spec.title.clone(),
            step: spec.step,
            total_steps: spec.total_steps,
            value: spec.value.clone(),
            prompt: spec.prompt.clone(),
            password: spec.password,
            buttons: self.buttons_for(&spec.buttons),
        };

        self.dispose_current();
        let mut active = ActiveWidget::new(self.prompts.open_text(view)?);
        let answer = text_loop(&mut active, &spec, back_offered).await;
        self.current = Some(active);
        answer
    }

    fn offers_back(&self) -> bool {
        self.depth > 1
    }

    fn buttons_for(&self, extra: &[PromptButton]) -> Vec<PromptButton> {
        let mut buttons = Vec::with_capacity(extra.len() + 1);
        if self.offers_back() {
            buttons.push(PromptButton::back());
        }
        buttons.extend(extra.iter().cloned());
        buttons
    }

    fn dispose_current(&mut self) {
        self.current = None;
    }

    fn finish(&mut self) {
        self.depth = 0;
        self.dispose_current();
    }
}

async fn choice_loop(
    active: &mut ActiveWidget,
    spec: &ChoiceSpec,
    back_offered: bool,
) -> PromptResult<Answer<Vec<usize>>> {
    loop {
        match active.widget.next_event().await? {
            WidgetEvent::Selected(indices) => {
                let mut selected: Vec<usize> = indices
                    .into_iter()
                    .filter(|index| *index < spec.items.len())
                    .collect();
                if selected.is_empty() {
                    trace!("Ignoring empty selection");
                    continue;
                }
                if !spec.can_select_many {
                    selected.truncate(1);
                }
                return Ok(Answer::Value(selected));
            }
            WidgetEvent::ButtonPressed(id) => {
                if let Some(answer) = button_answer(&id, back_offered, &spec.buttons) {
                    return Ok(answer);
                }
            }
            WidgetEvent::Hidden => {
                return Ok(Answer::Signal(on_dismiss(spec.should_resume.as_ref()).await));
            }
            WidgetEvent::ValueChanged(_) | WidgetEvent::Accepted(_) => {}
        }
    }
}

async fn text_loop(
    active: &mut ActiveWidget,
    spec: &TextSpec,
    back_offered: bool,
) -> PromptResult<Answer<String>> {
    let mut generation: u64 = 0;
    let mut pending: FuturesUnordered<BoxFuture<'static, (u64, Option<String>)>> =
        FuturesUnordered::new();

    loop {
        tokio::select! {
            Some((tag, message)) = pending.next(), if !pending.is_empty() => {
                if tag == generation {
                    active.widget.set_validation_message(message.as_deref());
                } else {
                    trace!(tag, generation, "Discarding stale validation result");
                }
            }
            event = active.widget.next_event() => match event? {
                WidgetEvent::ValueChanged(text) => {
                    generation += 1;
                    pending.push(start_validation(spec, generation, text));
                }
                WidgetEvent::Accepted(text) => {
                    // In-flight results for earlier edits must not land after this.
                    generation += 1;
                    active.widget.set_enabled(false);
                    active.widget.set_busy(true);
                    let message = spec.run_validator(text.clone()).await;
                    active.widget.set_enabled(true);
                    active.widget.set_busy(false);

                    match message {
                        None => return Ok(Answer::Value(text)),
                        Some(message) => {
                            debug!(title = %spec.title, "Submission blocked by validation");
                            active.widget.set_validation_message(Some(&message));
                        }
                    }
                }
                WidgetEvent::ButtonPressed(id) => {
                    if let Some(answer) = button_answer(&id, back_offered, &spec.buttons) {
                        return Ok(answer);
                    }
                }
                WidgetEvent::Hidden => {
                    return Ok(Answer::Signal(on_dismiss(spec.should_resume.as_ref()).await));
                }
                WidgetEvent::Selected(_) => {}
            }
        }
    }
}

fn start_validation(
    spec: &TextSpec,
    tag: u64,
    text: String,
) -> BoxFuture<'static, (u64, Option<String>)> {
    let validate = spec.validate.clone();
    async move {
        let message = match validate {
            Some(validate) => validate(text).await,
            None => None,
        };
        (tag, message)
    }
    .boxed()
}

fn button_answer<T>(id: &str, back_offered: bool, buttons: &[PromptButton]) -> Option<Answer<T>> {
    if back_offered && id == BACK_BUTTON_ID {
        Some(Answer::Signal(FlowSignal::Back))
    } else if buttons.iter().any(|button| button.id == id) {
        Some(Answer::Button(id.to_string()))
    } else {
        trace!(button = id, "Ignoring unknown button");
        None
    }
}

async fn on_dismiss(should_resume: Option<&ResumePredicate>) -> FlowSignal {
    match should_resume {
        Some(predicate) if predicate().await => FlowSignal::Resume,
        _ => FlowSignal::Cancel,
    }
}
