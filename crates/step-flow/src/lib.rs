//! # Step Flow
//!
//! Runs chains of interactive steps over a single active prompt widget.
//!
//! A [`StepHandler`] maps step identifiers to async behaviour. Each step
//! returns a [`StepOutcome`]: the next step, `Done`, or a [`FlowSignal`].
//! [`FlowController::run`] keeps the stack of entered steps and interprets
//! the signals:
//!
//! - `Back` unwinds two entries and re-runs the step before the current one
//! - `Cancel` ends the flow immediately
//! - `Resume` re-runs the current step
//!
//! Steps talk to the user through [`FlowController::show_choice`] and
//! [`FlowController::show_text`]. The controller owns the widget lifecycle:
//! opening a widget disposes the previous one, and the last widget is
//! disposed when `run` returns or the controller is dropped.

mod engine;
mod error;
mod prompt;
mod signal;
mod spec;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{FlowController, StepHandler};
pub use error::{PromptError, PromptResult};
pub use prompt::{
    ChoiceItem, ChoiceView, NoticeLevel, PromptButton, PromptSession, TextView, Widget,
    WidgetEvent, BACK_BUTTON_ID,
};
pub use signal::{Answer, FlowExit, FlowSignal, StepOutcome};
pub use spec::{resume_when, validator, ChoiceSpec, ResumePredicate, TextSpec, Validator};
