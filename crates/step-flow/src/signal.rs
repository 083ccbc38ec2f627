//! Control values exchanged between steps and the engine.

/// Positional control signal raised by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSignal {
    /// Re-run the step that ran before the current one.
    Back,
    /// Abandon the whole flow.
    Cancel,
    /// Re-run the current step.
    Resume,
}

/// What a step asks the engine to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<S> {
    Next(S),
    Done,
    Signal(FlowSignal),
}

impl<S> From<FlowSignal> for StepOutcome<S> {
    fn from(signal: FlowSignal) -> Self {
        StepOutcome::Signal(signal)
    }
}

/// How a flow run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowExit {
    /// The last step returned `Done`.
    Completed,
    /// A step raised `Cancel`.
    Cancelled,
    /// `Back` was raised on the first step.
    BackedOut,
}

impl FlowExit {
    pub fn is_completed(&self) -> bool {
        matches!(self, FlowExit::Completed)
    }
}

/// Result of showing one prompt widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer<T> {
    /// Selected item indices, or accepted text.
    Value(T),
    /// One of the step's extra buttons, by id.
    Button(String),
    /// Back button, or dismissal resolved to Cancel/Resume.
    Signal(FlowSignal),
}

impl<T> Answer<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Answer<U> {
        match self {
            Answer::Value(value) => Answer::Value(f(value)),
            Answer::Button(id) => Answer::Button(id),
            Answer::Signal(signal) => Answer::Signal(signal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_map_keeps_signals() {
        let answer: Answer<Vec<usize>> = Answer::Signal(FlowSignal::Back);
        assert_eq!(answer.map(|v| v.len()), Answer::Signal(FlowSignal::Back));

        let answer = Answer::Value(vec![2, 4]);
        assert_eq!(answer.map(|v| v[0]), Answer::Value(2));
    }

    #[test]
    fn test_signal_into_outcome() {
        let outcome: StepOutcome<u8> = FlowSignal::Cancel.into();
        assert_eq!(outcome, StepOutcome::Signal(FlowSignal::Cancel));
    }
}
