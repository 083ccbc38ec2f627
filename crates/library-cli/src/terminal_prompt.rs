//! Terminal rendering of prompt widgets.
//!
//! Widgets are drawn on stderr and answered line by line on stdin. Password
//! prompts read without echo through `rpassword`. Typing `<` presses the
//! back button when the widget offers one; end of input dismisses the
//! widget.
//!
//! One reader thread serves every widget of a session. A line typed after
//! its widget went away is handed to the next widget instead of being lost.

use crate::output::{self, OutputFormat};
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::sync::{mpsc as std_mpsc, Arc};
use step_flow::{
    ChoiceView, NoticeLevel, PromptButton, PromptResult, PromptSession, TextView,
    Widget, WidgetEvent, BACK_BUTTON_ID,
};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

const BACK_SHORTCUT: &str = "<";

/// One line of input, `None` at end of input.
type LineResult = io::Result<Option<String>>;

struct ReadRequest {
    label: String,
    password: bool,
}

struct ReaderState {
    lines: mpsc::UnboundedReceiver<LineResult>,
    /// A request was sent and its line has not been taken yet.
    outstanding: bool,
}

/// Input thread shared by the widgets of one session.
struct LineReader {
    requests: std_mpsc::Sender<ReadRequest>,
    state: Mutex<ReaderState>,
}

impl LineReader {
    fn spawn<F>(mut source: F) -> io::Result<Arc<Self>>
    where
        F: FnMut(&str, bool) -> LineResult + Send + 'static,
    {
        let (requests, incoming) = std_mpsc::channel::<ReadRequest>();
        let (lines_tx, lines) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("terminal-input".to_string())
            .spawn(move || {
                for request in incoming {
                    let line = source(&request.label, request.password);
                    if lines_tx.send(line).is_err() {
                        break;
                    }
                }
                debug!("Terminal reader stopped");
            })?;

        Ok(Arc::new(Self {
            requests,
            state: Mutex::new(ReaderState {
                lines,
                outstanding: false,
            }),
        }))
    }

    /// Next line for the caller. Cancel safe: a dropped call leaves its
    /// request in flight and the line goes to the next caller.
    async fn next_line(&self, label: &str, password: bool) -> PromptResult<Option<String>> {
        let mut state = self.state.lock().await;
        if !state.outstanding {
            let request = ReadRequest {
                label: label.to_string(),
                password,
            };
            if self.requests.send(request).is_err() {
                return Ok(None);
            }
            state.outstanding = true;
        }

        let line = state.lines.recv().await;
        state.outstanding = false;
        match line {
            Some(line) => Ok(line?),
            None => Ok(None),
        }
    }
}

/// Prompt session bound to the process terminal.
pub struct TerminalPrompts {
    format: OutputFormat,
    reader: Option<Arc<LineReader>>,
}

impl TerminalPrompts {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            reader: None,
        }
    }

    fn reader(&mut self) -> PromptResult<Arc<LineReader>> {
        if let Some(reader) = &self.reader {
            return Ok(Arc::clone(reader));
        }
        let reader = LineReader::spawn(read_line)?;
        self.reader = Some(Arc::clone(&reader));
        Ok(reader)
    }
}

impl PromptSession for TerminalPrompts {
    fn open_choice(&mut self, view: ChoiceView) -> PromptResult<Box<dyn Widget>> {
        let reader = self.reader()?;
        let mut err = io::stderr().lock();
        writeln!(err)?;
        writeln!(err, "{} ({}/{})", view.title, view.step, view.total_steps)?;
        if !view.placeholder.is_empty() {
            writeln!(err, "{}", view.placeholder)?;
        }
        for (index, item) in view.items.iter().enumerate() {
            let marker = if view.active_item == Some(index) { '*' } else { ' ' };
            match &item.description {
                Some(description) => {
                    writeln!(err, " {}{:>3}) {:<24} {}", marker, index + 1, item.label, description)?
                }
                None => writeln!(err, " {}{:>3}) {}", marker, index + 1, item.label)?,
            }
        }
        write_buttons(&mut err, &view.buttons)?;
        if view.can_select_many {
            writeln!(err, "Enter numbers separated by commas.")?;
        }

        Ok(Box::new(TerminalWidget {
            kind: WidgetKind::Choice {
                item_count: view.items.len(),
                active_item: view.active_item,
                can_select_many: view.can_select_many,
            },
            buttons: view.buttons,
            reader,
        }))
    }

    fn open_text(&mut self, view: TextView) -> PromptResult<Box<dyn Widget>> {
        let reader = self.reader()?;
        let mut err = io::stderr().lock();
        writeln!(err)?;
        writeln!(err, "{} ({}/{})", view.title, view.step, view.total_steps)?;
        write_buttons(&mut err, &view.buttons)?;

        Ok(Box::new(TerminalWidget {
            kind: WidgetKind::Text {
                prompt: view.prompt,
                default: view.value,
                password: view.password,
            },
            buttons: view.buttons,
            reader,
        }))
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        output::print_notice(level, message, &self.format);
    }
}

fn write_buttons(out: &mut impl Write, buttons: &[PromptButton]) -> io::Result<()> {
    for button in buttons {
        if button.is_back() {
            writeln!(out, "  [{}] {}", BACK_SHORTCUT, button.tooltip)?;
        } else {
            writeln!(out, "  [{}] {}", button.id, button.tooltip)?;
        }
    }
    Ok(())
}

enum WidgetKind {
    Choice {
        item_count: usize,
        active_item: Option<usize>,
        can_select_many: bool,
    },
    Text {
        prompt: String,
        default: String,
        password: bool,
    },
}

struct TerminalWidget {
    kind: WidgetKind,
    buttons: Vec<PromptButton>,
    reader: Arc<LineReader>,
}

impl TerminalWidget {
    fn read_label(&self) -> (String, bool) {
        match &self.kind {
            WidgetKind::Choice { .. } => ("> ".to_string(), false),
            WidgetKind::Text {
                prompt,
                default,
                password,
            } => {
                let label = if default.is_empty() || *password {
                    format!("{}: ", prompt)
                } else {
                    format!("{} [{}]: ", prompt, default)
                };
                (label, *password)
            }
        }
    }

    fn button_for(&self, line: &str) -> Option<String> {
        if line == BACK_SHORTCUT {
            return self
                .buttons
                .iter()
                .any(PromptButton::is_back)
                .then(|| BACK_BUTTON_ID.to_string());
        }
        self.buttons
            .iter()
            .find(|button| !button.is_back() && button.id == line)
            .map(|button| button.id.clone())
    }

    /// Map one typed line to an event; `None` asks for another line.
    fn interpret(&self, line: Option<String>) -> Option<WidgetEvent> {
        let Some(line) = line else {
            return Some(WidgetEvent::Hidden);
        };

        match &self.kind {
            WidgetKind::Choice {
                item_count,
                active_item,
                can_select_many,
            } => {
                let line = line.trim();
                if let Some(id) = self.button_for(line) {
                    return Some(WidgetEvent::ButtonPressed(id));
                }
                if line.is_empty() {
                    return active_item.map(|index| WidgetEvent::Selected(vec![index]));
                }
                match parse_selection(line, *item_count, *can_select_many) {
                    Some(indices) => Some(WidgetEvent::Selected(indices)),
                    None => {
                        eprintln!("Enter a number between 1 and {}.", item_count);
                        None
                    }
                }
            }
            WidgetKind::Text {
                default, password, ..
            } => {
                if let Some(id) = self.button_for(line.trim()) {
                    return Some(WidgetEvent::ButtonPressed(id));
                }
                if line.is_empty() && !*password {
                    return Some(WidgetEvent::Accepted(default.clone()));
                }
                Some(WidgetEvent::Accepted(line))
            }
        }
    }
}

#[async_trait]
impl Widget for TerminalWidget {
    async fn next_event(&mut self) -> PromptResult<WidgetEvent> {
        let (label, password) = self.read_label();
        loop {
            let line = self.reader.next_line(&label, password).await?;
            if let Some(event) = self.interpret(line) {
                return Ok(event);
            }
        }
    }

    fn set_busy(&mut self, busy: bool) {
        if busy {
            eprintln!("Working...");
        }
    }

    fn set_validation_message(&mut self, message: Option<&str>) {
        if let Some(message) = message {
            eprintln!("  ! {}", message);
        }
    }

    fn dispose(&mut self) {}
}

fn read_line(label: &str, password: bool) -> io::Result<Option<String>> {
    if password {
        return match rpassword::prompt_password(label) {
            Ok(line) => Ok(Some(line)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err),
        };
    }

    let mut err = io::stderr();
    write!(err, "{}", label)?;
    err.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Parse 1-based item numbers. Only one number is accepted unless
/// `many` is set.
fn parse_selection(line: &str, item_count: usize, many: bool) -> Option<Vec<usize>> {
    let indices = line
        .split(',')
        .map(|part| part.trim().parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;

    if indices.is_empty() || (!many && indices.len() > 1) {
        return None;
    }
    indices
        .into_iter()
        .map(|number| (1..=item_count).contains(&number).then(|| number - 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn idle_reader() -> Arc<LineReader> {
        LineReader::spawn(|_, _| Ok(None)).unwrap()
    }

    fn choice_widget(buttons: Vec<PromptButton>) -> TerminalWidget {
        choice_widget_on(buttons, idle_reader())
    }

    fn choice_widget_on(buttons: Vec<PromptButton>, reader: Arc<LineReader>) -> TerminalWidget {
        TerminalWidget {
            kind: WidgetKind::Choice {
                item_count: 3,
                active_item: Some(0),
                can_select_many: false,
            },
            buttons,
            reader,
        }
    }

    fn text_widget(default: &str, password: bool) -> TerminalWidget {
        TerminalWidget {
            kind: WidgetKind::Text {
                prompt: "Username".to_string(),
                default: default.to_string(),
                password,
            },
            buttons: vec![PromptButton::back()],
            reader: idle_reader(),
        }
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("2", 3, false), Some(vec![1]));
        assert_eq!(parse_selection(" 1, 3 ", 3, true), Some(vec![0, 2]));
        assert_eq!(parse_selection("1,3", 3, false), None);
        assert_eq!(parse_selection("4", 3, false), None);
        assert_eq!(parse_selection("0", 3, false), None);
        assert_eq!(parse_selection("abc", 3, false), None);
    }

    #[test]
    fn test_choice_input() {
        let widget = choice_widget(vec![PromptButton::back()]);

        assert_eq!(widget.interpret(Some("3".into())), Some(WidgetEvent::Selected(vec![2])));
        assert_eq!(widget.interpret(Some("".into())), Some(WidgetEvent::Selected(vec![0])));
        assert_eq!(
            widget.interpret(Some("<".into())),
            Some(WidgetEvent::ButtonPressed(BACK_BUTTON_ID.into()))
        );
        assert_eq!(widget.interpret(Some("9".into())), None);
        assert_eq!(widget.interpret(None), Some(WidgetEvent::Hidden));
    }

    #[test]
    fn test_back_shortcut_requires_back_button() {
        let widget = choice_widget(Vec::new());
        assert_eq!(widget.interpret(Some("<".into())), None);
    }

    #[test]
    fn test_text_input_uses_default_on_empty_line() {
        let widget = text_widget("alice", false);

        assert_eq!(
            widget.interpret(Some("".into())),
            Some(WidgetEvent::Accepted("alice".into()))
        );
        assert_eq!(
            widget.interpret(Some("bob".into())),
            Some(WidgetEvent::Accepted("bob".into()))
        );
        assert_eq!(
            widget.interpret(Some("<".into())),
            Some(WidgetEvent::ButtonPressed(BACK_BUTTON_ID.into()))
        );
    }

    #[test]
    fn test_password_input_has_no_default() {
        let widget = text_widget("ignored", true);
        assert_eq!(
            widget.interpret(Some("".into())),
            Some(WidgetEvent::Accepted("".into()))
        );
    }

    #[tokio::test]
    async fn test_line_typed_after_dispose_reaches_next_widget() {
        let (typed_tx, typed_rx) = std_mpsc::channel::<String>();
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let reader = LineReader::spawn(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(typed_rx.recv().ok())
        })
        .unwrap();

        let mut first = choice_widget_on(Vec::new(), Arc::clone(&reader));
        let waited = tokio::time::timeout(Duration::from_millis(50), first.next_event()).await;
        assert!(waited.is_err());
        first.dispose();
        drop(first);

        typed_tx.send("2".to_string()).unwrap();
        let mut second = choice_widget_on(Vec::new(), reader);
        let event = tokio::time::timeout(Duration::from_secs(5), second.next_event())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(event, WidgetEvent::Selected(vec![1]));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_line_reads_again_from_shared_reader() {
        let lines = std::sync::Mutex::new(vec!["7".to_string(), "1".to_string()].into_iter());
        let reader = LineReader::spawn(move |_, _| Ok(lines.lock().unwrap().next())).unwrap();

        let mut widget = choice_widget_on(Vec::new(), reader);
        assert_eq!(widget.next_event().await.unwrap(), WidgetEvent::Selected(vec![0]));
    }
}
