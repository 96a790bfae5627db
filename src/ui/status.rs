//! Status bar and one-line prompts

use tracing::debug;

use crate::editor::{ActionContext, Key, Panel, PanelKind, Point};

/// Question asked in the status bar
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prompt {
    Exit,
    SendEof,
    ForwardSearch,
    ReverseSearch,
    LineNumber,
}

impl Prompt {
    pub fn question(self) -> &'static str {
        match self {
            Prompt::Exit => "Exit (y/n)? ",
            Prompt::SendEof => "Send EOF (y/n)? ",
            Prompt::ForwardSearch => "Forward search for? ",
            Prompt::ReverseSearch => "Reverse search for? ",
            Prompt::LineNumber => "Line number? ",
        }
    }
}

/// What a completed prompt asks the front-end to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Answer {
    Quit,
    SendEof,
    Search { text: String, forward: bool },
    /// 0-based line
    GotoLine(usize),
}

/// Text of the status row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    pub left: String,
    pub right: String,
    pub prompting: bool,
    /// Column of the terminal cursor while prompting
    pub cursor: Option<usize>,
}

pub struct StatusBar {
    /// First line of the last command sent
    pub(crate) running: String,
    /// Shown until the next key
    message: Option<String>,
    prompt: Option<(Prompt, Panel)>,
}

impl Default for StatusBar {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBar {
    pub fn new() -> Self {
        Self {
            running: String::new(),
            message: None,
            prompt: None,
        }
    }

    pub fn set_running(&mut self, command: &[u8]) {
        let text = String::from_utf8_lossy(command);
        self.running = text.lines().next().unwrap_or_default().to_string();
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn is_prompting(&self) -> bool {
        self.prompt.is_some()
    }

    /// Ask `prompt`. Refused while another prompt is open.
    pub fn open(&mut self, prompt: Prompt) -> bool {
        if self.prompt.is_some() {
            return false;
        }
        self.prompt = Some((prompt, Panel::new(PanelKind::Prompt)));
        true
    }

    pub fn cancel(&mut self) {
        self.prompt = None;
    }

    /// Feed a key to the open prompt. Esc cancels; Enter closes the prompt
    /// and interprets the reply.
    pub fn handle(&mut self, key: Key, ctx: &mut ActionContext<'_>) -> Option<Answer> {
        if key == Key::Esc {
            self.cancel();
            return None;
        }

        let (prompt, panel) = self.prompt.as_mut()?;
        panel.handle(key, ctx);
        let (reply, _) = panel.command()?;
        let prompt = *prompt;
        self.prompt = None;

        let reply = String::from_utf8_lossy(&reply).into_owned();
        debug!("{:?} answered {:?}", prompt, reply);
        self.resolve(prompt, reply)
    }

    fn resolve(&mut self, prompt: Prompt, reply: String) -> Option<Answer> {
        match prompt {
            Prompt::Exit => yes(&reply).then_some(Answer::Quit),
            Prompt::SendEof => yes(&reply).then_some(Answer::SendEof),
            Prompt::ForwardSearch | Prompt::ReverseSearch if reply.is_empty() => None,
            Prompt::ForwardSearch => Some(Answer::Search {
                text: reply,
                forward: true,
            }),
            Prompt::ReverseSearch => Some(Answer::Search {
                text: reply,
                forward: false,
            }),
            Prompt::LineNumber => match natural(&reply) {
                Some(n) => Some(Answer::GotoLine(n - 1)),
                None => {
                    self.set_message(format!("Not a line number: {}", reply.trim()));
                    None
                }
            },
        }
    }

    /// Status row for a focused panel whose cursor is at `position`
    pub fn line(&mut self, position: Point) -> StatusLine {
        if let Some((prompt, panel)) = self.prompt.as_mut() {
            panel.settle();
            let question = prompt.question();
            return StatusLine {
                left: format!("{}{}", question, panel.text()),
                right: String::new(),
                prompting: true,
                cursor: Some(question.chars().count() + panel.cursor().col()),
            };
        }

        StatusLine {
            left: match &self.message {
                Some(message) => format!(" {}", message),
                None => format!(" {}", self.running),
            },
            right: format!("Ln {}, Col {} ", position.y + 1, position.x + 1),
            prompting: false,
            cursor: None,
        }
    }
}

fn yes(reply: &str) -> bool {
    reply.trim_start().starts_with(['y', 'Y'])
}

/// Positive integer, as typed
fn natural(reply: &str) -> Option<usize> {
    reply.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
