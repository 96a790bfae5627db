//! The user's side of the session: scrollback, status bar and command line
//! laid out top to bottom, fed by crossterm events.
//!
//! ```text
//! +---------------------------+
//! | scrollback (output panel) |
//! |                           |
//! +---------------------------+
//! | status bar / prompt       |
//! +---------------------------+
//! | command panel             |  hidden while editing the scrollback
//! +---------------------------+
//! ```

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{self, Event};
use tracing::{debug, trace};

use super::keymapper::KeyMapper;
use super::renderer::Renderer;
use super::status::{Answer, Prompt, StatusBar};
use crate::config::Config;
use crate::core::pty::WindowSize;
use crate::core::session::{Frontend, Input, LineMode};
use crate::editor::actions::EOF;
use crate::editor::point::to_coord;
use crate::editor::{
    ActionContext, Bindings, Clipboard, Key, Panel, PanelKind, Point, Pointer, SyntaxChecker,
};

/// Interrupt character sent by `^C` when nothing is selected
const INTERRUPT: &[u8] = b"\x03";

/// Panel receiving keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Output,
    Command,
}

/// Rows of each region for a terminal `rows` high
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub output_height: usize,
    pub status_row: usize,
    pub command_top: usize,
    pub command_height: usize,
}

impl Layout {
    pub fn new(rows: usize, editing: bool, command_lines: usize) -> Self {
        let command_height = if editing { 0 } else { command_lines }.min(rows.saturating_sub(1));
        let command_top = rows - command_height;
        Self {
            output_height: command_top.saturating_sub(1),
            status_row: command_top.saturating_sub(1),
            command_top,
            command_height,
        }
    }
}

/// Panels, status bar and shared editing state
pub struct Workspace {
    output: Panel,
    command: Panel,
    status: StatusBar,
    clipboard: Clipboard,
    checker: SyntaxChecker,
    focus: Focus,
    /// Panel holding the active selection
    owner: Option<Focus>,
    /// Panel that saw the last button press
    pressed: Option<Focus>,
    /// Layout of the last render, for mouse routing
    layout: Layout,
}

impl Workspace {
    pub fn new(output: Panel, clipboard: Clipboard, checker: SyntaxChecker) -> Self {
        // A file argument starts in editing mode.
        let focus = if output.filename().is_some() {
            Focus::Output
        } else {
            Focus::Command
        };
        Self {
            output,
            command: Panel::new(PanelKind::Command),
            status: StatusBar::new(),
            clipboard,
            checker,
            focus,
            owner: None,
            pressed: None,
            layout: Layout::default(),
        }
    }

    pub fn editing(&self) -> bool {
        self.focus == Focus::Output
    }

    fn panel(&self, focus: Focus) -> &Panel {
        match focus {
            Focus::Output => &self.output,
            Focus::Command => &self.command,
        }
    }

    fn panel_mut(&mut self, focus: Focus) -> &mut Panel {
        match focus {
            Focus::Output => &mut self.output,
            Focus::Command => &mut self.command,
        }
    }

    /// Child output for the scrollback
    pub fn append_output(&mut self, data: &[u8]) {
        self.output.append(data);
    }

    /// Queued input handed back by the shell
    pub fn type_ahead(&mut self, data: &[u8]) {
        self.command.prepend(data);
        self.status.set_running(b"(bash)");
    }

    /// Handle one key. Returns what, if anything, goes to the child.
    pub fn key(&mut self, key: Key) -> Option<Input> {
        trace!("Key {}", key);
        self.status.clear_message();

        if self.status.is_prompting() {
            let mut ctx = ActionContext::new(&mut self.clipboard, &self.checker);
            let answer = self.status.handle(key, &mut ctx)?;
            return self.answer(answer);
        }

        if let Some(operation) = Bindings::selection(key) {
            let owner = self
                .owner
                .filter(|owner| self.panel(*owner).selection().is_active());
            if let Some(owner) = owner {
                let panel = match owner {
                    Focus::Output => &mut self.output,
                    Focus::Command => &mut self.command,
                };
                let mut ctx = ActionContext::new(&mut self.clipboard, &self.checker);
                operation.apply(panel, key, &mut ctx);
                return None;
            }
            if key == Key::Ctrl('c') && !self.editing() {
                debug!("Interrupt");
                return Some(Input::Command(INTERRUPT.to_vec()));
            }
            return None;
        }

        match key {
            Key::Ctrl('e') => self.focus = Focus::Command,
            Key::Ctrl('w') => self.focus = Focus::Output,
            Key::Ctrl('f') => {
                self.status.open(Prompt::ForwardSearch);
            }
            Key::Ctrl('r') => {
                self.status.open(Prompt::ReverseSearch);
            }
            Key::Ctrl('l') => {
                self.status.open(Prompt::LineNumber);
            }
            Key::Ctrl('q') => {
                if self.editing() {
                    self.status.open(Prompt::Exit);
                } else if self.command.is_blank() {
                    self.status.open(Prompt::SendEof);
                }
            }
            _ => {
                let panel = match self.focus {
                    Focus::Output => &mut self.output,
                    Focus::Command => &mut self.command,
                };
                let mut ctx = ActionContext::new(&mut self.clipboard, &self.checker);
                panel.handle(key, &mut ctx);
                if let Some(message) = ctx.message.take() {
                    self.status.set_message(message);
                }
                return self.collect();
            }
        }
        None
    }

    /// Pasted text, typed key by key into the focused panel. Commands
    /// completed along the way are concatenated.
    pub fn paste(&mut self, text: &str) -> Option<Input> {
        let mut commands = Vec::new();
        for c in text.chars() {
            let key = match c {
                '\n' => Key::Enter,
                '\r' => continue,
                c => Key::Char(c),
            };
            match self.key(key) {
                Some(Input::Quit) => return Some(Input::Quit),
                Some(Input::Command(data)) => commands.extend_from_slice(&data),
                Some(Input::None) | None => {}
            }
        }
        (!commands.is_empty()).then_some(Input::Command(commands))
    }

    /// A completed command, echoed into the scrollback when it spans
    /// several lines
    fn collect(&mut self) -> Option<Input> {
        let (command, echo) = self.command.command()?;
        if echo {
            self.output.append(&command);
            self.status.set_running(&command);
        }
        debug!("Command {:?}", String::from_utf8_lossy(&command));
        Some(Input::Command(command))
    }

    fn answer(&mut self, answer: Answer) -> Option<Input> {
        match answer {
            Answer::Quit => return Some(Input::Quit),
            Answer::SendEof => return Some(Input::Command(EOF.to_vec())),
            Answer::Search { text, forward } => {
                if !self.panel_mut(self.focus).goto_text(&text, forward) {
                    self.status.set_message(format!("Not found: {}", text));
                }
            }
            Answer::GotoLine(n) => self.panel_mut(self.focus).goto_line(n),
        }
        None
    }

    /// Panel under terminal row `y`
    fn region(&self, y: i32) -> Option<Focus> {
        let split = to_coord(self.layout.output_height);
        if y < split {
            Some(Focus::Output)
        } else if y > split && !self.editing() {
            Some(Focus::Command)
        } else {
            None
        }
    }

    /// Handle a pointer event at a terminal cell. Drags and releases go to
    /// the panel that saw the press.
    pub fn mouse(&mut self, pointer: Pointer) {
        let region = self.region(pointer.cell().y);
        let target = match pointer {
            Pointer::Drag(_) | Pointer::Release(_) => self.pressed.or(region),
            _ => region,
        };
        let Some(target) = target else {
            return;
        };
        if let Pointer::Release(_) = pointer {
            self.pressed = None;
        }

        let top = match target {
            Focus::Output => 0,
            Focus::Command => to_coord(self.layout.command_top),
        };
        let pointer = pointer.shifted(0, -top);

        let panel = match target {
            Focus::Output => &mut self.output,
            Focus::Command => &mut self.command,
        };
        let mut ctx = ActionContext::new(&mut self.clipboard, &self.checker);
        if panel.mouse(pointer, &mut ctx) {
            let other = match target {
                Focus::Output => Focus::Command,
                Focus::Command => Focus::Output,
            };
            self.panel_mut(other).clear_selection();
            self.owner = Some(target);
            self.pressed = Some(target);
        }
    }

    /// Draw everything onto a `cols` x `rows` terminal
    pub fn render(&mut self, renderer: &mut Renderer, cols: usize, rows: usize) -> io::Result<()> {
        // No room for the overlay
        if rows < 2 || cols == 0 {
            return Ok(());
        }

        self.layout = Layout::new(rows, self.editing(), self.command.buffer().len());
        let layout = self.layout;

        renderer.blank(0, rows)?;
        let mut cursor = self
            .output
            .render(Point::new(0, 0), layout.output_height, cols, &mut *renderer)?;
        if !self.editing() {
            let origin = Point::new(0, to_coord(layout.command_top));
            cursor = self
                .command
                .render(origin, layout.command_height, cols, &mut *renderer)?;
        }

        let position = self.panel(self.focus).cursor();
        let line = self.status.line(position);
        renderer.status(layout.status_row, &line.left, &line.right, line.prompting)?;
        if let Some(col) = line.cursor {
            cursor = Point::new(to_coord(col.min(cols - 1)), to_coord(layout.status_row));
        }

        renderer.finish(cursor)
    }
}

/// Terminal front-end driving a [`Workspace`]
pub struct Console {
    renderer: Renderer,
    workspace: Workspace,
    mode: LineMode,
    /// Clear the whole screen on the next render
    full_redraw: bool,
}

impl Console {
    pub fn new(config: &Config, file: Option<&Path>) -> anyhow::Result<Self> {
        let output = match file {
            Some(path) => Panel::with_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => Panel::new(PanelKind::Output),
        };
        let workspace = Workspace::new(
            output,
            Clipboard::new(config.system_clipboard),
            SyntaxChecker::new(config.syntax_check.clone()),
        );

        Ok(Self {
            renderer: Renderer::new(config.color_scheme()),
            workspace,
            mode: LineMode::Canonical,
            full_redraw: true,
        })
    }

    pub fn init(&mut self) -> io::Result<()> {
        self.renderer.init()
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        self.renderer.cleanup()
    }
}

impl Frontend for Console {
    fn render(&mut self) -> anyhow::Result<()> {
        let full = std::mem::take(&mut self.full_redraw);
        let (cols, rows) = self.renderer.begin(full)?;
        self.workspace
            .render(&mut self.renderer, usize::from(cols), usize::from(rows))?;
        Ok(())
    }

    fn clear(&mut self) {
        self.full_redraw = true;
    }

    fn output(&mut self, data: &[u8]) {
        self.workspace.append_output(data);
    }

    fn type_ahead(&mut self, data: &[u8]) {
        self.workspace.type_ahead(data);
    }

    /// Drain every pending terminal event. Commands produced along the way
    /// are concatenated; a quit wins over everything.
    fn input(&mut self) -> anyhow::Result<Input> {
        let mut commands = Vec::new();

        while event::poll(Duration::ZERO)? {
            let input = match event::read()? {
                Event::Key(key) => KeyMapper::map(&key).and_then(|key| self.workspace.key(key)),
                Event::Mouse(mouse) => {
                    if let Some(pointer) = KeyMapper::map_mouse(&mouse) {
                        self.workspace.mouse(pointer);
                    }
                    None
                }
                Event::Paste(text) => self.workspace.paste(&text),
                Event::Resize(cols, rows) => {
                    trace!("Terminal resized to {}x{}", cols, rows);
                    self.full_redraw = true;
                    None
                }
                _ => None,
            };

            match input {
                Some(Input::Quit) => return Ok(Input::Quit),
                Some(Input::Command(data)) => commands.extend_from_slice(&data),
                Some(Input::None) | None => {}
            }
        }

        if commands.is_empty() {
            Ok(Input::None)
        } else {
            Ok(Input::Command(commands))
        }
    }

    fn raw_input(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 4096];
        match nix::unistd::read(libc::STDIN_FILENO, &mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(nix::errno::Errno::EINTR) | Err(nix::errno::Errno::EAGAIN) => Ok(Some(Vec::new())),
            Err(e) => Err(e).context("Failed to read terminal input"),
        }
    }

    fn passthrough(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.renderer.passthrough(data)?;
        Ok(())
    }

    fn window_size(&self) -> anyhow::Result<WindowSize> {
        let (cols, rows) = Renderer::size().context("Failed to query terminal size")?;
        Ok(WindowSize::new(cols, rows))
    }

    fn resize(&mut self, _size: WindowSize) -> anyhow::Result<()> {
        self.full_redraw = true;
        Ok(())
    }

    fn set_line_mode(&mut self, mode: LineMode) -> anyhow::Result<()> {
        debug!("Overlay {}", if mode == LineMode::Canonical { "shown" } else { "suspended" });
        self.mode = mode;
        match mode {
            LineMode::Raw => self.renderer.suspend()?,
            LineMode::Canonical => {
                self.renderer.resume()?;
                self.full_redraw = true;
            }
        }
        Ok(())
    }
}
