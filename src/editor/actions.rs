//! Key bindings and the edit operations they trigger.
//!
//! Each panel kind has its own table from [`Key`] to [`Operation`], built on
//! a shared default table, plus a fallback used for unbound keys. A separate
//! selection table (cut and copy) is consulted by the front-end for
//! whichever panel owns the active selection.
//!
//! Operations move the buffer cursor and the screen cursor by the same
//! delta and let the next render pass clamp both back into bounds.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use super::clipboard::Clipboard;
use super::panel::{Panel, PanelKind};
use super::point::{to_coord, Point};

/// End-of-file byte sent to the child
pub const EOF: &[u8] = b"\x04";

/// A decoded key press
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    /// Control plus a lowercase letter or symbol
    Ctrl(char),
    Alt(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    CtrlHome,
    CtrlEnd,
    PageUp,
    PageDown,
    F(u8),
}

/// Curses-style key names, as they appear in logs
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Ctrl(c) => write!(f, "^{}", c.to_ascii_uppercase()),
            Key::Alt(c) => write!(f, "ALT+{}", c),
            Key::Enter => write!(f, "^J"),
            Key::Tab => write!(f, "^I"),
            Key::Backspace => write!(f, "KEY_BACKSPACE"),
            Key::Delete => write!(f, "KEY_DC"),
            Key::Esc => write!(f, "ESC"),
            Key::Up => write!(f, "KEY_UP"),
            Key::Down => write!(f, "KEY_DOWN"),
            Key::Left => write!(f, "KEY_LEFT"),
            Key::Right => write!(f, "KEY_RIGHT"),
            Key::Home => write!(f, "KEY_HOME"),
            Key::End => write!(f, "KEY_END"),
            Key::CtrlHome => write!(f, "kHOM5"),
            Key::CtrlEnd => write!(f, "kEND5"),
            Key::PageUp => write!(f, "KEY_PPAGE"),
            Key::PageDown => write!(f, "KEY_NPAGE"),
            Key::F(n) => write!(f, "KEY_F({})", n),
        }
    }
}

/// Everything a key can do to a panel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Paste,
    CursorEndOfBuffer,
    CursorStartOfBuffer,
    DeleteChar,
    CursorDown,
    CursorUp,
    CursorLeft,
    CursorRight,
    CursorEndOfLine,
    CursorStartOfLine,
    NextPage,
    PrevPage,
    SaveFile,
    EndOfInput,
    InsertChar,
    CommandInsert,
    PromptInsert,
    Cut,
    Copy,
}

/// Runs the configured syntax checker over pending command text
#[derive(Clone, Debug)]
pub struct SyntaxChecker {
    argv: Vec<String>,
}

impl Default for SyntaxChecker {
    fn default() -> Self {
        Self::new(vec!["sh".to_string(), "-n".to_string()])
    }
}

impl SyntaxChecker {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// Whether `text` parses. A checker that cannot be run accepts everything.
    pub fn accepts(&self, text: &[u8]) -> bool {
        let Some((program, args)) = self.argv.split_first() else {
            return true;
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("Syntax checker {:?} failed to start: {}", self.argv, e);
                return true;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(text) {
                debug!("Syntax checker closed its input early: {}", e);
            }
        }

        match child.wait_with_output() {
            Ok(output) => {
                let accepted = output.status.success() && output.stderr.is_empty();
                debug!(
                    "Syntax check {:?}: status={} stderr={:?}",
                    self.argv,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                );
                accepted
            }
            Err(e) => {
                warn!("Syntax checker {:?} failed: {}", self.argv, e);
                true
            }
        }
    }
}

/// Shared state an operation may touch besides its panel
pub struct ActionContext<'a> {
    pub clipboard: &'a mut Clipboard,
    pub checker: &'a SyntaxChecker,
    /// One-line feedback for the status bar
    pub message: Option<String>,
}

impl<'a> ActionContext<'a> {
    pub fn new(clipboard: &'a mut Clipboard, checker: &'a SyntaxChecker) -> Self {
        Self {
            clipboard,
            checker,
            message: None,
        }
    }
}

/// Key table for one panel kind
#[derive(Clone, Debug)]
pub struct Bindings {
    table: HashMap<Key, Operation>,
    fallback: Operation,
}

impl Bindings {
    fn defaults() -> HashMap<Key, Operation> {
        HashMap::from([
            (Key::Ctrl('v'), Operation::Paste),
            (Key::CtrlEnd, Operation::CursorEndOfBuffer),
            (Key::CtrlHome, Operation::CursorStartOfBuffer),
            (Key::Backspace, Operation::DeleteChar),
            (Key::Down, Operation::CursorDown),
            (Key::End, Operation::CursorEndOfLine),
            (Key::Home, Operation::CursorStartOfLine),
            (Key::Left, Operation::CursorLeft),
            (Key::PageDown, Operation::NextPage),
            (Key::PageUp, Operation::PrevPage),
            (Key::Right, Operation::CursorRight),
            (Key::Up, Operation::CursorUp),
        ])
    }

    pub fn for_kind(kind: PanelKind) -> Self {
        let mut table = Self::defaults();
        let fallback = match kind {
            PanelKind::Output => {
                table.insert(Key::Ctrl('s'), Operation::SaveFile);
                Operation::InsertChar
            }
            PanelKind::Command => {
                table.insert(Key::Ctrl('d'), Operation::EndOfInput);
                Operation::CommandInsert
            }
            PanelKind::Prompt => Operation::PromptInsert,
        };
        Self { table, fallback }
    }

    pub fn lookup(&self, key: Key) -> Operation {
        self.table.get(&key).copied().unwrap_or(self.fallback)
    }

    /// Operations on the active selection, whichever panel holds it
    pub fn selection(key: Key) -> Option<Operation> {
        match key {
            Key::Ctrl('x') => Some(Operation::Cut),
            Key::Ctrl('c') => Some(Operation::Copy),
            _ => None,
        }
    }
}

impl Operation {
    pub fn apply(self, panel: &mut Panel, key: Key, ctx: &mut ActionContext<'_>) {
        match self {
            Operation::Paste => paste(panel, ctx),
            Operation::CursorEndOfBuffer => {
                let end = panel.buffer.end();
                panel.cursor = end;
                panel.screen = end;
            }
            Operation::CursorStartOfBuffer => {
                panel.cursor = Point::new(0, 0);
                panel.screen = Point::new(0, 0);
            }
            Operation::DeleteChar => delete_char(panel),
            Operation::CursorDown => panel.move_by(0, 1),
            Operation::CursorUp => panel.move_by(0, -1),
            Operation::CursorLeft => panel.move_by(-1, 0),
            Operation::CursorRight => panel.move_by(1, 0),
            Operation::CursorEndOfLine => {
                panel.settle();
                let len = to_coord(panel.buffer.line_len(panel.cursor.row()));
                panel.cursor.x = len;
                panel.screen.x = len;
            }
            Operation::CursorStartOfLine => {
                panel.cursor.x = 0;
                panel.screen.x = 0;
            }
            Operation::NextPage => {
                panel.settle();
                let last = to_coord(panel.buffer.len() - 1);
                let page = to_coord(panel.height.max(1));
                panel.cursor.y = last.min(panel.cursor.y + page);
                if panel.cursor.y == last {
                    panel.screen.y = page - 1;
                }
            }
            Operation::PrevPage => {
                panel.settle();
                let page = to_coord(panel.height.max(1));
                panel.cursor.y = (panel.cursor.y - page).max(0);
                if panel.cursor.y == 0 {
                    panel.screen.y = 0;
                }
            }
            Operation::SaveFile => save_file(panel, ctx),
            Operation::EndOfInput => {
                if panel.buffer.is_blank() {
                    info!("End of input requested");
                    panel.complete = Some(EOF.to_vec());
                    panel.clear();
                }
            }
            Operation::InsertChar => insert_char(panel, key),
            Operation::CommandInsert => command_insert(panel, key, ctx),
            Operation::PromptInsert => {
                if key == Key::Enter {
                    panel.complete = Some(panel.buffer.raw());
                    panel.clear();
                } else {
                    insert_char(panel, key);
                }
            }
            Operation::Cut => cut_selection(panel, ctx),
            Operation::Copy => copy_selection(panel, ctx),
        }
    }
}

fn insert_char(panel: &mut Panel, key: Key) {
    match key {
        Key::Enter => {
            panel.settle();
            panel.selection.clear();
            panel.cursor = panel.buffer.insert(panel.cursor, b"\n");
            panel.screen.x = 0;
            panel.screen.y += 1;
        }
        Key::Char(c) if !c.is_control() => {
            panel.settle();
            panel.selection.clear();
            let mut encoded = [0u8; 4];
            panel.cursor = panel.buffer.insert(panel.cursor, c.encode_utf8(&mut encoded).as_bytes());
            panel.screen.x += 1;
        }
        _ => {}
    }
}

fn command_insert(panel: &mut Panel, key: Key, ctx: &mut ActionContext<'_>) {
    if key != Key::Enter {
        insert_char(panel, key);
        return;
    }

    let mut text = panel.buffer.raw();
    text.push(b'\n');

    if panel.multiline && !ctx.checker.accepts(&text) {
        // Incomplete input: keep editing on a new line.
        debug!("Command rejected by syntax check, continuing on a new line");
        insert_char(panel, key);
        return;
    }

    panel.complete = Some(text);
    panel.clear();
}

fn delete_char(panel: &mut Panel) {
    panel.settle();
    panel.selection.clear();

    let Point { x, y } = panel.cursor;
    if x == 0 {
        if y > 0 {
            let prev = Point::new(to_coord(panel.buffer.line_len(y as usize - 1)), y - 1);
            panel.buffer.remove(prev, Point::new(prev.x + 1, prev.y));
            panel.cursor = prev;
            panel.screen.x = prev.x;
            panel.screen.y -= 1;
        }
        return;
    }

    panel.buffer.remove(Point::new(x - 1, y), panel.cursor);
    panel.move_by(-1, 0);
}

fn paste(panel: &mut Panel, ctx: &mut ActionContext<'_>) {
    let Some(raw) = ctx.clipboard.get() else {
        return;
    };
    debug!("Pasting {} bytes", raw.len());

    panel.settle();
    panel.selection.clear();
    let end = panel.buffer.insert(panel.cursor, raw);
    panel.move_to(end);
}

fn copy_selection(panel: &mut Panel, ctx: &mut ActionContext<'_>) {
    if let Some((start, end)) = panel.selection.range() {
        ctx.clipboard.set(panel.buffer.select(start, end));
    }
}

fn cut_selection(panel: &mut Panel, ctx: &mut ActionContext<'_>) {
    let Some((start, end)) = panel.selection.range() else {
        return;
    };

    panel.settle();
    ctx.clipboard.set(panel.buffer.select(start, end));
    panel.buffer.remove(start, end);
    panel.selection.clear();
    panel.move_to(start);
}

fn save_file(panel: &mut Panel, ctx: &mut ActionContext<'_>) {
    let Some(path) = panel.filename.clone() else {
        ctx.message = Some("No file name".to_string());
        return;
    };

    match panel.buffer.save(&path) {
        Ok(()) => {
            info!("Saved {} lines to {}", panel.buffer.len(), path.display());
            ctx.message = Some(format!("Saved {} lines", panel.buffer.len()));
        }
        Err(e) => {
            warn!("Failed to save {}: {}", path.display(), e);
            ctx.message = Some(format!("Save failed: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::selection::Release;

    fn panel_with(kind: PanelKind, lines: &[&str]) -> Panel {
        let mut panel = Panel::new(kind);
        let text = lines.join("\n");
        panel.buffer.insert(Point::new(0, 0), text.as_bytes());
        panel
    }

    fn press(panel: &mut Panel, ctx: &mut ActionContext<'_>, keys: &[Key]) {
        for key in keys {
            panel.handle(*key, ctx);
        }
    }

    fn select(panel: &mut Panel, start: Point, end: Point) {
        panel.selection.press(start, start);
        assert_eq!(panel.selection.release(end, end), Release::Selected);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Key::Ctrl('x').to_string(), "^X");
        assert_eq!(Key::Left.to_string(), "KEY_LEFT");
        assert_eq!(Key::Alt('b').to_string(), "ALT+b");
        assert_eq!(Key::CtrlEnd.to_string(), "kEND5");
    }

    #[test]
    fn test_binding_tables() {
        let output = Bindings::for_kind(PanelKind::Output);
        let command = Bindings::for_kind(PanelKind::Command);
        let prompt = Bindings::for_kind(PanelKind::Prompt);

        assert_eq!(output.lookup(Key::Ctrl('s')), Operation::SaveFile);
        assert_eq!(command.lookup(Key::Ctrl('s')), Operation::CommandInsert);
        assert_eq!(command.lookup(Key::Ctrl('d')), Operation::EndOfInput);
        assert_eq!(prompt.lookup(Key::Enter), Operation::PromptInsert);
        assert_eq!(output.lookup(Key::Char('a')), Operation::InsertChar);
        assert_eq!(command.lookup(Key::Up), Operation::CursorUp);
        assert_eq!(Bindings::selection(Key::Ctrl('x')), Some(Operation::Cut));
        assert_eq!(Bindings::selection(Key::Ctrl('v')), None);
    }

    #[test]
    fn test_typing_and_backspace() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = Panel::new(PanelKind::Output);
        press(
            &mut panel,
            &mut ctx,
            &[Key::Char('a'), Key::Char('b'), Key::Enter, Key::Char('c')],
        );
        assert_eq!(panel.text(), "ab\nc");
        assert_eq!(panel.cursor, Point::new(1, 1));

        press(&mut panel, &mut ctx, &[Key::Backspace, Key::Backspace]);
        assert_eq!(panel.text(), "ab");
        assert_eq!(panel.cursor, Point::new(2, 0));
        assert_eq!(panel.screen, Point::new(2, 0));
    }

    #[test]
    fn test_command_submit() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = Panel::new(PanelKind::Command);
        press(&mut panel, &mut ctx, &[Key::Char('l'), Key::Char('s'), Key::Enter]);
        assert_eq!(panel.command(), Some((b"ls\n".to_vec(), false)));
        assert!(panel.buffer.is_blank());
        assert_eq!(panel.command(), None);
    }

    #[test]
    fn test_multiline_submit_rejected() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = panel_with(PanelKind::Command, &["if true; then"]);
        panel.multiline = true;
        panel.handle(Key::CtrlEnd, &mut ctx);
        panel.handle(Key::Enter, &mut ctx);

        assert_eq!(panel.buffer.line(0), "if true; then");
        assert!(panel.complete.is_none());
        assert_eq!(panel.command(), None);
    }

    #[test]
    fn test_multiline_submit_accepted() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = panel_with(PanelKind::Command, &["if true; then", "  echo yes", "fi"]);
        panel.multiline = true;
        panel.handle(Key::Enter, &mut ctx);

        assert_eq!(
            panel.command(),
            Some((b"if true; then\n  echo yes\nfi\n".to_vec(), true))
        );
        assert!(!panel.multiline);
    }

    #[test]
    fn test_missing_checker_accepts() {
        let checker = SyntaxChecker::new(vec!["/nonexistent/checker".to_string()]);
        assert!(checker.accepts(b"if true; then\n"));
        assert!(SyntaxChecker::new(Vec::new()).accepts(b"anything"));
    }

    #[test]
    fn test_end_of_input_only_when_blank() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = panel_with(PanelKind::Command, &["partial"]);
        panel.handle(Key::Ctrl('d'), &mut ctx);
        assert_eq!(panel.command(), None);
        assert_eq!(panel.buffer.line(0), "partial");

        let mut panel = Panel::new(PanelKind::Command);
        panel.handle(Key::Ctrl('d'), &mut ctx);
        assert_eq!(panel.command(), Some((EOF.to_vec(), false)));
    }

    #[test]
    fn test_cut_and_paste() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = panel_with(PanelKind::Output, &["one", "two", "three"]);
        panel.settle();
        select(&mut panel, Point::new(0, 0), Point::new(4, 1));

        Bindings::selection(Key::Ctrl('x'))
            .unwrap()
            .apply(&mut panel, Key::Ctrl('x'), &mut ctx);
        assert_eq!(ctx.clipboard.get(), Some(&b"one\ntwo\n"[..]));
        assert_eq!(panel.text(), "three");
        assert_eq!(panel.cursor, Point::new(0, 0));
        assert!(!panel.selection.is_active());

        panel.handle(Key::Ctrl('v'), &mut ctx);
        assert_eq!(panel.text(), "one\ntwo\nthree");
        assert_eq!(panel.cursor, Point::new(0, 2));
    }

    #[test]
    fn test_copy_leaves_buffer() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = panel_with(PanelKind::Output, &["hello world"]);
        select(&mut panel, Point::new(6, 0), Point::new(11, 0));
        Operation::Copy.apply(&mut panel, Key::Ctrl('c'), &mut ctx);

        assert_eq!(ctx.clipboard.get(), Some(&b"world"[..]));
        assert_eq!(panel.text(), "hello world");
        assert!(panel.selection.is_active());
    }

    #[test]
    fn test_edit_clears_selection() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = panel_with(PanelKind::Output, &["hello"]);
        select(&mut panel, Point::new(0, 0), Point::new(2, 0));
        panel.handle(Key::Char('x'), &mut ctx);
        assert!(!panel.selection.is_active());
    }

    #[test]
    fn test_paging() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let lines: Vec<String> = (0..30).map(|n| format!("line {}", n)).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut panel = panel_with(PanelKind::Output, &lines);
        panel.height = 10;
        panel.handle(Key::CtrlHome, &mut ctx);

        panel.handle(Key::PageDown, &mut ctx);
        assert_eq!(panel.cursor.y, 10);
        panel.handle(Key::PageDown, &mut ctx);
        panel.handle(Key::PageDown, &mut ctx);
        assert_eq!(panel.cursor.y, 29);
        assert_eq!(panel.screen.y, 9);

        panel.handle(Key::PageUp, &mut ctx);
        assert_eq!(panel.cursor.y, 19);
        panel.handle(Key::PageUp, &mut ctx);
        panel.handle(Key::PageUp, &mut ctx);
        assert_eq!(panel.cursor.y, 0);
        assert_eq!(panel.screen.y, 0);
    }

    #[test]
    fn test_save_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = Panel::with_file(&path).unwrap();
        press(&mut panel, &mut ctx, &[Key::Char('h'), Key::Char('i'), Key::Ctrl('s')]);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi\n");
        assert_eq!(ctx.message.as_deref(), Some("Saved 1 lines"));
    }
}
