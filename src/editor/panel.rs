//! Editable, renderable text panels.
//!
//! A [`Panel`] pairs a [`TextBuffer`] with two cursors: `cursor` in buffer
//! coordinates and `screen` in viewport coordinates. Their difference is
//! the first visible column and row. Edits move both by the same delta and
//! may leave them out of bounds; [`Panel::render`] clamps them back.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use super::actions::{ActionContext, Bindings, Key, EOF};
use super::buffer::{Chunk, TextBuffer};
use super::point::{adjust, clip, to_coord, Point};
use super::selection::{Release, Selection};

/// Which behaviour a panel has
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelKind {
    /// Scrollback: appended to by the child, freely editable
    Output,
    /// Command line: collects a command, cleared on submit
    Command,
    /// Single-line answer in the status bar
    Prompt,
}

/// Pointer event, in cells relative to the panel's top-left corner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pointer {
    Press(Point),
    Drag(Point),
    Release(Point),
    WheelUp(Point),
    WheelDown(Point),
}

impl Pointer {
    pub fn cell(self) -> Point {
        match self {
            Pointer::Press(p)
            | Pointer::Drag(p)
            | Pointer::Release(p)
            | Pointer::WheelUp(p)
            | Pointer::WheelDown(p) => p,
        }
    }

    /// The same event with its cell moved by (`dx`, `dy`)
    pub fn shifted(self, dx: i32, dy: i32) -> Self {
        let mut p = self.cell();
        p.shift(dx, dy);
        match self {
            Pointer::Press(_) => Pointer::Press(p),
            Pointer::Drag(_) => Pointer::Drag(p),
            Pointer::Release(_) => Pointer::Release(p),
            Pointer::WheelUp(_) => Pointer::WheelUp(p),
            Pointer::WheelDown(_) => Pointer::WheelDown(p),
        }
    }
}

/// Destination for rendered spans
pub trait Surface {
    /// Draw `chunk` with its first cell at (`row`, `col`)
    fn draw(&mut self, row: usize, col: usize, chunk: &Chunk) -> io::Result<()>;
}

pub struct Panel {
    pub(super) kind: PanelKind,
    pub(super) buffer: TextBuffer,
    /// Buffer position
    pub(super) cursor: Point,
    /// Viewport position
    pub(super) screen: Point,
    pub(super) selection: Selection,
    /// Viewport height at the last render
    pub(super) height: usize,
    pub(super) bindings: Bindings,
    /// File bound to `^S`
    pub(super) filename: Option<PathBuf>,
    /// Command spans several lines (type-ahead was injected)
    pub(super) multiline: bool,
    /// Submitted text waiting to be collected
    pub(super) complete: Option<Vec<u8>>,
    /// Incomplete UTF-8 sequence held back from the last append
    pending: Vec<u8>,
}

impl Panel {
    pub fn new(kind: PanelKind) -> Self {
        Self {
            kind,
            buffer: TextBuffer::new(),
            cursor: Point::new(0, 0),
            screen: Point::new(0, 0),
            selection: Selection::new(),
            height: 0,
            bindings: Bindings::for_kind(kind),
            filename: None,
            multiline: false,
            complete: None,
            pending: Vec::new(),
        }
    }

    /// Output panel bound to `path`, preloaded when the file exists
    pub fn with_file(path: &Path) -> io::Result<Self> {
        let mut panel = Self::new(PanelKind::Output);
        if path.exists() {
            panel.buffer = TextBuffer::load(path)?;
            info!("Loaded {} lines from {}", panel.buffer.len(), path.display());
        } else {
            info!("Editing new file {}", path.display());
        }
        panel.filename = Some(path.to_path_buf());
        Ok(panel)
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn cursor(&self) -> Point {
        self.cursor
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Buffer is a single empty line
    pub fn is_blank(&self) -> bool {
        self.buffer.is_blank()
    }

    /// Whole buffer as text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer.raw()).into_owned()
    }

    /// Dispatch a key through this panel's bindings
    pub fn handle(&mut self, key: Key, ctx: &mut ActionContext<'_>) {
        let operation = self.bindings.lookup(key);
        trace!("{:?} panel: {} -> {:?}", self.kind, key, operation);
        operation.apply(self, key, ctx);
    }

    /// Empty buffer, cursors at the origin
    pub fn clear(&mut self) {
        self.buffer = TextBuffer::new();
        self.cursor = Point::new(0, 0);
        self.screen = Point::new(0, 0);
        self.selection.clear();
    }

    /// Bring the buffer cursor inside the buffer, mirroring the correction
    /// onto the screen cursor.
    pub fn settle(&mut self) {
        let last = to_coord(self.buffer.len() - 1);
        let dy = adjust(last, 0, self.cursor.y);
        self.cursor.y += dy;
        self.screen.y += dy;

        let len = to_coord(self.buffer.line_len(self.cursor.row()));
        let dx = adjust(len, 0, self.cursor.x);
        self.cursor.x += dx;
        self.screen.x += dx;
    }

    pub(super) fn move_by(&mut self, dx: i32, dy: i32) {
        self.cursor.shift(dx, dy);
        self.screen.shift(dx, dy);
    }

    pub(super) fn move_to(&mut self, p: Point) {
        self.move_by(p.x - self.cursor.x, p.y - self.cursor.y);
    }

    /// Append child output. A cursor sitting at the end of the buffer
    /// follows the new text.
    pub fn append(&mut self, data: &[u8]) {
        self.settle();
        let follow = self.cursor == self.buffer.end();

        let mut raw = std::mem::take(&mut self.pending);
        raw.extend_from_slice(data);
        let keep = incomplete_utf8_tail(&raw);
        self.pending = raw.split_off(raw.len() - keep);

        let end = self.buffer.append(&raw);
        if follow {
            self.move_to(end);
        }
    }

    /// Inject type-ahead above the current command line and mark the
    /// command as multi-line.
    pub fn prepend(&mut self, data: &[u8]) {
        self.multiline = true;
        if data.is_empty() {
            return;
        }

        let mut raw = data.to_vec();
        raw.push(b'\n');
        let end = self.buffer.insert(Point::new(0, 0), &raw);
        self.cursor.y += end.y;
        self.screen.y += end.y;
        self.selection.clear();
    }

    /// Collect a submitted command and whether it should be echoed
    pub fn command(&mut self) -> Option<(Vec<u8>, bool)> {
        let command = self.complete.take()?;
        let echo = self.multiline && command != EOF;
        self.multiline = false;
        Some((command, echo))
    }

    /// Buffer point under a viewport cell, clamped so that the column can
    /// reach one past the end of the line (its newline).
    pub fn point_at(&self, cell: Point) -> Point {
        let last = to_coord(self.buffer.len() - 1);
        let y = clip(last, 0, cell.y + self.cursor.y - self.screen.y);
        let len = to_coord(self.buffer.line_len(y as usize));
        let x = clip(len + 1, 0, cell.x + self.cursor.x - self.screen.x);
        Point::new(x, y)
    }

    /// Feed a pointer event. Returns true when the panel takes ownership of
    /// the selection.
    pub fn mouse(&mut self, pointer: Pointer, ctx: &mut ActionContext<'_>) -> bool {
        self.settle();
        match pointer {
            Pointer::Press(cell) => {
                let at = self.point_at(cell);
                self.selection.press(at, cell);
                true
            }
            Pointer::Drag(cell) => {
                let at = self.point_at(cell);
                self.selection.drag(at);
                false
            }
            Pointer::Release(cell) => {
                let at = self.point_at(cell);
                match self.selection.release(at, cell) {
                    Release::Click => {
                        self.move_by(cell.x - self.screen.x, cell.y - self.screen.y);
                        self.screen = cell;
                    }
                    Release::Selected => {
                        debug!("Selected {:?}", self.selection.range());
                    }
                    Release::Ignored => {}
                }
                false
            }
            Pointer::WheelUp(_) => {
                self.handle(Key::PageUp, ctx);
                false
            }
            Pointer::WheelDown(_) => {
                self.handle(Key::PageDown, ctx);
                false
            }
        }
    }

    /// Move to the start of 0-based line `n`
    pub fn goto_line(&mut self, n: usize) {
        self.selection.clear();
        let last = self.buffer.len() - 1;
        self.cursor = Point::new(0, to_coord(n.min(last)));
        self.screen = Point::new(0, to_coord(self.height / 2));
    }

    /// Move to the next (or previous) occurrence of `text` and select it
    pub fn goto_text(&mut self, text: &str, forward: bool) -> bool {
        self.settle();
        let Some(found) = self.buffer.find(text, self.cursor, forward) else {
            return false;
        };

        let end = Point::new(found.x + to_coord(text.chars().count()), found.y);
        self.selection.clear();
        self.selection.press(found, Point::UNSET);
        self.selection.release(end, end);

        self.cursor = found;
        self.screen = Point::new(found.x, to_coord(self.height / 2));
        true
    }

    /// Draw the panel into `height` rows of `width` cells at `origin` and
    /// return where the terminal cursor belongs.
    pub fn render(
        &mut self,
        origin: Point,
        height: usize,
        width: usize,
        surface: &mut impl Surface,
    ) -> io::Result<Point> {
        self.height = height;

        self.settle();
        let max_x = to_coord(width).saturating_sub(1).min(self.cursor.x);
        let max_y = to_coord(height).saturating_sub(1).min(self.cursor.y);
        self.screen.x = clip(max_x, 0, self.screen.x);
        self.screen.y = clip(max_y, 0, self.screen.y);

        let col = (self.cursor.x - self.screen.x) as usize;
        let row = (self.cursor.y - self.screen.y) as usize;
        let (sel_start, sel_end) = self.selection.bounds();

        for r in 0..height {
            for chunk in self.buffer.chunks(width, row + r, col, sel_start, sel_end) {
                surface.draw(origin.row() + r, origin.col() + chunk.col, &chunk)?;
            }
        }

        Ok(Point::new(origin.x + self.screen.x, origin.y + self.screen.y))
    }
}

/// Length of an incomplete UTF-8 sequence at the end of `raw`
fn incomplete_utf8_tail(raw: &[u8]) -> usize {
    for back in 1..=raw.len().min(3) {
        let byte = raw[raw.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::actions::SyntaxChecker;
    use crate::editor::buffer::Attr;
    use crate::editor::clipboard::Clipboard;

    /// Records draws as rows of text, selected cells in upper case
    #[derive(Default)]
    struct Grid {
        cells: Vec<(usize, usize, Chunk)>,
    }

    impl Surface for Grid {
        fn draw(&mut self, row: usize, col: usize, chunk: &Chunk) -> io::Result<()> {
            self.cells.push((row, col, chunk.clone()));
            Ok(())
        }
    }

    impl Grid {
        fn row(&self, row: usize) -> String {
            self.cells
                .iter()
                .filter(|(r, _, _)| *r == row)
                .map(|(_, _, c)| match c.attr {
                    Attr::Normal => c.text.clone(),
                    Attr::Selected => c.text.to_uppercase(),
                })
                .collect()
        }
    }

    fn output(lines: &[&str]) -> Panel {
        let mut panel = Panel::new(PanelKind::Output);
        panel.buffer = TextBuffer::from_lines(lines.iter().copied());
        panel
    }

    #[test]
    fn test_render_clamps_out_of_bounds_cursor() {
        let mut panel = output(&["abc", "de"]);
        panel.cursor = Point::new(10, 7);
        panel.screen = Point::new(10, 7);

        let mut grid = Grid::default();
        let at = panel.render(Point::new(0, 0), 4, 8, &mut grid).unwrap();

        assert_eq!(panel.cursor, Point::new(2, 1));
        assert_eq!(panel.screen, Point::new(2, 1));
        assert_eq!(at, Point::new(2, 1));
        assert_eq!(grid.row(0), "abc     ");
        assert_eq!(grid.row(1), "de      ");
        assert_eq!(grid.row(3), "        ");
    }

    #[test]
    fn test_render_idempotent() {
        let mut panel = output(&["first", "second", "third", "fourth", "fifth"]);
        panel.cursor = Point::new(-3, 9);
        panel.screen = Point::new(40, 40);

        let mut grid = Grid::default();
        let first = panel.render(Point::new(0, 2), 3, 4, &mut grid).unwrap();
        let state = (panel.cursor, panel.screen);
        let second = panel.render(Point::new(0, 2), 3, 4, &mut grid).unwrap();

        assert_eq!(first, second);
        assert_eq!(state, (panel.cursor, panel.screen));
    }

    #[test]
    fn test_render_scrolls_to_cursor() {
        let lines: Vec<String> = (0..10).map(|n| format!("row{}", n)).collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut panel = output(&lines);
        panel.cursor = Point::new(0, 9);
        panel.screen = Point::new(0, 9);

        let mut grid = Grid::default();
        let at = panel.render(Point::new(0, 5), 3, 6, &mut grid).unwrap();

        assert_eq!(at, Point::new(0, 7));
        assert_eq!(grid.row(5), "row7  ");
        assert_eq!(grid.row(7), "row9  ");
    }

    #[test]
    fn test_render_selection() {
        let mut panel = output(&["hello", "world"]);
        panel.selection.press(Point::new(3, 0), Point::new(3, 0));
        panel.selection.release(Point::new(2, 1), Point::new(2, 1));

        let mut grid = Grid::default();
        panel.render(Point::new(0, 0), 2, 7, &mut grid).unwrap();
        assert_eq!(grid.row(0), "helLO  ");
        assert_eq!(grid.row(1), "WOrld  ");
    }

    #[test]
    fn test_append_follows_tail() {
        let mut panel = Panel::new(PanelKind::Output);
        panel.append(b"one\r\ntwo\r\n");
        assert_eq!(panel.text(), "one\ntwo\n");
        assert_eq!(panel.cursor, Point::new(0, 2));

        panel.cursor = Point::new(1, 0);
        panel.screen = Point::new(1, 0);
        panel.append(b"three\r\n");
        assert_eq!(panel.cursor, Point::new(1, 0));
        assert_eq!(panel.buffer.len(), 4);
    }

    #[test]
    fn test_append_split_utf8() {
        let mut panel = Panel::new(PanelKind::Output);
        let text = "héllo".as_bytes();
        panel.append(&text[..2]);
        panel.append(&text[2..]);
        assert_eq!(panel.text(), "héllo");
        assert_eq!(incomplete_utf8_tail(&text[..2]), 1);
        assert_eq!(incomplete_utf8_tail(b"plain"), 0);
    }

    #[test]
    fn test_prepend_type_ahead() {
        let mut panel = Panel::new(PanelKind::Command);
        panel.buffer.insert(Point::new(0, 0), b"fi");
        panel.cursor = Point::new(2, 0);
        panel.screen = Point::new(2, 0);

        panel.prepend(b"if true; then\n  echo yes");
        assert!(panel.multiline);
        assert_eq!(panel.text(), "if true; then\n  echo yes\nfi");
        assert_eq!(panel.cursor, Point::new(2, 2));

        let mut empty = Panel::new(PanelKind::Command);
        empty.prepend(b"");
        assert!(empty.multiline);
        assert!(empty.is_blank());
    }

    #[test]
    fn test_mouse_click_moves_cursor() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = output(&["hello", "world"]);
        assert!(panel.mouse(Pointer::Press(Point::new(3, 1)), &mut ctx));
        assert!(!panel.mouse(Pointer::Release(Point::new(3, 1)), &mut ctx));
        assert_eq!(panel.cursor, Point::new(3, 1));
        assert!(!panel.selection.is_active());
    }

    #[test]
    fn test_mouse_drag_selects() {
        let mut clipboard = Clipboard::new(false);
        let checker = SyntaxChecker::default();
        let mut ctx = ActionContext::new(&mut clipboard, &checker);

        let mut panel = output(&["hello", "world"]);
        panel.mouse(Pointer::Press(Point::new(4, 1)), &mut ctx);
        panel.mouse(Pointer::Drag(Point::new(2, 0)), &mut ctx);
        panel.mouse(Pointer::Release(Point::new(9, 0)), &mut ctx);

        // Column 9 on a five-character line clamps onto its newline.
        assert_eq!(panel.selection.range(), Some((Point::new(6, 0), Point::new(4, 1))));
        assert_eq!(panel.buffer.select(Point::new(6, 0), Point::new(4, 1)), b"\nworl");
    }

    #[test]
    fn test_goto_line_and_text() {
        let mut panel = output(&["alpha", "beta", "gamma", "beta again"]);
        panel.height = 2;

        panel.goto_line(2);
        assert_eq!(panel.cursor, Point::new(0, 2));
        panel.goto_line(99);
        assert_eq!(panel.cursor, Point::new(0, 3));

        panel.goto_line(0);
        assert!(panel.goto_text("beta", true));
        assert_eq!(panel.cursor, Point::new(0, 1));
        assert_eq!(panel.selection.range(), Some((Point::new(0, 1), Point::new(4, 1))));

        assert!(panel.goto_text("beta", true));
        assert_eq!(panel.cursor, Point::new(0, 3));
        assert!(panel.goto_text("alp", false));
        assert_eq!(panel.cursor, Point::new(0, 0));
        assert!(!panel.goto_text("delta", true));
    }
}
