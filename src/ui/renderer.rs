//! Terminal renderer using crossterm
//!
//! Draws panels and the status bar onto the user's terminal and passes raw
//! child output through while a full-screen program is running.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture},
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::{debug, trace};
use unicode_width::UnicodeWidthChar;

use crate::config::ColorScheme;
use crate::editor::buffer::{Attr, Chunk};
use crate::editor::{Point, Surface};

/// Terminal renderer
pub struct Renderer {
    out: io::BufWriter<Box<dyn Write>>,
    scheme: ColorScheme,
    /// Whether the terminal has been initialized
    initialized: bool,
    mouse_captured: bool,
    /// Size at the start of the current frame
    size: (u16, u16),
}

impl Renderer {
    pub fn new(scheme: ColorScheme) -> Self {
        Self::with_writer(scheme, Box::new(io::stdout()))
    }

    pub(crate) fn with_writer(scheme: ColorScheme, out: Box<dyn Write>) -> Self {
        Self {
            out: io::BufWriter::with_capacity(65536, out),
            scheme,
            initialized: false,
            mouse_captured: false,
            size: (0, 0),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        debug!("Initializing terminal, scheme {}", self.scheme.name);
        terminal::enable_raw_mode()?;

        queue!(
            self.out,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableBracketedPaste,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.out.flush()?;

        self.mouse_captured = true;
        self.initialized = true;
        Ok(())
    }

    /// Restore the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let _ = queue!(
            self.out,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Show,
            EnableLineWrap,
            DisableBracketedPaste,
            DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = self.out.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;
        debug!("Terminal restored");
        Ok(())
    }

    /// Hand the screen to a full-screen program: blank it, home the cursor
    /// and give back the mouse, pastes and line wrapping.
    pub fn suspend(&mut self) -> io::Result<()> {
        debug!("Suspending overlay");
        queue!(
            self.out,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Clear(ClearType::All),
            MoveTo(0, 0),
            Show,
            EnableLineWrap,
            DisableBracketedPaste
        )?;
        self.set_mouse_capture(false)?;
        self.out.flush()
    }

    /// Take the terminal back from a full-screen program
    pub fn resume(&mut self) -> io::Result<()> {
        debug!("Resuming overlay");
        queue!(self.out, DisableLineWrap, EnableBracketedPaste)?;
        self.set_mouse_capture(true)?;
        self.out.flush()
    }

    fn set_mouse_capture(&mut self, on: bool) -> io::Result<()> {
        if on == self.mouse_captured {
            return Ok(());
        }
        if on {
            queue!(self.out, EnableMouseCapture)?;
        } else {
            queue!(self.out, DisableMouseCapture)?;
        }
        self.mouse_captured = on;
        Ok(())
    }

    /// Current terminal size (cols, rows)
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    /// Start a frame and return the terminal size. A `full` frame clears
    /// the whole screen first.
    pub fn begin(&mut self, full: bool) -> io::Result<(u16, u16)> {
        self.size = Self::size()?;
        // Synchronized update (reduces flicker)
        write!(self.out, "\x1b[?2026h")?;
        queue!(self.out, Hide, ResetColor, SetAttribute(Attribute::Reset))?;
        if full {
            trace!("Full redraw at {}x{}", self.size.0, self.size.1);
            queue!(self.out, Clear(ClearType::All))?;
        }
        Ok(self.size)
    }

    /// Blank `height` rows from `top` so stale text does not survive
    pub fn blank(&mut self, top: usize, height: usize) -> io::Result<()> {
        for row in top..top + height {
            queue!(self.out, MoveTo(0, row as u16), Clear(ClearType::UntilNewLine))?;
        }
        Ok(())
    }

    /// Draw the status bar on `row`: `left` text, `right` text flush right
    pub fn status(&mut self, row: usize, left: &str, right: &str, prompting: bool) -> io::Result<()> {
        let width = usize::from(self.size.0);
        let (bg, fg) = if prompting {
            (self.scheme.status_prompt_bg, self.scheme.status_prompt_fg)
        } else {
            (self.scheme.status_bar_bg, self.scheme.status_bar_fg)
        };

        let left = fit(&sanitize(left), width);
        let right = fit(&sanitize(right), width.saturating_sub(left.chars().count() + 1));
        let padding = width.saturating_sub(left.chars().count() + right.chars().count());

        queue!(
            self.out,
            MoveTo(0, row as u16),
            SetBackgroundColor(bg.to_crossterm()),
            SetForegroundColor(fg.to_crossterm()),
        )?;
        // Line wrap is off, so the bottom-right cell can be written
        // without scrolling.
        let text = format!("{}{:padding$}{}", left, "", right, padding = padding);
        queue!(self.out, Print(text), ResetColor)?;
        Ok(())
    }

    /// Finish the frame with the terminal cursor at `cursor`
    pub fn finish(&mut self, cursor: Point) -> io::Result<()> {
        queue!(self.out, MoveTo(cursor.col() as u16, cursor.row() as u16), Show)?;
        write!(self.out, "\x1b[?2026l")?;
        self.out.flush()
    }

    /// Write child output to the terminal untouched
    pub fn passthrough(&mut self, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data)?;
        self.out.flush()
    }
}

impl Surface for Renderer {
    fn draw(&mut self, row: usize, col: usize, chunk: &Chunk) -> io::Result<()> {
        let text = sanitize(&chunk.text);
        queue!(self.out, MoveTo(col as u16, row as u16))?;

        match chunk.attr {
            Attr::Normal => queue!(self.out, Print(&text)),
            Attr::Selected => queue!(
                self.out,
                SetBackgroundColor(self.scheme.selection_bg.to_crossterm()),
                SetForegroundColor(self.scheme.selection_fg.to_crossterm()),
                Print(&text),
                ResetColor
            ),
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// One cell per character: control and wide or zero-width characters are
/// shown as `?`.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c.width() {
            Some(1) if !c.is_control() => c,
            _ => '?',
        })
        .collect()
}

/// First `width` characters of `text`
fn fit(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Shared in-memory terminal for tests
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct Capture(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

#[cfg(test)]
impl Capture {
    pub(crate) fn renderer(&self) -> Renderer {
        Renderer::with_writer(ColorScheme::default(), Box::new(self.clone()))
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

#[cfg(test)]
impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
