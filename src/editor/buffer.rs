//! Line-oriented text storage.
//!
//! A [`TextBuffer`] is an ordered list of lines without embedded line
//! breaks. It is never empty: the smallest buffer is a single empty line.
//! Columns are counted in characters, and a column equal to the line length
//! is valid (it is the position after the last character, which doubles as
//! the line's newline when it appears at the end of a range).

use std::fs;
use std::io;
use std::path::Path;

use super::point::{to_coord, Point};

/// Display attribute of a rendered span
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attr {
    Normal,
    Selected,
}

/// A run of characters for one visible row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub attr: Attr,
    /// Screen column offset from the start of the row
    pub col: usize,
    pub text: String,
}

/// Ordered sequence of lines
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextBuffer {
    lines: Vec<String>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self { lines }
    }

    /// Load a file, one entry per line, line terminators stripped
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_lines(
            content.lines().map(|line| line.trim_end_matches('\r').to_string()),
        ))
    }

    /// Overwrite `path` with the newline-joined lines plus a trailing newline
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut text = self.lines.join("\n");
        text.push('\n');
        fs::write(path, text)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// A single empty line
    pub fn is_blank(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn line(&self, y: usize) -> &str {
        self.lines.get(y).map_or("", String::as_str)
    }

    /// Length of line `y` in characters
    pub fn line_len(&self, y: usize) -> usize {
        self.line(y).chars().count()
    }

    /// Position after the last character of the last line
    pub fn end(&self) -> Point {
        let y = self.lines.len() - 1;
        Point::new(to_coord(self.line_len(y)), to_coord(y))
    }

    /// Bring a point inside the buffer, as `(column, row)` indices
    pub fn clamp(&self, p: Point) -> (usize, usize) {
        let y = p.row().min(self.lines.len() - 1);
        let x = p.col().min(self.line_len(y));
        (x, y)
    }

    /// Insert raw bytes at `cursor` and return the position just after them.
    ///
    /// `\n` and `\r\n` split lines; the line at the cursor is split around
    /// the inserted text.
    pub fn insert(&mut self, cursor: Point, raw: &[u8]) -> Point {
        let segments = split(raw);
        let (x, y) = self.clamp(cursor);

        let line = &self.lines[y];
        let at = byte_offset(line, x);
        let head = line[..at].to_string();
        let tail = line[at..].to_string();

        let n = segments.len();
        if n == 1 {
            let segment = &segments[0];
            self.lines[y] = format!("{head}{segment}{tail}");
            return Point::new(to_coord(x + segment.chars().count()), to_coord(y));
        }

        let last = &segments[n - 1];
        let end = Point::new(to_coord(last.chars().count()), to_coord(y + n - 1));

        let mut replacement = Vec::with_capacity(n);
        replacement.push(head + &segments[0]);
        replacement.extend(segments[1..n - 1].iter().cloned());
        replacement.push(format!("{last}{tail}"));
        self.lines.splice(y..=y, replacement);

        end
    }

    /// Remove `[p0, p1)`.
    ///
    /// A `p1` column beyond the end of its line also removes that line's
    /// line break, joining the following line onto `p0`'s line.
    pub fn remove(&mut self, p0: Point, p1: Point) {
        if p1 < p0 {
            return;
        }

        let (x0, y0) = self.clamp(p0);
        let y1 = p1.row().min(self.lines.len() - 1).max(y0);

        let (tail, resume) = if p1.x > to_coord(self.line_len(y1)) {
            (self.lines.get(y1 + 1).cloned().unwrap_or_default(), y1 + 2)
        } else {
            let line = &self.lines[y1];
            let from = if y1 == y0 { p1.col().max(x0) } else { p1.col() };
            (line[byte_offset(line, from)..].to_string(), y1 + 1)
        };

        let head = &self.lines[y0][..byte_offset(&self.lines[y0], x0)];
        self.lines[y0] = format!("{head}{tail}");

        let resume = resume.min(self.lines.len());
        if resume > y0 + 1 {
            self.lines.drain(y0 + 1..resume);
        }

        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
    }

    /// Copy of the text in `[p0, p1)`, lines joined with `\n`.
    ///
    /// A `p1` column beyond the end of its line adds that line's newline.
    pub fn select(&self, p0: Point, p1: Point) -> Vec<u8> {
        if p1 < p0 {
            return Vec::new();
        }

        let (x0, y0) = self.clamp(p0);
        let y1 = p1.row().min(self.lines.len() - 1).max(y0);
        let x1 = p1.col().min(self.line_len(y1));

        let mut selected: Vec<&str> = Vec::new();
        if y0 == y1 {
            selected.push(slice(&self.lines[y0], x0, x1));
        } else {
            selected.push(slice(&self.lines[y0], x0, usize::MAX));
            selected.extend(self.lines[y0 + 1..y1].iter().map(String::as_str));
            selected.push(slice(&self.lines[y1], 0, x1));
        }

        let mut raw = selected.join("\n").into_bytes();
        if p1.x > to_coord(self.line_len(y1)) {
            raw.push(b'\n');
        }
        raw
    }

    /// Extend the buffer with child output.
    ///
    /// The last line is the continuation point, so a line split across two
    /// reads ends up whole.
    pub fn append(&mut self, raw: &[u8]) -> Point {
        let mut raw = raw;
        if raw.first() == Some(&b'\n') {
            if let Some(last) = self.lines.last_mut() {
                if last.ends_with('\r') {
                    last.pop();
                }
            }
        } else if raw.is_empty() {
            return self.end();
        }

        // A trailing CR may be the first half of a CRLF from the next read.
        let mut pending_cr = false;
        if let Some(stripped) = raw.strip_suffix(b"\r") {
            raw = stripped;
            pending_cr = true;
        }

        let end = self.insert(self.end(), raw);
        if pending_cr {
            if let Some(last) = self.lines.last_mut() {
                last.push('\r');
            }
        }
        end
    }

    /// Whole buffer, newline-joined
    pub fn raw(&self) -> Vec<u8> {
        self.lines.join("\n").into_bytes()
    }

    /// Display spans for buffer `row`, starting at column `col`, `width`
    /// columns wide, with `[sel_start, sel_end)` highlighted.
    pub fn chunks(
        &self,
        width: usize,
        row: usize,
        col: usize,
        sel_start: Point,
        sel_end: Point,
    ) -> Chunks<'_> {
        let line = self.lines.get(row).map_or("", String::as_str);
        let len = line.chars().count();

        let in_selection = row < self.lines.len()
            && sel_start.is_valid()
            && sel_end.is_valid()
            && sel_start.row() <= row
            && row <= sel_end.row();

        let selected = if in_selection {
            let from = if row == sel_start.row() { sel_start.col().min(len) } else { 0 };
            let to = if row == sel_end.row() { sel_end.col().min(len + 1) } else { len + 1 };
            (from < to).then_some((from, to))
        } else {
            None
        };

        Chunks {
            line,
            len,
            col,
            width,
            shift: 0,
            selected,
        }
    }

    /// First occurrence of `needle` after (or before) `from`
    pub fn find(&self, needle: &str, from: Point, forward: bool) -> Option<Point> {
        if needle.is_empty() {
            return None;
        }

        let (x, y) = self.clamp(from);
        let found = |row: usize, byte: usize| {
            let column = self.lines[row][..byte].chars().count();
            Some(Point::new(to_coord(column), to_coord(row)))
        };

        if forward {
            for (row, line) in self.lines.iter().enumerate().skip(y) {
                let start = if row == y { byte_offset(line, x + 1) } else { 0 };
                if let Some(i) = line[start..].find(needle) {
                    return found(row, start + i);
                }
            }
        } else {
            for row in (0..=y).rev() {
                let line = &self.lines[row];
                let end = if row == y { byte_offset(line, x) } else { line.len() };
                if let Some(i) = line[..end].rfind(needle) {
                    return found(row, i);
                }
            }
        }

        None
    }
}

/// Lazy span sequence for one row, produced by [`TextBuffer::chunks`].
///
/// Cloning restarts it from the same state.
#[derive(Clone, Debug)]
pub struct Chunks<'a> {
    line: &'a str,
    len: usize,
    col: usize,
    width: usize,
    shift: usize,
    /// Selected line columns `[from, to)`; `to == len + 1` covers the newline
    selected: Option<(usize, usize)>,
}

impl Chunks<'_> {
    fn segment_at(&self, pos: usize) -> (Attr, usize) {
        if let Some((from, to)) = self.selected {
            if pos < from {
                return (Attr::Normal, from);
            }
            if pos < to {
                return (Attr::Selected, to);
            }
        }
        if pos < self.len {
            (Attr::Normal, self.len)
        } else {
            (Attr::Normal, usize::MAX)
        }
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.shift >= self.width {
            return None;
        }

        let pos = self.col + self.shift;
        let (attr, end) = self.segment_at(pos);
        let end = end.min(self.col + self.width);

        // Columns past the end of the line render as blanks.
        let real_end = end.min(self.len).max(pos);
        let mut text = slice(self.line, pos, real_end).to_string();
        text.extend(std::iter::repeat(' ').take(end - real_end));

        let chunk = Chunk {
            attr,
            col: self.shift,
            text,
        };
        self.shift += end - pos;
        Some(chunk)
    }
}

/// Byte offset of character `x` (the string length when past the end)
pub fn byte_offset(s: &str, x: usize) -> usize {
    s.char_indices().nth(x).map_or(s.len(), |(i, _)| i)
}

/// Characters `[from, to)` of `s`
pub fn slice(s: &str, from: usize, to: usize) -> &str {
    let start = byte_offset(s, from);
    let end = byte_offset(s, to.max(from));
    &s[start..end]
}

/// Split raw bytes on `\n` or `\r\n`
pub fn split(raw: &[u8]) -> Vec<String> {
    let segments: Vec<&[u8]> = raw.split(|b| *b == b'\n').collect();
    let last = segments.len() - 1;
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let segment = if i < last {
                segment.strip_suffix(b"\r").unwrap_or(segment)
            } else {
                segment
            };
            String::from_utf8_lossy(segment).into_owned()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(lines: &[&str]) -> TextBuffer {
        TextBuffer::from_lines(lines.iter().copied())
    }

    fn texts(chunks: Chunks<'_>) -> Vec<(Attr, String)> {
        chunks.map(|c| (c.attr, c.text)).collect()
    }

    #[test]
    fn test_simple_insert() {
        let mut b = buffer(&["hello"]);
        let end = b.insert(Point::new(5, 0), b" world");
        assert_eq!(b.lines, ["hello world"]);
        assert_eq!(end, Point::new(11, 0));
    }

    #[test]
    fn test_insert_splits_line() {
        let mut b = buffer(&["abcdef"]);
        let end = b.insert(Point::new(3, 0), b"\nXY");
        assert_eq!(b.lines, ["abc", "XYdef"]);
        assert_eq!(end, Point::new(2, 1));
    }

    #[test]
    fn test_insert_many_lines_crlf() {
        let mut b = buffer(&["<>", "tail"]);
        let end = b.insert(Point::new(1, 0), b"one\r\ntwo\r\nthree");
        assert_eq!(b.lines, ["<one", "two", "three>", "tail"]);
        assert_eq!(end, Point::new(5, 2));
    }

    #[test]
    fn test_insert_multibyte() {
        let mut b = buffer(&["héllo"]);
        let end = b.insert(Point::new(2, 0), "ü".as_bytes());
        assert_eq!(b.lines, ["héüllo"]);
        assert_eq!(end, Point::new(3, 0));
    }

    #[test]
    fn test_insert_remove_inverse() {
        let original = buffer(&["alpha", "", "gamma delta"]);
        for y in 0..original.len() {
            for x in 0..=original.line_len(y) {
                let mut b = original.clone();
                let p0 = Point::new(x as i32, y as i32);
                let end = b.insert(p0, b"xyz");
                b.remove(p0, end);
                assert_eq!(b, original, "round trip at {p0}");
            }
        }
    }

    #[test]
    fn test_remove_within_line() {
        let mut b = buffer(&["abcdef"]);
        b.remove(Point::new(1, 0), Point::new(4, 0));
        assert_eq!(b.lines, ["aef"]);
    }

    #[test]
    fn test_remove_across_lines() {
        let mut b = buffer(&["one", "two", "three"]);
        b.remove(Point::new(1, 0), Point::new(2, 2));
        assert_eq!(b.lines, ["oree"]);
    }

    #[test]
    fn test_remove_consumes_newline() {
        let mut b = buffer(&["one", "two", "three"]);
        b.remove(Point::new(3, 0), Point::new(4, 0));
        assert_eq!(b.lines, ["onetwo", "three"]);

        let mut b = buffer(&["one", "two", "three"]);
        b.remove(Point::new(0, 0), Point::new(4, 1));
        assert_eq!(b.lines, ["three"]);
    }

    #[test]
    fn test_remove_never_empties() {
        let mut b = buffer(&["one", "two"]);
        b.remove(Point::new(0, 0), Point::new(4, 1));
        assert_eq!(b.len(), 1);
        assert!(b.is_blank());

        b.remove(Point::new(0, 0), Point::new(10, 0));
        b.remove(Point::new(0, 0), Point::new(0, 0));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_select() {
        let b = buffer(&["one", "two", "three"]);
        assert_eq!(b.select(Point::new(1, 0), Point::new(3, 0)), b"ne");
        assert_eq!(b.select(Point::new(1, 0), Point::new(2, 2)), b"ne\ntwo\nth");
        assert_eq!(b.select(Point::new(0, 0), Point::new(4, 1)), b"one\ntwo\n");
    }

    #[test]
    fn test_select_remove_consistency() {
        let original = buffer(&["first line", "second", "", "fourth line"]);
        let ranges = [
            (Point::new(0, 0), Point::new(5, 0)),
            (Point::new(6, 0), Point::new(3, 1)),
            (Point::new(2, 1), Point::new(7, 1)),
            (Point::new(0, 1), Point::new(1, 2)),
            (Point::new(4, 0), Point::new(11, 3)),
        ];

        for (p0, p1) in ranges {
            let selected = original.select(p0, p1);
            let mut b = original.clone();
            b.remove(p0, p1);

            let raw = original.raw();
            let start = original.select(Point::new(0, 0), p0).len();
            let mut expected = raw[..start].to_vec();
            expected.extend_from_slice(&raw[start + selected.len()..]);
            assert_eq!(b.raw(), expected, "range {p0}..{p1}");
        }
    }

    #[test]
    fn test_cut_paste_round_trip() {
        let original = buffer(&["one", "two", "three"]);
        let mut b = original.clone();
        let start = Point::new(0, 0);
        let end = Point::new(4, 1);

        let clipboard = b.select(start, end);
        b.remove(start, end);
        assert_eq!(b.lines, ["three"]);

        b.insert(start, &clipboard);
        assert_eq!(b, original);
    }

    #[test]
    fn test_append_merges_partial_lines() {
        let mut b = TextBuffer::new();
        b.append(b"$ ls\r\nfi");
        b.append(b"le.txt\r");
        b.append(b"\nREADME\r\n");
        assert_eq!(b.lines, ["$ ls", "file.txt", "README", ""]);
        assert_eq!(b.end(), Point::new(0, 3));
    }

    #[test]
    fn test_chunks_unselected() {
        let b = buffer(&["hello"]);
        let chunks = texts(b.chunks(8, 0, 0, Point::UNSET, Point::UNSET));
        assert_eq!(
            chunks,
            vec![
                (Attr::Normal, "hello".to_string()),
                (Attr::Normal, "   ".to_string()),
            ]
        );
    }

    #[test]
    fn test_chunks_selection_includes_newline() {
        let b = buffer(&["hello", "world"]);
        let (s, e) = (Point::new(2, 0), Point::new(3, 1));

        let row0: Vec<Chunk> = b.chunks(8, 0, 0, s, e).collect();
        assert_eq!(row0[0], Chunk { attr: Attr::Normal, col: 0, text: "he".into() });
        assert_eq!(row0[1], Chunk { attr: Attr::Selected, col: 2, text: "llo ".into() });
        assert_eq!(row0[2], Chunk { attr: Attr::Normal, col: 6, text: "  ".into() });

        let row1 = texts(b.chunks(8, 1, 0, s, e));
        assert_eq!(
            row1,
            vec![
                (Attr::Selected, "wor".to_string()),
                (Attr::Normal, "ld".to_string()),
                (Attr::Normal, "   ".to_string()),
            ]
        );
    }

    #[test]
    fn test_chunks_clipped_and_scrolled() {
        let b = buffer(&["abcdefghij"]);
        let chunks = texts(b.chunks(4, 0, 3, Point::new(5, 0), Point::new(11, 0)));
        assert_eq!(
            chunks,
            vec![
                (Attr::Normal, "de".to_string()),
                (Attr::Selected, "fg".to_string()),
            ]
        );
    }

    #[test]
    fn test_chunks_restartable_and_blank_rows() {
        let b = buffer(&["abc"]);
        let chunks = b.chunks(5, 0, 0, Point::UNSET, Point::UNSET);
        let again = chunks.clone();
        assert_eq!(texts(chunks), texts(again));

        let beyond = texts(b.chunks(3, 7, 0, Point::UNSET, Point::UNSET));
        assert_eq!(beyond, vec![(Attr::Normal, "   ".to_string())]);
        assert_eq!(b.chunks(0, 0, 0, Point::UNSET, Point::UNSET).count(), 0);
    }

    #[test]
    fn test_find() {
        let b = buffer(&["foo bar", "baz foo", "qux"]);
        assert_eq!(b.find("foo", Point::new(0, 0), true), Some(Point::new(4, 1)));
        assert_eq!(b.find("ba", Point::new(0, 0), true), Some(Point::new(4, 0)));
        assert_eq!(b.find("foo", Point::new(4, 1), false), Some(Point::new(0, 0)));
        assert_eq!(b.find("nope", Point::new(0, 0), true), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");

        let b = buffer(&["first", "", "third"]);
        b.save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n\nthird\n");

        let loaded = TextBuffer::load(&path).unwrap();
        assert_eq!(loaded, b);
    }
}
