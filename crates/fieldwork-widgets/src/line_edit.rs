//! Grapheme-aware single-line editing state.
//!
//! The engine owns the authoritative text; `LineEdit` owns only the cursor
//! and produces edited strings for the engine to coerce. After the engine
//! applies (and possibly truncates or rejects) an edit, the cursor is
//! clamped against the text that actually stuck.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Number of grapheme clusters in `text`.
#[must_use]
pub fn grapheme_count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Byte offset of the grapheme at `index` (the text length when past the
/// end).
#[must_use]
pub fn grapheme_byte_offset(text: &str, index: usize) -> usize {
    text.grapheme_indices(true)
        .nth(index)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Display width of the text before the grapheme at `index`.
#[must_use]
pub fn width_before(text: &str, index: usize) -> usize {
    let byte = grapheme_byte_offset(text, index);
    text[..byte].width()
}

/// Cursor state for editing a single line of text the cursor does not own.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineEdit {
    cursor: usize,
}

impl LineEdit {
    /// Create a cursor at the start of the line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cursor position as a grapheme index.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Clamp the cursor into `text`'s valid range.
    pub fn clamp(&mut self, text: &str) {
        self.cursor = self.cursor.min(grapheme_count(text));
    }

    /// Move the cursor to the start of the line.
    pub fn home(&mut self) {
        self.cursor = 0;
    }

    /// Move the cursor past the last grapheme.
    pub fn end(&mut self, text: &str) {
        self.cursor = grapheme_count(text);
    }

    /// Move one grapheme left. Returns whether the cursor moved.
    pub fn left(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Move one grapheme right. Returns whether the cursor moved.
    pub fn right(&mut self, text: &str) -> bool {
        if self.cursor < grapheme_count(text) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Insert a character at the cursor, advancing it. Returns the edited
    /// string; the caller feeds it to the engine and then clamps.
    #[must_use]
    pub fn insert(&mut self, text: &str, c: char) -> String {
        let mut edited = text.to_string();
        edited.insert(grapheme_byte_offset(text, self.cursor), c);
        self.cursor += 1;
        edited
    }

    /// Insert a string at the cursor (paste), advancing past it.
    #[must_use]
    pub fn insert_str(&mut self, text: &str, inserted: &str) -> String {
        let mut edited = text.to_string();
        edited.insert_str(grapheme_byte_offset(text, self.cursor), inserted);
        self.cursor += grapheme_count(inserted);
        edited
    }

    /// Delete the grapheme before the cursor. `None` when at the start.
    #[must_use]
    pub fn backspace(&mut self, text: &str) -> Option<String> {
        if self.cursor == 0 {
            return None;
        }
        let start = grapheme_byte_offset(text, self.cursor - 1);
        let end = grapheme_byte_offset(text, self.cursor);
        let mut edited = text.to_string();
        edited.drain(start..end);
        self.cursor -= 1;
        Some(edited)
    }

    /// Delete the grapheme under the cursor. `None` when at the end.
    #[must_use]
    pub fn delete(&mut self, text: &str) -> Option<String> {
        if self.cursor >= grapheme_count(text) {
            return None;
        }
        let start = grapheme_byte_offset(text, self.cursor);
        let end = grapheme_byte_offset(text, self.cursor + 1);
        let mut edited = text.to_string();
        edited.drain(start..end);
        Some(edited)
    }
}
