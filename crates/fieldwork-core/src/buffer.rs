//! The cell buffer widgets render into.
//!
//! A `Buffer` is a dense grid of styled cells. Widgets draw with
//! `set_string`, which is grapheme-cluster aware and clips at the buffer
//! edge; wide graphemes occupy their display width.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::geometry::Rect;
use crate::style::Style;

/// A single screen cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// The grapheme displayed in this cell. Wide graphemes occupy the
    /// leading cell; continuation cells hold the empty string.
    pub symbol: String,
    /// The cell's style.
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            symbol: " ".to_string(),
            style: Style::default(),
        }
    }
}

impl Cell {
    /// Whether the cell holds a blank space with no styling.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.symbol == " " && self.style.is_empty()
    }
}

/// A rectangular grid of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Buffer {
    /// Create a buffer filled with blank cells.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    /// Buffer width in columns.
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Buffer height in rows.
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// The full-buffer rectangle.
    #[must_use]
    pub const fn area(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Get a cell, if inside the buffer.
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Get a cell mutably, if inside the buffer.
    pub fn get_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        self.index(x, y).map(move |i| &mut self.cells[i])
    }

    /// Overwrite a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = cell;
        }
    }

    /// Reset every cell to blank.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Draw a string starting at `(x, y)`, clipped at `max_x` (exclusive)
    /// and at the buffer edge. Returns the column after the last drawn
    /// grapheme.
    pub fn set_string(&mut self, x: u16, y: u16, content: &str, style: Style, max_x: u16) -> u16 {
        let limit = max_x.min(self.width);
        let mut col = x;
        for grapheme in content.graphemes(true) {
            if col >= limit {
                break;
            }
            let w = grapheme.width() as u16;
            if w == 0 {
                continue;
            }
            if col.saturating_add(w) > limit {
                break;
            }
            self.set(
                col,
                y,
                Cell {
                    symbol: grapheme.to_string(),
                    style,
                },
            );
            // Blank out continuation cells behind a wide grapheme.
            for cont in 1..w {
                self.set(
                    col + cont,
                    y,
                    Cell {
                        symbol: String::new(),
                        style,
                    },
                );
            }
            col = col.saturating_add(w);
        }
        col
    }

    /// Apply a style to every cell in `area`, preserving content.
    pub fn set_style(&mut self, area: Rect, style: Style) {
        if style.is_empty() {
            return;
        }
        for y in area.y..area.bottom().min(self.height) {
            for x in area.x..area.right().min(self.width) {
                if let Some(cell) = self.get_mut(x, y) {
                    cell.style = cell.style.patch(style);
                }
            }
        }
    }

    /// The text content of one row, trailing spaces trimmed. Test helper.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        let mut out = String::new();
        for x in 0..self.width {
            if let Some(cell) = self.get(x, y) {
                out.push_str(&cell.symbol);
            }
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn new_buffer_is_blank() {
        let buf = Buffer::new(4, 2);
        assert_eq!(buf.width(), 4);
        assert_eq!(buf.height(), 2);
        assert!(buf.get(0, 0).unwrap().is_blank());
        assert!(buf.get(3, 1).unwrap().is_blank());
        assert!(buf.get(4, 0).is_none());
    }

    #[test]
    fn set_string_basic() {
        let mut buf = Buffer::new(10, 1);
        let end = buf.set_string(0, 0, "abc", Style::default(), 10);
        assert_eq!(end, 3);
        assert_eq!(buf.row_text(0), "abc");
    }

    #[test]
    fn set_string_clips_at_max_x() {
        let mut buf = Buffer::new(10, 1);
        buf.set_string(0, 0, "abcdef", Style::default(), 3);
        assert_eq!(buf.row_text(0), "abc");
    }

    #[test]
    fn set_string_clips_at_buffer_edge() {
        let mut buf = Buffer::new(4, 1);
        buf.set_string(2, 0, "wxyz", Style::default(), 10);
        assert_eq!(buf.row_text(0), "  wx");
    }

    #[test]
    fn set_string_applies_style() {
        let mut buf = Buffer::new(5, 1);
        buf.set_string(0, 0, "a", Style::new().fg(Color::Red), 5);
        assert_eq!(buf.get(0, 0).unwrap().style.fg, Some(Color::Red));
    }

    #[test]
    fn wide_grapheme_occupies_two_cells() {
        let mut buf = Buffer::new(6, 1);
        let end = buf.set_string(0, 0, "日x", Style::default(), 6);
        assert_eq!(end, 3);
        assert_eq!(buf.get(0, 0).unwrap().symbol, "日");
        assert_eq!(buf.get(1, 0).unwrap().symbol, "");
        assert_eq!(buf.get(2, 0).unwrap().symbol, "x");
    }

    #[test]
    fn wide_grapheme_does_not_split_at_clip() {
        let mut buf = Buffer::new(6, 1);
        // Clip boundary falls inside the wide grapheme: it must not draw.
        let end = buf.set_string(0, 0, "a日", Style::default(), 2);
        assert_eq!(end, 1);
        assert_eq!(buf.row_text(0), "a");
    }

    #[test]
    fn set_style_patches_area() {
        let mut buf = Buffer::new(3, 2);
        buf.set_string(0, 0, "abc", Style::default(), 3);
        buf.set_style(Rect::new(1, 0, 2, 1), Style::new().bg(Color::Blue));
        assert_eq!(buf.get(0, 0).unwrap().style.bg, None);
        assert_eq!(buf.get(1, 0).unwrap().style.bg, Some(Color::Blue));
        assert_eq!(buf.get(2, 0).unwrap().style.bg, Some(Color::Blue));
        assert_eq!(buf.get(1, 1).unwrap().style.bg, None);
    }

    #[test]
    fn row_text_trims_trailing_blanks() {
        let mut buf = Buffer::new(8, 1);
        buf.set_string(1, 0, "hi", Style::default(), 8);
        assert_eq!(buf.row_text(0), " hi");
    }
}
