//! Fixed-advance layout
//!
//! Every character is `0.6 * font_size` wide and every line is
//! `1.2 * font_size` tall. Words wrap greedily, a paragraph always starts
//! on a new line, and a word wider than a line is broken mid-word.
//! All arithmetic is integer so page breaks are reproducible.

use crate::paging::{LayoutConfig, MeasurementEngine, Position};

/// Character advance, in tenths of the font size
const ADVANCE_TENTHS: i64 = 6;
/// Line height, in tenths of the font size
const LINE_HEIGHT_TENTHS: i64 = 12;

/// Lines and columns available on one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub chars_per_line: usize,
    pub lines_per_page: usize,
}

impl Metrics {
    pub fn for_config(config: &LayoutConfig) -> Self {
        let m = &config.margins;
        let font = i64::from(config.font_size.max(1));
        let content_width = (i64::from(config.width) - i64::from(m.left) - i64::from(m.right)).max(0);
        let content_height = (i64::from(config.height) - i64::from(m.top) - i64::from(m.bottom)).max(0);

        Self {
            chars_per_line: (content_width * 10 / (font * ADVANCE_TENTHS)).max(1) as usize,
            lines_per_page: (content_height * 10 / (font * LINE_HEIGHT_TENTHS)).max(1) as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    paragraph: usize,
    word: usize,
    offset: usize,
}

impl Cursor {
    const START: Cursor = Cursor {
        paragraph: 0,
        word: 0,
        offset: 0,
    };

    fn position(self) -> Position {
        Position::new(self.paragraph as u32, self.word as u32, self.offset as u32)
    }
}

/// Page breaker over paragraphs given as word lengths (in chars)
pub struct TextLayout<'a> {
    paragraphs: &'a [Vec<usize>],
    metrics: Metrics,
    cursor: Cursor,
}

impl<'a> TextLayout<'a> {
    pub fn new(paragraphs: &'a [Vec<usize>], config: &LayoutConfig) -> Self {
        Self {
            paragraphs,
            metrics: Metrics::for_config(config),
            cursor: Cursor::START,
        }
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    fn at_end(&self, cursor: Cursor) -> bool {
        cursor.paragraph >= self.paragraphs.len()
    }

    /// Lay out one line from `cursor`, returning where the next one starts
    fn fill_line(&self, mut cursor: Cursor) -> Cursor {
        let width = self.metrics.chars_per_line;
        let mut column = 0;

        while let Some(words) = self.paragraphs.get(cursor.paragraph) {
            let Some(&len) = words.get(cursor.word) else {
                return Cursor {
                    paragraph: cursor.paragraph + 1,
                    ..Cursor::START
                };
            };

            let remaining = len.saturating_sub(cursor.offset);
            let needed = if column == 0 { remaining } else { remaining + 1 };
            if needed <= width - column {
                column += needed;
                cursor.word += 1;
                cursor.offset = 0;
            } else if column == 0 {
                cursor.offset += width;
                return cursor;
            } else {
                return cursor;
            }
        }
        cursor
    }
}

impl MeasurementEngine for TextLayout<'_> {
    fn rewind(&mut self) -> Position {
        self.cursor = Cursor::START;
        self.cursor.position()
    }

    fn next_page(&mut self) -> Option<Position> {
        let mut cursor = self.cursor;
        for _ in 0..self.metrics.lines_per_page {
            if self.at_end(cursor) {
                break;
            }
            cursor = self.fill_line(cursor);
        }
        self.cursor = cursor;

        if self.at_end(cursor) {
            None
        } else {
            Some(cursor.position())
        }
    }
}
