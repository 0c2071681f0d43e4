//! Offset ↔ position conversion for stripped fixture content.
//!
//! Offsets are byte offsets into the stripped text; positions are LSP
//! `(line, character)` pairs in the configured [`PositionEncoding`].

use ropey::Rope;
use text_size::{TextRange, TextSize};
use tower_lsp::lsp_types::{Position, Range};

use crate::types::PositionEncoding;

#[derive(Debug, Clone)]
pub struct LineMap {
    rope: Rope,
    encoding: PositionEncoding,
}

impl LineMap {
    pub fn new(text: &str, encoding: PositionEncoding) -> Self {
        Self {
            rope: Rope::from_str(text),
            encoding,
        }
    }

    pub fn encoding(&self) -> PositionEncoding {
        self.encoding
    }

    pub fn len(&self) -> TextSize {
        TextSize::from(self.rope.len_bytes() as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_bytes() == 0
    }

    /// Convert a byte offset to a position.
    ///
    /// Offsets past the end clamp to the end of the text; offsets inside a
    /// multi-byte character resolve to that character's start.
    pub fn position(&self, offset: TextSize) -> Position {
        let byte = usize::from(offset).min(self.rope.len_bytes());
        let line = self.rope.byte_to_line(byte);
        let char_idx = self.rope.byte_to_char(byte);
        let line_char = self.rope.line_to_char(line);

        let character = match self.encoding {
            PositionEncoding::Utf8 => {
                self.rope.char_to_byte(char_idx) - self.rope.line_to_byte(line)
            }
            PositionEncoding::Utf16 => {
                self.rope.char_to_utf16_cu(char_idx) - self.rope.char_to_utf16_cu(line_char)
            }
        };

        Position::new(line as u32, character as u32)
    }

    pub fn range(&self, range: TextRange) -> Range {
        Range::new(self.position(range.start()), self.position(range.end()))
    }

    /// Convert a position back to a byte offset.
    ///
    /// Returns `None` if the line does not exist or the character runs past
    /// the end of its line.
    pub fn offset(&self, position: Position) -> Option<TextSize> {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return None;
        }

        let line_slice = self.rope.line(line);
        let line_start_char = self.rope.line_to_char(line);
        let character = position.character as usize;

        let char_idx = match self.encoding {
            PositionEncoding::Utf8 => {
                if character > line_slice.len_bytes() {
                    return None;
                }
                let line_start_byte = self.rope.line_to_byte(line);
                self.rope.byte_to_char(line_start_byte + character)
            }
            PositionEncoding::Utf16 => {
                if character > line_slice.len_utf16_cu() {
                    return None;
                }
                let base = self.rope.char_to_utf16_cu(line_start_char);
                self.rope.utf16_cu_to_char(base + character)
            }
        };

        Some(TextSize::from(self.rope.char_to_byte(char_idx) as u32))
    }

    /// Position one past the last character of the text.
    pub fn end_position(&self) -> Position {
        self.position(self.len())
    }
}
