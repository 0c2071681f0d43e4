use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use text_size::{TextRange, TextSize};
use tower_lsp::lsp_types::{Position, Range};

use crate::error::ErrorSite;

/// Metadata attached to a `{| ... |}` marker.
pub type MarkerData = Map<String, Value>;

/// Index of a virtual file inside its fixture, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How `Position::character` counts columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositionEncoding {
    #[default]
    #[serde(rename = "utf-16")]
    Utf16,
    #[serde(rename = "utf-8")]
    Utf8,
}

impl PositionEncoding {
    /// The value advertised in `general.positionEncodings`.
    pub fn as_lsp_str(self) -> &'static str {
        match self {
            PositionEncoding::Utf16 => "utf-16",
            PositionEncoding::Utf8 => "utf-8",
        }
    }
}

/// 1-based line/column of a token in the raw fixture text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.column)
    }
}

/// A cursor position declared with `/*name*/`, `/**/` or `{| ... |}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub file: FileId,
    /// Byte offset in the stripped file content.
    pub offset: TextSize,
    pub position: Position,
    /// `None` for `/**/` and for metadata markers without a `"name"` key.
    pub name: Option<CompactString>,
    pub data: Option<MarkerData>,
    pub source: SourceLocation,
}

impl Marker {
    /// A bare `/**/` marker. Unnamed metadata markers don't count.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none() && self.data.is_none()
    }
}

/// A span declared with `[| ... |]`, or the zero-width span of a `{| ... |}` marker.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeMarker {
    pub file: FileId,
    /// Byte span in the stripped file content.
    pub text_range: TextRange,
    pub range: Range,
    /// Name of the last named marker found directly inside the range.
    pub name: Option<CompactString>,
    pub data: Option<MarkerData>,
    pub source: SourceLocation,
}

impl RangeMarker {
    pub fn is_empty(&self) -> bool {
        self.text_range.is_empty()
    }
}

/// Either kind of location a query can start from.
#[derive(Debug, Clone, Copy)]
pub enum MarkerOrRange<'a> {
    Marker(&'a Marker),
    Range(&'a RangeMarker),
}

impl<'a> MarkerOrRange<'a> {
    pub fn file(&self) -> FileId {
        match self {
            MarkerOrRange::Marker(m) => m.file,
            MarkerOrRange::Range(r) => r.file,
        }
    }

    /// Queries issued from a range start at the range's first character.
    pub fn position(&self) -> Position {
        match self {
            MarkerOrRange::Marker(m) => m.position,
            MarkerOrRange::Range(r) => r.range.start,
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        match self {
            MarkerOrRange::Marker(m) => m.name.as_deref(),
            MarkerOrRange::Range(r) => r.name.as_deref(),
        }
    }
}

impl<'a> From<&'a Marker> for MarkerOrRange<'a> {
    fn from(marker: &'a Marker) -> Self {
        MarkerOrRange::Marker(marker)
    }
}

impl<'a> From<&'a RangeMarker> for MarkerOrRange<'a> {
    fn from(range: &'a RangeMarker) -> Self {
        MarkerOrRange::Range(range)
    }
}

/// One `// @Filename` section of a fixture after annotation stripping.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualFile {
    pub id: FileId,
    /// Normalized absolute path.
    pub path: String,
    pub content: String,
    /// Per-file directives such as `emitthisfile`, keys lower-cased.
    pub options: FxHashMap<String, String>,
    pub emit: bool,
    /// Line of the raw fixture text where this file's content begins (1-based).
    pub first_line: u32,
}

impl VirtualFile {
    pub fn error_site(&self, location: SourceLocation) -> ErrorSite {
        ErrorSite::at(self.path.clone(), location.line, location.column)
    }

    /// Whether this is a TypeScript/JavaScript project configuration file.
    pub fn is_config_file(&self) -> bool {
        let lower = self.path.to_ascii_lowercase();
        lower.ends_with("tsconfig.json") || lower.ends_with("jsconfig.json")
    }
}
