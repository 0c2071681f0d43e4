//! Annotation scanner: strips `/*name*/`, `[| |]` and `{| |}` tokens from one
//! file section and records where they were, in post-stripping offsets.
//!
//! The scan is a small state machine over the section's bytes. Every token
//! is ASCII, so byte-wise matching never splits a multi-byte character.

use compact_str::CompactString;
use serde_json::Value;
use smallvec::SmallVec;
use text_size::{TextRange, TextSize};

use crate::error::{ErrorSite, HarnessError};
use crate::fixture::directives::FileSection;
use crate::types::{FileId, Marker, MarkerData, PositionEncoding, RangeMarker, SourceLocation};
use crate::workspace::LineMap;

const RANGE_OPEN: &[u8] = b"[|";
const RANGE_CLOSE: &[u8] = b"|]";
const MARKER_OPEN: &[u8] = b"/*";
const MARKER_CLOSE: &[u8] = b"*/";
const OBJECT_OPEN: &[u8] = b"{|";
const OBJECT_CLOSE: &[u8] = b"|}";

pub(crate) struct ScannedFile {
    pub content: String,
    pub markers: Vec<Marker>,
    pub ranges: Vec<RangeMarker>,
}

/// Where an annotation token started, in both coordinate systems.
#[derive(Debug, Clone, Copy)]
struct OpenToken {
    output_offset: usize,
    source_offset: usize,
    location: SourceLocation,
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Content,
    SlashStarMarker(OpenToken),
    ObjectMarker(OpenToken),
}

/// A range or marker whose line/character is computed once the output is final.
struct PendingRange {
    start: usize,
    end: usize,
    name: Option<CompactString>,
    data: Option<MarkerData>,
    location: SourceLocation,
}

struct PendingMarker {
    offset: usize,
    name: Option<CompactString>,
    data: Option<MarkerData>,
    location: SourceLocation,
}

struct Scanner<'a> {
    path: &'a str,
    section: &'a FileSection,
    bytes: &'a [u8],
    output: String,
    /// Start of plain text not yet copied to `output`.
    last_flushed: usize,
    pos: usize,
    line_idx: usize,
    column: u32,
    markers: Vec<PendingMarker>,
    ranges: Vec<PendingRange>,
    /// Indices into `ranges` of ranges still waiting for `|]`.
    open_ranges: SmallVec<[usize; 4]>,
}

impl<'a> Scanner<'a> {
    fn new(path: &'a str, section: &'a FileSection) -> Self {
        Self {
            path,
            section,
            bytes: section.content.as_bytes(),
            output: String::with_capacity(section.content.len()),
            last_flushed: 0,
            pos: 0,
            line_idx: 0,
            column: 1,
            markers: Vec::new(),
            ranges: Vec::new(),
            open_ranges: SmallVec::new(),
        }
    }

    fn at(&self, token: &[u8]) -> bool {
        self.bytes[self.pos..].starts_with(token)
    }

    fn location(&self) -> SourceLocation {
        let line = self
            .section
            .raw_lines
            .get(self.line_idx)
            .copied()
            .unwrap_or(self.line_idx as u32 + 1);
        SourceLocation {
            line,
            column: self.column,
        }
    }

    fn site(&self, location: SourceLocation) -> ErrorSite {
        ErrorSite::at(self.path, location.line, location.column)
    }

    fn advance(&mut self, count: usize) {
        for _ in 0..count {
            let Some(&byte) = self.bytes.get(self.pos) else {
                return;
            };
            if byte == b'\n' {
                self.line_idx += 1;
                self.column = 1;
            } else if byte & 0xC0 != 0x80 {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn flush(&mut self, until: usize) {
        if until > self.last_flushed {
            self.output
                .push_str(&self.section.content[self.last_flushed..until]);
        }
        self.last_flushed = until;
    }

    fn open_token(&self) -> OpenToken {
        OpenToken {
            output_offset: self.output.len(),
            source_offset: self.pos,
            location: self.location(),
        }
    }

    fn run(mut self) -> Result<ScannedFile, HarnessError> {
        let mut state = ScanState::Content;

        while self.pos < self.bytes.len() {
            state = match state {
                ScanState::Content => self.scan_content()?,
                ScanState::SlashStarMarker(open) => self.scan_slash_star(open)?,
                ScanState::ObjectMarker(open) => self.scan_object(open)?,
            };
        }

        self.flush(self.bytes.len());

        if let Some(&first) = self.open_ranges.first() {
            let location = self.ranges[first].location;
            return Err(HarnessError::malformed(
                self.site(location),
                "Unterminated range.",
            ));
        }

        match state {
            ScanState::Content => {}
            ScanState::SlashStarMarker(open) | ScanState::ObjectMarker(open) => {
                return Err(HarnessError::malformed(
                    self.site(open.location),
                    "Unterminated marker.",
                ));
            }
        }

        Ok(self.finish())
    }

    fn scan_content(&mut self) -> Result<ScanState, HarnessError> {
        if self.at(RANGE_OPEN) {
            self.flush(self.pos);
            let open = self.open_token();
            self.open_ranges.push(self.ranges.len());
            self.ranges.push(PendingRange {
                start: open.output_offset,
                end: open.output_offset,
                name: None,
                data: None,
                location: open.location,
            });
            self.advance(RANGE_OPEN.len());
            self.last_flushed = self.pos;
            return Ok(ScanState::Content);
        }

        if self.at(RANGE_CLOSE) {
            let Some(idx) = self.open_ranges.pop() else {
                return Err(HarnessError::malformed(
                    self.site(self.location()),
                    "Found range end with no matching start.",
                ));
            };
            self.flush(self.pos);
            self.ranges[idx].end = self.output.len();
            self.advance(RANGE_CLOSE.len());
            self.last_flushed = self.pos;
            return Ok(ScanState::Content);
        }

        if self.at(MARKER_OPEN) {
            // The text stays unflushed: if this turns out to be an ordinary
            // block comment it is emitted as-is.
            self.flush(self.pos);
            let open = self.open_token();
            self.advance(MARKER_OPEN.len());
            return Ok(ScanState::SlashStarMarker(open));
        }

        if self.at(OBJECT_OPEN) {
            self.flush(self.pos);
            let open = self.open_token();
            self.advance(OBJECT_OPEN.len());
            return Ok(ScanState::ObjectMarker(open));
        }

        self.advance(1);
        Ok(ScanState::Content)
    }

    fn scan_slash_star(&mut self, open: OpenToken) -> Result<ScanState, HarnessError> {
        if self.at(MARKER_CLOSE) {
            let name_start = open.source_offset + MARKER_OPEN.len();
            let name = self.section.content[name_start..self.pos].trim();
            let name = (!name.is_empty()).then(|| CompactString::from(name));

            self.record_marker(PendingMarker {
                offset: open.output_offset,
                name,
                data: None,
                location: open.location,
            });

            self.advance(MARKER_CLOSE.len());
            self.last_flushed = self.pos;
            return Ok(ScanState::Content);
        }

        let byte = self.bytes[self.pos];
        if is_marker_name_byte(byte) {
            self.advance(1);
            Ok(ScanState::SlashStarMarker(open))
        } else {
            // A block comment, not a marker. Re-examine this byte as content.
            Ok(ScanState::Content)
        }
    }

    fn scan_object(&mut self, open: OpenToken) -> Result<ScanState, HarnessError> {
        if !self.at(OBJECT_CLOSE) {
            self.advance(1);
            return Ok(ScanState::ObjectMarker(open));
        }

        let body_start = open.source_offset + OBJECT_OPEN.len();
        let body = self.section.content[body_start..self.pos].trim();
        let data = parse_object_marker(body).map_err(|message| {
            HarnessError::malformed(self.site(open.location), message)
        })?;

        let name = data
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(CompactString::from);

        self.ranges.push(PendingRange {
            start: open.output_offset,
            end: open.output_offset,
            name: None,
            data: Some(data.clone()),
            location: open.location,
        });
        self.record_marker(PendingMarker {
            offset: open.output_offset,
            name,
            data: Some(data),
            location: open.location,
        });

        self.advance(OBJECT_CLOSE.len());
        self.last_flushed = self.pos;
        Ok(ScanState::Content)
    }

    fn record_marker(&mut self, marker: PendingMarker) {
        // The innermost open range takes on the name and data of markers inside it.
        if let Some(&idx) = self.open_ranges.last() {
            let range = &mut self.ranges[idx];
            if marker.name.is_some() {
                range.name = marker.name.clone();
            }
            if marker.data.is_some() {
                range.data = marker.data.clone();
            }
        }
        self.markers.push(marker);
    }

    fn finish(self) -> ScannedFile {
        ScannedFile {
            content: self.output,
            markers: self
                .markers
                .into_iter()
                .map(|m| Marker {
                    file: FileId(0),
                    offset: TextSize::from(m.offset as u32),
                    position: Default::default(),
                    name: m.name,
                    data: m.data,
                    source: m.location,
                })
                .collect(),
            ranges: self
                .ranges
                .into_iter()
                .map(|r| RangeMarker {
                    file: FileId(0),
                    text_range: TextRange::new(
                        TextSize::from(r.start as u32),
                        TextSize::from(r.end as u32),
                    ),
                    range: Default::default(),
                    name: r.name,
                    data: r.data,
                    source: r.location,
                })
                .collect(),
        }
    }
}

fn is_marker_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'$' || byte == b'_'
}

/// Parse the body of a `{| ... |}` marker as the members of a JSON object.
fn parse_object_marker(body: &str) -> Result<MarkerData, String> {
    let value: Value = serde_json::from_str(&format!("{{ {} }}", body))
        .map_err(|e| format!("Unable to parse marker text {}: {}", body, e))?;

    let Value::Object(data) = value else {
        return Err(format!("Unable to parse marker text {}", body));
    };
    if data.is_empty() {
        return Err("Object markers can not be empty".to_string());
    }
    if let Some((key, _)) = data
        .iter()
        .find(|(_, v)| matches!(v, Value::Array(_) | Value::Object(_)))
    {
        return Err(format!(
            "Object marker value for '{}' must be a string, number, boolean or null",
            key
        ));
    }

    Ok(data)
}

/// Strip annotations from one file section and resolve marker positions.
pub(crate) fn scan_section(
    file: FileId,
    path: &str,
    section: &FileSection,
    encoding: PositionEncoding,
) -> Result<ScannedFile, HarnessError> {
    let mut scanned = Scanner::new(path, section).run()?;
    let line_map = LineMap::new(&scanned.content, encoding);

    for marker in &mut scanned.markers {
        marker.file = file;
        marker.position = line_map.position(marker.offset);
    }
    for range in &mut scanned.ranges {
        range.file = file;
        range.range = line_map.range(range.text_range);
    }

    Ok(scanned)
}
