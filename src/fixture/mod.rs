//! Annotated fixture parsing.
//!
//! A fixture is split into files on `// @Filename:` directives, then each
//! file is scanned for markers and ranges. The result is an immutable
//! [`Fixture`] that owns every file, marker and range of one test case.

mod directives;
mod scanner;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::constants::{EMIT_THIS_FILE_OPTION, IMPLICIT_FILE_NAME, ROOT_DIRECTORY};
use crate::error::{ErrorSite, HarnessError};
use crate::types::{FileId, Marker, PositionEncoding, RangeMarker, VirtualFile};
use crate::workspace::paths::normalize_path;

/// Options controlling how fixture text is interpreted.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// File name used when the fixture has no `// @Filename` directive.
    pub implicit_file_name: String,
    /// Directory relative `@Filename` paths resolve against, unless the
    /// fixture sets `// @currentDirectory`.
    pub current_directory: String,
    pub encoding: PositionEncoding,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            implicit_file_name: IMPLICIT_FILE_NAME.to_string(),
            current_directory: ROOT_DIRECTORY.to_string(),
            encoding: PositionEncoding::default(),
        }
    }
}

/// Parses raw fixture text into a [`Fixture`].
#[derive(Debug, Clone, Default)]
pub struct FixtureParser {
    options: ParseOptions,
}

impl FixtureParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn parse(&self, text: &str) -> Result<Fixture, HarnessError> {
        tracing::debug!("[PARSE_FIXTURE_ENTER] bytes={}", text.len());

        let split = directives::split_files(text, &self.options.implicit_file_name)?;
        let current_directory = split
            .current_directory
            .as_deref()
            .map(|dir| normalize_path(dir, ROOT_DIRECTORY))
            .unwrap_or_else(|| normalize_path(&self.options.current_directory, ROOT_DIRECTORY));

        let mut fixture = Fixture {
            files: Vec::with_capacity(split.sections.len()),
            path_index: FxHashMap::default(),
            markers: Vec::new(),
            marker_index: FxHashMap::default(),
            ranges: Vec::new(),
            range_index: FxHashMap::default(),
            symlinks: FxHashMap::default(),
            global_options: split.global_options,
            current_directory,
            encoding: self.options.encoding,
        };

        for (idx, section) in split.sections.iter().enumerate() {
            let id = FileId(idx as u32);
            let path = normalize_path(&section.name, &fixture.current_directory);
            let first_line = section.raw_lines.first().copied().unwrap_or(1);

            if let Some(&existing) = fixture.path_index.get(path.as_str()) {
                let existing: &VirtualFile = &fixture.files[existing.index()];
                return Err(HarnessError::malformed(
                    ErrorSite::at(path.clone(), first_line, 1),
                    format!(
                        "Duplicate file path '{}' (first declared at line {})",
                        path, existing.first_line
                    ),
                ));
            }

            let scanned = scanner::scan_section(id, &path, section, self.options.encoding)?;

            for marker in scanned.markers {
                fixture.add_marker(marker, &path)?;
            }
            for range in scanned.ranges {
                fixture.add_range(range);
            }

            let emit = section
                .options
                .get(EMIT_THIS_FILE_OPTION)
                .is_some_and(|value| value.eq_ignore_ascii_case("true"));

            fixture.path_index.insert(CompactString::from(path.as_str()), id);
            fixture.files.push(VirtualFile {
                id,
                path,
                content: scanned.content,
                options: section.options.clone(),
                emit,
                first_line,
            });
        }

        for (link, target) in split.symlinks {
            let link = normalize_path(&link, &fixture.current_directory);
            let target = normalize_path(&target, &fixture.current_directory);
            fixture.symlinks.insert(link, target);
        }

        fixture.validate_options()?;

        tracing::debug!(
            "[PARSE_FIXTURE_EXIT] files={} markers={} ranges={}",
            fixture.files.len(),
            fixture.markers.len(),
            fixture.ranges.len()
        );

        Ok(fixture)
    }
}

/// The parsed files, markers and ranges of one test case.
#[derive(Debug, Clone)]
pub struct Fixture {
    files: Vec<VirtualFile>,
    path_index: FxHashMap<CompactString, FileId>,
    markers: Vec<Marker>,
    marker_index: FxHashMap<CompactString, usize>,
    ranges: Vec<RangeMarker>,
    range_index: FxHashMap<CompactString, Vec<usize>>,
    /// Link path → target path, both normalized.
    symlinks: FxHashMap<String, String>,
    global_options: BTreeMap<String, String>,
    current_directory: String,
    encoding: PositionEncoding,
}

impl Fixture {
    /// Parse `text` with default options.
    pub fn parse(text: &str) -> Result<Self, HarnessError> {
        FixtureParser::default().parse(text)
    }

    fn add_marker(&mut self, marker: Marker, path: &str) -> Result<(), HarnessError> {
        if let Some(name) = marker.name.clone() {
            if let Some(&existing) = self.marker_index.get(&name) {
                let first = &self.markers[existing];
                let first_path = self
                    .files
                    .get(first.file.index())
                    .map_or(path, |f| f.path.as_str());
                return Err(HarnessError::DuplicateMarker {
                    name: name.to_string(),
                    first: ErrorSite::at(first_path, first.source.line, first.source.column),
                    second: ErrorSite::at(path, marker.source.line, marker.source.column),
                });
            }
            self.marker_index.insert(name, self.markers.len());
        }
        self.markers.push(marker);
        Ok(())
    }

    fn add_range(&mut self, range: RangeMarker) {
        if let Some(name) = range.name.clone() {
            self.range_index.entry(name).or_default().push(self.ranges.len());
        }
        self.ranges.push(range);
    }

    fn validate_options(&self) -> Result<(), HarnessError> {
        let has_compiler_options = self
            .global_options
            .keys()
            .any(|key| key != "currentdirectory");
        if !has_compiler_options {
            return Ok(());
        }

        if let Some(config) = self.files.iter().find(|f| f.is_config_file()) {
            return Err(HarnessError::malformed(
                ErrorSite::at(config.path.clone(), config.first_line, 1),
                format!(
                    "It is not allowed to use global options along with config files. Config file: {}",
                    config.path
                ),
            ));
        }
        Ok(())
    }

    pub fn files(&self) -> &[VirtualFile] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> Option<&VirtualFile> {
        self.files.get(id.index())
    }

    /// Look up a file by its normalized path, without following symlinks.
    pub fn file_by_path(&self, path: &str) -> Option<&VirtualFile> {
        self.path_index.get(path).and_then(|&id| self.file(id))
    }

    /// All markers in text order, file by file.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Look up a marker by name. The empty name refers to the first
    /// anonymous `/**/` marker.
    pub fn marker(&self, name: &str) -> Result<&Marker, HarnessError> {
        if name.is_empty() {
            return self
                .markers
                .iter()
                .find(|m| m.is_anonymous())
                .ok_or_else(|| HarnessError::unknown_marker(name));
        }
        self.marker_index
            .get(name)
            .map(|&idx| &self.markers[idx])
            .ok_or_else(|| HarnessError::unknown_marker(name))
    }

    pub fn marker_names(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().filter_map(|m| m.name.as_deref())
    }

    pub fn markers_in(&self, file: FileId) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| m.file == file)
    }

    /// All ranges in open order, including zero-width metadata ranges.
    pub fn ranges(&self) -> &[RangeMarker] {
        &self.ranges
    }

    /// The first range carrying `name`.
    pub fn range(&self, name: &str) -> Result<&RangeMarker, HarnessError> {
        self.range_index
            .get(name)
            .and_then(|indices| indices.first())
            .map(|&idx| &self.ranges[idx])
            .ok_or_else(|| HarnessError::unknown_range(name))
    }

    /// Every range carrying `name`, in open order.
    pub fn ranges_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a RangeMarker> + 'a {
        self.range_index
            .get(name)
            .into_iter()
            .flatten()
            .map(|&idx| &self.ranges[idx])
    }

    pub fn range_at(&self, index: usize) -> Option<&RangeMarker> {
        self.ranges.get(index)
    }

    pub fn ranges_in(&self, file: FileId) -> impl Iterator<Item = &RangeMarker> {
        self.ranges.iter().filter(move |r| r.file == file)
    }

    pub fn symlinks(&self) -> &FxHashMap<String, String> {
        &self.symlinks
    }

    pub fn global_options(&self) -> &BTreeMap<String, String> {
        &self.global_options
    }

    pub fn global_option(&self, key: &str) -> Option<&str> {
        self.global_options
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn current_directory(&self) -> &str {
        &self.current_directory
    }

    pub fn encoding(&self) -> PositionEncoding {
        self.encoding
    }
}
