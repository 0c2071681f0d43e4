//! The addressable, read-only view of a parsed fixture.

mod line_map;
pub mod paths;

pub use line_map::LineMap;

use tower_lsp::lsp_types::{Location, Position, Range, TextDocumentItem, Url};

use crate::error::{ErrorSite, HarnessError};
use crate::fixture::Fixture;
use crate::types::{FileId, MarkerOrRange, PositionEncoding, RangeMarker, VirtualFile};
use paths::{directory_of, extension_of, is_relative_specifier, normalize_path};

/// Extensions tried, in order, when a module specifier has none.
const MODULE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts", ".js", ".jsx", ".json"];

/// Maximum symlink hops followed before giving up on a cycle.
const MAX_LINK_DEPTH: usize = 16;

/// A concrete document coordinate for a marker or range start.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPosition {
    pub file: FileId,
    pub path: String,
    pub uri: Url,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    fixture: Fixture,
    line_maps: Vec<LineMap>,
    uris: Vec<Url>,
}

impl Workspace {
    pub fn new(fixture: Fixture) -> Result<Self, HarnessError> {
        let encoding = fixture.encoding();
        let line_maps = fixture
            .files()
            .iter()
            .map(|file| LineMap::new(&file.content, encoding))
            .collect();
        let uris = fixture
            .files()
            .iter()
            .map(|file| file_uri(&file.path))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            "[WORKSPACE_BUILD] files={} symlinks={}",
            fixture.files().len(),
            fixture.symlinks().len()
        );

        Ok(Self {
            fixture,
            line_maps,
            uris,
        })
    }

    /// Parse `text` with default options and build its workspace.
    pub fn from_fixture_text(text: &str) -> Result<Self, HarnessError> {
        Self::new(Fixture::parse(text)?)
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub fn files(&self) -> &[VirtualFile] {
        self.fixture.files()
    }

    pub fn encoding(&self) -> PositionEncoding {
        self.fixture.encoding()
    }

    /// Find the file at `path`, normalizing it and following symlinks.
    pub fn file(&self, path: &str) -> Option<&VirtualFile> {
        let mut current = normalize_path(path, self.fixture.current_directory());
        for _ in 0..MAX_LINK_DEPTH {
            if let Some(file) = self.fixture.file_by_path(&current) {
                return Some(file);
            }
            current = self.link_target(&current)?;
        }
        None
    }

    /// Content of the file at `path`.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.file(path).map(|file| file.content.as_str())
    }

    /// Map a path through the fixture's symlinks. A link may name a file or
    /// a directory prefix.
    fn link_target(&self, path: &str) -> Option<String> {
        self.fixture.symlinks().iter().find_map(|(link, target)| {
            if path == link {
                Some(target.clone())
            } else {
                path.strip_prefix(link.as_str())
                    .filter(|rest| rest.starts_with('/'))
                    .map(|rest| format!("{}{}", target, rest))
            }
        })
    }

    /// Resolve an import specifier relative to the importing file.
    ///
    /// Only relative specifiers resolve; bare package names return `None`.
    pub fn resolve_module(&self, from: &str, specifier: &str) -> Option<&VirtualFile> {
        if !is_relative_specifier(specifier) {
            return None;
        }

        let from_dir = match self.file(from) {
            Some(file) => directory_of(&file.path).to_string(),
            None => {
                directory_of(&normalize_path(from, self.fixture.current_directory())).to_string()
            }
        };
        let base = normalize_path(specifier, &from_dir);

        if let Some(file) = self.file(&base) {
            return Some(file);
        }

        // `./a.js` names the `./a.ts` source.
        if let Some(ext @ (".js" | ".jsx" | ".mjs" | ".cjs")) = extension_of(&base) {
            let stem = &base[..base.len() - ext.len()];
            let candidates: &[&str] = match ext {
                ".js" => &[".ts", ".tsx", ".d.ts"],
                ".jsx" => &[".tsx"],
                ".mjs" => &[".mts"],
                _ => &[".cts"],
            };
            if let Some(file) = candidates
                .iter()
                .find_map(|candidate| self.file(&format!("{}{}", stem, candidate)))
            {
                return Some(file);
            }
        }

        MODULE_EXTENSIONS
            .iter()
            .find_map(|ext| self.file(&format!("{}{}", base, ext)))
            .or_else(|| {
                let dir = base.trim_end_matches('/');
                MODULE_EXTENSIONS
                    .iter()
                    .find_map(|ext| self.file(&format!("{}/index{}", dir, ext)))
            })
    }

    fn file_by_id(&self, id: FileId) -> Result<&VirtualFile, HarnessError> {
        self.fixture.file(id).ok_or_else(|| {
            HarnessError::malformed(
                ErrorSite::Fixture,
                format!("No file with index {}", id.index()),
            )
        })
    }

    pub fn line_map(&self, id: FileId) -> Option<&LineMap> {
        self.line_maps.get(id.index())
    }

    pub fn uri(&self, id: FileId) -> Option<&Url> {
        self.uris.get(id.index())
    }

    /// The file a `file://` URI refers to.
    pub fn file_for_uri(&self, uri: &Url) -> Option<&VirtualFile> {
        self.uris
            .iter()
            .position(|candidate| candidate == uri)
            .and_then(|idx| self.fixture.file(FileId(idx as u32)))
    }

    pub fn language_id(&self, id: FileId) -> Option<&'static str> {
        self.fixture.file(id).map(|file| paths::language_id(&file.path))
    }

    /// The `didOpen` payload for a file.
    pub fn text_document_item(&self, id: FileId) -> Result<TextDocumentItem, HarnessError> {
        let file = self.file_by_id(id)?;
        let uri = self.uri(id).cloned().ok_or_else(|| {
            HarnessError::malformed(ErrorSite::Fixture, format!("No URI for '{}'", file.path))
        })?;
        Ok(TextDocumentItem::new(
            uri,
            paths::language_id(&file.path).to_string(),
            0,
            file.content.clone(),
        ))
    }

    /// The document coordinate a marker or range start refers to.
    pub fn position_of<'a>(
        &self,
        target: impl Into<MarkerOrRange<'a>>,
    ) -> Result<DocumentPosition, HarnessError> {
        let target = target.into();
        let file = self.file_by_id(target.file())?;
        let uri = self.uri(file.id).cloned().ok_or_else(|| {
            HarnessError::malformed(ErrorSite::Fixture, format!("No URI for '{}'", file.path))
        })?;
        Ok(DocumentPosition {
            file: file.id,
            path: file.path.clone(),
            uri,
            position: target.position(),
        })
    }

    /// Both endpoints of a range as an LSP location.
    pub fn location_of(&self, range: &RangeMarker) -> Result<Location, HarnessError> {
        let start = self.position_of(range)?;
        Ok(Location::new(start.uri, range.range))
    }

    /// Position of the end of a file's content.
    pub fn end_of_file(&self, id: FileId) -> Option<Position> {
        self.line_map(id).map(LineMap::end_position)
    }

    /// The stripped text covered by `range`.
    pub fn text_of(&self, id: FileId, range: Range) -> Option<&str> {
        let file = self.fixture.file(id)?;
        let map = self.line_map(id)?;
        let start = usize::from(map.offset(range.start)?);
        let end = usize::from(map.offset(range.end)?);
        file.content.get(start..end)
    }
}

fn file_uri(path: &str) -> Result<Url, HarnessError> {
    Url::parse(&format!("file://{}", path)).map_err(|e| {
        HarnessError::malformed(ErrorSite::Fixture, format!("Invalid file path '{}': {}", path, e))
    })
}
