//! Issues queries at markers and ranges and checks the answers.
//!
//! The driver keeps a caret (active file + position + the marker it came
//! from, if any). Every query runs at the caret, so `completions("1")` is
//! `go_to_marker("1")` followed by a completion request.

mod capabilities;

pub use capabilities::initialize_params;

use compact_str::CompactString;
use rustc_hash::FxHashSet;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_lsp::lsp_types::{CompletionItem, Position};

use crate::config::HarnessConfig;
use crate::error::{ErrorSite, HarnessError};
use crate::expect::{
    verify_completions, verify_quick_info, CompletionsExpectedList, ExpectedItem, MatchOptions,
    QueryLocation, Verdict,
};
use crate::fixture::FixtureParser;
use crate::response::{decode_completions, decode_hover, CompletionListResponse, HoverResponse};
use crate::service::{LanguageService, ServiceError};
use crate::types::{FileId, MarkerOrRange, VirtualFile};
use crate::workspace::Workspace;

/// Where a query should run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    /// Wherever the caret already is.
    Caret,
    Marker(&'a str),
    /// The start of a named range.
    Range(&'a str),
    /// A position in the active file.
    Position(Position),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(marker: &'a str) -> Self {
        Target::Marker(marker)
    }
}

impl From<Position> for Target<'_> {
    fn from(position: Position) -> Self {
        Target::Position(position)
    }
}

pub struct QueryDriver {
    workspace: Workspace,
    service: Arc<dyn LanguageService>,
    config: HarnessConfig,
    match_options: MatchOptions,
    active_file: FileId,
    caret: Position,
    last_marker: Option<CompactString>,
    opened: FxHashSet<FileId>,
}

impl QueryDriver {
    pub fn new(
        workspace: Workspace,
        service: Arc<dyn LanguageService>,
        config: HarnessConfig,
    ) -> Self {
        let match_options = config.match_options();
        Self {
            workspace,
            service,
            config,
            match_options,
            active_file: FileId(0),
            caret: Position::new(0, 0),
            last_marker: None,
            opened: FxHashSet::default(),
        }
    }

    /// Parse `text` with the configured fixture options and build a driver for it.
    pub fn from_fixture(
        text: &str,
        service: Arc<dyn LanguageService>,
        config: HarnessConfig,
    ) -> Result<Self, HarnessError> {
        let fixture = FixtureParser::new(config.parse_options()).parse(text)?;
        let workspace = Workspace::new(fixture)?;
        Ok(Self::new(workspace, service, config))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn service(&self) -> &Arc<dyn LanguageService> {
        &self.service
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn caret(&self) -> Position {
        self.caret
    }

    pub fn active_file(&self) -> Result<&VirtualFile, HarnessError> {
        self.workspace
            .fixture()
            .file(self.active_file)
            .ok_or_else(|| HarnessError::malformed(ErrorSite::Fixture, "Fixture has no files"))
    }

    /// Where the caret is, for failure messages.
    pub fn location(&self) -> QueryLocation {
        let path = self
            .active_file()
            .map(|file| file.path.clone())
            .unwrap_or_default();
        match &self.last_marker {
            Some(name) => QueryLocation::Marker {
                name: name.to_string(),
                path,
            },
            None => QueryLocation::Position {
                path,
                position: self.caret,
            },
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, HarnessError> {
        let timeout = self.config.timeout();
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.service.request(method, params)).await;

        let elapsed = start.elapsed();
        if elapsed > self.config.slow_query_threshold() {
            tracing::warn!("Slow query: {} took {:?}", method, elapsed);
        }

        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = HarnessError::service_fault(method, e);
                err.log_debug();
                Err(err)
            }
            Err(_) => {
                let err = HarnessError::service_fault(method, ServiceError::Timeout(timeout));
                err.log_warn();
                Err(err)
            }
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), HarnessError> {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, self.service.notify(method, params)).await {
            Ok(result) => result.map_err(|e| HarnessError::service_fault(method, e)),
            Err(_) => Err(HarnessError::service_fault(method, ServiceError::Timeout(timeout))),
        }
    }

    /// Initialize the service and open every fixture file. The first file
    /// becomes active. Returns the raw `InitializeResult`.
    pub async fn start(&mut self) -> Result<Value, HarnessError> {
        let root_uri = format!("file://{}", self.workspace.fixture().current_directory());
        tracing::debug!("[DRIVER_START_ENTER] root={}", root_uri);

        let params = initialize_params(&root_uri, self.workspace.encoding());
        let result = self.send_request("initialize", params).await?;
        self.send_notification("initialized", json!({})).await?;

        for idx in 0..self.workspace.files().len() {
            self.ensure_open(FileId(idx as u32)).await?;
        }

        self.activate(FileId(0));

        tracing::debug!("[DRIVER_START_EXIT] opened={}", self.opened.len());
        Ok(result)
    }

    async fn ensure_open(&mut self, file: FileId) -> Result<(), HarnessError> {
        if self.opened.contains(&file) {
            return Ok(());
        }
        let item = self.workspace.text_document_item(file)?;
        let params = json!({ "textDocument": item });
        self.send_notification("textDocument/didOpen", params).await?;
        self.opened.insert(file);
        Ok(())
    }

    fn place_caret(&mut self, file: FileId, position: Position, marker: Option<CompactString>) {
        self.active_file = file;
        self.caret = position;
        self.last_marker = marker;
    }

    fn caret_for(
        &self,
        target: MarkerOrRange<'_>,
    ) -> Result<(FileId, Position, Option<CompactString>), HarnessError> {
        let document = self.workspace.position_of(target)?;
        Ok((document.file, document.position, target.name().map(CompactString::from)))
    }

    /// Move to a marker, switching files if it lives in another one.
    pub fn go_to_marker(&mut self, name: &str) -> Result<(), HarnessError> {
        let marker = self.workspace.fixture().marker(name)?;
        let (file, position, marker) = self.caret_for(MarkerOrRange::Marker(marker))?;
        self.place_caret(file, position, marker);
        Ok(())
    }

    pub fn go_to_range_start(&mut self, name: &str) -> Result<(), HarnessError> {
        let range = self.workspace.fixture().range(name)?;
        let (file, position, marker) = self.caret_for(MarkerOrRange::Range(range))?;
        self.place_caret(file, position, marker);
        Ok(())
    }

    /// Move to a position in the active file. The caret no longer refers to a marker.
    pub fn go_to_position(&mut self, position: Position) -> Result<(), HarnessError> {
        let in_bounds = self
            .workspace
            .line_map(self.active_file)
            .and_then(|map| map.offset(position))
            .is_some();
        if !in_bounds {
            return Err(HarnessError::malformed(
                ErrorSite::Fixture,
                format!(
                    "Position (Ln {}, Col {}) is outside {}",
                    position.line + 1,
                    position.character + 1,
                    self.active_file()?.path
                ),
            ));
        }
        self.caret = position;
        self.last_marker = None;
        Ok(())
    }

    pub fn go_to_bof(&mut self) {
        self.caret = Position::new(0, 0);
        self.last_marker = None;
    }

    pub fn go_to_eof(&mut self) {
        self.caret = self
            .workspace
            .end_of_file(self.active_file)
            .unwrap_or_default();
        self.last_marker = None;
    }

    /// Make `path` the active file with the caret at its start.
    pub fn go_to_file(&mut self, path: &str) -> Result<(), HarnessError> {
        let id = self
            .workspace
            .file(path)
            .map(|file| file.id)
            .ok_or_else(|| {
                HarnessError::malformed(ErrorSite::Fixture, format!("File '{}' not found", path))
            })?;
        self.activate(id);
        Ok(())
    }

    /// Make the `index`-th declared file active.
    pub fn go_to_file_number(&mut self, index: usize) -> Result<(), HarnessError> {
        if index >= self.workspace.files().len() {
            return Err(HarnessError::malformed(
                ErrorSite::Fixture,
                format!(
                    "File number {} out of range; fixture has {} files",
                    index,
                    self.workspace.files().len()
                ),
            ));
        }
        self.activate(FileId(index as u32));
        Ok(())
    }

    fn activate(&mut self, id: FileId) {
        self.place_caret(id, Position::new(0, 0), None);
    }

    fn go_to(&mut self, target: Target<'_>) -> Result<(), HarnessError> {
        match target {
            Target::Caret => Ok(()),
            Target::Marker(name) => self.go_to_marker(name),
            Target::Range(name) => self.go_to_range_start(name),
            Target::Position(position) => self.go_to_position(position),
        }
    }

    fn text_document_position(&self) -> Result<Value, HarnessError> {
        let uri = self.workspace.uri(self.active_file).ok_or_else(|| {
            HarnessError::malformed(ErrorSite::Fixture, "Active file has no URI")
        })?;
        Ok(json!({
            "textDocument": { "uri": uri },
            "position": self.caret,
        }))
    }

    /// Request completions at `target`. `Ok(None)` when the service has none.
    pub async fn completions<'a>(
        &mut self,
        target: impl Into<Target<'a>>,
    ) -> Result<Option<CompletionListResponse>, HarnessError> {
        self.go_to(target.into())?;
        self.ensure_open(self.active_file).await?;

        let mut params = self.text_document_position()?;
        params["context"] = capabilities::invoked_context();

        let result = self.send_request("textDocument/completion", params).await?;
        decode_completions(result)
            .map_err(|e| HarnessError::service_fault("textDocument/completion", e))
    }

    /// Request quick info at `target`. `Ok(None)` when the service has none.
    pub async fn hover<'a>(
        &mut self,
        target: impl Into<Target<'a>>,
    ) -> Result<Option<HoverResponse>, HarnessError> {
        self.go_to(target.into())?;
        self.ensure_open(self.active_file).await?;

        let params = self.text_document_position()?;
        let result = self.send_request("textDocument/hover", params).await?;
        decode_hover(result).map_err(|e| HarnessError::service_fault("textDocument/hover", e))
    }

    pub async fn resolve_completion_item(
        &self,
        item: &CompletionItem,
    ) -> Result<CompletionItem, HarnessError> {
        const METHOD: &str = "completionItem/resolve";
        let params = serde_json::to_value(item)
            .map_err(|e| HarnessError::service_fault(METHOD, ServiceError::from(e)))?;
        let result = self.send_request(METHOD, params).await?;
        serde_json::from_value(result)
            .map_err(|e| HarnessError::service_fault(METHOD, ServiceError::from(e)))
    }

    /// Resolve the actual items that expectations check `detail` or
    /// `documentation` on. Items that are missing or ambiguous are left for
    /// the matcher to report.
    async fn resolve_expected_details(
        &self,
        list: &mut CompletionListResponse,
        expected: &CompletionsExpectedList,
    ) -> Result<(), HarnessError> {
        for item in expected.items.expected_items().iter().filter_map(ExpectedItem::as_item) {
            if !item.needs_resolve() {
                continue;
            }
            let mut matches = list.items.iter().enumerate().filter(|(_, actual)| {
                actual.label == item.label
                    && item.kind.map_or(true, |kind| actual.kind == Some(kind))
            });
            let (Some((idx, _)), None) = (matches.next(), matches.next()) else {
                continue;
            };
            list.items[idx] = self.resolve_completion_item(&list.items[idx]).await?;
        }
        Ok(())
    }

    /// Request completions at `target` and match them against `expected`.
    /// `expected: None` asserts there are no completions.
    pub async fn verify_completions<'a>(
        &mut self,
        target: impl Into<Target<'a>>,
        expected: Option<&CompletionsExpectedList>,
    ) -> Result<Verdict, HarnessError> {
        let start = Instant::now();
        let target = target.into();
        tracing::debug!("[VERIFY_COMPLETIONS_ENTER] target={:?}", target);

        let mut actual = self.completions(target).await?;
        if let (Some(list), Some(expected)) = (actual.as_mut(), expected) {
            if self.config.completion.resolve_details {
                self.resolve_expected_details(list, expected).await?;
            }
        }

        let verdict = verify_completions(actual.as_ref(), expected, &self.match_options)
            .at(self.location());

        tracing::debug!(
            "[VERIFY_COMPLETIONS_EXIT] pass={} elapsed_ms={}",
            verdict.is_pass(),
            start.elapsed().as_millis()
        );
        Ok(verdict)
    }

    /// Run [`verify_completions`](Self::verify_completions) at each marker,
    /// stopping at the first failure.
    pub async fn verify_completions_each(
        &mut self,
        markers: &[&str],
        expected: Option<&CompletionsExpectedList>,
    ) -> Result<Verdict, HarnessError> {
        for marker in markers {
            let verdict = self.verify_completions(Target::Marker(marker), expected).await?;
            if !verdict.is_pass() {
                return Ok(verdict);
            }
        }
        Ok(Verdict::Pass)
    }

    /// Hover at `marker` and compare the display and documentation strings.
    pub async fn verify_quick_info_at(
        &mut self,
        marker: &str,
        display: &str,
        documentation: Option<&str>,
    ) -> Result<Verdict, HarnessError> {
        tracing::debug!("[VERIFY_QUICK_INFO_ENTER] marker={}", marker);

        let actual = self.hover(Target::Marker(marker)).await?;
        let verdict =
            verify_quick_info(actual.as_ref(), display, documentation).at(self.location());

        tracing::debug!("[VERIFY_QUICK_INFO_EXIT] pass={}", verdict.is_pass());
        Ok(verdict)
    }

    /// Send `shutdown` followed by `exit`.
    pub async fn shutdown(&self) -> Result<(), HarnessError> {
        self.send_request("shutdown", Value::Null).await?;
        self.send_notification("exit", Value::Null).await
    }
}
