//! A tiny TypeScript-flavoured language server used to drive the harness.
//!
//! It reads `const`, `declare const`, `export const` and `import { .. }`
//! lines, which is enough for member completions, identifier completions,
//! resolve and hover. Everything else in a document is ignored.

use dashmap::DashMap;
use fourslash_lsp::constants::{
    DEFAULT_COMMIT_CHARACTERS, SORT_TEXT_AUTO_IMPORT_SUGGESTIONS, SORT_TEXT_GLOBALS_OR_KEYWORDS,
    SORT_TEXT_LOCATION_PRIORITY, SORT_TEXT_OPTIONAL_MEMBER,
};
use serde_json::json;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

pub const KEYWORDS: [&str; 4] = ["const", "declare", "export", "import"];

#[derive(Debug, Clone)]
struct Declaration {
    name: String,
    ty: String,
    doc: Option<String>,
    exported: bool,
}

#[derive(Debug, Clone)]
struct Member {
    name: String,
    ty: String,
    optional: bool,
}

pub struct ToyServer {
    client: Client,
    documents: DashMap<Url, String>,
}

impl ToyServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: DashMap::new(),
        }
    }

    fn text(&self, uri: &Url) -> Option<String> {
        self.documents.get(uri).map(|doc| doc.value().clone())
    }

    /// Declaration of `name` visible from `uri`: local first, then imports.
    fn lookup(&self, uri: &Url, name: &str) -> Option<(Declaration, bool)> {
        let text = self.text(uri)?;
        if let Some(decl) = declarations(&text).into_iter().find(|d| d.name == name) {
            return Some((decl, false));
        }
        let (_, specifier) = imports(&text).into_iter().find(|(n, _)| n == name)?;
        let target = self.resolve_import(uri, &specifier)?;
        let target_text = self.text(&target)?;
        declarations(&target_text)
            .into_iter()
            .find(|d| d.exported && d.name == name)
            .map(|decl| (decl, true))
    }

    fn resolve_import(&self, from: &Url, specifier: &str) -> Option<Url> {
        let dir = from.path().rsplit_once('/').map_or("", |(dir, _)| dir);
        let joined = normalize(&format!("{}/{}", dir, specifier));
        ["", ".ts", ".tsx", "/index.ts"]
            .iter()
            .filter_map(|ext| Url::parse(&format!("file://{}{}", joined, ext)).ok())
            .find(|candidate| self.documents.contains_key(candidate))
    }

    fn member_items(
        &self,
        uri: &Url,
        receiver: &str,
        line: u32,
        dot: u32,
        cursor: u32,
        word_end: u32,
    ) -> Option<Vec<CompletionItem>> {
        let (decl, imported) = self.lookup(uri, receiver)?;
        let members = members(&decl.ty)?;
        let typed_start = dot + 1;

        let items = members
            .into_iter()
            .map(|member| {
                let sort_text = if member.optional {
                    SORT_TEXT_OPTIONAL_MEMBER
                } else {
                    SORT_TEXT_LOCATION_PRIORITY
                };
                let mut item = CompletionItem {
                    label: member.name.clone(),
                    kind: Some(CompletionItemKind::FIELD),
                    sort_text: Some(sort_text.to_string()),
                    commit_characters: Some(
                        DEFAULT_COMMIT_CHARACTERS
                            .iter()
                            .map(|c| c.to_string())
                            .collect(),
                    ),
                    data: Some(json!({
                        "detail": format!("(property) {}.{}: {}", receiver, member.name, member.ty),
                    })),
                    ..CompletionItem::default()
                };
                if imported {
                    // Replaces the dot so the client filters on `.name`.
                    let new_text = format!(".{}", member.name);
                    item.filter_text = Some(new_text.clone());
                    item.text_edit = Some(CompletionTextEdit::Edit(TextEdit {
                        range: Range::new(Position::new(line, dot), Position::new(line, word_end)),
                        new_text,
                    }));
                } else {
                    item.text_edit = Some(CompletionTextEdit::InsertAndReplace(InsertReplaceEdit {
                        new_text: member.name.clone(),
                        insert: Range::new(
                            Position::new(line, typed_start),
                            Position::new(line, cursor),
                        ),
                        replace: Range::new(
                            Position::new(line, typed_start),
                            Position::new(line, word_end),
                        ),
                    }));
                }
                item
            })
            .collect();
        Some(items)
    }

    fn identifier_items(&self, uri: &Url, text: &str) -> Vec<CompletionItem> {
        let mut items: Vec<CompletionItem> = declarations(text)
            .into_iter()
            .map(|decl| CompletionItem {
                label: decl.name.clone(),
                kind: Some(CompletionItemKind::VARIABLE),
                sort_text: Some(SORT_TEXT_LOCATION_PRIORITY.to_string()),
                data: Some(json!({
                    "detail": format!("const {}: {}", decl.name, decl.ty),
                    "documentation": decl.doc,
                })),
                ..CompletionItem::default()
            })
            .collect();

        let imported: Vec<String> = imports(text).into_iter().map(|(name, _)| name).collect();
        for name in &imported {
            items.push(CompletionItem {
                label: name.clone(),
                kind: Some(CompletionItemKind::VARIABLE),
                sort_text: Some(SORT_TEXT_LOCATION_PRIORITY.to_string()),
                ..CompletionItem::default()
            });
        }

        // Exports of other open documents that are not imported yet.
        for entry in self.documents.iter() {
            if entry.key() == uri {
                continue;
            }
            for decl in declarations(entry.value()) {
                if !decl.exported || imported.contains(&decl.name) {
                    continue;
                }
                items.push(CompletionItem {
                    label: decl.name.clone(),
                    kind: Some(CompletionItemKind::VARIABLE),
                    sort_text: Some(SORT_TEXT_AUTO_IMPORT_SUGGESTIONS.to_string()),
                    label_details: Some(CompletionItemLabelDetails {
                        detail: None,
                        description: Some(entry.key().path().to_string()),
                    }),
                    ..CompletionItem::default()
                });
            }
        }

        for keyword in KEYWORDS {
            items.push(CompletionItem {
                label: keyword.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                sort_text: Some(SORT_TEXT_GLOBALS_OR_KEYWORDS.to_string()),
                ..CompletionItem::default()
            });
        }
        items
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for ToyServer {
    async fn initialize(&self, _: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "toy-server".to_string(),
                version: None,
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![".".to_string()]),
                    resolve_provider: Some(true),
                    ..CompletionOptions::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..ServerCapabilities::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "toy server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.documents
            .insert(params.text_document.uri, params.text_document.text);
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let Some(text) = self.text(&uri) else {
            return Ok(None);
        };
        let line: Vec<char> = text
            .lines()
            .nth(position.line as usize)
            .unwrap_or("")
            .chars()
            .collect();
        let cursor = (position.character as usize).min(line.len());
        let before: String = line[..cursor].iter().collect();
        if before.contains("//") {
            return Ok(None);
        }

        let typed_start = word_start(&line, cursor);
        let word_end = word_end(&line, cursor);

        if typed_start > 0 && line[typed_start - 1] == '.' {
            let dot = typed_start - 1;
            let receiver_start = word_start(&line, dot);
            let receiver: String = line[receiver_start..dot].iter().collect();
            let items = self.member_items(
                &uri,
                &receiver,
                position.line,
                dot as u32,
                cursor as u32,
                word_end as u32,
            );
            return Ok(items.map(|items| {
                CompletionResponse::List(CompletionList {
                    is_incomplete: false,
                    items,
                })
            }));
        }

        Ok(Some(CompletionResponse::List(CompletionList {
            is_incomplete: false,
            items: self.identifier_items(&uri, &text),
        })))
    }

    async fn completion_resolve(&self, mut item: CompletionItem) -> Result<CompletionItem> {
        if let Some(data) = item.data.take() {
            item.detail = data["detail"].as_str().map(str::to_string);
            item.documentation = data["documentation"]
                .as_str()
                .map(|doc| Documentation::String(doc.to_string()));
        }
        Ok(item)
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some(text) = self.text(&uri) else {
            return Ok(None);
        };
        let line: Vec<char> = text
            .lines()
            .nth(position.line as usize)
            .unwrap_or("")
            .chars()
            .collect();
        let cursor = (position.character as usize).min(line.len());
        let start = word_start(&line, cursor);
        let end = word_end(&line, cursor);
        if start == end {
            return Ok(None);
        }
        let word: String = line[start..end].iter().collect();
        let Some((decl, _)) = self.lookup(&uri, &word) else {
            return Ok(None);
        };

        let mut value = format!("```typescript\nconst {}: {}\n```", decl.name, decl.ty);
        if let Some(doc) = &decl.doc {
            value.push_str("\n\n");
            value.push_str(doc);
        }
        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: Some(Range::new(
                Position::new(position.line, start as u32),
                Position::new(position.line, end as u32),
            )),
        }))
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn word_start(line: &[char], cursor: usize) -> usize {
    let mut start = cursor;
    while start > 0 && is_ident(line[start - 1]) {
        start -= 1;
    }
    start
}

fn word_end(line: &[char], cursor: usize) -> usize {
    let mut end = cursor;
    while end < line.len() && is_ident(line[end]) {
        end += 1;
    }
    end
}

fn declarations(text: &str) -> Vec<Declaration> {
    let mut result = Vec::new();
    let mut doc: Option<String> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(body) = trimmed.strip_prefix("/**").and_then(|s| s.strip_suffix("*/")) {
            doc = Some(body.trim().to_string());
            continue;
        }
        let (exported, rest) = match trimmed.strip_prefix("export ") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let rest = rest.strip_prefix("declare ").unwrap_or(rest);
        let Some(rest) = rest.strip_prefix("const ") else {
            doc = None;
            continue;
        };

        let name_end = rest.find(|c: char| !is_ident(c)).unwrap_or(rest.len());
        let name = &rest[..name_end];
        let after = rest[name_end..].trim_start();
        let ty = if let Some(annotation) = after.strip_prefix(':') {
            annotation
                .split(" = ")
                .next()
                .unwrap_or("")
                .trim()
                .trim_end_matches(';')
                .trim()
                .to_string()
        } else if let Some(init) = after.strip_prefix('=') {
            literal_type(init.trim().trim_end_matches(';')).to_string()
        } else {
            "any".to_string()
        };

        result.push(Declaration {
            name: name.to_string(),
            ty,
            doc: doc.take(),
            exported,
        });
    }
    result
}

fn literal_type(init: &str) -> &'static str {
    if init.starts_with('"') || init.starts_with('\'') {
        "string"
    } else if init == "true" || init == "false" {
        "boolean"
    } else if init.parse::<f64>().is_ok() {
        "number"
    } else {
        "any"
    }
}

fn members(ty: &str) -> Option<Vec<Member>> {
    let inner = ty.trim().strip_prefix('{')?.strip_suffix('}')?;
    let members = inner
        .split(|c: char| c == ';' || c == ',')
        .filter_map(|part| {
            let (name, ty) = part.split_once(':')?;
            let name = name.trim();
            let (name, optional) = match name.strip_suffix('?') {
                Some(name) => (name, true),
                None => (name, false),
            };
            Some(Member {
                name: name.to_string(),
                ty: ty.trim().to_string(),
                optional,
            })
        })
        .collect();
    Some(members)
}

/// `(name, specifier)` for every named import.
fn imports(text: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    for line in text.lines() {
        let Some(rest) = line.trim().strip_prefix("import {") else {
            continue;
        };
        let Some((names, source)) = rest.split_once("} from") else {
            continue;
        };
        let specifier = source
            .trim()
            .trim_end_matches(';')
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            result.push((name.to_string(), specifier.clone()));
        }
    }
    result
}

fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}
