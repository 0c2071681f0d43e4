//! Decoded language-service responses.
//!
//! `lsp_types` 0.94 has no `CompletionList::item_defaults`, so the list shape
//! is modelled here with the item type borrowed from `lsp_types`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionTextEdit, Documentation, Hover, HoverContents, InsertTextFormat,
    InsertTextMode, MarkedString, Range,
};

use crate::service::ServiceError;

/// Edit range shared by every item of a completion list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultEditRange {
    InsertReplace { insert: Range, replace: Range },
    Range(Range),
}

impl DefaultEditRange {
    /// `(insert, replace)`; a plain range is both.
    pub fn as_insert_replace(&self) -> (Range, Range) {
        match self {
            DefaultEditRange::InsertReplace { insert, replace } => (*insert, *replace),
            DefaultEditRange::Range(range) => (*range, *range),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItemDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_characters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_range: Option<DefaultEditRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_text_format: Option<InsertTextFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_text_mode: Option<InsertTextMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CompletionItemDefaults {
    pub fn is_empty(&self) -> bool {
        self.commit_characters.is_none()
            && self.edit_range.is_none()
            && self.insert_text_format.is_none()
            && self.insert_text_mode.is_none()
            && self.data.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionListResponse {
    #[serde(default)]
    pub is_incomplete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_defaults: Option<CompletionItemDefaults>,
    #[serde(default)]
    pub items: Vec<CompletionItem>,
}

impl CompletionListResponse {
    pub fn from_items(items: Vec<CompletionItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.label.as_str()).collect()
    }

    /// Commit characters of `item` after applying the list defaults.
    pub fn effective_commit_characters<'a>(
        &'a self,
        item: &'a CompletionItem,
    ) -> Option<&'a [String]> {
        item.commit_characters.as_deref().or_else(|| {
            self.item_defaults
                .as_ref()
                .and_then(|d| d.commit_characters.as_deref())
        })
    }

    /// Text edit of `item` after applying the list defaults.
    pub fn effective_edit(&self, item: &CompletionItem) -> Option<EffectiveEdit> {
        if let Some(edit) = &item.text_edit {
            return Some(EffectiveEdit::from(edit));
        }
        let default = self.item_defaults.as_ref()?.edit_range.as_ref()?;
        let (insert, replace) = default.as_insert_replace();
        Some(EffectiveEdit {
            insert,
            replace,
            new_text: item.insert_text.clone().unwrap_or_else(|| item.label.clone()),
        })
    }
}

/// A completion edit with plain ranges normalized to insert/replace pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveEdit {
    pub insert: Range,
    pub replace: Range,
    pub new_text: String,
}

impl From<&CompletionTextEdit> for EffectiveEdit {
    fn from(edit: &CompletionTextEdit) -> Self {
        match edit {
            CompletionTextEdit::Edit(edit) => Self {
                insert: edit.range,
                replace: edit.range,
                new_text: edit.new_text.clone(),
            },
            CompletionTextEdit::InsertAndReplace(edit) => Self {
                insert: edit.insert,
                replace: edit.replace,
                new_text: edit.new_text.clone(),
            },
        }
    }
}

/// Text of a documentation value, markup or plain.
pub fn documentation_text(documentation: &Documentation) -> &str {
    match documentation {
        Documentation::String(text) => text,
        Documentation::MarkupContent(markup) => &markup.value,
    }
}

/// Decode a `textDocument/completion` result. `null` means no completions.
pub fn decode_completions(result: Value) -> Result<Option<CompletionListResponse>, ServiceError> {
    match result {
        Value::Null => Ok(None),
        Value::Array(_) => {
            let items: Vec<CompletionItem> = serde_json::from_value(result)?;
            Ok(Some(CompletionListResponse::from_items(items)))
        }
        Value::Object(_) => Ok(Some(serde_json::from_value(result)?)),
        other => Err(ServiceError::Decode(format!(
            "Unexpected completion result: {}",
            other
        ))),
    }
}

/// Quick info split into the code signature and the prose around it.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverResponse {
    pub display: String,
    pub documentation: String,
    pub range: Option<Range>,
}

impl HoverResponse {
    pub fn from_hover(hover: &Hover) -> Self {
        let (display, documentation) = match &hover.contents {
            HoverContents::Markup(markup) => split_markdown(&markup.value),
            HoverContents::Scalar(MarkedString::String(text)) => split_markdown(text),
            HoverContents::Scalar(MarkedString::LanguageString(code)) => {
                (code.value.trim().to_string(), String::new())
            }
            HoverContents::Array(parts) => {
                let mut display = Vec::new();
                let mut documentation = Vec::new();
                for part in parts {
                    match part {
                        MarkedString::LanguageString(code) => display.push(code.value.trim()),
                        MarkedString::String(text) => documentation.push(text.trim()),
                    }
                }
                (display.join("\n"), documentation.join("\n\n"))
            }
        };

        Self {
            display,
            documentation,
            range: hover.range,
        }
    }
}

/// Decode a `textDocument/hover` result. `null` means no quick info.
pub fn decode_hover(result: Value) -> Result<Option<HoverResponse>, ServiceError> {
    if result.is_null() {
        return Ok(None);
    }
    let hover: Hover = serde_json::from_value(result)?;
    Ok(Some(HoverResponse::from_hover(&hover)))
}

/// Take the first fenced code block as the display text and everything else
/// as documentation. Text without a fence is all display.
fn split_markdown(text: &str) -> (String, String) {
    let Some(fence_start) = text.find("```") else {
        return (text.trim().to_string(), String::new());
    };
    let after_fence = &text[fence_start + 3..];
    let Some(body_start) = after_fence.find('\n') else {
        return (text.trim().to_string(), String::new());
    };
    let body = &after_fence[body_start + 1..];
    let Some(body_end) = body.find("```") else {
        return (text.trim().to_string(), String::new());
    };

    let display = body[..body_end].trim().to_string();
    let before = text[..fence_start].trim();
    let after = body[body_end + 3..].trim();
    let documentation = match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (false, true) => before.to_string(),
        (false, false) => format!("{}\n\n{}", before, after),
    };

    (display, documentation)
}
