//! Declarative expectations for completion and quick-info results.
//!
//! An expectation is plain data; [`verify_completions`] and
//! [`verify_quick_info`] compare it with a decoded response and return a
//! [`Verdict`].

mod hover;
mod matcher;
mod verdict;

pub use hover::verify_quick_info;
pub use matcher::verify_completions;
pub use verdict::{Failure, FailureKind, QueryLocation, Verdict};

use tower_lsp::lsp_types::{CompletionItemKind, CompletionItemLabelDetails, Range};

/// A field expectation that can be left out or explicitly skipped.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expect<T> {
    /// Not mentioned. Falls back to the list defaults where those apply.
    #[default]
    Unspecified,
    /// Never compared.
    Ignored,
    Value(T),
}

impl<T> Expect<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Expect::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, Expect::Unspecified)
    }
}

impl<T> From<T> for Expect<T> {
    fn from(value: T) -> Self {
        Expect::Value(value)
    }
}

/// Expected edit range. A plain range is the same as an insert/replace pair
/// whose two ranges are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRangeExpectation {
    Range(Range),
    InsertReplace { insert: Range, replace: Range },
}

impl EditRangeExpectation {
    pub fn as_insert_replace(&self) -> (Range, Range) {
        match *self {
            EditRangeExpectation::Range(range) => (range, range),
            EditRangeExpectation::InsertReplace { insert, replace } => (insert, replace),
        }
    }
}

impl From<Range> for EditRangeExpectation {
    fn from(range: Range) -> Self {
        EditRangeExpectation::Range(range)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedTextEdit {
    pub range: EditRangeExpectation,
    /// `None` compares the range only.
    pub new_text: Option<String>,
}

impl ExpectedTextEdit {
    pub fn new(range: impl Into<EditRangeExpectation>, new_text: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            new_text: Some(new_text.into()),
        }
    }
}

/// A completion item described by the fields worth checking. `None` and
/// `Expect::Unspecified` fields are not compared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpectedCompletionItem {
    pub label: String,
    pub label_details: Option<CompletionItemLabelDetails>,
    pub kind: Option<CompletionItemKind>,
    /// Left out, the configured default sort text is expected instead.
    pub sort_text: Option<String>,
    pub filter_text: Option<String>,
    pub insert_text: Option<String>,
    pub detail: Option<String>,
    pub documentation: Option<String>,
    pub commit_characters: Expect<Vec<String>>,
    pub edit: Expect<ExpectedTextEdit>,
}

impl ExpectedCompletionItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: CompletionItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn sort_text(mut self, sort_text: impl Into<String>) -> Self {
        self.sort_text = Some(sort_text.into());
        self
    }

    pub fn filter_text(mut self, filter_text: impl Into<String>) -> Self {
        self.filter_text = Some(filter_text.into());
        self
    }

    pub fn insert_text(mut self, insert_text: impl Into<String>) -> Self {
        self.insert_text = Some(insert_text.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn label_details(mut self, details: CompletionItemLabelDetails) -> Self {
        self.label_details = Some(details);
        self
    }

    pub fn commit_characters(mut self, chars: impl Into<Expect<Vec<String>>>) -> Self {
        self.commit_characters = chars.into();
        self
    }

    pub fn edit(mut self, edit: impl Into<Expect<ExpectedTextEdit>>) -> Self {
        self.edit = edit.into();
        self
    }

    /// Whether checking this item needs a `completionItem/resolve` round trip.
    pub fn needs_resolve(&self) -> bool {
        self.detail.is_some() || self.documentation.is_some()
    }
}

/// An expected completion: a bare label, or an item with fields to check.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedItem {
    Label(String),
    Item(Box<ExpectedCompletionItem>),
}

impl ExpectedItem {
    pub fn label(&self) -> &str {
        match self {
            ExpectedItem::Label(label) => label,
            ExpectedItem::Item(item) => &item.label,
        }
    }

    pub fn as_item(&self) -> Option<&ExpectedCompletionItem> {
        match self {
            ExpectedItem::Label(_) => None,
            ExpectedItem::Item(item) => Some(item),
        }
    }
}

impl From<&str> for ExpectedItem {
    fn from(label: &str) -> Self {
        ExpectedItem::Label(label.to_string())
    }
}

impl From<String> for ExpectedItem {
    fn from(label: String) -> Self {
        ExpectedItem::Label(label)
    }
}

impl From<ExpectedCompletionItem> for ExpectedItem {
    fn from(item: ExpectedCompletionItem) -> Self {
        ExpectedItem::Item(Box::new(item))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemsExpectation {
    /// Exactly these items, in any order.
    Exact(Vec<ExpectedItem>),
    /// Exactly these items, in this order.
    Ordered(Vec<ExpectedItem>),
    /// At least `includes`, and none labelled as in `excludes`.
    Partial {
        includes: Vec<ExpectedItem>,
        excludes: Vec<String>,
    },
}

impl ItemsExpectation {
    pub fn exact<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExpectedItem>,
    {
        ItemsExpectation::Exact(items.into_iter().map(Into::into).collect())
    }

    pub fn ordered<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExpectedItem>,
    {
        ItemsExpectation::Ordered(items.into_iter().map(Into::into).collect())
    }

    pub fn includes<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExpectedItem>,
    {
        ItemsExpectation::Partial {
            includes: items.into_iter().map(Into::into).collect(),
            excludes: Vec::new(),
        }
    }

    pub fn excludes<I, T>(labels: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        ItemsExpectation::Partial {
            includes: Vec::new(),
            excludes: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Add excluded labels to a partial expectation. Ignored for exact modes.
    pub fn and_excludes<I, T>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        match self {
            ItemsExpectation::Partial {
                includes,
                mut excludes,
            } => {
                excludes.extend(labels.into_iter().map(Into::into));
                ItemsExpectation::Partial { includes, excludes }
            }
            other => other,
        }
    }

    /// True when the expectation asks for nothing at all.
    pub fn is_empty(&self) -> bool {
        match self {
            ItemsExpectation::Exact(items) | ItemsExpectation::Ordered(items) => items.is_empty(),
            ItemsExpectation::Partial { includes, excludes } => {
                includes.is_empty() && excludes.is_empty()
            }
        }
    }

    pub(crate) fn expected_items(&self) -> &[ExpectedItem] {
        match self {
            ItemsExpectation::Exact(items) | ItemsExpectation::Ordered(items) => items,
            ItemsExpectation::Partial { includes, .. } => includes,
        }
    }
}

/// Expected list-level defaults. Also the fallback for items that leave
/// `commit_characters` or `edit` unspecified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemDefaultsExpectation {
    pub commit_characters: Expect<Vec<String>>,
    pub edit_range: Expect<EditRangeExpectation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionsExpectedList {
    pub is_incomplete: bool,
    /// `None` expects the actual list to carry no item defaults.
    pub item_defaults: Option<ItemDefaultsExpectation>,
    pub items: ItemsExpectation,
}

impl CompletionsExpectedList {
    pub fn new(items: ItemsExpectation) -> Self {
        Self {
            is_incomplete: false,
            item_defaults: None,
            items,
        }
    }

    pub fn with_item_defaults(mut self, defaults: ItemDefaultsExpectation) -> Self {
        self.item_defaults = Some(defaults);
        self
    }

    pub fn incomplete(mut self, is_incomplete: bool) -> Self {
        self.is_incomplete = is_incomplete;
        self
    }
}

/// Knobs for the completion matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    /// Sort text expected of full items that leave it out. `None` skips the check.
    pub default_sort_text: Option<String>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            default_sort_text: Some(crate::constants::SORT_TEXT_LOCATION_PRIORITY.to_string()),
        }
    }
}
