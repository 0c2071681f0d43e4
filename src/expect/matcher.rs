//! Completion list matching. Pure: no I/O, no service calls.

use serde::Serialize;
use serde_json::{json, Value};
use smallvec::SmallVec;
use tower_lsp::lsp_types::CompletionItem;

use super::{
    CompletionsExpectedList, Expect, ExpectedCompletionItem, ExpectedItem, ItemDefaultsExpectation,
    ItemsExpectation, MatchOptions,
};
use super::verdict::{FailureKind, Verdict};
use crate::response::{documentation_text, CompletionItemDefaults, CompletionListResponse};

type Check = Result<(), FailureKind>;

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn mismatch<T: Serialize, U: Serialize>(
    label: &str,
    field: &'static str,
    expected: T,
    actual: U,
) -> FailureKind {
    FailureKind::MismatchedField {
        label: label.to_string(),
        field,
        expected: to_json(expected),
        actual: to_json(actual),
    }
}

/// Compare a completion response with an expectation.
///
/// `expected: None` asserts that there are no completions; an absent or
/// empty actual list both satisfy it.
pub fn verify_completions(
    actual: Option<&CompletionListResponse>,
    expected: Option<&CompletionsExpectedList>,
    options: &MatchOptions,
) -> Verdict {
    match check_list(actual, expected, options) {
        Ok(()) => Verdict::Pass,
        Err(kind) => Verdict::fail(kind),
    }
}

fn check_list(
    actual: Option<&CompletionListResponse>,
    expected: Option<&CompletionsExpectedList>,
    options: &MatchOptions,
) -> Check {
    let (list, expected) = match (actual, expected) {
        (actual, None) => {
            return match actual {
                Some(list) if !list.items.is_empty() => Err(FailureKind::UnexpectedList {
                    actual: to_json(list),
                }),
                _ => Ok(()),
            };
        }
        (None, Some(expected)) => {
            return if expected.items.is_empty() {
                Ok(())
            } else {
                Err(FailureKind::MissingList)
            };
        }
        (Some(list), Some(expected)) => (list, expected),
    };

    if list.is_incomplete != expected.is_incomplete {
        return Err(FailureKind::IncompleteMismatch {
            expected: expected.is_incomplete,
            actual: list.is_incomplete,
        });
    }

    check_item_defaults(list.item_defaults.as_ref(), expected.item_defaults.as_ref())?;

    let matcher = ItemMatcher {
        list,
        defaults: expected.item_defaults.as_ref(),
        options,
    };
    match &expected.items {
        ItemsExpectation::Exact(items) => matcher.check_exact(items, false),
        ItemsExpectation::Ordered(items) => matcher.check_exact(items, true),
        ItemsExpectation::Partial { includes, excludes } => {
            matcher.check_partial(includes, excludes)
        }
    }
}

fn check_item_defaults(
    actual: Option<&CompletionItemDefaults>,
    expected: Option<&ItemDefaultsExpectation>,
) -> Check {
    let Some(expected) = expected else {
        return match actual {
            Some(defaults) if !defaults.is_empty() => Err(FailureKind::ItemDefaultsMismatch {
                field: "itemDefaults",
                expected: Value::Null,
                actual: to_json(defaults),
            }),
            _ => Ok(()),
        };
    };

    let empty = CompletionItemDefaults::default();
    let actual = actual.unwrap_or(&empty);

    let commit_ok = match &expected.commit_characters {
        Expect::Ignored => true,
        Expect::Unspecified => actual.commit_characters.is_none(),
        Expect::Value(chars) => actual.commit_characters.as_ref() == Some(chars),
    };
    if !commit_ok {
        return Err(FailureKind::ItemDefaultsMismatch {
            field: "commitCharacters",
            expected: to_json(expected.commit_characters.value()),
            actual: to_json(&actual.commit_characters),
        });
    }

    let actual_range = actual.edit_range.as_ref().map(|r| r.as_insert_replace());
    let range_ok = match &expected.edit_range {
        Expect::Ignored => true,
        Expect::Unspecified => actual_range.is_none(),
        Expect::Value(range) => actual_range == Some(range.as_insert_replace()),
    };
    if !range_ok {
        let expected_range = expected
            .edit_range
            .value()
            .map(|r| r.as_insert_replace())
            .map(|(insert, replace)| json!({ "insert": insert, "replace": replace }));
        return Err(FailureKind::ItemDefaultsMismatch {
            field: "editRange",
            expected: to_json(expected_range),
            actual: to_json(&actual.edit_range),
        });
    }

    Ok(())
}

struct ItemMatcher<'a> {
    list: &'a CompletionListResponse,
    defaults: Option<&'a ItemDefaultsExpectation>,
    options: &'a MatchOptions,
}

impl ItemMatcher<'_> {
    fn actual_labels(&self) -> Vec<String> {
        self.list.items.iter().map(|item| item.label.clone()).collect()
    }

    /// Index of the single actual item `expected` refers to.
    ///
    /// Items match on label, plus kind and sort text when the expectation
    /// gives them. With no full match, a lone item with the same label is
    /// returned so field comparison can say which field differs.
    fn find(&self, expected: &ExpectedItem) -> Result<usize, FailureKind> {
        let label = expected.label();
        let candidates: SmallVec<[usize; 2]> = self
            .list
            .items
            .iter()
            .enumerate()
            .filter(|(_, actual)| key_matches(expected, actual))
            .map(|(idx, _)| idx)
            .collect();

        match candidates.as_slice() {
            [idx] => Ok(*idx),
            [] => {
                let mut same_label = self
                    .list
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(_, actual)| actual.label == label);
                match (same_label.next(), same_label.next()) {
                    (Some((idx, _)), None) => Ok(idx),
                    _ => Err(FailureKind::MissingItem {
                        label: label.to_string(),
                        actual_labels: self.actual_labels(),
                    }),
                }
            }
            many => Err(FailureKind::AmbiguousMatch {
                label: label.to_string(),
                candidates: many.iter().map(|&idx| to_json(&self.list.items[idx])).collect(),
            }),
        }
    }

    fn check_exact(&self, expected: &[ExpectedItem], ordered: bool) -> Check {
        let mut claimed = vec![false; self.list.items.len()];

        for item in expected {
            let idx = self.find(item)?;
            if claimed[idx] {
                return Err(FailureKind::MissingItem {
                    label: item.label().to_string(),
                    actual_labels: self.actual_labels(),
                });
            }
            claimed[idx] = true;
            self.compare(item, &self.list.items[idx])?;
        }

        let unexpected: Vec<String> = self
            .list
            .items
            .iter()
            .zip(&claimed)
            .filter(|(_, claimed)| !**claimed)
            .map(|(item, _)| item.label.clone())
            .collect();
        if !unexpected.is_empty() {
            return Err(FailureKind::UnexpectedItems { labels: unexpected });
        }

        if ordered {
            let expected_labels: Vec<String> =
                expected.iter().map(|item| item.label().to_string()).collect();
            let actual_labels = self.actual_labels();
            if expected_labels != actual_labels {
                return Err(FailureKind::OrderMismatch {
                    expected: expected_labels,
                    actual: actual_labels,
                });
            }
        }

        Ok(())
    }

    fn check_partial(&self, includes: &[ExpectedItem], excludes: &[String]) -> Check {
        for item in includes {
            let idx = self.find(item)?;
            self.compare(item, &self.list.items[idx])?;
        }

        if let Some(label) = excludes
            .iter()
            .find(|label| self.list.items.iter().any(|item| &item.label == *label))
        {
            return Err(FailureKind::ExcludedItemPresent {
                label: label.clone(),
            });
        }

        Ok(())
    }

    fn compare(&self, expected: &ExpectedItem, actual: &CompletionItem) -> Check {
        match expected {
            ExpectedItem::Label(_) => Ok(()),
            ExpectedItem::Item(item) => self.compare_fields(item, actual),
        }
    }

    fn compare_fields(&self, expected: &ExpectedCompletionItem, actual: &CompletionItem) -> Check {
        let label = expected.label.as_str();

        if let Some(kind) = expected.kind {
            if actual.kind != Some(kind) {
                return Err(mismatch(label, "kind", kind, actual.kind));
            }
        }

        if let Some(sort_text) = expected
            .sort_text
            .as_ref()
            .or(self.options.default_sort_text.as_ref())
        {
            if actual.sort_text.as_ref() != Some(sort_text) {
                return Err(mismatch(label, "sortText", sort_text, &actual.sort_text));
            }
        }

        if let Some(details) = &expected.label_details {
            if actual.label_details.as_ref() != Some(details) {
                return Err(mismatch(label, "labelDetails", details, &actual.label_details));
            }
        }

        let string_fields = [
            ("filterText", &expected.filter_text, &actual.filter_text),
            ("insertText", &expected.insert_text, &actual.insert_text),
            ("detail", &expected.detail, &actual.detail),
        ];
        for (field, expected_value, actual_value) in string_fields {
            if let Some(expected_value) = expected_value {
                if actual_value.as_ref() != Some(expected_value) {
                    return Err(mismatch(label, field, expected_value, actual_value));
                }
            }
        }

        if let Some(documentation) = &expected.documentation {
            let actual_doc = actual.documentation.as_ref().map(documentation_text);
            if actual_doc != Some(documentation.as_str()) {
                return Err(mismatch(label, "documentation", documentation, actual_doc));
            }
        }

        let expected_commit = match &expected.commit_characters {
            Expect::Value(chars) => Some(chars),
            Expect::Ignored => None,
            Expect::Unspecified => self.defaults.and_then(|d| d.commit_characters.value()),
        };
        if let Some(chars) = expected_commit {
            let actual_chars = self.list.effective_commit_characters(actual);
            if actual_chars != Some(chars.as_slice()) {
                return Err(mismatch(label, "commitCharacters", chars, actual_chars));
            }
        }

        let expected_edit = match &expected.edit {
            Expect::Value(edit) => Some((edit.range.as_insert_replace(), edit.new_text.as_deref())),
            Expect::Ignored => None,
            Expect::Unspecified => self
                .defaults
                .and_then(|d| d.edit_range.value())
                .map(|range| (range.as_insert_replace(), None)),
        };
        if let Some(((insert, replace), new_text)) = expected_edit {
            let actual_edit = self.list.effective_edit(actual);
            let matches = actual_edit.as_ref().is_some_and(|edit| {
                edit.insert == insert
                    && edit.replace == replace
                    && new_text.map_or(true, |text| text == edit.new_text)
            });
            if !matches {
                let mut expected_json = json!({ "insert": insert, "replace": replace });
                if let Some(text) = new_text {
                    expected_json["newText"] = Value::String(text.to_string());
                }
                return Err(mismatch(label, "textEdit", expected_json, actual_edit));
            }
        }

        Ok(())
    }
}

fn key_matches(expected: &ExpectedItem, actual: &CompletionItem) -> bool {
    if actual.label != expected.label() {
        return false;
    }
    let Some(item) = expected.as_item() else {
        return true;
    };
    item.kind.map_or(true, |kind| actual.kind == Some(kind))
        && item
            .sort_text
            .as_ref()
            .map_or(true, |sort| actual.sort_text.as_ref() == Some(sort))
}
