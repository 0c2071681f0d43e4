//! Splits raw fixture text into per-file sections on `// @Filename:` lines
//! and collects the other `// @key: value` directives.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::constants::EMIT_THIS_FILE_OPTION;
use crate::error::{ErrorSite, HarnessError};

/// Directives that apply to the file they appear in rather than globally.
const FILE_DIRECTIVES: &[&str] = &[EMIT_THIS_FILE_OPTION];

/// Annotated content of one virtual file, before marker stripping.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileSection {
    pub name: String,
    pub content: String,
    pub options: FxHashMap<String, String>,
    /// Raw fixture line (1-based) for each line of `content`.
    pub raw_lines: Vec<u32>,
}

impl FileSection {
    /// Append one content line. Blank lines before the first non-empty line
    /// are dropped.
    fn push_line(&mut self, line: &str, raw_line: u32) {
        if self.content.is_empty() {
            if line.is_empty() {
                return;
            }
        } else {
            self.content.push('\n');
        }
        self.content.push_str(line);
        self.raw_lines.push(raw_line);
    }

    fn is_only_trivia(&self) -> bool {
        self.content.lines().all(|line| {
            let line = line.trim();
            line.is_empty()
                || line.starts_with("//")
                || line.starts_with("/*")
                || line.starts_with('*')
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct SplitFixture {
    pub sections: Vec<FileSection>,
    /// Link path → target path, as written.
    pub symlinks: FxHashMap<String, String>,
    pub global_options: BTreeMap<String, String>,
    pub current_directory: Option<String>,
}

/// Parse a `// @key: value` line. Keys are lower-cased.
pub(crate) fn parse_directive(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("//")?.trim_start();
    let rest = rest.strip_prefix('@')?;
    let key_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if key_len == 0 {
        return None;
    }
    let (key, rest) = rest.split_at(key_len);
    let value = rest.trim_start().strip_prefix(':')?;
    Some((key.to_ascii_lowercase(), value.trim().to_string()))
}

/// Parse the value of a `// @link: target -> link` directive.
fn parse_link(value: &str) -> Option<(String, String)> {
    let (target, link) = value.split_once("->")?;
    let (target, link) = (target.trim(), link.trim());
    if target.is_empty() || link.is_empty() {
        return None;
    }
    Some((target.to_string(), link.to_string()))
}

pub(crate) fn split_files(text: &str, implicit_name: &str) -> Result<SplitFixture, HarnessError> {
    let mut split = SplitFixture::default();
    let mut current = FileSection::default();
    let mut has_file_name = false;

    for (idx, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let raw_line = idx as u32 + 1;

        let Some((key, value)) = parse_directive(line) else {
            current.push_line(line, raw_line);
            continue;
        };

        match key.as_str() {
            "filename" => {
                if has_file_name {
                    let finished = std::mem::take(&mut current);
                    split.sections.push(finished);
                } else if !current.is_only_trivia() {
                    return Err(HarnessError::malformed(
                        ErrorSite::at(implicit_name, raw_line, 1),
                        "Non-comment test content appears before the first '// @Filename' directive",
                    ));
                } else {
                    // Options declared before the first file still belong to it.
                    let options = std::mem::take(&mut current.options);
                    current = FileSection {
                        options,
                        ..FileSection::default()
                    };
                }
                if value.is_empty() {
                    return Err(HarnessError::malformed(
                        ErrorSite::at(implicit_name, raw_line, 1),
                        "Empty '@Filename' directive",
                    ));
                }
                current.name = value;
                has_file_name = true;
            }
            "link" => match parse_link(&value) {
                Some((target, link)) => {
                    split.symlinks.insert(link, target);
                }
                None => {
                    return Err(HarnessError::malformed(
                        ErrorSite::at(implicit_name, raw_line, 1),
                        format!("Invalid '@link' directive: {}", value),
                    ));
                }
            },
            "currentdirectory" => {
                split.current_directory = Some(value.clone());
                split.global_options.insert(key, value);
            }
            _ if FILE_DIRECTIVES.contains(&key.as_str()) => {
                current.options.insert(key, value);
            }
            _ => {
                split.global_options.insert(key, value);
            }
        }
    }

    if !has_file_name {
        current.name = implicit_name.to_string();
    }
    split.sections.push(current);

    tracing::trace!(
        files = split.sections.len(),
        options = split.global_options.len(),
        "Split fixture into files"
    );

    Ok(split)
}
