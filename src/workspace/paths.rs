//! Virtual path helpers. Fixture paths are always `/`-separated and absolute.

/// Normalize `path` to an absolute path, resolving it against `current_directory`
/// when relative. `.` and `..` segments are collapsed and backslashes become `/`.
pub fn normalize_path(path: &str, current_directory: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let joined = if path.starts_with('/') {
        path
    } else {
        format!("{}/{}", current_directory.trim_end_matches('/'), path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Directory portion of a normalized path (`/` for top-level files).
pub fn directory_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

pub fn extension_of(path: &str) -> Option<&str> {
    let file_name = &path[path.rfind('/').map(|i| i + 1).unwrap_or(0)..];
    file_name.rfind('.').map(|idx| &file_name[idx..])
}

/// LSP language identifier for a file name.
pub fn language_id(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".tsx") {
        "typescriptreact"
    } else if lower.ends_with(".jsx") {
        "javascriptreact"
    } else if lower.ends_with(".js") || lower.ends_with(".mjs") || lower.ends_with(".cjs") {
        "javascript"
    } else if lower.ends_with(".json") {
        "json"
    } else {
        "typescript"
    }
}
