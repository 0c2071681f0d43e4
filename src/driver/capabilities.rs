use serde_json::{json, Value};

use crate::types::PositionEncoding;

/// `initialize` params advertising what the matcher knows how to check:
/// snippets, commit characters, insert/replace edits and list-level item
/// defaults.
pub fn initialize_params(root_uri: &str, encoding: PositionEncoding) -> Value {
    json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "general": {
                "positionEncodings": [encoding.as_lsp_str()]
            },
            "textDocument": {
                "synchronization": { "didSave": false },
                "hover": { "contentFormat": ["markdown", "plaintext"] },
                "completion": {
                    "completionItem": {
                        "snippetSupport": true,
                        "commitCharactersSupport": true,
                        "preselectSupport": true,
                        "labelDetailsSupport": true,
                        "insertReplaceSupport": true,
                        "documentationFormat": ["markdown", "plaintext"],
                        "resolveSupport": { "properties": ["detail", "documentation"] }
                    },
                    "completionList": {
                        "itemDefaults": ["commitCharacters", "editRange"]
                    }
                }
            }
        }
    })
}

/// Empty completion context: an explicit invocation.
pub fn invoked_context() -> Value {
    json!({ "triggerKind": 1 })
}
