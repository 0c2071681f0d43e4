//! Constants shared by the parser, driver and matcher.

/// Sort text the language service assigns to members found at the current location.
/// Full expected items without an explicit sort text are compared against this.
pub const SORT_TEXT_LOCATION_PRIORITY: &str = "11";

pub const SORT_TEXT_OPTIONAL_MEMBER: &str = "12";
pub const SORT_TEXT_GLOBALS_OR_KEYWORDS: &str = "15";
pub const SORT_TEXT_AUTO_IMPORT_SUGGESTIONS: &str = "16";

/// Commit characters most completion lists advertise as their item default.
pub const DEFAULT_COMMIT_CHARACTERS: [&str; 3] = [".", ",", ";"];

/// File name given to fixtures that never declare `// @Filename`.
pub const IMPLICIT_FILE_NAME: &str = "/main.ts";

/// Root every relative fixture path is resolved against.
pub const ROOT_DIRECTORY: &str = "/";

/// Upper bound on a single language-service round trip (milliseconds).
pub const QUERY_TIMEOUT_MS: u64 = 30_000;

/// Largest message body accepted from a language service (bytes).
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Queries slower than this are logged at warn level (milliseconds).
pub const SLOW_QUERY_MS: u64 = 1_000;

/// Name of the optional configuration file looked up in a harness root.
pub const CONFIG_FILE_NAME: &str = "fourslash.toml";

/// Per-file directive that marks a file for emit.
pub const EMIT_THIS_FILE_OPTION: &str = "emitthisfile";
