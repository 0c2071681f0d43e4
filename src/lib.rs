pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod expect;
pub mod fixture;
pub mod logging;
pub mod response;
pub mod service;
pub mod types;
pub mod workspace;

pub use config::{ConfigManager, HarnessConfig};
pub use driver::{QueryDriver, Target};
pub use error::{ErrorSite, HarnessError};
pub use expect::{
    CompletionsExpectedList, EditRangeExpectation, Expect, ExpectedCompletionItem, ExpectedItem,
    ExpectedTextEdit, ItemDefaultsExpectation, ItemsExpectation, MatchOptions, Verdict,
};
pub use fixture::{Fixture, FixtureParser, ParseOptions};
pub use service::{InProcessService, LanguageService, ServiceError, StdioService};
pub use workspace::Workspace;
