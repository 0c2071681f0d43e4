use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::constants::{
    CONFIG_FILE_NAME, IMPLICIT_FILE_NAME, QUERY_TIMEOUT_MS, ROOT_DIRECTORY, SLOW_QUERY_MS,
    SORT_TEXT_LOCATION_PRIORITY,
};
use crate::error::HarnessError;
use crate::expect::MatchOptions;
use crate::fixture::ParseOptions;
use crate::types::PositionEncoding;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub fixture: FixtureConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FixtureConfig {
    #[serde(default = "implicit_file_name")]
    pub implicit_file_name: String,
    #[serde(default = "root_directory")]
    pub current_directory: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "query_timeout_ms")]
    pub timeout_ms: u64,
    /// Queries slower than this are logged at warn level.
    #[serde(default = "slow_query_ms")]
    pub slow_query_ms: u64,
    #[serde(default)]
    pub position_encoding: PositionEncoding,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Sort text assumed for expected items that leave it out. Empty disables
    /// the check.
    #[serde(default = "default_sort_text")]
    pub default_sort_text: String,
    /// Resolve actual items before comparing `detail` or `documentation`.
    #[serde(default = "true_bool")]
    pub resolve_details: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            implicit_file_name: implicit_file_name(),
            current_directory: root_directory(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: query_timeout_ms(),
            slow_query_ms: slow_query_ms(),
            position_encoding: PositionEncoding::default(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            default_sort_text: default_sort_text(),
            resolve_details: true,
        }
    }
}

impl HarnessConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            implicit_file_name: self.fixture.implicit_file_name.clone(),
            current_directory: self.fixture.current_directory.clone(),
            encoding: self.query.position_encoding,
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            default_sort_text: Some(self.completion.default_sort_text.clone())
                .filter(|text| !text.is_empty()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.query.timeout_ms)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.query.slow_query_ms)
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<HarnessConfig>>,

    overrides: Arc<RwLock<Option<serde_json::Value>>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(HarnessConfig::default())),
            overrides: Arc::new(RwLock::new(None)),
        }
    }

    pub fn get_config(&self) -> Arc<RwLock<HarnessConfig>> {
        self.config.clone()
    }

    /// Settings applied on top of the defaults; `fourslash.toml` still wins.
    pub async fn set_overrides(&self, overrides: Option<serde_json::Value>) {
        let mut lock = self.overrides.write().await;
        *lock = overrides;
    }

    pub async fn load_from_dir(&self, root: &Path) -> Result<HarnessConfig, HarnessError> {
        let mut config_json = serde_json::to_value(HarnessConfig::default())
            .map_err(|e| HarnessError::Config(format!("Failed to serialize defaults: {}", e)))?;

        {
            let overrides = self.overrides.read().await;
            if let Some(settings) = overrides.as_ref() {
                merge_json(&mut config_json, settings);
            }
        }

        let config_path = root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let toml_content = fs::read_to_string(&config_path)
                .map_err(|e| HarnessError::Config(format!("Failed to read config: {}", e)))?;

            let toml_value: toml::Value = toml::from_str(&toml_content)
                .map_err(|e| HarnessError::Config(format!("Failed to parse config: {}", e)))?;
            let toml_json = toml_to_json(&toml_value);

            merge_json(&mut config_json, &toml_json);
        }

        let config: HarnessConfig = serde_json::from_value(config_json).map_err(|e| {
            HarnessError::Config(format!("Failed to deserialize merged config: {}", e))
        })?;

        tracing::debug!(
            "[CONFIG_LOADED] root={} timeout_ms={} encoding={}",
            root.display(),
            config.query.timeout_ms,
            config.query.position_encoding.as_lsp_str()
        );

        let mut lock = self.config.write().await;
        *lock = config.clone();

        Ok(config)
    }
}

fn toml_to_json(toml: &toml::Value) -> serde_json::Value {
    match toml {
        toml::Value::String(s) => serde_json::Value::String(s.clone()),
        toml::Value::Integer(i) => serde_json::Value::Number((*i).into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        toml::Value::Boolean(b) => serde_json::Value::Bool(*b),
        toml::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
    }
}

/// Recursively overlay `overlay` onto `base`. Null values in the overlay are skipped.
fn merge_json(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if overlay_val.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(base_val) => merge_json(base_val, overlay_val),
                    None => {
                        base_map.insert(key.clone(), overlay_val.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            if !overlay.is_null() {
                *base = overlay.clone();
            }
        }
    }
}

fn implicit_file_name() -> String {
    IMPLICIT_FILE_NAME.to_string()
}

fn root_directory() -> String {
    ROOT_DIRECTORY.to_string()
}

fn query_timeout_ms() -> u64 {
    QUERY_TIMEOUT_MS
}

fn slow_query_ms() -> u64 {
    SLOW_QUERY_MS
}

fn default_sort_text() -> String {
    SORT_TEXT_LOCATION_PRIORITY.to_string()
}

fn true_bool() -> bool {
    true
}
