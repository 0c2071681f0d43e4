//! Transports between the query driver and a language service.
//!
//! The driver only knows [`LanguageService`]: send a request, get a JSON
//! result back. Adapters decide how the message travels.

mod in_process;
mod stdio;

pub use in_process::InProcessService;
pub use stdio::StdioService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single round trip to the language service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("LSP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Language service has exited")]
    Exited,
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Decode(e.to_string())
    }
}

/// A notification the service sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerNotification {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Anything that answers LSP requests.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Send a request and wait for its result. `params` of `Value::Null` are
    /// omitted from the message.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ServiceError>;

    async fn notify(&self, method: &str, params: Value) -> Result<(), ServiceError>;

    /// Notifications received so far, oldest first.
    fn notifications(&self) -> Vec<ServerNotification>;

    fn notifications_by_method(&self, method: &str) -> Vec<ServerNotification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.method == method)
            .collect()
    }
}
