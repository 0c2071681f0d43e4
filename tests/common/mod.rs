#![allow(dead_code)]

#[path = "../e2e/harness/server.rs"]
pub mod toy_server;

use async_trait::async_trait;
use fourslash_lsp::config::HarnessConfig;
use fourslash_lsp::service::ServerNotification;
use fourslash_lsp::{InProcessService, LanguageService, QueryDriver, ServiceError};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use std::sync::Arc;

/// How a [`ScriptedService`] answers one method.
#[derive(Debug, Clone)]
pub enum Reply {
    Result(Value),
    Error { code: i64, message: String },
    /// Never answers.
    Hang,
}

/// A [`LanguageService`] with canned answers, recording everything it is sent.
///
/// `initialize` and `shutdown` answer on their own unless scripted; other
/// unscripted methods fail with method-not-found.
#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<FxHashMap<String, Reply>>,
    requests: Mutex<Vec<(String, Value)>>,
    sent_notifications: Mutex<Vec<(String, Value)>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, method: &str, result: Value) -> Self {
        self.replies
            .lock()
            .insert(method.to_string(), Reply::Result(result));
        self
    }

    pub fn fail(self, method: &str, code: i64, message: &str) -> Self {
        self.replies.lock().insert(
            method.to_string(),
            Reply::Error {
                code,
                message: message.to_string(),
            },
        );
        self
    }

    pub fn hang(self, method: &str) -> Self {
        self.replies.lock().insert(method.to_string(), Reply::Hang);
        self
    }

    /// Params of every `method` request, oldest first.
    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn sent_notifications(&self, method: &str) -> Vec<Value> {
        self.sent_notifications
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl LanguageService for ScriptedService {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ServiceError> {
        self.requests.lock().push((method.to_string(), params));

        let reply = self.replies.lock().get(method).cloned();
        match reply {
            Some(Reply::Result(result)) => Ok(result),
            Some(Reply::Error { code, message }) => Err(ServiceError::Rpc { code, message }),
            Some(Reply::Hang) => std::future::pending().await,
            None => match method {
                "initialize" => Ok(json!({ "capabilities": {} })),
                "shutdown" => Ok(Value::Null),
                _ => Err(ServiceError::Rpc {
                    code: -32601,
                    message: "Method not found".to_string(),
                }),
            },
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ServiceError> {
        self.sent_notifications
            .lock()
            .push((method.to_string(), params));
        Ok(())
    }

    fn notifications(&self) -> Vec<ServerNotification> {
        Vec::new()
    }
}

/// A started driver over `service`.
pub async fn start_scripted(
    fixture: &str,
    service: Arc<ScriptedService>,
    config: HarnessConfig,
) -> QueryDriver {
    fourslash_lsp::logging::init();
    let mut driver =
        QueryDriver::from_fixture(fixture, service, config).expect("Fixture should parse");
    driver.start().await.expect("Initialize failed");
    driver
}

/// A started driver talking to [`toy_server::ToyServer`] in process.
pub async fn start_in_process(fixture: &str) -> QueryDriver {
    fourslash_lsp::logging::init();
    let service = Arc::new(InProcessService::new(toy_server::ToyServer::new));
    let mut driver = QueryDriver::from_fixture(fixture, service, HarnessConfig::default())
        .expect("Fixture should parse");
    driver.start().await.expect("Initialize failed");
    driver
}
