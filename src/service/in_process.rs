//! Drives a `tower-lsp` server in the same process, without any framing.

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::{Request, Response};
use tower_lsp::{Client, ClientSocket, LanguageServer, LspService};
use tower_service::Service;

use super::{LanguageService, ServerNotification, ServiceError};

/// A [`LanguageService`] backed by an [`LspService`].
///
/// Requests the server sends back to the client (configuration, progress,
/// registration) are answered with `null`; notifications are recorded.
/// Must be created inside a Tokio runtime.
pub struct InProcessService<S: LanguageServer> {
    service: Mutex<LspService<S>>,
    next_id: AtomicI64,
    notifications: Arc<RwLock<Vec<ServerNotification>>>,
    socket_task: JoinHandle<()>,
}

impl<S: LanguageServer> InProcessService<S> {
    pub fn new<F>(init: F) -> Self
    where
        F: FnOnce(Client) -> S,
    {
        let (service, socket) = LspService::new(init);
        Self::from_parts(service, socket)
    }

    /// Wrap a service built with [`LspService::build`], e.g. one with custom methods.
    pub fn from_parts(service: LspService<S>, socket: ClientSocket) -> Self {
        let notifications = Arc::new(RwLock::new(Vec::new()));
        let socket_task = tokio::spawn(drain_client_socket(socket, Arc::clone(&notifications)));

        Self {
            service: Mutex::new(service),
            next_id: AtomicI64::new(1),
            notifications,
            socket_task,
        }
    }

    pub fn clear_notifications(&self) {
        self.notifications.write().clear();
    }

    async fn call(&self, request: Request) -> Result<Option<Response>, ServiceError> {
        // Only readiness and dispatch need the lock; the response future is
        // awaited without it.
        let response = {
            let mut service = self.service.lock().await;
            future::poll_fn(|cx| service.poll_ready(cx))
                .await
                .map_err(|_| ServiceError::Exited)?;
            service.call(request)
        };
        response.await.map_err(|_| ServiceError::Exited)
    }
}

impl<S: LanguageServer> Drop for InProcessService<S> {
    fn drop(&mut self) {
        self.socket_task.abort();
    }
}

#[async_trait]
impl<S: LanguageServer> LanguageService for InProcessService<S> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut builder = Request::build(method.to_string()).id(id);
        if !params.is_null() {
            builder = builder.params(params);
        }

        let Some(response) = self.call(builder.finish()).await? else {
            return Ok(Value::Null);
        };

        let (_, result) = response.into_parts();
        result.map_err(|error| ServiceError::Rpc {
            code: error.code.code(),
            message: error.message.into_owned(),
        })
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ServiceError> {
        let mut builder = Request::build(method.to_string());
        if !params.is_null() {
            builder = builder.params(params);
        }
        self.call(builder.finish()).await.map(|_| ())
    }

    fn notifications(&self) -> Vec<ServerNotification> {
        self.notifications.read().clone()
    }
}

async fn drain_client_socket(
    socket: ClientSocket,
    notifications: Arc<RwLock<Vec<ServerNotification>>>,
) {
    let (mut requests, mut responses) = socket.split();

    while let Some(message) = requests.next().await {
        let (method, id, params) = message.into_parts();
        match id {
            Some(id) => {
                tracing::debug!("[SERVER_REQUEST] method={}", method);
                if responses.send(Response::from_ok(id, Value::Null)).await.is_err() {
                    tracing::warn!("Dropped reply to server request '{}'", method);
                    break;
                }
            }
            None => {
                notifications.write().push(ServerNotification {
                    method: method.into_owned(),
                    params,
                });
            }
        }
    }
}
