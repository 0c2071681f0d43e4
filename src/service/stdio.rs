//! Talks to a language server over a byte stream with `Content-Length` framing.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::{LanguageService, ServerNotification, ServiceError};
use crate::constants::MAX_FRAME_BYTES;

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;
type PendingMap = Arc<DashMap<i64, oneshot::Sender<Value>>>;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
}

/// A [`LanguageService`] reached over a framed byte stream, usually a child
/// process's stdin/stdout.
pub struct StdioService {
    writer: SharedWriter,
    pending: PendingMap,
    notifications: Arc<RwLock<Vec<ServerNotification>>>,
    next_id: AtomicI64,
    reader_task: JoinHandle<()>,
    _child: Option<Child>,
}

impl StdioService {
    /// Spawn `program` and speak LSP over its stdio. The process is killed
    /// when the service is dropped.
    pub fn spawn<I, A>(
        program: impl AsRef<OsStr>,
        args: I,
        cwd: &Path,
    ) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ServiceError::Transport(format!(
                    "Failed to spawn {}: {}",
                    program.to_string_lossy(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ServiceError::Transport("Failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServiceError::Transport("Failed to capture stdout".into()))?;

        tracing::debug!("[STDIO_SPAWN] program={}", program.to_string_lossy());

        let mut service = Self::connect(stdout, stdin);
        service._child = Some(child);
        Ok(service)
    }

    /// Use an already-open stream pair. Must be called inside a Tokio runtime.
    pub fn connect<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));
        let pending: PendingMap = Arc::new(DashMap::new());
        let notifications = Arc::new(RwLock::new(Vec::new()));

        let reader_task = tokio::spawn(read_messages(
            BufReader::new(reader),
            Arc::clone(&pending),
            Arc::clone(&notifications),
            Arc::clone(&writer),
        ));

        Self {
            writer,
            pending,
            notifications,
            next_id: AtomicI64::new(1),
            reader_task,
            _child: None,
        }
    }

    pub fn clear_notifications(&self) {
        self.notifications.write().clear();
    }

    async fn send(&self, message: &JsonRpcRequest<'_>) -> Result<(), ServiceError> {
        let value = serde_json::to_value(message)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &value).await?;
        Ok(())
    }
}

impl Drop for StdioService {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Removes a pending entry when its request is abandoned, e.g. on timeout.
struct PendingGuard<'a> {
    pending: &'a DashMap<i64, oneshot::Sender<Value>>,
    id: i64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

#[async_trait]
impl LanguageService for StdioService {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        self.send(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        })
        .await?;

        let response = rx.await.map_err(|_| ServiceError::Exited)?;

        if let Some(error) = response.get("error") {
            return Err(ServiceError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ServiceError> {
        self.send(&JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params,
        })
        .await
    }

    fn notifications(&self) -> Vec<ServerNotification> {
        self.notifications.read().clone()
    }
}

async fn read_messages<R: AsyncRead + Unpin>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    notifications: Arc<RwLock<Vec<ServerNotification>>>,
    writer: SharedWriter,
) {
    loop {
        let message = match read_frame(&mut reader).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                tracing::warn!("Skipping undecodable message from server: {}", e);
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                tracing::warn!("Dropping server stream: {}", e);
                break;
            }
            Err(e) => {
                tracing::debug!("Server stream closed: {}", e);
                break;
            }
        };

        let id = message.get("id").filter(|id| !id.is_null()).cloned();
        let has_method = message.get("method").is_some();

        match (id, has_method) {
            (Some(id), false) => match id.as_i64().and_then(|id| pending.remove(&id)) {
                Some((_, tx)) => {
                    let _ = tx.send(message);
                }
                None => tracing::warn!("Dropped response for unknown request id {}", id),
            },
            // Server-to-client request; ids may be numbers or strings.
            (Some(id), true) => {
                let reply = json!({ "jsonrpc": "2.0", "id": id, "result": null });
                let mut writer = writer.lock().await;
                if let Err(e) = write_frame(&mut *writer, &reply).await {
                    tracing::warn!("Failed to answer server request {}: {}", id, e);
                }
            }
            (None, true) => match serde_json::from_value::<ServerNotification>(message) {
                Ok(notification) => notifications.write().push(notification),
                Err(e) => tracing::warn!("Malformed notification from server: {}", e),
            },
            (None, false) => tracing::warn!("Ignoring message with neither id nor method"),
        }
    }

    // Waiters see a closed channel and report the service as exited.
    pending.clear();
}

/// Read one `Content-Length` framed JSON message. `Ok(None)` at end of stream.
pub(crate) async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some(len) = line.strip_prefix("Content-Length:") {
            content_length = len.trim().parse().ok();
        }
    }

    let len = content_length.unwrap_or_default();
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Content-Length {} exceeds {} bytes", len, MAX_FRAME_BYTES),
        ));
    }
    let mut content = vec![0u8; len];
    reader.read_exact(&mut content).await?;

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub(crate) async fn write_frame<W>(writer: &mut W, message: &Value) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let content = serde_json::to_string(message)?;
    let header = format!("Content-Length: {}\r\n\r\n", content.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(content.as_bytes()).await?;
    writer.flush().await
}
