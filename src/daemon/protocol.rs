//! RPC protocol types and wire helpers for daemon communication.
//!
//! The CLI talks to the daemon over TCP with one request per connection.
//! A request is a single JSON object `{"method", "params", "id"}`; the
//! response is `{"id", "result"}` on success or `{"id", "error": {"message"}}`
//! on failure. The sender closes its write side after the request and the
//! receiver reads to EOF, so no length prefix is needed; messages are bounded
//! to keep a misbehaving peer from exhausting memory.

use std::io;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::scheduler::{JobSnapshot, SchedulerState};

/// Maximum message size (64 KiB); far beyond any real job table.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Timestamp format used for every wire timestamp.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Method names understood by the daemon.
pub mod methods {
    pub const GET_STATUS: &str = "get_status";
    pub const GET_JOBS: &str = "get_jobs";
    pub const ADVANCE_JOBS: &str = "advance_jobs";
}

/// RPC request envelope sent from CLI to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The operation to perform, by name.
    pub method: String,
    /// Method-specific parameters; omitted when the method takes none.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    /// Request identifier echoed back in the response.
    pub id: u64,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }
}

/// RPC response envelope sent from daemon to CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response corresponds to.
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Structured error payload carried in a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub message: String,
}

impl Response {
    /// Create a successful response with a result body.
    pub fn ok(id: u64, result: impl Serialize) -> Self {
        Self {
            id,
            result: Some(serde_json::to_value(result).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                message: message.into(),
            }),
        }
    }
}

/// Result payload for `get_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResult {
    pub status: SchedulerState,
}

/// One job table entry as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: String,
    pub name: String,
    pub trigger: String,
    /// Formatted with [`TIME_FORMAT`]; `None` for exhausted jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_time: Option<String>,
}

impl JobEntry {
    /// Parse the wire timestamp back into a datetime.
    pub fn parsed_next_run(&self) -> Option<chrono::NaiveDateTime> {
        self.next_run_time
            .as_deref()
            .and_then(|s| chrono::NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok())
    }
}

impl From<&JobSnapshot> for JobEntry {
    fn from(snapshot: &JobSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            trigger: snapshot.trigger.clone(),
            next_run_time: snapshot
                .next_run_time
                .map(|t| t.format(TIME_FORMAT).to_string()),
        }
    }
}

/// Parameters for `advance_jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceParams {
    #[serde(default = "default_advance_minutes")]
    pub minutes: u32,
}

fn default_advance_minutes() -> u32 {
    1
}

impl Default for AdvanceParams {
    fn default() -> Self {
        Self {
            minutes: default_advance_minutes(),
        }
    }
}

/// Result payload for `advance_jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResult {
    pub advanced: usize,
}

/// Write one message and flush. The caller closes the write side afterward to
/// signal end-of-message to the peer.
///
/// # Errors
///
/// Returns an error if the data exceeds [`MAX_MESSAGE_SIZE`] or writing fails.
pub async fn write_message<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message too large: {} bytes (max {})", data.len(), MAX_MESSAGE_SIZE),
        ));
    }
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one message: everything up to EOF, bounded by [`MAX_MESSAGE_SIZE`].
///
/// # Errors
///
/// Returns an error if the peer sends more than the bound or reading fails.
pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut bounded = reader.take(MAX_MESSAGE_SIZE as u64 + 1);
    bounded.read_to_end(&mut buf).await?;
    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large (max {} bytes)", MAX_MESSAGE_SIZE),
        ));
    }
    Ok(buf)
}

/// Serialize and write a request.
pub async fn write_request<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    request: &Request,
) -> io::Result<()> {
    let json =
        serde_json::to_vec(request).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_message(writer, &json).await
}

/// Read and deserialize a request.
pub async fn read_request<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Request> {
    let data = read_message(reader).await?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Serialize and write a response.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
) -> io::Result<()> {
    let json =
        serde_json::to_vec(response).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    write_message(writer, &json).await
}

/// Read and deserialize a response.
pub async fn read_response<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Response> {
    let data = read_message(reader).await?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
