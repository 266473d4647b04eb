//! DaemonClient for CLI-to-daemon communication.
//!
//! Each call opens a fresh TCP connection to the daemon, writes one request,
//! closes its write side and reads the response to EOF. Connect and read are
//! bounded by a timeout so a wedged daemon surfaces as a structured error
//! instead of a hanging CLI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::Config;
use crate::daemon::protocol::{
    AdvanceParams, AdvanceResult, JobEntry, Request, StatusResult, methods, read_response,
    write_request,
};
use crate::error::{PalisadeError, Result};
use crate::scheduler::SchedulerState;

/// Connect/read timeout for each RPC call.
const RPC_TIMEOUT: Duration = Duration::from_secs(2);

/// Client for the daemon's RPC endpoint.
///
/// # Example
///
/// ```ignore
/// use palisade::daemon::client::DaemonClient;
///
/// let client = DaemonClient::new(&config);
/// let status = client.get_status().await?;
/// println!("scheduler is {}", status);
/// ```
pub struct DaemonClient {
    host: String,
    port: u16,
    request_id: AtomicU64,
}

impl DaemonClient {
    pub fn new(config: &Config) -> Self {
        Self::at(&config.rpc_host, config.rpc_port)
    }

    /// Client against an explicit endpoint; used by tests with port 0 binds.
    pub fn at(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            request_id: AtomicU64::new(1),
        }
    }

    /// Scheduler state as reported by the daemon.
    pub async fn get_status(&self) -> Result<SchedulerState> {
        let result = self
            .call(methods::GET_STATUS, serde_json::Value::Null)
            .await?;
        let status: StatusResult = serde_json::from_value(result)?;
        Ok(status.status)
    }

    /// The daemon's current job table.
    pub async fn get_jobs(&self) -> Result<Vec<JobEntry>> {
        let result = self.call(methods::GET_JOBS, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Shift all scheduled jobs earlier; returns the number modified.
    pub async fn advance_jobs(&self, minutes: u32) -> Result<usize> {
        let params = serde_json::to_value(AdvanceParams { minutes })?;
        let result = self.call(methods::ADVANCE_JOBS, params).await?;
        let advance: AdvanceResult = serde_json::from_value(result)?;
        Ok(advance.advanced)
    }

    /// One request/response exchange on a fresh connection.
    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(id, method, params);

        let mut stream = timeout(
            RPC_TIMEOUT,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| {
            PalisadeError::DaemonConnection(format!(
                "timed out connecting to daemon at {}:{}",
                self.host, self.port
            ))
        })?
        .map_err(|e| {
            PalisadeError::DaemonConnection(format!(
                "failed to connect to daemon at {}:{}: {}",
                self.host, self.port, e
            ))
        })?;

        write_request(&mut stream, &request)
            .await
            .map_err(|e| PalisadeError::DaemonConnection(format!("failed to send request: {}", e)))?;
        // Half-close so the daemon sees end-of-request
        stream
            .shutdown()
            .await
            .map_err(|e| PalisadeError::DaemonConnection(format!("failed to send request: {}", e)))?;

        let response = timeout(RPC_TIMEOUT, read_response(&mut stream))
            .await
            .map_err(|_| {
                PalisadeError::DaemonConnection("timed out waiting for daemon response".to_string())
            })?
            .map_err(|e| {
                PalisadeError::DaemonConnection(format!("failed to read response: {}", e))
            })?;

        if response.id != id {
            return Err(PalisadeError::DaemonProtocol(format!(
                "response id {} does not match request id {}",
                response.id, id
            )));
        }
        if let Some(error) = response.error {
            return Err(PalisadeError::DaemonError(error.message));
        }
        response.result.ok_or_else(|| {
            PalisadeError::DaemonProtocol("response carried neither result nor error".to_string())
        })
    }
}
