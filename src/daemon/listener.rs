//! RPC listener for daemon communication.
//!
//! The daemon accepts TCP connections from CLI clients and serves one request
//! per connection: read the request to EOF, dispatch by method name into the
//! scheduler engine, write one response, close. Connections are accepted and
//! served serially; every method is a quick in-memory operation, and the
//! request read is bounded in both size and time so no client can hold the
//! loop.
//!
//! ## Usage
//!
//! ```ignore
//! use palisade::daemon::listener::RpcListener;
//!
//! let listener = RpcListener::bind(&config, engine).await?;
//! listener.serve(cancel).await;
//! ```

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::daemon::protocol::{
    AdvanceParams, AdvanceResult, JobEntry, Request, Response, StatusResult, methods,
    read_request, write_response,
};
use crate::error::Result;
use crate::scheduler::SchedulerEngine;

/// How long a connected client gets to deliver its request. A client that
/// never closes its write half would otherwise stall the serial accept loop.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP listener serving scheduler queries from CLI clients.
pub struct RpcListener {
    listener: TcpListener,
    engine: SchedulerEngine,
}

impl RpcListener {
    /// Bind to the configured RPC endpoint (default `127.0.0.1:8585`).
    pub async fn bind(config: &Config, engine: SchedulerEngine) -> Result<Self> {
        let listener = TcpListener::bind((config.rpc_host.as_str(), config.rpc_port)).await?;
        Ok(Self { listener, engine })
    }

    /// The address the listener is bound to. Useful with port 0 in tests.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until cancelled.
    ///
    /// A failing connection is logged and never brings the loop down;
    /// cancellation is the only way out.
    pub async fn serve(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("RPC listener shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            tracing::debug!("RPC connection from {}", peer);
                            if let Err(e) = self.handle_connection(stream).await {
                                tracing::warn!("RPC connection from {} failed: {}", peer, e);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("RPC accept failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let response = match timeout(READ_TIMEOUT, read_request(&mut stream)).await {
            Ok(Ok(request)) => self.dispatch(request),
            // No usable id to echo back on a malformed request
            Ok(Err(e)) => Response::err(0, format!("malformed request: {}", e)),
            Err(_) => Response::err(0, "request timed out"),
        };
        write_response(&mut stream, &response).await?;
        stream.shutdown().await
    }

    /// Dispatch one request into the engine. Always produces a response.
    fn dispatch(&self, request: Request) -> Response {
        let id = request.id;
        match request.method.as_str() {
            methods::GET_STATUS => Response::ok(
                id,
                StatusResult {
                    status: self.engine.state(),
                },
            ),
            methods::GET_JOBS => {
                let jobs: Vec<JobEntry> =
                    self.engine.jobs().iter().map(JobEntry::from).collect();
                Response::ok(id, jobs)
            }
            methods::ADVANCE_JOBS => {
                let params = if request.params.is_null() {
                    Ok(AdvanceParams::default())
                } else {
                    serde_json::from_value::<AdvanceParams>(request.params)
                };
                match params {
                    Ok(params) => Response::ok(
                        id,
                        AdvanceResult {
                            advanced: self.engine.advance_jobs(params.minutes),
                        },
                    ),
                    Err(e) => Response::err(id, format!("invalid params: {}", e)),
                }
            }
            other => Response::err(id, format!("unknown method: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupOps;
    use crate::daemon::protocol::{read_response, write_request};
    use crate::downtime::DowntimeTracker;
    use crate::scheduler::{BackupSchedule, Collaborators, SchedulerState, TracingSink};
    use crate::server_ctl::{ServerControl, ServerStatus};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    struct NullServer;
    impl ServerControl for NullServer {
        fn start(&self) -> Result<String> {
            Ok(String::new())
        }
        fn stop(&self) -> Result<String> {
            Ok(String::new())
        }
        fn restart(&self) -> Result<String> {
            Ok(String::new())
        }
        fn command(&self, _cmd: &str) -> Result<String> {
            Ok(String::new())
        }
        fn status(&self) -> Result<ServerStatus> {
            Ok(ServerStatus::default())
        }
        fn player_count(&self) -> Result<u32> {
            Ok(0)
        }
        fn announce(&self, _message: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    struct NullBackups;
    impl BackupOps for NullBackups {
        fn world_backup(&self) -> Result<String> {
            Ok(String::new())
        }
        fn server_backup(&self) -> Result<String> {
            Ok(String::new())
        }
        fn cleanup_after_server_backup(&self) -> Result<String> {
            Ok(String::new())
        }
        fn prune_old_backups(&self) -> Result<String> {
            Ok(String::new())
        }
    }

    struct NullDowntime;
    impl DowntimeTracker for NullDowntime {
        fn record_stop_time(&self) -> Result<()> {
            Ok(())
        }
        fn record_start_time(&self) -> Result<()> {
            Ok(())
        }
        fn format_estimate(&self) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn test_engine() -> SchedulerEngine {
        SchedulerEngine::new(
            BackupSchedule {
                world_interval: 1,
                server_interval: 6,
                offset: 0,
            },
            Collaborators {
                server: Arc::new(NullServer),
                backups: Arc::new(NullBackups),
                downtime: Arc::new(NullDowntime),
            },
            Arc::new(TracingSink),
        )
    }

    async fn serve_one() -> (std::net::SocketAddr, CancellationToken, SchedulerEngine) {
        let engine = test_engine();
        engine.start().unwrap();

        let config = Config {
            rpc_port: 0,
            ..Config::default()
        };
        let listener = RpcListener::bind(&config, engine.clone()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let serve_cancel = cancel.clone();
        tokio::spawn(async move { listener.serve(serve_cancel).await });
        (addr, cancel, engine)
    }

    async fn call(addr: std::net::SocketAddr, request: Request) -> Response {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_request(&mut stream, &request).await.unwrap();
        stream.shutdown().await.unwrap();
        timeout(Duration::from_secs(2), read_response(&mut stream))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_status() {
        let (addr, cancel, _engine) = serve_one().await;

        let response = call(
            addr,
            Request::new(1, methods::GET_STATUS, serde_json::Value::Null),
        )
        .await;
        assert_eq!(response.id, 1);
        let result: StatusResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(result.status, SchedulerState::Running);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_get_jobs_carries_timestamps() {
        let (addr, cancel, _engine) = serve_one().await;

        let response = call(
            addr,
            Request::new(2, methods::GET_JOBS, serde_json::Value::Null),
        )
        .await;
        let jobs: Vec<JobEntry> = serde_json::from_value(response.result.unwrap()).unwrap();
        let server = jobs.iter().find(|j| j.id == "server-backup").unwrap();
        assert!(server.parsed_next_run().is_some());

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_advance_jobs_default_and_explicit_minutes() {
        let (addr, cancel, engine) = serve_one().await;
        let before = engine.jobs();

        let response = call(
            addr,
            Request::new(3, methods::ADVANCE_JOBS, serde_json::Value::Null),
        )
        .await;
        let result: AdvanceResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(
            result.advanced,
            before.iter().filter(|j| j.next_run_time.is_some()).count()
        );

        let response = call(
            addr,
            Request::new(4, methods::ADVANCE_JOBS, serde_json::json!({"minutes": 30})),
        )
        .await;
        assert!(response.error.is_none());

        // Default minutes (1) plus 30 explicit. A job the shift made due
        // fires and reschedules later, so only non-fired jobs are compared.
        let after = engine.jobs();
        for new in &after {
            let Some(old) = before.iter().find(|j| j.id == new.id) else {
                continue;
            };
            if let (Some(t0), Some(t1)) = (old.next_run_time, new.next_run_time)
                && t1 < t0
            {
                assert_eq!(t1, t0 - chrono::Duration::minutes(31));
            }
        }

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_unknown_method_is_an_error_response() {
        let (addr, cancel, _engine) = serve_one().await;

        let response = call(
            addr,
            Request::new(5, "open_pod_bay_doors", serde_json::Value::Null),
        )
        .await;
        assert_eq!(response.id, 5);
        let error = response.error.unwrap();
        assert!(error.message.contains("unknown method"));

        // The listener survives; a follow-up call still works
        let response = call(
            addr,
            Request::new(6, methods::GET_STATUS, serde_json::Value::Null),
        )
        .await;
        assert!(response.error.is_none());

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_stalled_client_does_not_wedge_listener() {
        let (addr, cancel, _engine) = serve_one().await;

        // Write a partial request and never close the write half
        let mut stalled = TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut stalled, b"{\"method\":")
            .await
            .unwrap();

        let response = timeout(READ_TIMEOUT * 2, read_response(&mut stalled))
            .await
            .unwrap()
            .unwrap();
        assert!(response.error.unwrap().message.contains("timed out"));

        // The accept loop moved on; the next client is served normally
        let response = call(
            addr,
            Request::new(7, methods::GET_STATUS, serde_json::Value::Null),
        )
        .await;
        assert!(response.error.is_none());

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error_response() {
        let (addr, cancel, _engine) = serve_one().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut stream, b"this is not json")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();
        let response = timeout(Duration::from_secs(2), read_response(&mut stream))
            .await
            .unwrap()
            .unwrap();
        assert!(response.error.unwrap().message.contains("malformed request"));

        cancel.cancel();
    }
}
