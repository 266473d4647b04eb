//! Daemon module for background scheduler hosting.
//!
//! The CLI and a long-running `palisaded` process communicate over a small
//! TCP JSON protocol.
//!
//! ## Components
//!
//! - [`protocol`]: request/response types and bounded read-to-EOF framing
//! - [`listener`]: TCP listener dispatching methods into the engine
//! - [`client`]: one-connection-per-call client for the CLI
//! - [`lifecycle`]: PID file, ready marker, start/stop/health of the process

pub mod client;
pub mod lifecycle;
pub mod listener;
pub mod protocol;

pub use client::DaemonClient;
pub use lifecycle::{DaemonFiles, pid_alive, running_daemon_pid, start_daemon, stop_daemon};
pub use listener::RpcListener;
pub use protocol::*;
