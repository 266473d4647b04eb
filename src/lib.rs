//! Palisade - unattended game-server host manager.
//!
//! Runs periodic world and full-server backups against a live dedicated
//! server, announces disruptive backups to connected players in advance, and
//! exposes the scheduler inside a background daemon to the `palisade` CLI
//! through a small TCP JSON protocol.

pub mod backup;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod downtime;
pub mod error;
pub mod output;
pub mod scheduler;
pub mod server_ctl;

pub use error::{PalisadeError, Result};
