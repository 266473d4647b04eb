pub mod args;
pub mod backup;
pub mod config;
pub mod daemon;
pub mod jobs;
pub mod schedule;
pub mod server;

pub use args::*;
