//! CLI module for dangerwatch
//!
//! Provides command-line interface for:
//! - serve: Run the presence server
//! - join: Interactive participant session
//! - users: One-shot snapshot fetch

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{join, parse_join_command, run, run_command, serve, users, JoinCommand};
pub use config::{ClientConfig, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
