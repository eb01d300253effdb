//! CLI argument definitions using clap
//!
//! Commands:
//! - dangerwatch serve [--config <path>] [--port <port>]
//! - dangerwatch join --email <email> --lat <lat> --lng <lng> [--config <path>]
//! - dangerwatch users [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dangerwatch - live danger levels shared between nearby participants
#[derive(Parser, Debug)]
#[command(name = "dangerwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the presence server
    Serve {
        /// Path to configuration file (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override server.port from the configuration
        #[arg(long)]
        port: Option<u16>,
    },

    /// Join as a participant; reads low/high/sos/move/quit from stdin
    Join {
        /// Participant identity
        #[arg(long)]
        email: Option<String>,

        /// Starting latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Starting longitude
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Path to configuration file (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the current presence snapshot and exit
    Users {
        /// Path to configuration file (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
