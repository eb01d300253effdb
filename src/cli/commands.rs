//! CLI command implementations
//!
//! `serve` runs the presence server. `join` drives one participant session
//! from stdin. `users` fetches the current snapshot once.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::{ChannelNotice, ManualLocation, Session, StaticIdentity};
use crate::http_server::HttpServer;
use crate::observability::{log_event, log_event_with_fields, Event, Logger, MetricsRegistry};
use crate::presence::{AlertLevel, LocationUpdate, Position, PresenceRegistry};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::Join {
            email,
            lat,
            lng,
            config,
        } => join(config.as_deref(), email.as_deref(), Position::new(lat, lng)),
        Command::Users { config } => users(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<Config> {
    let config = Config::load(path)?;
    Logger::set_min_severity(config.severity()?);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[(
            "path",
            &path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<defaults>".to_string()),
        )],
    );
    Ok(config)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Run the presence server until Ctrl-C
pub fn serve(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    log_event(Event::ServerStart);
    let mut config = load_config(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let registry = Arc::new(PresenceRegistry::new(
        config.presence.clone(),
        Arc::new(MetricsRegistry::new()),
    ));

    let rt = runtime()?;
    rt.block_on(async {
        HttpServer::new(config.server.clone(), registry)
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// One line of `join` input
#[derive(Debug, Clone, PartialEq)]
pub enum JoinCommand {
    Level(AlertLevel),
    Sos,
    /// Set the position reported by the next SOS
    Move(Position),
    Quit,
}

/// Parse one stdin line. Blank lines yield `Ok(None)`.
pub fn parse_join_command(line: &str) -> Result<Option<JoinCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "sos" => JoinCommand::Sos,
        "quit" | "exit" => JoinCommand::Quit,
        "move" => {
            let lat = parts.next().and_then(|s| s.parse::<f64>().ok());
            let lng = parts.next().and_then(|s| s.parse::<f64>().ok());
            let (Some(lat), Some(lng)) = (lat, lng) else {
                return Err("usage: move <lat> <lng>".to_string());
            };
            let position = Position::new(lat, lng);
            position.validate().map_err(|e| e.to_string())?;
            JoinCommand::Move(position)
        }
        other => JoinCommand::Level(other.parse::<AlertLevel>().map_err(|e| e.to_string())?),
    };

    if parts.next().is_some() {
        return Err(format!("unexpected arguments after '{}'", word));
    }
    Ok(Some(command))
}

/// Join as a participant and print a frame after every change
pub fn join(config_path: Option<&Path>, email: Option<&str>, start: Position) -> CliResult<()> {
    start
        .validate()
        .map_err(|e| CliError::invalid_argument(e.to_string()))?;
    let config = load_config(config_path)?;

    let rt = runtime()?;
    rt.block_on(async {
        let producer = ManualLocation::new(Some(start));
        let publisher = config.client.publisher()?;
        let mut session = Session::new(
            &StaticIdentity::new(email),
            Arc::new(producer.clone()),
            Arc::new(publisher),
            config.client.session_options(),
        )?;

        session.start().await?;
        write_response(session.render())?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut channel_open = true;

        loop {
            tokio::select! {
                notice = session.next_notice(), if channel_open => match notice {
                    Some(ChannelNotice::Snapshot(_)) => write_response(session.render())?,
                    Some(ChannelNotice::Disconnected(reason)) => {
                        write_error(CliErrorCode::RequestFailed.code(), &reason)?
                    }
                    Some(ChannelNotice::Connected) => {}
                    None => channel_open = false,
                },
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_join_command(&line) {
                        Ok(None) => {}
                        Ok(Some(JoinCommand::Quit)) => break,
                        Ok(Some(JoinCommand::Level(level))) => {
                            session.select_alert_level(level).await?;
                            write_response(session.render())?;
                        }
                        Ok(Some(JoinCommand::Sos)) => {
                            session.sos().await?;
                            write_response(session.render())?;
                        }
                        Ok(Some(JoinCommand::Move(position))) => producer.set(Some(position)),
                        Err(message) => {
                            write_error(CliErrorCode::InvalidArgument.code(), &message)?
                        }
                    }
                }
            }
        }

        session.end().await?;
        // Let the last spawned write reach the server before the runtime stops
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<(), CliError>(())
    })
}

/// Fetch and print the current snapshot
pub fn users(config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let url = format!("{}/api/users", config.client.server_url.trim_end_matches('/'));
    let timeout = Duration::from_millis(config.client.publish_timeout_ms);

    let rt = runtime()?;
    let users: Vec<LocationUpdate> = rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CliError::request_failed(e.to_string()))?;
        client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CliError::request_failed(e.to_string()))?
            .json()
            .await
            .map_err(|e| CliError::request_failed(e.to_string()))
    })?;

    write_response(users)
}
