use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod lobbies;
pub mod serve;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the lobby server until interrupted.
    Serve(ServeArgs),
    /// List lobbies on a server, optionally creating one first.
    Lobbies(LobbiesArgs),
    /// Print lobby changes pushed by a server.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Lobbies(args) => lobbies::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "POLYNET_BIND", default_value = "0.0.0.0:6969")]
    pub bind: SocketAddr,
    /// Time between liveness challenges (e.g. 2s, 500ms).
    #[arg(long, env = "POLYNET_CHALLENGE_INTERVAL", default_value = "2s")]
    pub challenge_interval: String,
    /// Time a peer has to answer a challenge (e.g. 1500ms).
    #[arg(long, env = "POLYNET_CHALLENGE_TIMEOUT", default_value = "1500ms")]
    pub challenge_timeout: String,
    /// Do not challenge peers. The challenge settings are ignored.
    #[arg(long)]
    pub no_liveness: bool,
}

#[derive(Args, Debug)]
pub struct LobbiesArgs {
    /// Server address.
    pub addr: SocketAddr,
    /// Register this player name before listing.
    #[arg(long)]
    pub name: Option<String>,
    /// Create a lobby with this many seats before listing.
    #[arg(long, value_name = "SEATS")]
    pub create: Option<u32>,
    /// Wait for each reply at most this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Server address.
    pub addr: SocketAddr,
    /// Player name to register. Pushes only go to registered players.
    #[arg(long)]
    pub name: Option<String>,
    /// Exit after printing N changes.
    #[arg(long)]
    pub count: Option<usize>,
    /// Wait for each reply at most this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(what: &str, input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, format!("{what} must not be empty")));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid {what}: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, format!("{what} must be greater than zero")));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Runtime for one command invocation.
pub fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start runtime: {err}")))
}
