mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "polynet", version, about = "Lobby server and client for the polynet transport")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_defaults() {
        let cli = Cli::try_parse_from(["polynet", "serve"]).expect("serve args should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind.port(), 6969);
        assert!(!args.no_liveness);
    }

    #[test]
    fn parses_lobbies_with_create() {
        let cli = Cli::try_parse_from([
            "polynet",
            "lobbies",
            "127.0.0.1:6969",
            "--name",
            "ada",
            "--create",
            "4",
            "--format",
            "json",
        ])
        .expect("lobbies args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        let Command::Lobbies(args) = cli.command else {
            panic!("expected lobbies");
        };
        assert_eq!(args.create, Some(4));
        assert_eq!(args.name.as_deref(), Some("ada"));
    }

    #[test]
    fn rejects_bad_address() {
        let err = Cli::try_parse_from(["polynet", "watch", "not-an-addr"])
            .expect_err("address should be validated");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
