use polynet::lobby::{LobbyConnection, LobbyError};
use tracing::info;

use crate::cmd::{parse_duration, runtime, WatchArgs};
use crate::exit::{io_error, lobby_error, CliError, CliResult, SUCCESS};
use crate::output::{print_change, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration("timeout", &args.timeout)?;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| format!("watch-{}", std::process::id()));

    runtime()?.block_on(async move {
        let mut conn = LobbyConnection::connect(args.addr, timeout)
            .await
            .map_err(|err| lobby_error("connect failed", err))?;
        conn.register(&name)
            .await
            .map_err(|err| lobby_error("register failed", err))?;
        info!(name = %name, server = %conn.peer_addr(), "watching lobby changes");

        let mut printed = 0usize;
        while args.count.is_none_or(|count| printed < count) {
            let change = tokio::select! {
                change = conn.next_push() => change,
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|err| io_error("signal handler setup failed", err))?;
                    break;
                }
            };

            match change {
                Ok(change) => print_change(&change, format),
                Err(LobbyError::Closed(reason)) => {
                    info!(%reason, "server closed the connection");
                    return Ok(SUCCESS);
                }
                Err(err) => return Err(lobby_error("watch failed", err)),
            }
            printed = printed.saturating_add(1);
        }

        conn.close();
        conn.closed().await;
        Ok::<_, CliError>(SUCCESS)
    })
}
