use polynet::lobby::LobbyConnection;
use tracing::info;

use crate::cmd::{parse_duration, runtime, LobbiesArgs};
use crate::exit::{lobby_error, CliError, CliResult, SUCCESS};
use crate::output::{print_lobbies, OutputFormat};

pub fn run(args: LobbiesArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration("timeout", &args.timeout)?;

    runtime()?.block_on(async move {
        let mut conn = LobbyConnection::connect(args.addr, timeout)
            .await
            .map_err(|err| lobby_error("connect failed", err))?;

        if let Some(name) = &args.name {
            conn.register(name)
                .await
                .map_err(|err| lobby_error("register failed", err))?;
            info!(name = %name, "registered");
        }

        if let Some(seats) = args.create {
            let id = conn
                .create_lobby(seats)
                .await
                .map_err(|err| lobby_error("create failed", err))?;
            info!(lobby = id, seats, "lobby created");
        }

        let lobbies = conn
            .list_lobbies()
            .await
            .map_err(|err| lobby_error("list failed", err))?;
        print_lobbies(&lobbies, format);

        conn.close();
        conn.closed().await;
        Ok::<_, CliError>(SUCCESS)
    })
}
