use polynet::lobby::LobbyServer;
use polynet::peer::{LivenessConfig, LivenessRole, PeerConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cmd::{parse_duration, runtime, ServeArgs};
use crate::exit::{io_error, peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = server_config(&args)?;

    runtime()?.block_on(async move {
        let listener = LobbyServer::bind(args.bind, config)
            .await
            .map_err(|err| peer_error("bind failed", err))?;
        print_listening(listener.local_addr(), format);

        let shutdown = CancellationToken::new();
        let mut server = tokio::spawn(listener.serve(shutdown.clone()));

        let joined = tokio::select! {
            joined = &mut server => joined,
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                info!("interrupt received, shutting down");
                shutdown.cancel();
                server.await
            }
        };

        joined
            .map_err(|err| CliError::new(INTERNAL, format!("server task failed: {err}")))?
            .map_err(|err| peer_error("server failed", err))?;
        Ok::<_, CliError>(SUCCESS)
    })
}

fn server_config(args: &ServeArgs) -> CliResult<PeerConfig> {
    let liveness = if args.no_liveness {
        LivenessRole::Disabled
    } else {
        LivenessRole::Challenger(LivenessConfig {
            interval: parse_duration("challenge interval", &args.challenge_interval)?,
            timeout: parse_duration("challenge timeout", &args.challenge_timeout)?,
        })
    };

    let config = PeerConfig::server().with_liveness(liveness);
    config
        .validate()
        .map_err(|err| peer_error("invalid liveness settings", err))?;
    Ok(config)
}
