use polynet::lobby::{DEFAULT_PORT, PROTOCOL_VERSION};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("polynet {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: polynet");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol_version: {PROTOCOL_VERSION}");
    println!("default_port: {DEFAULT_PORT}");
    println!(
        "build_target: {}",
        option_env!("POLYNET_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: peer={}, cli=true",
        cfg!(feature = "peer")
    );

    Ok(SUCCESS)
}
