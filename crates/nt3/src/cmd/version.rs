use nt3_frame::{PROTOCOL_FAMILY, PROTOCOL_MAJOR, PROTOCOL_MINOR};
use nt3_transport::DEFAULT_PORT;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("nt3 {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    let protocol = format!("NT {PROTOCOL_MAJOR}.{PROTOCOL_MINOR} (family 0x{PROTOCOL_FAMILY:02x})");
    let features = format!(
        "pipeline={} async={}",
        cfg!(feature = "pipeline"),
        cfg!(feature = "async")
    );
    let rows = [
        ("protocol", protocol),
        ("default_port", DEFAULT_PORT.to_string()),
        ("target", build_env(option_env!("NT3_BUILD_TARGET"))),
        ("profile", build_env(option_env!("NT3_BUILD_PROFILE"))),
        ("features", features),
    ];
    for (key, value) in rows {
        println!("  {key:<13}{value}");
    }

    Ok(SUCCESS)
}

fn build_env(value: Option<&'static str>) -> String {
    value.unwrap_or("unknown").to_string()
}
