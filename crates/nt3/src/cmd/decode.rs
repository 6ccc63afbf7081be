use futures_util::StreamExt;
use nt3_frame::{FrameConfig, Nt3Codec};
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_event, OutputFormat};

pub async fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = FrameConfig::default();
    if let Some(max) = args.max_field_len {
        if max == 0 {
            return Err(CliError::new(USAGE, "--max-field-len must be greater than zero"));
        }
        config.max_field_len = max;
    }

    let file = tokio::fs::File::open(&args.path)
        .await
        .map_err(|err| io_error(&format!("open {} failed", args.path.display()), err))?;
    let mut frames = FramedRead::new(file, Nt3Codec::with_config(config));

    let mut decoded = 0usize;
    while let Some(event) = frames.next().await {
        let event = event.map_err(|err| {
            frame_error(&format!("decode failed after {decoded} events"), err)
        })?;
        print_event(&event, format);
        decoded = decoded.saturating_add(1);
    }

    debug!(decoded, path = %args.path.display(), "capture decoded");
    Ok(SUCCESS)
}
