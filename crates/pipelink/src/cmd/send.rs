use pipelink_frame::{DuplexChannel, Frame};
use pipelink_transport::PipeEndpoint;
use tokio_util::sync::CancellationToken;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT};

pub async fn run(args: SendArgs) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;

    let stream = tokio::time::timeout(timeout, PipeEndpoint::connect(&args.path))
        .await
        .map_err(|_| {
            CliError::new(
                TIMEOUT,
                format!("connect to {} timed out after {timeout:?}", args.path.display()),
            )
        })?
        .map_err(|err| transport_error("connect failed", err))?;

    let cancel = CancellationToken::new();
    let (_reader, mut writer) = DuplexChannel::new(stream).split();
    writer
        .write_frame(&Frame::new(args.title, args.message), &cancel)
        .await
        .map_err(|err| frame_error("send failed", err))?;

    Ok(SUCCESS)
}
