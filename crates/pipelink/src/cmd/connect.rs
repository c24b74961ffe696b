use pipelink_service::{Initiator, SequenceSource, ServiceConfig};
use tokio_util::sync::CancellationToken;

use crate::cmd::{install_shutdown_handler, parse_duration, print_events, ConnectArgs};
use crate::exit::{service_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub async fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ServiceConfig {
        cadence: parse_duration(&args.cadence)?,
        ..ServiceConfig::default()
    };
    let source = Box::new(SequenceSource::new(args.title));

    let (initiator, events) = Initiator::new(&args.path, config, source);

    let cancel = CancellationToken::new();
    install_shutdown_handler(&cancel);

    let printer = tokio::spawn(print_events(
        events,
        format,
        args.count,
        cancel.clone(),
        "initiator",
    ));

    initiator
        .run(&cancel)
        .await
        .map_err(|err| service_error("initiator failed", err))?;
    let _ = printer.await;

    Ok(SUCCESS)
}
