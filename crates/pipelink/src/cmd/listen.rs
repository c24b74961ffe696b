use pipelink_service::{Listener, ServiceConfig, StaticSource};
use tokio_util::sync::CancellationToken;

use crate::cmd::{install_shutdown_handler, parse_duration, print_events, ListenArgs};
use crate::exit::{service_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ServiceConfig {
        cadence: parse_duration(&args.cadence)?,
        ..ServiceConfig::default()
    };
    let source = Box::new(StaticSource::new(args.title, args.message));

    let (listener, events) =
        Listener::bind(&args.path, config, source).map_err(|err| service_error("bind failed", err))?;

    let cancel = CancellationToken::new();
    install_shutdown_handler(&cancel);

    let printer = tokio::spawn(print_events(
        events,
        format,
        args.count,
        cancel.clone(),
        "listener",
    ));

    listener
        .run(&cancel)
        .await
        .map_err(|err| service_error("listener failed", err))?;
    let _ = printer.await;

    Ok(SUCCESS)
}
