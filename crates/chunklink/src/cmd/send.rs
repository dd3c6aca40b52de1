use std::fs;

use chunklink_transfer::{CancellationToken, SessionError, TransferSession};
use tracing::{debug, info};

use crate::cmd::{install_ctrlc_handler, parse_duration, SendArgs};
use crate::exit::{io_error, session_error, transport_error, CliResult, CANCELLED, SUCCESS};
use crate::output::{print_send_report, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;

    let mut config = args.link.transfer_config()?;
    config.ack_timeout = args.ack_timeout.as_deref().map(parse_duration).transpose()?;
    let settings = args.link.link_settings()?;

    let mut link =
        chunklink_transport::open(&settings).map_err(|err| transport_error("open failed", err))?;
    let stale = link
        .clear_input()
        .map_err(|err| transport_error("flush input failed", err))?;
    if stale > 0 {
        debug!(stale, "discarded stale input");
    }
    info!(
        endpoint = %settings.endpoint,
        transport = link.transport_name(),
        size = payload.len(),
        "link open"
    );

    let mut session = TransferSession::new(link, payload, &config)
        .map_err(|err| session_error("session setup failed", err))?;

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    match session.run(&cancel) {
        Ok(report) => {
            print_send_report(&settings.endpoint.to_string(), &report, format);
            Ok(SUCCESS)
        }
        Err(SessionError::Cancelled) => {
            eprintln!("exiting");
            Ok(CANCELLED)
        }
        Err(err) => Err(session_error("transfer failed", err)),
    }
}
