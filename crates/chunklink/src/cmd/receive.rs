use std::time::Duration;

use chunklink_transfer::{
    CancellationToken, Command, CommandError, CommandInterpreter, SessionError, TransferReceiver,
};
use chunklink_transport::{Endpoint, Link, LinkStream, SocketListener};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, ReceiveArgs};
use crate::exit::{session_error, transport_error, CliResult, CANCELLED, SUCCESS};
use crate::output::{print_received, OutputFormat};

pub fn run(args: ReceiveArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.transfer_config()?;
    let settings = args.link.link_settings()?;

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    // Socket endpoints are bound here and the sender connects; serial
    // endpoints have no such asymmetry.
    let listener;
    let mut link = match &settings.endpoint {
        Endpoint::Unix(path) => {
            listener =
                SocketListener::bind(path).map_err(|err| transport_error("bind failed", err))?;
            let Some(link) = accept(&listener, config.poll_interval, &cancel)? else {
                eprintln!("exiting");
                return Ok(CANCELLED);
            };
            link.set_read_timeout(Some(settings.read_timeout))
                .map_err(|err| transport_error("configure failed", err))?;
            link
        }
        Endpoint::Serial(_) => chunklink_transport::open(&settings)
            .map_err(|err| transport_error("open failed", err))?,
    };
    link.clear_input()
        .map_err(|err| transport_error("flush input failed", err))?;
    info!(endpoint = %settings.endpoint, transport = link.transport_name(), "link open");

    let mut receiver = TransferReceiver::new(link, &config)
        .map_err(|err| session_error("receiver setup failed", err))?;

    let payload = match receiver.run(&cancel) {
        Ok(payload) => payload,
        Err(SessionError::Cancelled) => {
            eprintln!("exiting");
            return Ok(CANCELLED);
        }
        Err(err) => return Err(session_error("receive failed", err)),
    };

    let mut interpreter = interpreter_for(&args.accept);
    let commands = if args.commands || !args.accept.is_empty() {
        Some(interpreter.execute(&payload))
    } else {
        None
    };
    print_received(
        &settings.endpoint.to_string(),
        &payload,
        &receiver.report(),
        commands,
        format,
    );
    Ok(SUCCESS)
}

fn interpreter_for(accept: &[String]) -> CommandInterpreter {
    let mut interpreter = CommandInterpreter::new();
    for name in accept {
        interpreter.register(name.clone(), execute_logged);
    }
    interpreter
}

fn execute_logged(command: &Command) -> Result<(), CommandError> {
    if let Some(bad) = command.parameters.iter().find(|p| !p.is_finite()) {
        return Err(CommandError::Failed(format!("non-finite parameter: {bad}")));
    }
    info!(command = %command.name, parameters = ?command.parameters, "command executed");
    Ok(())
}

fn accept(
    listener: &SocketListener,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> CliResult<Option<LinkStream>> {
    info!(path = ?listener.path(), "waiting for sender");
    while !cancel.is_cancelled() {
        if let Some(link) = listener
            .accept_timeout(poll_interval)
            .map_err(|err| transport_error("accept failed", err))?
        {
            return Ok(Some(link));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use chunklink_transfer::ExecutionStatus;

    use super::*;

    #[test]
    fn accepted_names_execute_and_others_fail() {
        let mut interpreter = interpreter_for(&["A0".to_string(), "B2".to_string()]);
        let records = interpreter.execute(b"A0 1 2
B2 inf
C3
");

        assert_eq!(records[0].status, ExecutionStatus::Executed);
        assert_eq!(records[1].status, ExecutionStatus::Error);
        assert_eq!(records[1].error.as_deref(), Some("non-finite parameter: inf"));
        assert_eq!(records[2].status, ExecutionStatus::Error);
        assert_eq!(
            records[2].error.as_deref(),
            Some("no callback registered for command: C3")
        );
    }
}
