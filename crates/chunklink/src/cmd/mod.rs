use std::path::PathBuf;
use std::time::Duration;

use chunklink_transfer::{CancellationToken, TransferConfig};
use chunklink_transport::{Endpoint, LinkSettings, DEFAULT_BAUD_RATE};
use clap::{Args, Subcommand};

use crate::exit::{transport_error, CliError, CliResult, CANCELLED, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod receive;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a file to a receiver.
    Send(SendArgs),
    /// Receive one transfer and print it.
    Receive(ReceiveArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Receive(args) => receive::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Link and protocol options shared by `send` and `receive`.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial device, or `unix:<path>` for a Unix-socket link.
    #[arg(long, short = 'p', env = "CHUNKLINK_PORT")]
    pub port: String,
    /// Serial line speed.
    #[arg(long, env = "CHUNKLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Bound on a single link read (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub read_timeout: String,
    /// Ceiling on a frame's wire size in bytes.
    #[arg(long, env = "CHUNKLINK_MAX_FRAME_SIZE", default_value_t = 256)]
    pub max_frame_size: usize,
    /// Idle wait between polls of the link (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub poll_interval: String,
}

impl LinkArgs {
    pub fn endpoint(&self) -> CliResult<Endpoint> {
        self.port
            .parse()
            .map_err(|err| transport_error("invalid --port", err))
    }

    pub fn link_settings(&self) -> CliResult<LinkSettings> {
        Ok(LinkSettings {
            endpoint: self.endpoint()?,
            baud_rate: self.baud,
            read_timeout: parse_duration(&self.read_timeout)?,
        })
    }

    pub fn transfer_config(&self) -> CliResult<TransferConfig> {
        let config = TransferConfig {
            max_frame_size: self.max_frame_size,
            read_timeout: parse_duration(&self.read_timeout)?,
            poll_interval: parse_duration(&self.poll_interval)?,
            ack_timeout: None,
        };
        config
            .validate()
            .map_err(|err| CliError::new(USAGE, err.to_string()))?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// File to send. Read fully into memory before the transfer starts.
    pub file: PathBuf,
    #[command(flatten)]
    pub link: LinkArgs,
    /// Give up if an acknowledgement takes longer than this (e.g. 30s).
    /// Default: wait forever. Nothing is retransmitted either way.
    #[arg(long)]
    pub ack_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Parse the payload as `NAME p1 p2 ...` command lines and report the
    /// execution status of each.
    #[arg(long)]
    pub commands: bool,
    /// Command names to execute (comma-separated or repeated). Any other
    /// command is reported as an error. Implies `--commands`.
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub accept: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// How long SIGINT waits for the session to wind down before forcing exit.
pub(crate) const INTERRUPT_GRACE: Duration = Duration::from_millis(500);

/// Cancel `token` on SIGINT, then exit with 130 if the process is still
/// running after [`INTERRUPT_GRACE`] (e.g. stuck in a serial drain).
pub(crate) fn install_ctrlc_handler(token: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        token.cancel();
        std::thread::sleep(INTERRUPT_GRACE);
        eprintln!("exiting");
        std::process::exit(CANCELLED);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
