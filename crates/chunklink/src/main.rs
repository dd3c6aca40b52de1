mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "chunklink", version, about = "Chunked file transfer over serial links")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "chunklink",
            "send",
            "commands.txt",
            "--port",
            "/dev/rfcomm0",
            "--max-frame-size",
            "64",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.link.max_frame_size, 64);
                assert_eq!(args.link.port, "/dev/rfcomm0");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_receive_with_commands() {
        let cli = Cli::try_parse_from([
            "chunklink",
            "--format",
            "json",
            "receive",
            "--port",
            "unix:/tmp/link.sock",
            "--commands",
        ])
        .expect("receive args should parse");

        match cli.command {
            Command::Receive(args) => assert!(args.commands),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_accepted_command_names() {
        let cli = Cli::try_parse_from([
            "chunklink",
            "receive",
            "--port",
            "/dev/ttyUSB0",
            "--accept",
            "A0,B2",
            "--accept",
            "HOME",
        ])
        .expect("receive args should parse");

        match cli.command {
            Command::Receive(args) => {
                assert_eq!(args.accept, ["A0", "B2", "HOME"]);
                assert!(!args.commands);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_requires_a_file() {
        let err = Cli::try_parse_from(["chunklink", "send", "--port", "/dev/ttyUSB0"])
            .expect_err("missing file should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
