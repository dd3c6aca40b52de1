use std::io::{IsTerminal, Write};

use chunklink_transfer::{Command, CommandRecord, ReceiveReport, TransferReport};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SendOutput<'a> {
    endpoint: &'a str,
    #[serde(flatten)]
    report: &'a TransferReport,
}

#[derive(Serialize)]
struct ReceiveOutput<'a> {
    endpoint: &'a str,
    #[serde(flatten)]
    report: &'a ReceiveReport,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    commands: Option<&'a [CommandRecord]>,
}

pub fn print_send_report(endpoint: &str, report: &TransferReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SendOutput { endpoint, report };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ENDPOINT", "BYTES", "CHUNKS", "WIRE", "ACKS", "IGNORED", "MS"])
                .add_row(vec![
                    endpoint.to_string(),
                    report.total_bytes.to_string(),
                    report.chunks_sent.to_string(),
                    report.wire_bytes.to_string(),
                    report.acks_received.to_string(),
                    report.ignored_responses.to_string(),
                    report.elapsed_ms.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {} bytes to {} in {} chunks ({} wire bytes, {} ignored responses, {} ms)",
                report.total_bytes,
                endpoint,
                report.chunks_sent,
                report.wire_bytes,
                report.ignored_responses,
                report.elapsed_ms
            );
        }
        OutputFormat::Raw => {
            println!("{}", report.total_bytes);
        }
    }
}

pub fn print_received(
    endpoint: &str,
    payload: &[u8],
    report: &ReceiveReport,
    commands: Option<&[CommandRecord]>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = ReceiveOutput {
                endpoint,
                report,
                payload: payload_preview(payload),
                commands,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            match commands {
                Some(commands) => {
                    table.set_header(vec!["COMMAND", "PARAMETERS", "STATUS", "ERROR"]);
                    for record in commands {
                        table.add_row(vec![
                            record.command.name.clone(),
                            format_parameters(&record.command),
                            record.status.to_string(),
                            record.error.clone().unwrap_or_default(),
                        ]);
                    }
                }
                None => {
                    table
                        .set_header(vec!["ENDPOINT", "SIZE", "CHUNKS", "REJECTED", "PAYLOAD"])
                        .add_row(vec![
                            endpoint.to_string(),
                            report.received_bytes.to_string(),
                            report.chunks_accepted.to_string(),
                            report.chunks_rejected.to_string(),
                            payload_preview(payload),
                        ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "received {} bytes from {} in {} chunks ({} rejected)",
                report.received_bytes, endpoint, report.chunks_accepted, report.chunks_rejected
            );
            match commands {
                Some(commands) => {
                    for record in commands {
                        println!("{}", format_record(record));
                    }
                }
                None => println!("{}", payload_preview(payload)),
            }
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn format_parameters(command: &Command) -> String {
    command
        .parameters
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_record(record: &CommandRecord) -> String {
    let mut line = record.command.name.clone();
    let parameters = format_parameters(&record.command);
    if !parameters.is_empty() {
        line.push(' ');
        line.push_str(&parameters);
    }
    line.push_str(&format!(" [{}]", record.status));
    if let Some(error) = &record.error {
        line.push_str(&format!(": {error}"));
    }
    line
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
