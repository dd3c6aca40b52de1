//! Line-oriented commands carried as a transfer payload.
//!
//! Each non-blank line is `NAME p1 p2 ...`. Parameters are read as `f64`
//! until the first token that is not a number; the rest of the line is
//! dropped.
//!
//! [`CommandInterpreter`] dispatches parsed commands to handlers registered
//! by name and records an [`ExecutionStatus`] for each one.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CommandError;

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub name: String,
    pub parameters: Vec<f64>,
}

/// Parse a received payload into commands. Invalid UTF-8 is replaced lossily.
pub fn parse_commands(data: &[u8]) -> Vec<Command> {
    String::from_utf8_lossy(data)
        .lines()
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<Command> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?.to_string();
    let parameters = tokens.map_while(|t| t.parse::<f64>().ok()).collect();
    Some(Command { name, parameters })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotExecuted,
    Executed,
    Error,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::NotExecuted => "not_executed",
            ExecutionStatus::Executed => "executed",
            ExecutionStatus::Error => "error",
        })
    }
}

/// A command together with what happened when it was dispatched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRecord {
    #[serde(flatten)]
    pub command: Command,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandRecord {
    /// A record for a command that has not been dispatched yet.
    pub fn pending(command: Command) -> Self {
        Self {
            command,
            status: ExecutionStatus::NotExecuted,
            error: None,
        }
    }

    fn finish(&mut self, result: Result<(), CommandError>) {
        match result {
            Ok(()) => {
                self.status = ExecutionStatus::Executed;
                self.error = None;
            }
            Err(err) => {
                self.status = ExecutionStatus::Error;
                self.error = Some(err.to_string());
            }
        }
    }
}

/// Handler invoked for every command registered under its name.
pub type CommandHandler = Box<dyn FnMut(&Command) -> Result<(), CommandError> + Send>;

/// Name-to-handler dispatch for received commands.
///
/// Commands run in payload order. A command with no registered handler, or
/// whose handler returns an error, is recorded as [`ExecutionStatus::Error`];
/// later commands still run.
#[derive(Default)]
pub struct CommandInterpreter {
    handlers: HashMap<String, CommandHandler>,
    records: Vec<CommandRecord>,
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`, replacing any previous handler.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: FnMut(&Command) -> Result<(), CommandError> + Send + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Parse `data` and dispatch every command in it.
    pub fn execute(&mut self, data: &[u8]) -> &[CommandRecord] {
        self.execute_commands(parse_commands(data))
    }

    /// Dispatch already-parsed commands. Replaces the records of the previous run.
    pub fn execute_commands(&mut self, commands: Vec<Command>) -> &[CommandRecord] {
        self.records = commands.into_iter().map(CommandRecord::pending).collect();

        for record in &mut self.records {
            let name = record.command.name.as_str();
            let result = match self.handlers.get_mut(name) {
                Some(handler) => handler(&record.command),
                None => Err(CommandError::Unregistered(name.to_string())),
            };
            match &result {
                Ok(()) => debug!(command = name, "command executed"),
                Err(err) => warn!(command = name, error = %err, "command failed"),
            }
            record.finish(result);
        }

        &self.records
    }

    /// Records of the last run.
    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }
}

impl fmt::Debug for CommandInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("CommandInterpreter")
            .field("handlers", &names)
            .field("records", &self.records)
            .finish()
    }
}
