use std::fmt;

use serde::Serialize;

/// Sender-side session state.
///
/// `Idle -> AwaitingSizeAck -> Sending -> Complete`. `Sending` is re-entered
/// after every acknowledged chunk; `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    AwaitingSizeAck,
    Sending,
    Complete,
}

impl TransferState {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::AwaitingSizeAck => "awaiting_size_ack",
            TransferState::Sending => "sending",
            TransferState::Complete => "complete",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&TransferState::AwaitingSizeAck).unwrap();
        assert_eq!(json, "\"awaiting_size_ack\"");
        assert_eq!(TransferState::Complete.to_string(), "complete");
    }
}
