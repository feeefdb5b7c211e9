pub mod command;
pub mod limits;
pub mod response;

pub use command::{Command, OperationCode};
pub use limits::ValidationError;

/// Marker prefix for device-reported error codes inside a response line.
/// The firmware appends `er` followed by a two-digit code; `er00` means
/// the command was accepted.
pub const ERROR_MARKER: &str = "er";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Empty response to {op} command")]
    EmptyResponse { op: &'static str },

    #[error("Device reported error {code} for {op} command (response: {raw:?})")]
    DeviceError {
        op: &'static str,
        code: String,
        raw: String,
    },

    #[error("Malformed {op} response {raw:?}: {reason}")]
    Malformed {
        op: &'static str,
        raw: String,
        reason: String,
    },

    #[error("{op} command acknowledged but not confirmed: {reason}")]
    Unconfirmed {
        op: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
