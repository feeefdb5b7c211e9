pub mod controller;
pub mod models;

pub use controller::HeaterShaker;
pub use models::{DeviceState, ShakeDirection, TemperatureReading};

use crate::protocol::{ProtocolError, ValidationError};
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum HhsError {
    /// The transport could not be opened, timed out, or failed mid-exchange.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A reply arrived but reported a device-side failure or did not
    /// match the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A caller-supplied parameter was out of range; nothing was sent.
    #[error("Invalid parameter: {0}")]
    Validation(#[from] ValidationError),

    /// The operation is not valid in the controller's current state.
    #[error("Invalid state: {0}")]
    State(String),

    /// During initialization, which step failed and why. The controller
    /// stays Connected so the caller can retry.
    #[error("Initialization failed at {step}: {source}")]
    InitializationStep {
        step: &'static str,
        #[source]
        source: Box<HhsError>,
    },

    /// Suppressed failures collected during shutdown. The transport is
    /// closed regardless.
    #[error("Shutdown completed with errors: {0:?}")]
    Shutdown(Vec<String>),
}

impl HhsError {
    /// True when the underlying cause is a read timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            HhsError::Transport(TransportError::Timeout) => true,
            HhsError::InitializationStep { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HhsError>;
