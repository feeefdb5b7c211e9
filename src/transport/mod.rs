pub mod mock;
pub mod serial;
pub mod usb;

pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use usb::UsbTransport;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::limits;

/// Hamilton USB vendor id for the heater shaker box.
pub const HHS_USB_VID: u16 = 0x08AF;
/// Heater shaker box product id.
pub const HHS_USB_PID: u16 = 0x8002;

/// Fixed serial frame settings of the device: 9600 baud, 8N1.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands and responses are single ASCII lines with this terminator.
pub const LINE_TERMINATOR: &str = "\r\n";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Which physical interface carries the protocol. The wire content is
/// identical on both; only framing and addressing differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// Direct RS232 connection to a STAR.
    Serial,
    /// Standalone heater shaker box on USB.
    Usb,
}

impl InterfaceKind {
    /// Highest addressable device index on this connection kind.
    pub fn max_device_index(self) -> u8 {
        match self {
            InterfaceKind::Serial => limits::DIRECT_DEVICE_INDEX_MAX,
            InterfaceKind::Usb => limits::BOX_DEVICE_INDEX_MAX,
        }
    }
}

/// Immutable connection parameters, fixed at controller construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub name: String,
    pub interface: InterfaceKind,
    /// Serial port path; unused for USB connections.
    pub port_name: String,
    pub baud_rate: u32,
    /// Firmware address of the shaker unit (1-8 behind a box, 1-2 direct).
    pub device_index: u8,
    /// Which box to talk to when several are plugged in, by USB
    /// enumeration order. Ignored on serial connections.
    #[serde(default)]
    pub usb_box_position: usize,
    pub read_timeout: Duration,
}

impl ConnectionConfig {
    pub fn serial(port_name: impl Into<String>, device_index: u8) -> Self {
        Self {
            name: "Hamilton_HHS".to_string(),
            interface: InterfaceKind::Serial,
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            device_index,
            usb_box_position: 0,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn usb(device_index: u8) -> Self {
        Self {
            name: "Hamilton_HHS".to_string(),
            interface: InterfaceKind::Usb,
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            device_index,
            usb_box_position: 0,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_usb_box_position(mut self, position: usize) -> Self {
        self.usb_box_position = position;
        self
    }
}

/// Blocking line-oriented exchange with the device.
///
/// Both implementations expose identical timeout and error semantics so
/// the controller never branches on transport kind. The caller owns the
/// pacing: exactly one command is in flight at a time, because the
/// protocol has no multiplexing.
pub trait Transport: Send {
    fn open(&mut self) -> Result<()>;

    /// Send one command line; the terminator is appended here.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Block until one full response line arrives or the timeout elapses.
    /// The returned line is stripped of its terminator.
    fn read_line(&mut self, timeout: Duration) -> Result<String>;

    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_config_defaults_to_first_box() {
        let config = ConnectionConfig::usb(1);
        assert_eq!(config.usb_box_position, 0);
    }

    #[test]
    fn usb_box_position_is_configurable() {
        let config = ConnectionConfig::usb(3).with_usb_box_position(2);
        assert_eq!(config.usb_box_position, 2);
        assert_eq!(config.device_index, 3);
    }
}
