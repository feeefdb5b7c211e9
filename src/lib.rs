//! Command protocol engine for the Hamilton Heater Shaker (HHS).
//!
//! Encodes device operations into the firmware's fixed-format ASCII
//! command strings, exchanges them over RS232 or the USB box transport,
//! parses the textual replies and tracks device state across the
//! initialize / operate / shutdown lifecycle.
//!
//! ```no_run
//! use std::time::Duration;
//! use hamilton_hhs::{ConnectionConfig, HeaterShaker};
//!
//! # fn main() -> hamilton_hhs::Result<()> {
//! let mut hs = HeaterShaker::new(ConnectionConfig::serial("/dev/ttyUSB0", 1))?;
//! hs.connect()?;
//! hs.initialize(Some(25.0))?;
//! hs.heat_shake(Duration::from_secs(300), 37.0, 800)?;
//! hs.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod protocol;
pub mod transport;

pub use device::{DeviceState, HeaterShaker, HhsError, ShakeDirection, TemperatureReading};
pub use transport::{ConnectionConfig, InterfaceKind, Transport};

pub type Result<T> = std::result::Result<T, HhsError>;
