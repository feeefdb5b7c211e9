use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shaking direction as encoded in the `st` field of the SB command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShakeDirection {
    #[default]
    Positive,
    Negative,
}

impl ShakeDirection {
    pub fn digit(self) -> u8 {
        match self {
            ShakeDirection::Positive => 0,
            ShakeDirection::Negative => 1,
        }
    }
}

/// One RT reading: the device reports the middle plate temperature and
/// the edge (peripheral) temperature separately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub middle_c: f64,
    pub edge_c: f64,
    pub taken_at: DateTime<Utc>,
}

/// In-memory snapshot of the device, owned exclusively by the controller
/// and mutated only by its methods after successful commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceState {
    pub connected: bool,
    pub initialized: bool,
    pub lock_initialized: bool,
    pub shaker_initialized: bool,
    pub plate_locked: bool,
    pub shaking: bool,
    pub target_temperature: Option<f64>,
    pub last_known_temperature: Option<f64>,
    pub last_reading_at: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Drop back to the disconnected state. Last temperature readings are
    /// kept; they describe the past, not the connection.
    pub fn reset(&mut self) {
        self.connected = false;
        self.initialized = false;
        self.lock_initialized = false;
        self.shaker_initialized = false;
        self.plate_locked = false;
        self.shaking = false;
        self.target_temperature = None;
    }

    pub fn record_reading(&mut self, reading: &TemperatureReading) {
        self.last_known_temperature = Some(reading.middle_c);
        self.last_reading_at = Some(reading.taken_at);
    }
}
