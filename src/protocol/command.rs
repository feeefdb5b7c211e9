use serde::{Deserialize, Serialize};

/// Firmware operations of the heater shaker, each mapping to a two-letter
/// command code on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationCode {
    InitializeLock,
    InitializeShaker,
    SetTemperature,
    GetTemperature,
    DeactivateHeating,
    StartShaking,
    StopShaking,
    WaitForStop,
    ShakingStatus,
    LockPlate,
}

impl OperationCode {
    pub fn code(self) -> &'static str {
        match self {
            OperationCode::InitializeLock => "LI",
            OperationCode::InitializeShaker => "SI",
            OperationCode::SetTemperature => "TA",
            OperationCode::GetTemperature => "RT",
            OperationCode::DeactivateHeating => "TO",
            OperationCode::StartShaking => "SB",
            OperationCode::StopShaking => "SC",
            OperationCode::WaitForStop => "SW",
            OperationCode::ShakingStatus => "RD",
            OperationCode::LockPlate => "LP",
        }
    }
}

/// One wire command: `T{index}{code}id{4-digit id}{key}{value}...`
///
/// Field order is significant; the firmware expects the fields of each
/// operation in a fixed order, so fields are rendered in the order they
/// were appended. Rendering is pure: the same inputs always yield a
/// byte-identical string.
#[derive(Debug, Clone)]
pub struct Command {
    index: u8,
    code: OperationCode,
    id: u16,
    fields: Vec<(&'static str, String)>,
}

impl Command {
    pub fn new(index: u8, code: OperationCode, id: u16) -> Self {
        Self {
            index,
            code,
            id,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((key, value.into()));
        self
    }

    pub fn code(&self) -> OperationCode {
        self.code
    }

    pub fn render(&self) -> String {
        let mut out = format!("T{}{}id{:04}", self.index, self.code.code(), self.id);
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(value);
        }
        out
    }
}

/// Temperature in tenths of a degree, zero-padded to 4 digits (37.0 -> "0370").
pub fn format_temperature(celsius: f64) -> String {
    format!("{:04}", (celsius * 10.0).round() as i32)
}

/// Speed in steps/second, zero-padded to 4 digits.
pub fn format_speed(steps_per_sec: u16) -> String {
    format!("{:04}", steps_per_sec)
}

/// Acceleration in increments/second, zero-padded to 5 digits.
pub fn format_acceleration(accel: u16) -> String {
    format!("{:05}", accel)
}

pub fn init_lock(index: u8, id: u16) -> Command {
    Command::new(index, OperationCode::InitializeLock, id)
}

pub fn init_shaker(index: u8, id: u16) -> Command {
    Command::new(index, OperationCode::InitializeShaker, id)
}

pub fn set_temperature(index: u8, id: u16, celsius: f64) -> Command {
    Command::new(index, OperationCode::SetTemperature, id)
        .field("ta", format_temperature(celsius))
}

pub fn get_temperature(index: u8, id: u16) -> Command {
    Command::new(index, OperationCode::GetTemperature, id)
}

pub fn deactivate_heating(index: u8, id: u16) -> Command {
    Command::new(index, OperationCode::DeactivateHeating, id)
}

pub fn start_shaking(index: u8, id: u16, direction: u8, speed: u16, accel: u16) -> Command {
    Command::new(index, OperationCode::StartShaking, id)
        .field("st", direction.to_string())
        .field("sv", format_speed(speed))
        .field("sr", format_acceleration(accel))
}

pub fn stop_shaking(index: u8, id: u16) -> Command {
    Command::new(index, OperationCode::StopShaking, id)
}

pub fn wait_for_stop(index: u8, id: u16) -> Command {
    Command::new(index, OperationCode::WaitForStop, id)
}

pub fn shaking_status(index: u8, id: u16) -> Command {
    Command::new(index, OperationCode::ShakingStatus, id)
}

pub fn lock_plate(index: u8, id: u16, locked: bool) -> Command {
    Command::new(index, OperationCode::LockPlate, id)
        .field("lp", if locked { "1" } else { "0" })
}
