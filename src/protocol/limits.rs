//! Device specification constants and parameter range checks.
//!
//! These bounds are fixed protocol facts of the heater shaker hardware,
//! not user-tunable configuration. Every check runs before a command is
//! encoded; an out-of-range value is rejected, never clamped.

use thiserror::Error;

pub const TEMPERATURE_MIN_C: f64 = 0.0;
/// Upper heating bound. The vendor documentation also mentions 105 degC
/// in one place; the protocol table value is taken as authoritative.
pub const TEMPERATURE_MAX_C: f64 = 115.0;

/// Shaking speed bounds in steps/second.
pub const SPEED_MIN: u16 = 20;
pub const SPEED_MAX: u16 = 2000;

/// Shaking acceleration bounds in increments/second.
pub const ACCELERATION_MIN: u16 = 500;
pub const ACCELERATION_MAX: u16 = 10000;

/// Highest firmware address behind a USB box.
pub const BOX_DEVICE_INDEX_MAX: u8 = 8;
/// Highest firmware address on a direct STAR serial connection.
pub const DIRECT_DEVICE_INDEX_MAX: u8 = 2;

pub const DEVICE_INDEX_MIN: u8 = 1;

/// A caller-supplied parameter outside the device specification. Raised
/// before any transmission; the offending field, value and valid range
/// are all named so the caller can correct the input.
#[derive(Debug, Clone, Error)]
#[error("{field} {value} out of range, valid range is {min}..={max}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub min: String,
    pub max: String,
}

impl ValidationError {
    fn new(
        field: &'static str,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        Self {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

pub fn check_temperature(celsius: f64) -> Result<(), ValidationError> {
    if !(TEMPERATURE_MIN_C..=TEMPERATURE_MAX_C).contains(&celsius) {
        return Err(ValidationError::new(
            "temperature",
            celsius,
            TEMPERATURE_MIN_C,
            TEMPERATURE_MAX_C,
        ));
    }
    Ok(())
}

pub fn check_speed(steps_per_sec: u16) -> Result<(), ValidationError> {
    if !(SPEED_MIN..=SPEED_MAX).contains(&steps_per_sec) {
        return Err(ValidationError::new(
            "speed",
            steps_per_sec,
            SPEED_MIN,
            SPEED_MAX,
        ));
    }
    Ok(())
}

pub fn check_acceleration(accel: u16) -> Result<(), ValidationError> {
    if !(ACCELERATION_MIN..=ACCELERATION_MAX).contains(&accel) {
        return Err(ValidationError::new(
            "acceleration",
            accel,
            ACCELERATION_MIN,
            ACCELERATION_MAX,
        ));
    }
    Ok(())
}

/// `max_index` depends on the connection: [`BOX_DEVICE_INDEX_MAX`] behind
/// a USB box, [`DIRECT_DEVICE_INDEX_MAX`] on a direct serial connection.
pub fn check_device_index(index: u8, max_index: u8) -> Result<(), ValidationError> {
    if !(DEVICE_INDEX_MIN..=max_index).contains(&index) {
        return Err(ValidationError::new(
            "device_index",
            index,
            DEVICE_INDEX_MIN,
            max_index,
        ));
    }
    Ok(())
}
