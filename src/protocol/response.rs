//! Strict parsing of heater shaker response lines.
//!
//! A response is never guessed at: anything that does not match the
//! expected shape for the operation becomes a typed [`ProtocolError`]
//! carrying the operation name and the raw payload, so callers can tell
//! "the device reported an error" apart from "the reply was unreadable".

use super::{OperationCode, ProtocolError, Result, ERROR_MARKER};

/// Check an acknowledgement-only response: success iff the line is
/// non-empty and carries no device error code.
pub fn check_ack(op: OperationCode, raw: &str) -> Result<()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::EmptyResponse { op: op.code() });
    }
    if let Some(code) = find_error_code(trimmed) {
        if code != "00" {
            return Err(ProtocolError::DeviceError {
                op: op.code(),
                code,
                raw: trimmed.to_string(),
            });
        }
    }
    Ok(())
}

/// Parse an `RT` reply: `...rt{±tttt} {±tttt}...` carrying the middle
/// plate and edge temperatures in tenths of a degree.
pub fn parse_temperature(raw: &str) -> Result<(f64, f64)> {
    const OP: &str = "RT";
    let trimmed = raw.trim();

    let payload = trimmed.split("rt").nth(1).ok_or_else(|| ProtocolError::Malformed {
        op: OP,
        raw: trimmed.to_string(),
        reason: "missing rt segment".to_string(),
    })?;

    let mut values = payload.split_whitespace();
    let middle = parse_tenths(OP, trimmed, values.next())?;
    let edge = parse_tenths(OP, trimmed, values.next())?;
    Ok((middle, edge))
}

/// Parse an `RD` reply: the trailing digit is the shaking flag.
pub fn parse_shaking_status(raw: &str) -> Result<bool> {
    const OP: &str = "RD";
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::EmptyResponse { op: OP });
    }
    match trimmed.chars().last() {
        Some('1') => Ok(true),
        Some('0') => Ok(false),
        other => Err(ProtocolError::Malformed {
            op: OP,
            raw: trimmed.to_string(),
            reason: format!("unexpected status digit {:?}", other),
        }),
    }
}

/// Extract the echoed 4-digit command id, if the response carries one.
/// Used for debug correlation only, never for correctness.
pub fn parse_command_id(raw: &str) -> Option<u16> {
    let start = raw.find("id")? + 2;
    let digits = raw.get(start..start + 4)?;
    digits.parse().ok()
}

/// Locate the `er` marker followed by its two-digit code.
fn find_error_code(raw: &str) -> Option<String> {
    let start = raw.find(ERROR_MARKER)? + ERROR_MARKER.len();
    let code = raw.get(start..start + 2)?;
    if code.bytes().all(|b| b.is_ascii_digit()) {
        Some(code.to_string())
    } else {
        None
    }
}

fn parse_tenths(op: &'static str, raw: &str, token: Option<&str>) -> Result<f64> {
    let token = token.ok_or_else(|| ProtocolError::Malformed {
        op,
        raw: raw.to_string(),
        reason: "missing temperature field".to_string(),
    })?;
    let tenths: i32 = token.parse().map_err(|_| ProtocolError::Malformed {
        op,
        raw: raw.to_string(),
        reason: format!("non-numeric temperature field {:?}", token),
    })?;
    Ok(f64::from(tenths) / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_pair_parses() {
        let (middle, edge) = parse_temperature("T1RTid0001rt+0370 +0365").unwrap();
        assert_eq!(middle, 37.0);
        assert_eq!(edge, 36.5);
    }

    #[test]
    fn negative_temperatures_parse() {
        let (middle, edge) = parse_temperature("T1RTid0002rt-0010 +0005").unwrap();
        assert_eq!(middle, -1.0);
        assert_eq!(edge, 0.5);
    }

    #[test]
    fn missing_rt_segment_is_an_error() {
        let err = parse_temperature("T1RTid0001").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { op: "RT", .. }));
    }

    #[test]
    fn non_numeric_temperature_is_an_error() {
        assert!(parse_temperature("T1RTid0001rt+03x0 +0365").is_err());
        assert!(parse_temperature("T1RTid0001rt+0370").is_err());
    }

    #[test]
    fn shaking_status_digits() {
        assert!(parse_shaking_status("T1RDid00051").unwrap());
        assert!(!parse_shaking_status("T1RDid00050").unwrap());
    }

    #[test]
    fn shaking_status_rejects_other_values() {
        assert!(parse_shaking_status("T1RDid0005x").is_err());
        assert!(matches!(
            parse_shaking_status("  "),
            Err(ProtocolError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn ack_accepts_plain_echo() {
        assert!(check_ack(OperationCode::InitializeLock, "T1LIid0001").is_ok());
    }

    #[test]
    fn ack_accepts_er00() {
        assert!(check_ack(OperationCode::SetTemperature, "T1TAid0002er00").is_ok());
    }

    #[test]
    fn ack_rejects_empty_response() {
        let err = check_ack(OperationCode::StopShaking, "").unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyResponse { op: "SC" }));
    }

    #[test]
    fn ack_rejects_device_error_code() {
        let err = check_ack(OperationCode::InitializeShaker, "T1SIid0003er31").unwrap_err();
        match err {
            ProtocolError::DeviceError { op, code, .. } => {
                assert_eq!(op, "SI");
                assert_eq!(code, "31");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn command_id_extraction() {
        assert_eq!(parse_command_id("T1TAid0123ta0370"), Some(123));
        assert_eq!(parse_command_id("garbage"), None);
    }
}
