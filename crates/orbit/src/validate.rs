//! Input validation at the gateway edge.
//!
//! Everything a client sends is untrusted. Requests that fail validation
//! get a 400 reply; fire-and-forget events that fail are dropped without
//! an answer, like any other bad event.

use orbit_protocol::{
    MAX_SIGNAL_MESSAGE_LEN, MEMBER_PALETTE, SessionCode, Signal,
};
use thiserror::Error;

/// Display names are capped at 20 characters, matching the join form.
pub const MAX_NAME_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must be 1-{MAX_NAME_LEN} characters")]
    InvalidName,

    #[error("color must be one of the member palette")]
    InvalidColor,

    #[error("session code must be 6 digits")]
    InvalidCode,

    #[error("signal message must be 1-{MAX_SIGNAL_MESSAGE_LEN} characters")]
    InvalidSignalMessage,

    #[error("coordinates out of range")]
    InvalidCoordinates,
}

/// Trims the name and requires 1..=20 characters after trimming.
pub fn member_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ValidationError::InvalidName);
    }
    Ok(trimmed.to_owned())
}

/// Requires an exact match against the fixed member palette.
pub fn member_color(raw: &str) -> Result<String, ValidationError> {
    if MEMBER_PALETTE.contains(&raw) {
        Ok(raw.to_owned())
    } else {
        Err(ValidationError::InvalidColor)
    }
}

/// Requires exactly 6 ASCII digits.
pub fn session_code(raw: &str) -> Result<SessionCode, ValidationError> {
    SessionCode::parse(raw).ok_or(ValidationError::InvalidCode)
}

/// Presets are always valid; a custom signal needs a non-blank message
/// of at most 100 characters.
pub fn signal(signal: &Signal) -> Result<(), ValidationError> {
    match signal.message() {
        Some(message) => {
            let len = message.chars().count();
            if message.trim().is_empty() || len > MAX_SIGNAL_MESSAGE_LEN {
                Err(ValidationError::InvalidSignalMessage)
            } else {
                Ok(())
            }
        }
        None => Ok(()),
    }
}

/// Requires finite coordinates inside the WGS84 range.
pub fn coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    if lat.is_finite() && lng.is_finite() && lat.abs() <= 90.0 && lng.abs() <= 180.0
    {
        Ok(())
    } else {
        Err(ValidationError::InvalidCoordinates)
    }
}
