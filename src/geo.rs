use crate::models::Checkpoint;

/// Fixed-point checkpoint encoding accepted by the proof contract.
/// Coordinates are degrees scaled by 10^6, the planned time is whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedCheckpoint {
    pub lat_e6: i64,
    pub lon_e6: i64,
    pub planned_time_sec: i64,
}

/// An encoded checkpoint value does not fit the proof contract's integer range
#[derive(Debug, Clone, thiserror::Error)]
#[error("checkpoint out of range: {message}")]
pub struct RangeError {
    message: String,
}

impl RangeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Converts a checkpoint into the fixed-point form registered on chain.
///
/// Latitude and longitude are rounded after scaling; the planned time is
/// floored to whole seconds and must not be before the epoch. Pure and
/// deterministic, so a rejected checkpoint never costs a network call.
pub fn encode_checkpoint(checkpoint: &Checkpoint) -> Result<EncodedCheckpoint, RangeError> {
    let lat_e6 = scale_coordinate("latitude", checkpoint.latitude)?;
    let lon_e6 = scale_coordinate("longitude", checkpoint.longitude)?;

    let planned_time_sec = checkpoint.timestamp_millis.div_euclid(1000);
    if planned_time_sec < 0 {
        return Err(RangeError::new(format!(
            "planned time {}ms is before the epoch",
            checkpoint.timestamp_millis
        )));
    }

    Ok(EncodedCheckpoint {
        lat_e6,
        lon_e6,
        planned_time_sec,
    })
}

fn scale_coordinate(name: &str, degrees: f64) -> Result<i64, RangeError> {
    let scaled = (degrees * 1_000_000.0).round();

    // -(i64::MIN) as f64 is exactly 2^63; i64::MAX itself has no exact f64 form
    if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= -(i64::MIN as f64) {
        return Err(RangeError::new(format!(
            "{} {} does not fit the contract integer range",
            name, degrees
        )));
    }

    Ok(scaled as i64)
}
