//! Fixed-Point Wire Codec
//!
//! Every value leaves the probe as a signed 32-bit little-endian integer
//! holding the physical reading times 100:
//!
//! ```text
//!   23.456 °C  ──×100──▶  2345.6  ──round──▶  2346  ──LE──▶  2A 09 00 00
//! ```
//!
//! Rounding is half away from zero (`libm::round`), so `0.005` becomes `1` and
//! `-0.005` becomes `-1`. A missing reading is sent as four zero bytes, which a
//! receiver cannot tell apart from a genuine `0.00`; the wire format has no
//! sentinel and this is accepted.
//!
//! Values whose scaled form does not fit an `i32` (about ±21.4 million) are a
//! defined error rather than a silent wrap. Callers in the sampling loop use
//! [`encode_or_absent`], which degrades such values to "absent" and logs.

use crate::errors::CodecError;

// Macro for optional logging
#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Scale between physical units and wire integers
pub const SCALE: f64 = 100.0;

/// Encoding of an absent reading
pub const ABSENT: [u8; 4] = [0; 4];

/// Scale and round a reading to its wire integer
pub fn to_fixed(value: f64) -> Result<i32, CodecError> {
    if !value.is_finite() {
        return Err(CodecError::NotFinite);
    }
    let scaled = libm::round(value * SCALE);
    if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
        return Err(CodecError::Overflow { value });
    }
    Ok(scaled as i32)
}

/// Encode an optional reading as 4 little-endian bytes
pub fn encode(value: Option<f64>) -> Result<[u8; 4], CodecError> {
    match value {
        None => Ok(ABSENT),
        Some(v) => Ok(to_fixed(v)?.to_le_bytes()),
    }
}

/// Decode 4 little-endian bytes back to a reading
pub fn decode(bytes: [u8; 4]) -> f64 {
    i32::from_le_bytes(bytes) as f64 / SCALE
}

/// Encode, substituting "absent" for values the wire cannot carry
pub fn encode_or_absent(value: Option<f64>) -> WireValue {
    match value.map(to_fixed).transpose() {
        Ok(fixed) => WireValue(fixed),
        Err(_err) => {
            log_warn!("Reading not representable on the wire ({}), sending as absent", _err);
            WireValue::ABSENT
        }
    }
}

/// A reading already scaled to its wire integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WireValue(pub Option<i32>);

impl WireValue {
    /// No reading this cycle
    pub const ABSENT: Self = Self(None);

    /// `true` for the all-zero "no value" encoding
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// The 4 bytes pushed to a BLE characteristic
    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.map_or(ABSENT, i32::to_le_bytes)
    }

    /// Value rounded to 0.01, or `None` when absent
    ///
    /// This is what JSON-based transports put on the wire.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.map(|fixed| fixed as f64 / SCALE)
    }
}

impl From<[u8; 4]> for WireValue {
    fn from(bytes: [u8; 4]) -> Self {
        Self(Some(i32::from_le_bytes(bytes)))
    }
}
