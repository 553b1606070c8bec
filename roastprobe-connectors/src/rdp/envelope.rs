//! Datagram envelope
//!
//! Every datagram is one JSON object:
//!
//! ```text
//! {
//!   "RPVersion": "RDP_1.0",
//!   "RPSerial":  "12345",
//!   "RPEpoch":   7,
//!   "RPPayload": "[{\"RPEventType\":3,\"RPChannel\":1,\"RPValue\":182.25}]"
//! }
//! ```
//!
//! `RPPayload` is the event array serialized to JSON *text* and embedded as a
//! string, i.e. encoded twice. The server expects exactly this.
//!
//! Inbound parsing is lenient where servers differ: the ACK event type may be
//! a number or a numeric string, and may sit at top level or as the first
//! event of the payload (which in turn may be an array or a JSON string).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::protocol::{
    EventType, KEY_EVENT_TYPE, KEY_PAYLOAD, KEY_SERIAL, KEY_VERSION,
};
use super::RdpError;

/// Outbound envelope
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    #[serde(rename = "RPVersion")]
    version: &'a str,
    #[serde(rename = "RPSerial")]
    serial: &'a str,
    #[serde(rename = "RPEpoch")]
    epoch: u64,
    #[serde(rename = "RPPayload")]
    payload: String,
}

/// Discovery announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynEvent {
    #[serde(rename = "RPEventType")]
    pub event_type: u8,
}

impl Default for SynEvent {
    fn default() -> Self {
        Self { event_type: EventType::Syn.code() }
    }
}

/// One channel reading
///
/// `value` is always serialized; an absent reading goes out as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempEvent {
    #[serde(rename = "RPEventType")]
    pub event_type: u8,
    #[serde(rename = "RPChannel")]
    pub channel: u16,
    #[serde(rename = "RPValue")]
    pub value: Option<f64>,
    #[serde(rename = "RPMetaType", default, skip_serializing_if = "Option::is_none")]
    pub meta_type: Option<u16>,
}

impl TempEvent {
    pub fn new(channel: u16, value: Option<f64>, meta_type: Option<u16>) -> Self {
        Self { event_type: EventType::Temp.code(), channel, value, meta_type }
    }
}

/// Serialize a complete datagram
pub fn encode_datagram<E: Serialize>(
    version: &str,
    serial: &str,
    epoch: u64,
    events: &[E],
) -> Result<Vec<u8>, RdpError> {
    let envelope = Envelope {
        version,
        serial,
        epoch,
        payload: serde_json::to_string(events)?,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Inbound envelope with the payload decoded
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram<E> {
    pub version: String,
    pub serial: String,
    pub epoch: u64,
    pub events: Vec<E>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "RPVersion")]
    version: String,
    #[serde(rename = "RPSerial")]
    serial: String,
    #[serde(rename = "RPEpoch")]
    epoch: u64,
    #[serde(rename = "RPPayload")]
    payload: String,
}

/// Parse a datagram produced by [`encode_datagram`]
pub fn decode_datagram<E: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<Datagram<E>, RdpError> {
    let raw: RawEnvelope = serde_json::from_slice(bytes)?;
    Ok(Datagram {
        version: raw.version,
        serial: raw.serial,
        epoch: raw.epoch,
        events: serde_json::from_str(&raw.payload)?,
    })
}

/// Why an inbound datagram was not accepted as an ACK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not a JSON object
    Malformed,
    /// `RPVersion` missing or different
    WrongVersion,
    /// `RPSerial` missing or addressed to another probe
    WrongSerial,
    /// Valid envelope carrying something other than an ACK
    NotAck,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Rejection::Malformed => "malformed JSON",
            Rejection::WrongVersion => "version mismatch",
            Rejection::WrongSerial => "serial mismatch",
            Rejection::NotAck => "not an ACK",
        };
        f.write_str(reason)
    }
}

/// Check whether `bytes` is an ACK addressed to this probe
pub fn validate_ack(bytes: &[u8], version: &str, serial: &str) -> Result<(), Rejection> {
    let packet: Value = serde_json::from_slice(bytes).map_err(|_| Rejection::Malformed)?;
    if !packet.is_object() {
        return Err(Rejection::Malformed);
    }
    if packet.get(KEY_VERSION).and_then(Value::as_str) != Some(version) {
        return Err(Rejection::WrongVersion);
    }
    if packet.get(KEY_SERIAL).and_then(Value::as_str) != Some(serial) {
        return Err(Rejection::WrongSerial);
    }

    let event_type = packet
        .get(KEY_EVENT_TYPE)
        .and_then(event_code)
        .or_else(|| first_payload_event_code(&packet));

    match event_type.and_then(EventType::from_code) {
        Some(EventType::Ack) => Ok(()),
        _ => Err(Rejection::NotAck),
    }
}

/// Event type as a number or a numeric string
fn event_code(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_payload_event_code(packet: &Value) -> Option<u64> {
    let payload = packet.get(KEY_PAYLOAD)?;
    let events = match payload {
        Value::String(text) => serde_json::from_str::<Value>(text).ok()?,
        other => other.clone(),
    };
    events.as_array()?.first()?.get(KEY_EVENT_TYPE).and_then(event_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    const V: &str = "RDP_1.0";
    const S: &str = "12345";

    #[test]
    fn payload_is_double_encoded() {
        let bytes = encode_datagram(V, S, 0, &[SynEvent::default()]).unwrap();
        let packet: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(packet["RPVersion"], "RDP_1.0");
        assert_eq!(packet["RPSerial"], "12345");
        assert_eq!(packet["RPEpoch"], 0);
        assert_eq!(packet["RPPayload"], Value::String(r#"[{"RPEventType":1}]"#.into()));
    }

    #[test]
    fn temp_event_fields() {
        let events = [
            TempEvent::new(1, Some(182.25), Some(3000)),
            TempEvent::new(2, None, None),
        ];
        let bytes = encode_datagram(V, S, 4, &events).unwrap();
        let packet: Value = serde_json::from_slice(&bytes).unwrap();
        let payload: Value = serde_json::from_str(packet["RPPayload"].as_str().unwrap()).unwrap();

        assert_eq!(payload[0]["RPEventType"], 3);
        assert_eq!(payload[0]["RPChannel"], 1);
        assert_eq!(payload[0]["RPValue"], 182.25);
        assert_eq!(payload[0]["RPMetaType"], 3000);
        assert_eq!(payload[1]["RPValue"], Value::Null);
        assert!(payload[1].get("RPMetaType").is_none());

        let decoded: Datagram<TempEvent> = decode_datagram(&bytes).unwrap();
        assert_eq!(decoded.epoch, 4);
        assert_eq!(decoded.events, events);
    }

    #[test]
    fn ack_with_numeric_event_type() {
        let ack = br#"{"RPVersion":"RDP_1.0","RPSerial":"12345","RPEventType":2}"#;
        assert_eq!(validate_ack(ack, V, S), Ok(()));
    }

    #[test]
    fn ack_with_string_event_type() {
        let ack = br#"{"RPVersion":"RDP_1.0","RPSerial":"12345","RPEventType":"2"}"#;
        assert_eq!(validate_ack(ack, V, S), Ok(()));
    }

    #[test]
    fn ack_inside_payload() {
        let as_string =
            br#"{"RPVersion":"RDP_1.0","RPSerial":"12345","RPEpoch":0,"RPPayload":"[{\"RPEventType\":2}]"}"#;
        assert_eq!(validate_ack(as_string, V, S), Ok(()));

        let as_array =
            br#"{"RPVersion":"RDP_1.0","RPSerial":"12345","RPPayload":[{"RPEventType":"2"}]}"#;
        assert_eq!(validate_ack(as_array, V, S), Ok(()));
    }

    #[test]
    fn rejections() {
        assert_eq!(validate_ack(b"not json", V, S), Err(Rejection::Malformed));
        assert_eq!(validate_ack(b"[2]", V, S), Err(Rejection::Malformed));
        assert_eq!(
            validate_ack(br#"{"RPVersion":"RDP_2.0","RPSerial":"12345","RPEventType":2}"#, V, S),
            Err(Rejection::WrongVersion)
        );
        assert_eq!(
            validate_ack(br#"{"RPVersion":"RDP_1.0","RPSerial":"99999","RPEventType":2}"#, V, S),
            Err(Rejection::WrongSerial)
        );
        assert_eq!(
            validate_ack(br#"{"RPVersion":"RDP_1.0","RPSerial":"12345","RPEventType":1}"#, V, S),
            Err(Rejection::NotAck)
        );
        assert_eq!(
            validate_ack(br#"{"RPVersion":"RDP_1.0","RPSerial":"12345"}"#, V, S),
            Err(Rejection::NotAck)
        );
        // Our own SYN echoed back by multicast loopback
        let syn = encode_datagram(V, S, 0, &[SynEvent::default()]).unwrap();
        assert_eq!(validate_ack(&syn, V, S), Err(Rejection::NotAck));
    }
}
