//! RDP wire constants

use std::net::Ipv4Addr;
use std::time::Duration;

/// Protocol version string carried in every datagram
pub const RDP_VERSION_1_0: &str = "RDP_1.0";

/// UDP port the server listens on and the probe binds
pub const DEFAULT_PORT: u16 = 5050;

/// Multicast group used for discovery
pub const DEFAULT_DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// SYN period while searching
pub const SYNC_INTERVAL: Duration = Duration::from_millis(2000);

/// TEMP period once connected
pub const TEMP_INTERVAL: Duration = Duration::from_millis(1000);

/// Shortest SYN or TEMP period a session accepts
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Receive buffer size; ACKs are well under this
pub const MAX_DATAGRAM: usize = 4096;

pub const KEY_VERSION: &str = "RPVersion";
pub const KEY_SERIAL: &str = "RPSerial";
pub const KEY_EPOCH: &str = "RPEpoch";
pub const KEY_PAYLOAD: &str = "RPPayload";
pub const KEY_EVENT_TYPE: &str = "RPEventType";
pub const KEY_CHANNEL: &str = "RPChannel";
pub const KEY_VALUE: &str = "RPValue";
pub const KEY_META_TYPE: &str = "RPMetaType";

/// Payload event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    /// Probe announces itself (multicast)
    Syn = 1,
    /// Server accepts the probe
    Ack = 2,
    /// Channel readings
    Temp = 3,
}

impl EventType {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(EventType::Syn),
            2 => Some(EventType::Ack),
            3 => Some(EventType::Temp),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::Syn => "SYN",
            EventType::Ack => "ACK",
            EventType::Temp => "TEMP",
        };
        f.write_str(name)
    }
}

/// Channel meta types understood by the server
pub mod meta {
    /// Bean temperature
    pub const BEAN_TEMP: u16 = 3000;
    /// Mean environmental temperature
    pub const MET: u16 = 3002;
    /// Exhaust temperature
    pub const EXHAUST_TEMP: u16 = 3004;
    /// Ambient temperature
    pub const AMBIENT_TEMP: u16 = 3005;

    /// Every meta type the server recognises
    pub const ALL: [u16; 4] = [BEAN_TEMP, MET, EXHAUST_TEMP, AMBIENT_TEMP];
}
