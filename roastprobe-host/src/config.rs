//! Probe configuration file
//!
//! Every field has a default matching the production probe, so an empty
//! file (or no file at all) yields a working configuration:
//!
//! ```toml
//! serial = "12345"
//! transport = "rdp"
//!
//! [heater_curve]
//! points = [[0.8, 9.0], [2.1, 5.0], [2.9, 1.0]]
//!
//! [[channels]]
//! label = "Bean Temp"
//! kind = "bean_temperature"
//! ble_uuid = "4ac90001-0b71-11e8-b8f5-b827ebe1d493"
//! rdp_channel = 1
//! meta_type = 3000
//! ```
//!
//! Loading parses and then validates: a file that parses but describes an
//! impossible probe (a one-point curve, two channels on the same RDP number)
//! is rejected before anything starts.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use roastprobe_connectors::ble::{
    UUID_CHAR_HUMIDITY_1, UUID_CHAR_TEMP_1, UUID_CHAR_TEMP_2, UUID_CHAR_USER_1, UUID_CHAR_USER_2,
    UUID_CHAR_USER_3,
};
use roastprobe_connectors::rdp::protocol::{
    meta, DEFAULT_DISCOVERY_GROUP, DEFAULT_PORT, RDP_VERSION_1_0,
};
use roastprobe_connectors::SessionConfig;
use roastprobe_core::curve::{FAN_CURVE_POINTS, HEATER_CURVE_POINTS};
use roastprobe_core::sampler::MAX_CHANNELS;
use roastprobe_core::{CalibrationCurve, ChannelError, CurveError, ReadingKind, TelemetryChannel, TickDelta};
use serde::{Deserialize, Serialize};

/// Configuration errors, all fatal at startup
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{name} curve: {source}")]
    Curve {
        name: &'static str,
        #[source]
        source: CurveError,
    },

    #[error("channel '{label}': {source}")]
    Channel {
        label: String,
        #[source]
        source: ChannelError,
    },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("simulation: {0}")]
    Simulation(&'static str),

    #[error("serial number must not be empty")]
    EmptySerial,

    #[error("no channels configured")]
    NoChannels,

    #[error("{count} channels configured, at most {max} supported")]
    TooManyChannels { count: usize, max: usize },

    #[error("RDP channel {0} is used more than once")]
    DuplicateRdpChannel(u16),

    #[error("BLE characteristic {0} is used more than once")]
    DuplicateBleUuid(String),
}

/// Which transport publishes telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// RBP characteristic push over Bluetooth LE
    Ble,
    /// RDP datagrams over UDP
    #[default]
    Rdp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Ble => f.write_str("ble"),
            TransportKind::Rdp => f.write_str("rdp"),
        }
    }
}

/// `(delay_ms, level)` calibration points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurveConfig {
    pub points: Vec<[f64; 2]>,
}

impl CurveConfig {
    fn from_points(points: &[(f64, f64)]) -> Self {
        Self { points: points.iter().map(|&(d, l)| [d, l]).collect() }
    }

    pub fn build(&self, name: &'static str) -> Result<CalibrationCurve, ConfigError> {
        let points: Vec<(f64, f64)> = self.points.iter().map(|&[d, l]| (d, l)).collect();
        CalibrationCurve::new(&points).map_err(|source| ConfigError::Curve { name, source })
    }
}

fn default_heater_curve() -> CurveConfig {
    CurveConfig::from_points(&HEATER_CURVE_POINTS)
}

fn default_fan_curve() -> CurveConfig {
    CurveConfig::from_points(&FAN_CURVE_POINTS)
}

/// `[rdp]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RdpConfig {
    /// Server port, also the port the probe binds
    pub port: u16,
    pub discovery_group: Ipv4Addr,
    pub version: String,
    pub sync_interval_ms: u64,
    pub temp_interval_ms: u64,
}

impl Default for RdpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            discovery_group: DEFAULT_DISCOVERY_GROUP,
            version: RDP_VERSION_1_0.to_string(),
            sync_interval_ms: 2000,
            temp_interval_ms: 1000,
        }
    }
}

impl RdpConfig {
    /// Handshake session parameters for the probe with `serial`
    pub fn session_config(&self, serial: &str) -> SessionConfig {
        let mut config = SessionConfig::new(serial)
            .discovery(SocketAddr::V4(SocketAddrV4::new(self.discovery_group, self.port)))
            .port(self.port)
            .intervals(
                Duration::from_millis(self.sync_interval_ms),
                Duration::from_millis(self.temp_interval_ms),
            );
        config.version = self.version.clone();
        config
    }
}

/// `[simulation]` section: the simulated roaster and sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimulationConfig {
    /// Heater trigger delay after each zero-cross
    pub heater_delay_ms: f64,
    /// Fan trigger delay after each zero-cross
    pub fan_delay_ms: f64,
    pub line_frequency_hz: f64,
    /// Length of the simulated roast profile
    pub roast_duration_s: u64,
}

/// Line frequencies the phase simulator accepts
pub const LINE_FREQUENCY_RANGE_HZ: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            heater_delay_ms: 1.45,
            fan_delay_ms: 3.9,
            line_frequency_hz: 60.0,
            roast_duration_s: 900,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !LINE_FREQUENCY_RANGE_HZ.contains(&self.line_frequency_hz) {
            return Err(ConfigError::Simulation("line_frequency_hz must be between 1 and 1000"));
        }
        let half_cycle_ms = 500.0 / self.line_frequency_hz;
        for delay in [self.heater_delay_ms, self.fan_delay_ms] {
            if !(delay.is_finite() && (0.0..half_cycle_ms).contains(&delay)) {
                return Err(ConfigError::Simulation("trigger delays must fall within a half cycle"));
            }
        }
        Ok(())
    }
}

/// One `[[channels]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    pub label: String,
    pub kind: ReadingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ble_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdp_channel: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_type: Option<u16>,
}

impl ChannelConfig {
    fn new(label: &str, kind: ReadingKind, ble_uuid: &str, rdp: Option<(u16, Option<u16>)>) -> Self {
        Self {
            label: label.to_string(),
            kind,
            ble_uuid: Some(ble_uuid.to_string()),
            rdp_channel: rdp.map(|(channel, _)| channel),
            meta_type: rdp.and_then(|(_, meta)| meta),
        }
    }

    pub fn build(&self) -> Result<TelemetryChannel, ConfigError> {
        let wrap = |source| ConfigError::Channel { label: self.label.clone(), source };
        let mut channel = TelemetryChannel::new(&self.label, self.kind).map_err(wrap)?;
        if let Some(uuid) = &self.ble_uuid {
            channel = channel.with_ble_uuid(uuid).map_err(wrap)?;
        }
        if let Some(number) = self.rdp_channel {
            channel = channel.with_rdp(number, self.meta_type).map_err(wrap)?;
        }
        Ok(channel)
    }
}

/// Production channel table
///
/// CO2 goes out as density over BLE and as raw ppm over RDP, so it takes
/// two entries.
fn default_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig::new(
            "Bean Temp",
            ReadingKind::BeanTemperature,
            UUID_CHAR_TEMP_1,
            Some((1, Some(meta::BEAN_TEMP))),
        ),
        ChannelConfig::new(
            "Exhaust",
            ReadingKind::ExhaustTemperature,
            UUID_CHAR_TEMP_2,
            Some((2, Some(meta::EXHAUST_TEMP))),
        ),
        ChannelConfig::new("Humidity", ReadingKind::RelativeHumidity, UUID_CHAR_HUMIDITY_1, Some((3, None))),
        ChannelConfig::new("CO2", ReadingKind::Co2Density, UUID_CHAR_USER_1, None),
        ChannelConfig {
            label: "CO2 ppm".to_string(),
            kind: ReadingKind::Co2Ppm,
            ble_uuid: None,
            rdp_channel: Some(4),
            meta_type: None,
        },
        ChannelConfig::new("Heater Set", ReadingKind::HeaterPower, UUID_CHAR_USER_2, Some((5, None))),
        ChannelConfig::new("Fan Speed", ReadingKind::FanPower, UUID_CHAR_USER_3, Some((6, None))),
    ]
}

fn default_serial() -> String {
    "12345".to_string()
}

fn default_server_name() -> String {
    "RoastProbe".to_string()
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_reference_timeout_ms() -> u32 {
    200
}

/// Top-level probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Serial number reported over RDP and the BLE device info service
    #[serde(default = "default_serial")]
    pub serial: String,
    /// BLE peripheral name
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Zero-cross silence after which the roaster counts as off
    #[serde(default = "default_reference_timeout_ms")]
    pub reference_timeout_ms: u32,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_heater_curve")]
    pub heater_curve: CurveConfig,
    #[serde(default = "default_fan_curve")]
    pub fan_curve: CurveConfig,
    #[serde(default)]
    pub rdp: RdpConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            serial: default_serial(),
            server_name: default_server_name(),
            sample_interval_ms: default_sample_interval_ms(),
            reference_timeout_ms: default_reference_timeout_ms(),
            transport: TransportKind::default(),
            heater_curve: default_heater_curve(),
            fan_curve: default_fan_curve(),
            rdp: RdpConfig::default(),
            simulation: SimulationConfig::default(),
            channels: default_channels(),
        }
    }
}

impl ProbeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ProbeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.trim().is_empty() {
            return Err(ConfigError::EmptySerial);
        }
        for (name, value) in [
            ("sample_interval_ms", self.sample_interval_ms),
            ("reference_timeout_ms", u64::from(self.reference_timeout_ms)),
            ("rdp.sync_interval_ms", self.rdp.sync_interval_ms),
            ("rdp.temp_interval_ms", self.rdp.temp_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        self.simulation.validate()?;

        self.heater_curve()?;
        self.fan_curve()?;
        self.telemetry_channels()?;
        Ok(())
    }

    pub fn heater_curve(&self) -> Result<CalibrationCurve, ConfigError> {
        self.heater_curve.build("heater")
    }

    pub fn fan_curve(&self) -> Result<CalibrationCurve, ConfigError> {
        self.fan_curve.build("fan")
    }

    /// Build every channel, rejecting duplicate routes
    pub fn telemetry_channels(&self) -> Result<Vec<TelemetryChannel>, ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if self.channels.len() > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels { count: self.channels.len(), max: MAX_CHANNELS });
        }
        let mut rdp_numbers = HashSet::new();
        let mut uuids = HashSet::new();
        let mut channels = Vec::with_capacity(self.channels.len());

        for entry in &self.channels {
            let channel = entry.build()?;
            if let Some(number) = channel.rdp_channel() {
                if !rdp_numbers.insert(number) {
                    return Err(ConfigError::DuplicateRdpChannel(number));
                }
            }
            if let Some(uuid) = channel.ble_uuid() {
                if !uuids.insert(uuid.to_string()) {
                    return Err(ConfigError::DuplicateBleUuid(uuid.to_string()));
                }
            }
            channels.push(channel);
        }
        Ok(channels)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn reference_timeout(&self) -> TickDelta {
        TickDelta::from_millis(self.reference_timeout_ms)
    }
}
