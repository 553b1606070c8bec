//! Telemetry channels
//!
//! A channel is one published reading: what it measures ([`ReadingKind`]),
//! where it goes (a BLE characteristic, an RDP channel number, or both) and
//! the last value the sampler produced for it.
//!
//! Reading kinds form a closed set. Each kind knows whether it comes straight
//! from a sensor ([`Quantity`]), is derived from other sensor readings
//! (CO2 density), or is resolved from phase timing (heater and fan power).

use heapless::String;

use crate::errors::ChannelError;

/// Label capacity in bytes
pub const MAX_LABEL_LEN: usize = 24;

/// Canonical textual UUID length
pub const UUID_LEN: usize = 36;

/// Molar mass of CO2 (g/mol)
const CO2_MOLAR_MASS: f64 = 44.01;
/// Standard atmospheric pressure (Pa)
const STANDARD_PRESSURE_PA: f64 = 101_325.0;
/// Universal gas constant (J/(mol·K))
const GAS_CONSTANT: f64 = 8.314;
const KELVIN_OFFSET: f64 = 273.15;

/// Physical quantity a [`SensorSource`](crate::traits::SensorSource) can be
/// asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Quantity {
    /// Bean probe thermocouple (°C)
    Thermocouple,
    /// Exhaust air temperature from the CO2/humidity sensor (°C)
    ExhaustTemperature,
    /// Room temperature (°C)
    AmbientTemperature,
    /// Exhaust relative humidity (%)
    RelativeHumidity,
    /// Exhaust CO2 concentration (ppm)
    Co2Ppm,
}

/// Which load a phase-derived reading describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Load {
    /// Heating element, trigger A
    Heater,
    /// Blower, trigger B
    Fan,
}

/// What a channel publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadingKind {
    /// Bean probe (°C)
    BeanTemperature,
    /// Exhaust air (°C)
    ExhaustTemperature,
    /// Room (°C)
    AmbientTemperature,
    /// Exhaust humidity (%)
    RelativeHumidity,
    /// Exhaust CO2 (ppm)
    Co2Ppm,
    /// g/m³, derived from CO2 ppm and exhaust temperature
    Co2Density,
    /// Heater dial level
    HeaterPower,
    /// Fan dial level
    FanPower,
}

/// How the sampler obtains a value for a [`ReadingKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingSource {
    /// Ask the sensor source directly
    Sensor(Quantity),
    /// Combine CO2 ppm with exhaust temperature
    Co2Density,
    /// Resolve from edge timing
    Power(Load),
}

impl ReadingKind {
    /// Every kind, in the order the default channel table lists them
    pub const ALL: [ReadingKind; 8] = [
        ReadingKind::BeanTemperature,
        ReadingKind::ExhaustTemperature,
        ReadingKind::AmbientTemperature,
        ReadingKind::RelativeHumidity,
        ReadingKind::Co2Ppm,
        ReadingKind::Co2Density,
        ReadingKind::HeaterPower,
        ReadingKind::FanPower,
    ];

    /// Where the sampler gets this reading
    pub const fn source(&self) -> ReadingSource {
        match self {
            ReadingKind::BeanTemperature => ReadingSource::Sensor(Quantity::Thermocouple),
            ReadingKind::ExhaustTemperature => ReadingSource::Sensor(Quantity::ExhaustTemperature),
            ReadingKind::AmbientTemperature => ReadingSource::Sensor(Quantity::AmbientTemperature),
            ReadingKind::RelativeHumidity => ReadingSource::Sensor(Quantity::RelativeHumidity),
            ReadingKind::Co2Ppm => ReadingSource::Sensor(Quantity::Co2Ppm),
            ReadingKind::Co2Density => ReadingSource::Co2Density,
            ReadingKind::HeaterPower => ReadingSource::Power(Load::Heater),
            ReadingKind::FanPower => ReadingSource::Power(Load::Fan),
        }
    }

    /// Config-file spelling
    pub const fn name(&self) -> &'static str {
        match self {
            ReadingKind::BeanTemperature => "bean_temperature",
            ReadingKind::ExhaustTemperature => "exhaust_temperature",
            ReadingKind::AmbientTemperature => "ambient_temperature",
            ReadingKind::RelativeHumidity => "relative_humidity",
            ReadingKind::Co2Ppm => "co2_ppm",
            ReadingKind::Co2Density => "co2_density",
            ReadingKind::HeaterPower => "heater_power",
            ReadingKind::FanPower => "fan_power",
        }
    }

    /// Display unit
    pub const fn unit(&self) -> &'static str {
        match self {
            ReadingKind::BeanTemperature
            | ReadingKind::ExhaustTemperature
            | ReadingKind::AmbientTemperature => "°C",
            ReadingKind::RelativeHumidity => "%",
            ReadingKind::Co2Ppm => "ppm",
            ReadingKind::Co2Density => "g/m³",
            ReadingKind::HeaterPower | ReadingKind::FanPower => "level",
        }
    }
}

/// CO2 mass concentration (g/m³) at standard pressure
///
/// `ppm · M · P / (R · T) / 1e6` with `T` in kelvin.
pub fn co2_density(ppm: f64, temperature_c: f64) -> f64 {
    (ppm * CO2_MOLAR_MASS * STANDARD_PRESSURE_PA)
        / (GAS_CONSTANT * (temperature_c + KELVIN_OFFSET))
        / 1_000_000.0
}

/// One published reading and where it is routed
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryChannel {
    label: String<MAX_LABEL_LEN>,
    kind: ReadingKind,
    ble_uuid: Option<String<UUID_LEN>>,
    rdp_channel: Option<u16>,
    meta_type: Option<u16>,
    /// Value produced by the most recent cycle, `None` if absent
    pub last_value: Option<f64>,
}

impl TelemetryChannel {
    /// Channel with no transport routing yet
    pub fn new(label: &str, kind: ReadingKind) -> Result<Self, ChannelError> {
        let label = String::try_from(label).map_err(|_| ChannelError::LabelTooLong {
            len: label.len(),
            max: MAX_LABEL_LEN,
        })?;
        Ok(Self {
            label,
            kind,
            ble_uuid: None,
            rdp_channel: None,
            meta_type: None,
            last_value: None,
        })
    }

    /// Route to a BLE characteristic (stored lowercase)
    pub fn with_ble_uuid(mut self, uuid: &str) -> Result<Self, ChannelError> {
        let mut stored = String::new();
        for c in uuid.chars() {
            stored
                .push(c.to_ascii_lowercase())
                .map_err(|_| ChannelError::UuidTooLong { len: uuid.len(), max: UUID_LEN })?;
        }
        self.ble_uuid = Some(stored);
        Ok(self)
    }

    /// Route to a 1-based RDP channel, optionally tagged with a meta type
    pub fn with_rdp(mut self, channel: u16, meta_type: Option<u16>) -> Result<Self, ChannelError> {
        if channel == 0 {
            return Err(ChannelError::ZeroRdpChannel);
        }
        self.rdp_channel = Some(channel);
        self.meta_type = meta_type;
        Ok(self)
    }

    /// Human-readable name
    pub fn label(&self) -> &str {
        &self.label
    }

    /// What the channel publishes
    pub fn kind(&self) -> ReadingKind {
        self.kind
    }

    /// Lowercase characteristic UUID, if routed over BLE
    pub fn ble_uuid(&self) -> Option<&str> {
        self.ble_uuid.as_deref()
    }

    /// 1-based RDP channel, if routed over RDP
    pub fn rdp_channel(&self) -> Option<u16> {
        self.rdp_channel
    }

    /// `RPMetaType` sent with this channel
    pub fn meta_type(&self) -> Option<u16> {
        self.meta_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn co2_density_at_room_temperature() {
        // 1000 ppm at 25 °C is about 1.8 g/m³
        let density = co2_density(1000.0, 25.0);
        assert!((density - 1.799).abs() < 0.001, "got {density}");
    }

    #[test]
    fn co2_density_falls_with_temperature() {
        assert!(co2_density(800.0, 120.0) < co2_density(800.0, 20.0));
        assert_eq!(co2_density(0.0, 50.0), 0.0);
    }

    #[test]
    fn kinds_map_to_sources() {
        assert_eq!(
            ReadingKind::BeanTemperature.source(),
            ReadingSource::Sensor(Quantity::Thermocouple)
        );
        assert_eq!(ReadingKind::FanPower.source(), ReadingSource::Power(Load::Fan));
        assert_eq!(ReadingKind::Co2Density.source(), ReadingSource::Co2Density);
    }

    #[test]
    fn channel_routing() {
        let channel = TelemetryChannel::new("Bean Temp", ReadingKind::BeanTemperature)
            .unwrap()
            .with_ble_uuid("4AC90001-0B71-11E8-B8F5-B827EBE1D493")
            .unwrap()
            .with_rdp(1, Some(3000))
            .unwrap();

        assert_eq!(channel.label(), "Bean Temp");
        assert_eq!(channel.ble_uuid(), Some("4ac90001-0b71-11e8-b8f5-b827ebe1d493"));
        assert_eq!(channel.rdp_channel(), Some(1));
        assert_eq!(channel.meta_type(), Some(3000));
        assert_eq!(channel.last_value, None);
    }

    #[test]
    fn rejects_oversized_fields() {
        let err = TelemetryChannel::new("A label that is far too long to fit", ReadingKind::Co2Ppm);
        assert!(matches!(err, Err(ChannelError::LabelTooLong { max: MAX_LABEL_LEN, .. })));

        let err = TelemetryChannel::new("CO2", ReadingKind::Co2Ppm)
            .unwrap()
            .with_ble_uuid("4ac90001-0b71-11e8-b8f5-b827ebe1d493-extra");
        assert!(matches!(err, Err(ChannelError::UuidTooLong { .. })));
    }

    #[test]
    fn rdp_channels_start_at_one() {
        let err = TelemetryChannel::new("Fan", ReadingKind::FanPower).unwrap().with_rdp(0, None);
        assert_eq!(err, Err(ChannelError::ZeroRdpChannel));
    }
}
