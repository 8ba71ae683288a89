//! The fixed set of fields tracked by the dashboard

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A sensor or actuator quantity backed by one path in the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorField {
    Temperature,
    Humidity,
    AirQuality,
    SmokeLevel,
    Distance,
    LedState,
    LedBrightness,
}

/// The JSON shape a field's remote value is expected to have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Boolean,
    /// Integer in 0..=100
    Percent,
}

impl SensorField {
    pub const ALL: [SensorField; 7] = [
        SensorField::Temperature,
        SensorField::Humidity,
        SensorField::AirQuality,
        SensorField::SmokeLevel,
        SensorField::Distance,
        SensorField::LedState,
        SensorField::LedBrightness,
    ];

    /// Field name as used in the remote store and the JSON API
    pub fn name(&self) -> &'static str {
        match self {
            SensorField::Temperature => "temperature",
            SensorField::Humidity => "humidity",
            SensorField::AirQuality => "airQuality",
            SensorField::SmokeLevel => "smokeLevel",
            SensorField::Distance => "distance",
            SensorField::LedState => "ledState",
            SensorField::LedBrightness => "ledBrightness",
        }
    }

    /// Remote store path the field is subscribed at
    pub fn path(&self) -> &'static str {
        match self {
            SensorField::Temperature => "/temperature",
            SensorField::Humidity => "/humidity",
            SensorField::AirQuality => "/airQuality",
            SensorField::SmokeLevel => "/smokeLevel",
            SensorField::Distance => "/distance",
            SensorField::LedState => "/led/state",
            SensorField::LedBrightness => "/led/brightness",
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            SensorField::LedState => ValueKind::Boolean,
            SensorField::LedBrightness => ValueKind::Percent,
            _ => ValueKind::Number,
        }
    }

    /// Display unit, empty for the actuator state
    pub fn unit(&self) -> &'static str {
        match self {
            SensorField::Temperature => "°C",
            SensorField::Humidity => "%",
            SensorField::AirQuality => "AQI",
            SensorField::SmokeLevel => "%",
            SensorField::Distance => "cm",
            SensorField::LedState => "",
            SensorField::LedBrightness => "%",
        }
    }

    pub fn from_path(path: &str) -> Option<SensorField> {
        SensorField::ALL.into_iter().find(|f| f.path() == path)
    }
}

impl fmt::Display for SensorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SensorField {
    type Err = crate::HomewatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| crate::HomewatchError::Config(format!("Unknown field: {}", s)))
    }
}
