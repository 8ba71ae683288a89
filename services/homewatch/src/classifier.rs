//! Threshold-based status classification and alert rules

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{AlertConfig, ClassifierConfig};
use crate::field::SensorField;
use crate::reading::Reading;

/// Severity of a reading relative to its threshold profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Loading,
    Safe,
    Warning,
    Danger,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Loading => write!(f, "Loading"),
            Status::Safe => write!(f, "Safe"),
            Status::Warning => write!(f, "Warning"),
            Status::Danger => write!(f, "Danger"),
        }
    }
}

/// Upper bounds of the safe and warning tiers for one field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub safe_upper_bound: f64,
    pub warning_upper_bound: f64,
}

impl ThresholdProfile {
    pub const fn new(safe_upper_bound: f64, warning_upper_bound: f64) -> Self {
        Self {
            safe_upper_bound,
            warning_upper_bound,
        }
    }
}

/// Status assigned to values at or above the warning bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Danger,
    Warning,
}

/// Classify a numeric value against a profile.
///
/// Returns `None` when the field has no profile (display-only field).
pub fn classify(
    value: Option<f64>,
    profile: Option<&ThresholdProfile>,
    overflow: OverflowPolicy,
) -> Option<Status> {
    let profile = profile?;
    let Some(value) = value else {
        return Some(Status::Loading);
    };

    let status = if value < profile.safe_upper_bound {
        Status::Safe
    } else if value < profile.warning_upper_bound {
        Status::Warning
    } else {
        match overflow {
            OverflowPolicy::Danger => Status::Danger,
            OverflowPolicy::Warning => Status::Warning,
        }
    };
    Some(status)
}

/// True when something is closer than the threshold (strictly below)
pub fn proximity_alert(distance_cm: Option<f64>, threshold_cm: f64) -> bool {
    distance_cm.is_some_and(|d| d < threshold_cm)
}

/// True when smoke exceeds the threshold (strictly above)
pub fn fire_alert(smoke_percent: Option<f64>, threshold_percent: f64) -> bool {
    smoke_percent.is_some_and(|s| s > threshold_percent)
}

/// Default profiles for the sensor fields
pub fn default_profiles() -> BTreeMap<SensorField, ThresholdProfile> {
    BTreeMap::from([
        (SensorField::Temperature, ThresholdProfile::new(25.0, 30.0)),
        (SensorField::Humidity, ThresholdProfile::new(50.0, 70.0)),
        (SensorField::AirQuality, ThresholdProfile::new(50.0, 80.0)),
        (SensorField::SmokeLevel, ThresholdProfile::new(20.0, 50.0)),
    ])
}

/// Derived alert flags for the current snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alerts {
    pub proximity: bool,
    pub fire: bool,
}

/// Profiles, overflow policy and alert thresholds bundled for reads
#[derive(Debug, Clone)]
pub struct Classifier {
    profiles: BTreeMap<SensorField, ThresholdProfile>,
    overflow: OverflowPolicy,
    alerts: AlertConfig,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig, alerts: &AlertConfig) -> Self {
        Self {
            profiles: config.thresholds.clone(),
            overflow: config.overflow,
            alerts: alerts.clone(),
        }
    }

    pub fn profile(&self, field: SensorField) -> Option<&ThresholdProfile> {
        self.profiles.get(&field)
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// Status for a field given its latest reading, if the field has a profile
    pub fn status(&self, field: SensorField, reading: Option<&Reading>) -> Option<Status> {
        classify(
            reading.and_then(|r| r.number()),
            self.profile(field),
            self.overflow,
        )
    }

    pub fn alerts(&self, distance: Option<&Reading>, smoke: Option<&Reading>) -> Alerts {
        Alerts {
            proximity: proximity_alert(
                distance.and_then(|r| r.number()),
                self.alerts.proximity_threshold_cm,
            ),
            fire: fire_alert(
                smoke.and_then(|r| r.number()),
                self.alerts.fire_threshold_percent,
            ),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default(), &AlertConfig::default())
    }
}
