//! Timestamped values observed for a field, and decoding of raw remote values

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HomewatchError, Result};
use crate::field::{SensorField, ValueKind};

/// A decoded, non-null remote value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Bool(bool),
    Number(f64),
}

impl ReadingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReadingValue::Number(n) => Some(*n),
            ReadingValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ReadingValue::Bool(b) => Some(*b),
            ReadingValue::Number(_) => None,
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Bool(b) => write!(f, "{}", b),
            ReadingValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A single value observed for one field
///
/// `value` is `None` while the field is loading, or when the remote value was
/// deleted or could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub field: SensorField,
    pub value: Option<ReadingValue>,
    pub observed_at_epoch_ms: u64,
}

impl Reading {
    pub fn new(field: SensorField, value: Option<ReadingValue>, observed_at_epoch_ms: u64) -> Self {
        Self {
            field,
            value,
            observed_at_epoch_ms,
        }
    }

    pub fn number(&self) -> Option<f64> {
        self.value.and_then(|v| v.as_f64())
    }

    pub fn boolean(&self) -> Option<bool> {
        self.value.and_then(|v| v.as_bool())
    }
}

/// Decode a raw remote value according to the field's expected kind.
///
/// JSON `null` (the path is absent or was deleted) decodes to `Ok(None)`.
/// Numeric strings are accepted for number fields, and `0`/`1` for the LED
/// state, since firmware commonly writes those.
pub fn decode_value(field: SensorField, raw: &Value) -> Result<Option<ReadingValue>> {
    if raw.is_null() {
        return Ok(None);
    }

    let malformed = |message: String| HomewatchError::MalformedValue { field, message };

    match field.value_kind() {
        ValueKind::Number => {
            let n = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match n {
                Some(n) if n.is_finite() => Ok(Some(ReadingValue::Number(n))),
                _ => Err(malformed(format!("expected a number, got {}", raw))),
            }
        }
        ValueKind::Boolean => match raw {
            Value::Bool(b) => Ok(Some(ReadingValue::Bool(*b))),
            Value::Number(n) if n.as_u64() == Some(0) => Ok(Some(ReadingValue::Bool(false))),
            Value::Number(n) if n.as_u64() == Some(1) => Ok(Some(ReadingValue::Bool(true))),
            _ => Err(malformed(format!("expected a boolean, got {}", raw))),
        },
        ValueKind::Percent => match raw.as_f64() {
            Some(n) if n.fract() == 0.0 && (0.0..=100.0).contains(&n) => {
                Ok(Some(ReadingValue::Number(n)))
            }
            _ => Err(malformed(format!(
                "expected an integer between 0 and 100, got {}",
                raw
            ))),
        },
    }
}

pub fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
