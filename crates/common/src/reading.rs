//! Decoding of inbound sensor readings.
//!
//! A reading is a flat JSON object with a `device_id`, a `timestamp` in epoch
//! seconds and any number of numeric metric fields:
//!
//! ```json
//! {"device_id":"device-1","temperature":25.5,"current":1,"timestamp":1703123456}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEVICE_ID_FIELD: &str = "device_id";
pub const TIMESTAMP_FIELD: &str = "timestamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    pub metrics: BTreeMap<String, f64>,
}

impl Reading {
    pub fn new(device_id: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp_ms,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn value(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }

    /// Encodes back into the wire shape, timestamp in whole seconds.
    pub fn to_payload(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(DEVICE_ID_FIELD.into(), Value::from(self.device_id.clone()));
        for (name, value) in &self.metrics {
            obj.insert(name.clone(), Value::from(*value));
        }
        obj.insert(TIMESTAMP_FIELD.into(), Value::from(self.timestamp_ms / 1000));
        Value::Object(obj)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReadingError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing or empty device_id")]
    MissingDeviceId,
    #[error("missing timestamp")]
    MissingTimestamp,
    #[error("timestamp is not a non-negative epoch-seconds number")]
    InvalidTimestamp,
    #[error("metric `{field}` is not numeric")]
    InvalidMetric { field: String },
}

pub fn decode_reading(payload: &[u8]) -> Result<Reading, ReadingError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| ReadingError::Json(e.to_string()))?;
    reading_from_value(value)
}

pub fn reading_from_value(value: Value) -> Result<Reading, ReadingError> {
    let Value::Object(mut obj) = value else {
        return Err(ReadingError::NotAnObject);
    };

    let device_id = match obj.remove(DEVICE_ID_FIELD) {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => return Err(ReadingError::MissingDeviceId),
    };

    let timestamp_ms = match obj.remove(TIMESTAMP_FIELD) {
        None | Some(Value::Null) => return Err(ReadingError::MissingTimestamp),
        Some(v) => parse_timestamp(&v)?,
    };

    let mut metrics = BTreeMap::new();
    for (field, v) in obj {
        let parsed = metric_value(&v).ok_or_else(|| ReadingError::InvalidMetric {
            field: field.clone(),
        })?;
        metrics.insert(field, parsed);
    }

    Ok(Reading {
        device_id,
        timestamp_ms,
        metrics,
    })
}

fn parse_timestamp(v: &Value) -> Result<i64, ReadingError> {
    let Value::Number(n) = v else {
        return Err(ReadingError::InvalidTimestamp);
    };
    if let Some(secs) = n.as_i64() {
        if secs < 0 {
            return Err(ReadingError::InvalidTimestamp);
        }
        return secs.checked_mul(1000).ok_or(ReadingError::InvalidTimestamp);
    }
    match n.as_f64() {
        Some(secs) if secs.is_finite() && secs >= 0.0 && secs < (i64::MAX / 1000) as f64 => {
            Ok((secs * 1000.0).round() as i64)
        }
        _ => Err(ReadingError::InvalidTimestamp),
    }
}

fn metric_value(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}
