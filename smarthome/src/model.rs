use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored temperature reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    pub id: i32,
    pub name: String,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
}

/// A reading that passed validation and is ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub name: String,
    pub temperature: f64,
}

/// Raw create body. Fields stay loosely typed so that missing, null and
/// malformed values can all be reported as validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct CreateReadingRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
}

impl CreateReadingRequest {
    /// Only a JSON object is read field by field. Anything else, including
    /// arrays that serde would otherwise map onto the fields by position,
    /// is treated as an empty object.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(object @ Value::Object(_)) => serde_json::from_value(object).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

/// A switchable device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub status: bool,
}

/// Toggle response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceStatus {
    pub id: i32,
    pub status: bool,
}
