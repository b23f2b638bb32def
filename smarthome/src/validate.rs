use crate::errors::{Error, Result};
use crate::model::{CreateReadingRequest, NewReading};
use serde_json::Value;

pub const READING_NAME_MAX: usize = 50;
pub const DEVICE_NAME_MAX: usize = 32;

/// Validates a create body and coerces it into a [`NewReading`]
pub fn validate_reading(req: CreateReadingRequest) -> Result<NewReading> {
    let (name, temperature) = match (non_null(req.name), non_null(req.temperature)) {
        (Some(name), Some(temperature)) => (name, temperature),
        _ => {
            return Err(Error::Validation(
                "`name` and `temperature` are required".to_string(),
            ))
        }
    };

    let name = match name {
        Value::String(s) => s,
        other => {
            return Err(Error::Validation(format!(
                "`name` must be a string, got {}",
                other
            )))
        }
    };

    if name.chars().count() > READING_NAME_MAX {
        return Err(Error::Validation(format!(
            "`name` must be at most {} characters",
            READING_NAME_MAX
        )));
    }

    let temperature = coerce_float(&temperature).ok_or_else(|| {
        Error::Validation(format!("`temperature` is not a number: {}", temperature))
    })?;

    Ok(NewReading { name, temperature })
}

/// Validates a device name taken from provisioning configuration
pub fn validate_device_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("Device name cannot be empty".to_string()));
    }

    if name.chars().count() > DEVICE_NAME_MAX {
        return Err(Error::Validation(format!(
            "Device name {:?} exceeds {} characters",
            name, DEVICE_NAME_MAX
        )));
    }

    Ok(())
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn coerce_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.filter(|f| f.is_finite())
}
