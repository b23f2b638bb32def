use rand::Rng;
use serde::{Deserialize, Serialize};

/// Body posted to `/api/temperatures`
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub name: String,
    pub temperature: f64,
}

/// Entry returned by `/api/devices`
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub status: bool,
}

/// Entry returned by `/api/device/{id}/toggle`
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStatus {
    pub id: i32,
    pub status: bool,
}

pub fn generate_reading(rng: &mut impl Rng, sensor: u32) -> Reading {
    let temperature = if rng.gen_bool(0.05) {
        rng.gen_range(-20.0..60.0) // 5% outliers
    } else {
        rng.gen_range(15.0..35.0)
    };

    Reading {
        name: format!("sensor-{}", sensor),
        temperature: (temperature * 10.0_f64).round() / 10.0,
    }
}
