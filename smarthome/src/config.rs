use crate::errors::{Error, Result};
use crate::validate::validate_device_name;
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SENSOR_ADDR: &str = "0.0.0.0:4001";
pub const DEFAULT_DEVICE_ADDR: &str = "0.0.0.0:5000";

/// Service configuration, read once at startup
#[derive(Clone)]
pub struct Config {
    pub database: PgConnectOptions,
    pub max_connections: u32,
    pub sensor_addr: String,
    pub device_addr: String,
    pub device_seed: Vec<String>,
}

// PgConnectOptions' own Debug output includes the password.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database_label())
            .field("username", &self.database.get_username())
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("sensor_addr", &self.sensor_addr)
            .field("device_addr", &self.device_addr)
            .field("device_seed", &self.device_seed)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database = match lookup("DATABASE_URL") {
            Some(url) => PgConnectOptions::from_str(&url)
                .map_err(|e| Error::Config(format!("invalid DATABASE_URL: {}", e)))?,
            None => PgConnectOptions::new()
                .host(&var("DB_HOST", "localhost"))
                .port(parse(&var("DB_PORT", "5432"), "DB_PORT")?)
                .username(&var("DB_USER", "sh_user"))
                .password(&var("DB_PASS", "YourPass"))
                .database(&var("DB_NAME", "smarthome")),
        };

        let device_seed = parse_seed(&var("DEVICE_SEED", ""))?;

        Ok(Self {
            database,
            max_connections: parse(&var("DB_MAX_CONNECTIONS", "20"), "DB_MAX_CONNECTIONS")?,
            sensor_addr: var("SENSOR_HTTP_ADDR", DEFAULT_SENSOR_ADDR),
            device_addr: var("DEVICE_HTTP_ADDR", DEFAULT_DEVICE_ADDR),
            device_seed,
        })
    }

    /// `host:port/database`, safe to log
    pub fn database_label(&self) -> String {
        format!(
            "{}:{}/{}",
            self.database.get_host(),
            self.database.get_port(),
            self.database.get_database().unwrap_or("")
        )
    }
}

fn parse<T: FromStr>(value: &str, key: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid {} {:?}: {}", key, value, e)))
}

fn parse_seed(raw: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        validate_device_name(name)
            .map_err(|e| Error::Config(format!("invalid DEVICE_SEED: {}", e)))?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
