use crate::errors::{Error, Result};
use crate::metrics::STORE_LATENCY_SECONDS;
use crate::model::{Device, DeviceStatus, NewReading, SensorReading};
use crate::store::{DeviceStore, ReadingStore};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

const MAX_CONNECT_ATTEMPTS: u32 = 5;

const SELECT_READINGS: &str = r#"
    SELECT id, name, temperature, timestamp
    FROM temperature_sensors
    ORDER BY timestamp DESC, id DESC
    "#;
const INSERT_READING: &str = r#"
    INSERT INTO temperature_sensors (name, temperature)
    VALUES ($1, $2)
    RETURNING id, name, temperature, timestamp
    "#;
const DELETE_READING: &str = "DELETE FROM temperature_sensors WHERE id = $1";

const SELECT_DEVICES: &str = "SELECT id, name, status FROM devices";
const TOGGLE_DEVICE: &str =
    "UPDATE devices SET status = NOT status WHERE id = $1 RETURNING id, status";
const INSERT_DEVICE_IF_MISSING: &str = r#"
    INSERT INTO devices (name, status)
    SELECT $1, FALSE
    WHERE NOT EXISTS (SELECT 1 FROM devices WHERE name = $1)
    "#;

/// Connects to Postgres and runs the embedded migrations.
///
/// Transient connection failures are retried with exponential backoff; this
/// is the only place the service retries anything.
pub async fn make_pool(options: PgConnectOptions, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to database...");

    let mut attempt = 0;
    let pool = loop {
        attempt += 1;
        let connected = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options.clone())
            .await;

        match connected {
            Ok(pool) => break pool,
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS && is_transient_error(&e) => {
                let wait_ms = 100 * 2_u64.pow(attempt - 1);
                warn!(
                    "Database connection failed (attempt {}/{}), retrying in {}ms: {}",
                    attempt, MAX_CONNECT_ATTEMPTS, wait_ms, e
                );
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
            Err(e) => {
                error!(
                    "Database connection failed permanently after {} attempts: {}",
                    attempt, e
                );
                return Err(Error::Database(e));
            }
        }
    };

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            code.starts_with("08") || // connection_exception class
            code == "57P03" || // cannot_connect_now
            code == "53300" // too_many_connections
        }),
        _ => false,
    }
}

/// Postgres-backed store for both readings and devices
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReadingStore for PgStore {
    fn list_readings(&self) -> impl Future<Output = Result<Vec<SensorReading>>> + Send {
        async move {
            let _timer = STORE_LATENCY_SECONDS
                .with_label_values(&["list_readings"])
                .start_timer();

            let readings = sqlx::query_as::<_, SensorReading>(SELECT_READINGS)
                .fetch_all(&self.pool)
                .await?;
            Ok(readings)
        }
    }

    fn create_reading(
        &self,
        reading: NewReading,
    ) -> impl Future<Output = Result<SensorReading>> + Send {
        async move {
            let _timer = STORE_LATENCY_SECONDS
                .with_label_values(&["create_reading"])
                .start_timer();

            let stored = sqlx::query_as::<_, SensorReading>(INSERT_READING)
                .bind(&reading.name)
                .bind(reading.temperature)
                .fetch_one(&self.pool)
                .await?;
            Ok(stored)
        }
    }

    fn delete_reading(&self, id: i32) -> impl Future<Output = Result<()>> + Send {
        async move {
            let _timer = STORE_LATENCY_SECONDS
                .with_label_values(&["delete_reading"])
                .start_timer();

            let result = sqlx::query(DELETE_READING)
                .bind(id)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(Error::not_found("temperature reading", id));
            }
            Ok(())
        }
    }
}

impl DeviceStore for PgStore {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<Device>>> + Send {
        async move {
            let _timer = STORE_LATENCY_SECONDS
                .with_label_values(&["list_devices"])
                .start_timer();

            let devices = sqlx::query_as::<_, Device>(SELECT_DEVICES)
                .fetch_all(&self.pool)
                .await?;
            Ok(devices)
        }
    }

    fn toggle_device(&self, id: i32) -> impl Future<Output = Result<DeviceStatus>> + Send {
        async move {
            let _timer = STORE_LATENCY_SECONDS
                .with_label_values(&["toggle_device"])
                .start_timer();

            // Single-statement flip: concurrent toggles serialize on the row lock.
            sqlx::query_as::<_, DeviceStatus>(TOGGLE_DEVICE)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::not_found("device", id))
        }
    }

    fn seed_devices(&self, names: &[String]) -> impl Future<Output = Result<usize>> + Send {
        let names = names.to_vec();
        async move {
            let _timer = STORE_LATENCY_SECONDS
                .with_label_values(&["seed_devices"])
                .start_timer();

            let mut tx = self.pool.begin().await?;
            let mut inserted = 0;
            for name in &names {
                let result = sqlx::query(INSERT_DEVICE_IF_MISSING)
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                inserted += result.rows_affected() as usize;
            }
            tx.commit().await?;

            Ok(inserted)
        }
    }
}
