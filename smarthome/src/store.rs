//! Repository traits the HTTP layer talks to.
//!
//! Handlers never see SQL; they are generic over these traits so the
//! routers can be exercised against an in-memory store in tests.

use crate::errors::Result;
use crate::model::{Device, DeviceStatus, NewReading, SensorReading};
use std::future::Future;

pub trait ReadingStore: Send + Sync + 'static {
    /// All readings, newest first.
    fn list_readings(&self) -> impl Future<Output = Result<Vec<SensorReading>>> + Send;

    /// Persists a reading and returns it with its generated id and timestamp.
    fn create_reading(
        &self,
        reading: NewReading,
    ) -> impl Future<Output = Result<SensorReading>> + Send;

    /// Fails with `Error::NotFound` when no reading has this id.
    fn delete_reading(&self, id: i32) -> impl Future<Output = Result<()>> + Send;
}

pub trait DeviceStore: Send + Sync + 'static {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<Device>>> + Send;

    /// Flips `status` atomically. Fails with `Error::NotFound` for unknown ids.
    fn toggle_device(&self, id: i32) -> impl Future<Output = Result<DeviceStatus>> + Send;

    /// Inserts each name that is not already present. Returns the number inserted.
    fn seed_devices(&self, names: &[String]) -> impl Future<Output = Result<usize>> + Send;
}
