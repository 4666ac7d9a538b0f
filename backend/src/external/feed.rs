//! Sensor feed abstraction

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::{GeoPoint, SensorReading};

use crate::error::AppResult;

/// Source of the latest station readings around a point
#[async_trait]
pub trait SensorFeed: Send + Sync {
    /// Latest reading of every station within `radius_km` of `center`
    async fn latest(&self, center: GeoPoint, radius_km: f64) -> AppResult<Vec<SensorReading>>;
}

/// Feed backed by a fixed, replaceable set of readings
#[derive(Default)]
pub struct StaticFeed {
    readings: RwLock<Vec<SensorReading>>,
}

impl StaticFeed {
    pub fn new(readings: Vec<SensorReading>) -> Self {
        Self {
            readings: RwLock::new(readings),
        }
    }

    /// Replace the current reading set
    pub fn replace(&self, readings: Vec<SensorReading>) {
        *self.readings.write() = readings;
    }
}

#[async_trait]
impl SensorFeed for StaticFeed {
    async fn latest(&self, center: GeoPoint, radius_km: f64) -> AppResult<Vec<SensorReading>> {
        Ok(self
            .readings
            .read()
            .iter()
            .filter(|r| r.location().approx_distance_km(&center) <= radius_km)
            .cloned()
            .collect())
    }
}
