//! Historical store: AQI time series and symptom records

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{GeoPoint, HistoricalPoint, HistoricalReading, SensorReading, SymptomRecord};

use crate::error::AppResult;

pub use memory::InMemoryStore;
pub use postgres::PgHistoryStore;

/// Readings within this distance of a location form its history
pub const SERIES_RADIUS_KM: f64 = 5.0;

/// Filters for browsing stored readings
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Center and radius in kilometers
    pub near: Option<(GeoPoint, f64)>,
    pub limit: usize,
}

impl ReadingQuery {
    pub fn matches(&self, location: &GeoPoint, timestamp: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
            && self
                .near
                .map_or(true, |(center, radius_km)| location.approx_distance_km(&center) <= radius_km)
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;

    /// AQI history near `location` since `since`, oldest first
    async fn series(
        &self,
        location: GeoPoint,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<HistoricalPoint>>;

    /// Stored readings matching `query`, oldest first, at most `query.limit`
    async fn readings(&self, query: &ReadingQuery) -> AppResult<Vec<HistoricalReading>>;

    /// Persist station readings; readings without an AQI are skipped
    async fn record_readings(&self, readings: &[SensorReading]) -> AppResult<usize>;

    async fn save_symptom(&self, record: &SymptomRecord) -> AppResult<()>;

    /// Every stored symptom record, oldest first
    async fn symptoms(&self) -> AppResult<Vec<SymptomRecord>>;
}
