//! Process-local store used when no database is configured

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared::{GeoPoint, HistoricalPoint, HistoricalReading, SensorReading, SymptomRecord};

use crate::error::AppResult;
use crate::store::{HistoryStore, ReadingQuery, SERIES_RADIUS_KM};

/// Readings older than this are discarded on insert
const RETENTION_HOURS: i64 = 7 * 24;

#[derive(Debug, Clone)]
struct StoredReading {
    station_id: String,
    location: GeoPoint,
    pm25: Option<f64>,
    pm10: Option<f64>,
    point: HistoricalPoint,
}

#[derive(Default)]
pub struct InMemoryStore {
    readings: RwLock<Vec<StoredReading>>,
    symptoms: RwLock<Vec<SymptomRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reading_count(&self) -> usize {
        self.readings.read().len()
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn series(
        &self,
        location: GeoPoint,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<HistoricalPoint>> {
        let mut points: Vec<HistoricalPoint> = self
            .readings
            .read()
            .iter()
            .filter(|r| r.point.timestamp >= since)
            .filter(|r| r.location.approx_distance_km(&location) <= SERIES_RADIUS_KM)
            .map(|r| r.point)
            .collect();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    async fn readings(&self, query: &ReadingQuery) -> AppResult<Vec<HistoricalReading>> {
        let mut matching: Vec<HistoricalReading> = self
            .readings
            .read()
            .iter()
            .filter(|r| query.matches(&r.location, r.point.timestamp))
            .map(|r| HistoricalReading {
                station_id: r.station_id.clone(),
                lat: r.location.lat,
                lon: r.location.lon,
                aqi: r.point.aqi,
                pm25: r.pm25,
                pm10: r.pm10,
                timestamp: r.point.timestamp,
            })
            .collect();
        matching.sort_by_key(|r| r.timestamp);
        matching.truncate(query.limit);
        Ok(matching)
    }

    async fn record_readings(&self, readings: &[SensorReading]) -> AppResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::hours(RETENTION_HOURS);
        let mut stored = self.readings.write();
        stored.retain(|r| r.point.timestamp >= cutoff);

        let mut inserted = 0;
        for reading in readings {
            let Some(aqi) = reading.aqi() else { continue };
            let duplicate = stored
                .iter()
                .any(|r| r.station_id == reading.station_id && r.point.timestamp == reading.timestamp);
            if duplicate {
                continue;
            }
            stored.push(StoredReading {
                station_id: reading.station_id.clone(),
                location: reading.location(),
                pm25: reading.pm25,
                pm10: reading.pm10,
                point: HistoricalPoint {
                    timestamp: reading.timestamp,
                    aqi,
                },
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn save_symptom(&self, record: &SymptomRecord) -> AppResult<()> {
        self.symptoms.write().push(record.clone());
        Ok(())
    }

    async fn symptoms(&self) -> AppResult<Vec<SymptomRecord>> {
        let mut records = self.symptoms.read().clone();
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}
