//! PostgreSQL-backed historical store

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    GeoPoint, HistoricalPoint, HistoricalReading, SensorReading, SymptomRecord, KM_PER_DEGREE,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::store::{HistoryStore, ReadingQuery, SERIES_RADIUS_KM};

#[derive(Clone)]
pub struct PgHistoryStore {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct SeriesRow {
    latitude: f64,
    longitude: f64,
    recorded_at: DateTime<Utc>,
    aqi: f64,
}

#[derive(Debug, FromRow)]
struct ReadingRow {
    station_id: String,
    latitude: f64,
    longitude: f64,
    aqi: f64,
    pm25: Option<f64>,
    pm10: Option<f64>,
    recorded_at: DateTime<Utc>,
}

impl From<ReadingRow> for HistoricalReading {
    fn from(row: ReadingRow) -> Self {
        HistoricalReading {
            station_id: row.station_id,
            lat: row.latitude,
            lon: row.longitude,
            aqi: row.aqi,
            pm25: row.pm25,
            pm10: row.pm10,
            timestamp: row.recorded_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SymptomRow {
    id: Uuid,
    recorded_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    aqi_at_time: f64,
    symptoms: Vec<String>,
    severity: i32,
}

impl From<SymptomRow> for SymptomRecord {
    fn from(row: SymptomRow) -> Self {
        SymptomRecord {
            id: row.id,
            timestamp: row.recorded_at,
            lat: row.latitude,
            lon: row.longitude,
            aqi_at_time: row.aqi_at_time,
            symptoms: row.symptoms,
            severity: row.severity,
        }
    }
}

/// Connectivity failures degrade to `StoreUnavailable`; other database
/// errors keep their own variant
fn store_error(error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            AppError::StoreUnavailable(error.to_string())
        }
        other => AppError::DatabaseError(other),
    }
}

impl PgHistoryStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Connect a pool using the `database` configuration section
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("database.url is not set".into()))?;

        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(store_error)?;

        Ok(Self::new(db))
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn series(
        &self,
        location: GeoPoint,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<HistoricalPoint>> {
        // Box prefilter on the index; the distance check is done in Rust
        let margin = SERIES_RADIUS_KM / KM_PER_DEGREE;
        let lon_margin = margin / location.lat.to_radians().cos().abs().max(0.01);

        let rows = sqlx::query_as::<_, SeriesRow>(
            r#"
            SELECT latitude, longitude, recorded_at, aqi
            FROM aqi_readings
            WHERE latitude BETWEEN $1 AND $2
              AND longitude BETWEEN $3 AND $4
              AND recorded_at >= $5
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(location.lat - margin)
        .bind(location.lat + margin)
        .bind(location.lon - lon_margin)
        .bind(location.lon + lon_margin)
        .bind(since)
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .filter(|row| {
                GeoPoint::new(row.latitude, row.longitude).approx_distance_km(&location)
                    <= SERIES_RADIUS_KM
            })
            .map(|row| HistoricalPoint {
                timestamp: row.recorded_at,
                aqi: row.aqi,
            })
            .collect())
    }

    async fn readings(&self, query: &ReadingQuery) -> AppResult<Vec<HistoricalReading>> {
        let bounds = query.near.map(|(center, radius_km)| {
            let margin = radius_km / KM_PER_DEGREE;
            let lon_margin = margin / center.lat.to_radians().cos().abs().max(0.01);
            (
                center.lat - margin,
                center.lat + margin,
                center.lon - lon_margin,
                center.lon + lon_margin,
            )
        });
        // With a radius the exact distance check runs in Rust, so the limit
        // can only be applied afterwards
        let sql_limit = query.near.is_none().then_some(query.limit as i64);

        let rows = sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT station_id, latitude, longitude, aqi, pm25, pm10, recorded_at
            FROM aqi_readings
            WHERE ($1::timestamptz IS NULL OR recorded_at >= $1)
              AND ($2::timestamptz IS NULL OR recorded_at <= $2)
              AND ($3::float8 IS NULL OR latitude BETWEEN $3 AND $4)
              AND ($5::float8 IS NULL OR longitude BETWEEN $5 AND $6)
            ORDER BY recorded_at ASC
            LIMIT $7
            "#,
        )
        .bind(query.start)
        .bind(query.end)
        .bind(bounds.map(|b| b.0))
        .bind(bounds.map(|b| b.1))
        .bind(bounds.map(|b| b.2))
        .bind(bounds.map(|b| b.3))
        .bind(sql_limit)
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .filter(|row| {
                query.matches(&GeoPoint::new(row.latitude, row.longitude), row.recorded_at)
            })
            .take(query.limit)
            .map(HistoricalReading::from)
            .collect())
    }

    async fn record_readings(&self, readings: &[SensorReading]) -> AppResult<usize> {
        let mut inserted = 0;
        for reading in readings {
            let Some(aqi) = reading.aqi() else { continue };
            let result = sqlx::query(
                r#"
                INSERT INTO aqi_readings (station_id, latitude, longitude, aqi, pm25, pm10, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (station_id, recorded_at) DO NOTHING
                "#,
            )
            .bind(&reading.station_id)
            .bind(reading.lat)
            .bind(reading.lon)
            .bind(aqi)
            .bind(reading.pm25)
            .bind(reading.pm10)
            .bind(reading.timestamp)
            .execute(&self.db)
            .await
            .map_err(store_error)?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    async fn save_symptom(&self, record: &SymptomRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO symptom_records (id, recorded_at, latitude, longitude, aqi_at_time, symptoms, severity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.timestamp)
        .bind(record.lat)
        .bind(record.lon)
        .bind(record.aqi_at_time)
        .bind(&record.symptoms)
        .bind(record.severity)
        .execute(&self.db)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn symptoms(&self) -> AppResult<Vec<SymptomRecord>> {
        let rows = sqlx::query_as::<_, SymptomRow>(
            r#"
            SELECT id, recorded_at, latitude, longitude, aqi_at_time, symptoms, severity
            FROM symptom_records
            ORDER BY recorded_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(SymptomRecord::from).collect())
    }
}
