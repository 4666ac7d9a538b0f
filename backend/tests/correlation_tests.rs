//! Symptom correlation integration tests
//!
//! Tests for symptom/AQI correlation including:
//! - Minimum sample counts per bucket
//! - Submission validation and persistence ordering
//! - Rebuilding totals from stored records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hyperlocal_aq_backend::config::CorrelationConfig;
use hyperlocal_aq_backend::error::{AppError, AppResult};
use hyperlocal_aq_backend::services::CorrelationEngine;
use hyperlocal_aq_backend::store::{HistoryStore, InMemoryStore, ReadingQuery};
use proptest::prelude::*;
use shared::{
    AqiBucket, BucketResult, CorrelationReport, GeoPoint, HistoricalPoint, HistoricalReading,
    SensorReading, SymptomRecord, SymptomSubmission,
};

/// Store that is always down
struct UnavailableStore;

#[async_trait]
impl HistoryStore for UnavailableStore {
    fn backend(&self) -> &'static str {
        "unavailable"
    }

    async fn series(
        &self,
        _location: GeoPoint,
        _since: DateTime<Utc>,
    ) -> AppResult<Vec<HistoricalPoint>> {
        Err(AppError::StoreUnavailable("connection reset".into()))
    }

    async fn readings(&self, _query: &ReadingQuery) -> AppResult<Vec<HistoricalReading>> {
        Err(AppError::StoreUnavailable("connection reset".into()))
    }

    async fn record_readings(&self, _readings: &[SensorReading]) -> AppResult<usize> {
        Err(AppError::StoreUnavailable("connection reset".into()))
    }

    async fn save_symptom(&self, _record: &SymptomRecord) -> AppResult<()> {
        Err(AppError::StoreUnavailable("connection reset".into()))
    }

    async fn symptoms(&self) -> AppResult<Vec<SymptomRecord>> {
        Err(AppError::StoreUnavailable("connection reset".into()))
    }
}

fn submission(aqi: f64, severity: i32, symptoms: &[&str]) -> SymptomSubmission {
    SymptomSubmission {
        lat: 28.61,
        lon: 77.20,
        aqi,
        symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
        severity,
    }
}

fn engine() -> CorrelationEngine {
    CorrelationEngine::new(&CorrelationConfig::default())
}

fn bucket(report: &CorrelationReport, wanted: AqiBucket) -> BucketResult {
    match report {
        CorrelationReport::Buckets(buckets) => buckets
            .iter()
            .find(|(b, _)| *b == wanted)
            .map(|(_, result)| result.clone())
            .unwrap(),
        CorrelationReport::InsufficientData => panic!("expected per-bucket results"),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_empty_engine_reports_insufficient_data() {
        let report = engine().report();
        assert_eq!(report, CorrelationReport::InsufficientData);
        assert_eq!(serde_json::to_value(&report).unwrap(), "insufficient data");
    }

    /// A bucket needs three samples before it reports aggregates
    #[tokio::test]
    async fn test_bucket_needs_minimum_samples() {
        let store = InMemoryStore::new();
        let engine = engine();

        engine.submit(&store, submission(180.0, 6, &["cough"])).await.unwrap();
        engine.submit(&store, submission(175.0, 8, &["cough", "headache"])).await.unwrap();
        assert_eq!(engine.report(), CorrelationReport::InsufficientData);

        engine.submit(&store, submission(160.0, 7, &["Eye Irritation"])).await.unwrap();
        let report = engine.report();

        match bucket(&report, AqiBucket::Unhealthy) {
            BucketResult::Sufficient(stats) => {
                assert_eq!(stats.count, 3);
                assert_eq!(stats.avg_severity, 7.0);
                assert_eq!(stats.common_symptoms.get("cough"), Some(&2));
                assert_eq!(stats.common_symptoms.get("eye irritation"), Some(&1));
            }
            other => panic!("unexpected bucket result: {:?}", other),
        }
        assert_eq!(
            bucket(&report, AqiBucket::Good),
            BucketResult::InsufficientData { count: 0 }
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["151-200"]["count"], 3);
        assert_eq!(json["0-50"], "insufficient data");
        assert_eq!(json["300+"], "insufficient data");
    }

    /// Averages are rounded to two decimals
    #[test]
    fn test_average_severity_rounding() {
        let engine = engine();
        for severity in [3, 4, 4] {
            engine.record(42.0, severity, &[]).unwrap();
        }

        match bucket(&engine.report(), AqiBucket::Good) {
            BucketResult::Sufficient(stats) => assert_eq!(stats.avg_severity, 3.67),
            other => panic!("unexpected bucket result: {:?}", other),
        }
    }

    /// Bucket boundaries are inclusive at the top of each range
    #[test]
    fn test_bucket_boundaries() {
        let engine = engine();
        for _ in 0..3 {
            engine.record(50.0, 2, &[]).unwrap();
            engine.record(300.0, 9, &[]).unwrap();
        }
        let report = engine.report();

        assert!(bucket(&report, AqiBucket::Good).is_sufficient());
        assert!(bucket(&report, AqiBucket::VeryUnhealthy).is_sufficient());
        assert!(!bucket(&report, AqiBucket::Moderate).is_sufficient());
        assert!(!bucket(&report, AqiBucket::Hazardous).is_sufficient());
    }

    #[tokio::test]
    async fn test_invalid_submissions_rejected() {
        let store = InMemoryStore::new();
        let engine = engine();

        let result = engine.submit(&store, submission(120.0, 11, &[])).await;
        assert!(matches!(result, Err(AppError::InvalidInput { .. })));

        let result = engine.submit(&store, submission(120.0, 0, &[])).await;
        assert!(matches!(result, Err(AppError::InvalidInput { .. })));

        let result = engine.submit(&store, submission(-5.0, 5, &[])).await;
        assert!(matches!(result, Err(AppError::InvalidInput { .. })));

        assert_eq!(engine.total_samples(), 0);
        assert!(store.symptoms().await.unwrap().is_empty());
    }

    /// Nothing is aggregated when the record cannot be stored
    #[tokio::test]
    async fn test_store_failure_not_aggregated() {
        let engine = engine();

        let result = engine.submit(&UnavailableStore, submission(120.0, 5, &["cough"])).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
        assert_eq!(engine.total_samples(), 0);
    }

    /// Submitted symptoms are trimmed, lowercased and deduplicated
    #[tokio::test]
    async fn test_symptoms_normalized() {
        let store = InMemoryStore::new();
        let record = engine()
            .submit(&store, submission(90.0, 4, &[" Cough", "cough", "Wheezing", ""]))
            .await
            .unwrap();

        assert_eq!(record.symptoms, vec!["cough".to_string(), "wheezing".to_string()]);
        assert_eq!(record.aqi_at_time, 90.0);
    }

    /// Totals rebuilt from the store match the live totals
    #[tokio::test]
    async fn test_rebuild_from_store() {
        let store = InMemoryStore::new();
        let live = engine();
        for (aqi, severity) in [(30.0, 2), (45.0, 3), (20.0, 1), (220.0, 9)] {
            live.submit(&store, submission(aqi, severity, &["fatigue"])).await.unwrap();
        }

        let restored = engine();
        let used = restored.rebuild(&store.symptoms().await.unwrap());

        assert_eq!(used, 4);
        assert_eq!(restored.total_samples(), live.total_samples());
        assert_eq!(restored.report(), live.report());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every accepted observation lands in exactly one bucket
        #[test]
        fn prop_counts_sum_to_samples(
            observations in prop::collection::vec((0.0f64..600.0, 1i32..=10), 0..40)
        ) {
            let engine = engine();
            for (aqi, severity) in &observations {
                engine.record(*aqi, *severity, &[]).unwrap();
            }

            prop_assert_eq!(engine.total_samples(), observations.len() as u64);

            if let CorrelationReport::Buckets(buckets) = engine.report() {
                let counted: u64 = buckets
                    .iter()
                    .map(|(_, result)| match result {
                        BucketResult::Sufficient(stats) => stats.count,
                        BucketResult::InsufficientData { count } => *count,
                    })
                    .sum();
                prop_assert_eq!(counted, observations.len() as u64);
            }
        }

        /// Reported averages stay within the severity scale
        #[test]
        fn prop_average_within_scale(
            severities in prop::collection::vec(1i32..=10, 3..20)
        ) {
            let engine = engine();
            for severity in &severities {
                engine.record(175.0, *severity, &[]).unwrap();
            }

            match bucket(&engine.report(), AqiBucket::Unhealthy) {
                BucketResult::Sufficient(stats) => {
                    prop_assert!(stats.avg_severity >= 1.0 && stats.avg_severity <= 10.0);
                    prop_assert_eq!(stats.count, severities.len() as u64);
                }
                other => prop_assert!(false, "unexpected bucket result: {:?}", other),
            }
        }
    }
}
