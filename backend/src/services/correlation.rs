//! Symptom/AQI correlation
//!
//! Running totals per AQI bucket are updated on every accepted submission,
//! so a report never rescans history. On startup the totals are rebuilt from
//! the store.

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use shared::{
    validate_aqi, validate_severity, AqiBucket, BucketResult, BucketStats, CorrelationBucket,
    CorrelationReport, SymptomRecord, SymptomSubmission,
};
use validator::Validate;

use crate::config::CorrelationConfig;
use crate::error::{AppError, AppResult};
use crate::store::HistoryStore;

/// Symptoms listed per bucket
const TOP_SYMPTOMS: usize = 5;

pub struct CorrelationEngine {
    buckets: RwLock<[CorrelationBucket; 6]>,
    min_samples: u64,
}

impl CorrelationEngine {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            buckets: RwLock::new(std::array::from_fn(|_| CorrelationBucket::default())),
            min_samples: config.min_samples.max(1),
        }
    }

    /// Add one observation to its bucket
    pub fn record(&self, aqi: f64, severity: i32, symptoms: &[String]) -> AppResult<()> {
        validate_aqi(aqi).map_err(|msg| AppError::invalid("aqi", msg))?;
        validate_severity(severity).map_err(|msg| AppError::invalid("severity", msg))?;

        let bucket = AqiBucket::for_aqi(aqi);
        self.buckets.write()[bucket.index()].add(severity, symptoms);
        Ok(())
    }

    /// Validate, persist, then aggregate a submission. Nothing is aggregated
    /// when the store rejects the record.
    pub async fn submit(
        &self,
        store: &dyn HistoryStore,
        submission: SymptomSubmission,
    ) -> AppResult<SymptomRecord> {
        submission.validate()?;

        let mut record = SymptomRecord::from_submission(submission, Utc::now());
        record.symptoms = normalize_symptoms(record.symptoms);

        store.save_symptom(&record).await?;
        self.record(record.aqi_at_time, record.severity, &record.symptoms)?;

        tracing::info!(
            id = %record.id,
            aqi = record.aqi_at_time,
            severity = record.severity,
            "Symptom report recorded"
        );
        Ok(record)
    }

    /// Replace the totals with the aggregate of `records`
    pub fn rebuild(&self, records: &[SymptomRecord]) -> usize {
        let mut fresh: [CorrelationBucket; 6] = std::array::from_fn(|_| CorrelationBucket::default());
        let mut used = 0;
        for record in records {
            if validate_aqi(record.aqi_at_time).is_err() || validate_severity(record.severity).is_err() {
                tracing::warn!(id = %record.id, "Skipping invalid stored symptom record");
                continue;
            }
            fresh[AqiBucket::for_aqi(record.aqi_at_time).index()].add(record.severity, &record.symptoms);
            used += 1;
        }
        *self.buckets.write() = fresh;
        used
    }

    pub fn total_samples(&self) -> u64 {
        self.buckets.read().iter().map(|b| b.count).sum()
    }

    /// Per-bucket aggregates; buckets below the minimum sample count report
    /// insufficient data, and so does the whole report if none qualifies
    pub fn report(&self) -> CorrelationReport {
        let buckets = self.buckets.read();
        let results: Vec<(AqiBucket, BucketResult)> = AqiBucket::ALL
            .iter()
            .map(|bucket| {
                let totals = &buckets[bucket.index()];
                (*bucket, self.bucket_result(totals))
            })
            .collect();

        if results.iter().any(|(_, result)| result.is_sufficient()) {
            CorrelationReport::Buckets(results)
        } else {
            CorrelationReport::InsufficientData
        }
    }

    fn bucket_result(&self, totals: &CorrelationBucket) -> BucketResult {
        match totals.average_severity() {
            Some(avg) if totals.count >= self.min_samples => BucketResult::Sufficient(BucketStats {
                avg_severity: (avg * 100.0).round() / 100.0,
                count: totals.count,
                common_symptoms: top_symptoms(&totals.symptom_counts),
            }),
            _ => BucketResult::InsufficientData {
                count: totals.count,
            },
        }
    }
}

fn normalize_symptoms(symptoms: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = symptoms
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

fn top_symptoms(counts: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
    let mut ranked: Vec<(&String, &u64)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_SYMPTOMS)
        .map(|(name, count)| (name.clone(), *count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symptoms() {
        let symptoms = vec![" Cough".to_string(), "cough".to_string(), "".to_string()];
        assert_eq!(normalize_symptoms(symptoms), vec!["cough".to_string()]);
    }

    #[test]
    fn test_top_symptoms_limit() {
        let counts: BTreeMap<String, u64> = (0..8).map(|i| (format!("s{}", i), i)).collect();
        let top = top_symptoms(&counts);
        assert_eq!(top.len(), TOP_SYMPTOMS);
        assert!(top.contains_key("s7"));
        assert!(!top.contains_key("s0"));
    }
}
