//! Symptom reports and AQI/severity correlation buckets

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;
use validator::Validate;

/// Sentinel reported for buckets (or whole reports) without enough samples
pub const INSUFFICIENT_DATA: &str = "insufficient data";

/// Symptom submission as received from clients
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SymptomSubmission {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
    #[validate(range(min = 0.0, max = 2000.0))]
    pub aqi: f64,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[validate(range(min = 1, max = 10))]
    pub severity: i32,
}

/// A stored symptom report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymptomRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub aqi_at_time: f64,
    pub symptoms: Vec<String>,
    pub severity: i32,
}

impl SymptomRecord {
    pub fn from_submission(submission: SymptomSubmission, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            lat: submission.lat,
            lon: submission.lon,
            aqi_at_time: submission.aqi,
            symptoms: submission.symptoms,
            severity: submission.severity,
        }
    }
}

/// Fixed AQI ranges used to group symptom severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AqiBucket {
    #[serde(rename = "0-50")]
    Good,
    #[serde(rename = "51-100")]
    Moderate,
    #[serde(rename = "101-150")]
    Sensitive,
    #[serde(rename = "151-200")]
    Unhealthy,
    #[serde(rename = "201-300")]
    VeryUnhealthy,
    #[serde(rename = "300+")]
    Hazardous,
}

impl AqiBucket {
    pub const ALL: [AqiBucket; 6] = [
        AqiBucket::Good,
        AqiBucket::Moderate,
        AqiBucket::Sensitive,
        AqiBucket::Unhealthy,
        AqiBucket::VeryUnhealthy,
        AqiBucket::Hazardous,
    ];

    pub fn for_aqi(aqi: f64) -> Self {
        if aqi <= 50.0 {
            AqiBucket::Good
        } else if aqi <= 100.0 {
            AqiBucket::Moderate
        } else if aqi <= 150.0 {
            AqiBucket::Sensitive
        } else if aqi <= 200.0 {
            AqiBucket::Unhealthy
        } else if aqi <= 300.0 {
            AqiBucket::VeryUnhealthy
        } else {
            AqiBucket::Hazardous
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiBucket::Good => "0-50",
            AqiBucket::Moderate => "51-100",
            AqiBucket::Sensitive => "101-150",
            AqiBucket::Unhealthy => "151-200",
            AqiBucket::VeryUnhealthy => "201-300",
            AqiBucket::Hazardous => "300+",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Running totals for one AQI range
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationBucket {
    pub count: u64,
    pub severity_sum: i64,
    pub symptom_counts: BTreeMap<String, u64>,
}

impl CorrelationBucket {
    pub fn add(&mut self, severity: i32, symptoms: &[String]) {
        self.count += 1;
        self.severity_sum += i64::from(severity);
        for symptom in symptoms {
            *self.symptom_counts.entry(symptom.clone()).or_default() += 1;
        }
    }

    pub fn average_severity(&self) -> Option<f64> {
        (self.count > 0).then(|| self.severity_sum as f64 / self.count as f64)
    }
}

/// Aggregates reported for a bucket with enough samples
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BucketStats {
    pub avg_severity: f64,
    pub count: u64,
    pub common_symptoms: BTreeMap<String, u64>,
}

/// Per-bucket correlation result
#[derive(Debug, Clone, PartialEq)]
pub enum BucketResult {
    Sufficient(BucketStats),
    /// Fewer samples than the minimum; the count is kept for diagnostics
    InsufficientData { count: u64 },
}

impl BucketResult {
    pub fn is_sufficient(&self) -> bool {
        matches!(self, BucketResult::Sufficient(_))
    }
}

impl Serialize for BucketResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BucketResult::Sufficient(stats) => stats.serialize(serializer),
            BucketResult::InsufficientData { .. } => serializer.serialize_str(INSUFFICIENT_DATA),
        }
    }
}

/// Correlation query result
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationReport {
    /// Every bucket in range order
    Buckets(Vec<(AqiBucket, BucketResult)>),
    /// No bucket reached the minimum sample count
    InsufficientData,
}

impl Serialize for CorrelationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CorrelationReport::Buckets(buckets) => {
                let mut map = serializer.serialize_map(Some(buckets.len()))?;
                for (bucket, result) in buckets {
                    map.serialize_entry(bucket.label(), result)?;
                }
                map.end()
            }
            CorrelationReport::InsufficientData => serializer.serialize_str(INSUFFICIENT_DATA),
        }
    }
}
