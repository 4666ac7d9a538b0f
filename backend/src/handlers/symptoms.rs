//! HTTP handlers for symptom reports and correlation

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use shared::{CorrelationReport, SymptomRecord, SymptomSubmission};

use crate::error::AppResult;
use crate::AppState;

#[derive(Serialize)]
pub struct SymptomAccepted {
    pub status: &'static str,
    pub record: SymptomRecord,
}

/// Record a symptom report
pub async fn log_symptoms(
    State(state): State<AppState>,
    Json(submission): Json<SymptomSubmission>,
) -> AppResult<(StatusCode, Json<SymptomAccepted>)> {
    let record = state
        .correlation
        .submit(state.store.as_ref(), submission)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SymptomAccepted {
            status: "accepted",
            record,
        }),
    ))
}

#[derive(Serialize)]
pub struct CorrelationResponse {
    pub correlation: CorrelationReport,
    pub total_samples: u64,
}

/// Severity by AQI range across all reports
pub async fn get_correlation(State(state): State<AppState>) -> Json<CorrelationResponse> {
    Json(CorrelationResponse {
        correlation: state.correlation.report(),
        total_samples: state.correlation.total_samples(),
    })
}
