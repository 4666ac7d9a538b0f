//! HTTP handlers for exposure impact and health guidance

use axum::{extract::Query, Json};
use serde::Deserialize;
use shared::{cigarette_equivalence, CigaretteEquivalence};

use crate::error::AppResult;
use crate::services::health::{recommendations, HealthAdvice};

#[derive(Debug, Deserialize)]
pub struct AqiQuery {
    pub aqi: f64,
}

/// Cigarettes-per-day equivalent of breathing air at an AQI
pub async fn get_cigarette_equivalence(
    Query(query): Query<AqiQuery>,
) -> AppResult<Json<CigaretteEquivalence>> {
    let equivalence = cigarette_equivalence(query.aqi)?;
    Ok(Json(equivalence))
}

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    pub aqi: f64,
    #[serde(default)]
    pub sensitive_group: bool,
}

/// Health guidance for an AQI
pub async fn get_health_recommendations(
    Query(query): Query<HealthQuery>,
) -> AppResult<Json<HealthAdvice>> {
    let advice = recommendations(query.aqi, query.sensitive_group)?;
    Ok(Json(advice))
}
