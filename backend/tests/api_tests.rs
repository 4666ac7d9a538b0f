//! HTTP API integration tests
//!
//! Drives the full router with an in-memory store, a fixed sensor feed and
//! the baseline forecast model.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use hyperlocal_aq_backend::external::{BaselineModel, StaticFeed};
use hyperlocal_aq_backend::store::InMemoryStore;
use hyperlocal_aq_backend::{create_app, AppState, Config};
use proptest::prelude::*;
use shared::SensorReading;
use tower::ServiceExt;

fn station(id: &str, lat: f64, lon: f64, pm25: f64) -> SensorReading {
    SensorReading {
        station_id: id.to_string(),
        lat,
        lon,
        pm25: Some(pm25),
        pm10: None,
        temperature: Some(24.0),
        timestamp: Utc::now(),
    }
}

fn delhi_stations() -> Vec<SensorReading> {
    vec![
        station("DL-ANV", 28.6508, 77.3152, 210.0),
        station("DL-ITO", 28.6289, 77.2405, 160.0),
        station("DL-RKP", 28.5633, 77.1869, 90.0),
        station("DL-PUS", 28.6395, 77.1463, 45.0),
    ]
}

fn test_app(readings: Vec<SensorReading>) -> Router {
    let config = Config::from_defaults().unwrap();
    let state = AppState::new(
        config,
        Arc::new(StaticFeed::new(readings)),
        Arc::new(InMemoryStore::new()),
        Arc::new(BaselineModel::default()),
    );
    create_app(state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = get(test_app(delhi_stations()), "/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["model"], "baseline");
    }

    #[tokio::test]
    async fn test_grid_around_point() {
        let (status, body) = get(
            test_app(delhi_stations()),
            "/api/v1/aqi/grid?lat=28.61&lon=77.2&radius_km=5",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 1);
        let rows = body["rows"].as_u64().unwrap();
        let cols = body["cols"].as_u64().unwrap();
        assert_eq!(body["cells"].as_array().unwrap().len() as u64, rows * cols);
    }

    #[tokio::test]
    async fn test_grid_for_bounding_box() {
        let (status, body) = get(
            test_app(delhi_stations()),
            "/api/v1/aqi/grid?min_lat=28.55&min_lon=77.15&max_lat=28.65&max_lon=77.25",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["region"]["min_lat"], 28.55);
    }

    #[tokio::test]
    async fn test_grid_rejects_inverted_box() {
        let (status, body) = get(
            test_app(delhi_stations()),
            "/api/v1/aqi/grid?min_lat=28.7&min_lon=77.1&max_lat=28.5&max_lon=77.3",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_grid_rejects_partial_location() {
        let (status, _) = get(test_app(delhi_stations()), "/api/v1/aqi/grid?lat=28.61").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_grid_without_stations() {
        let (status, body) = get(test_app(Vec::new()), "/api/v1/aqi/grid?lat=28.61&lon=77.2").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "DATA_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_hotspots_near_polluted_stations() {
        let (status, body) = get(
            test_app(delhi_stations()),
            "/api/v1/aqi/hotspots?lat=28.64&lon=77.28&radius_km=10",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["threshold"], 150.0);
        let hotspots = body["hotspots"].as_array().unwrap();
        assert!(!hotspots.is_empty());
        assert_eq!(hotspots[0]["id"], "hotspot_1");
        assert!(hotspots[0]["members"].is_null());
    }

    #[tokio::test]
    async fn test_forecast_horizons() {
        let app = test_app(delhi_stations());

        let (status, body) = get(app.clone(), "/api/v1/forecast?lat=28.61&lon=77.2&horizon=48").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecasts"].as_array().unwrap().len(), 48);
        assert_eq!(body["stale"], false);

        let (status, body) = get(app.clone(), "/api/v1/forecast?lat=28.61&lon=77.2&horizon=24").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecasts"].as_array().unwrap().len(), 24);

        let (status, body) = get(app, "/api/v1/forecast?lat=28.61&lon=77.2&horizon=36").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "horizon");
    }

    #[tokio::test]
    async fn test_regional_forecast() {
        let (status, body) = get(test_app(delhi_stations()), "/api/v1/forecast/regional").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["region"], "Delhi-NCR");
        assert_eq!(body["locations"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_cigarette_equivalence() {
        let (status, body) = get(test_app(Vec::new()), "/api/v1/impact/cigarettes?aqi=300").await;

        assert_eq!(status, StatusCode::OK);
        assert!((body["pm25_est"].as_f64().unwrap() - 250.4).abs() < 0.05);
        assert!((body["cigarettes_equivalent"].as_f64().unwrap() - 11.38).abs() < 0.01);

        let (status, _) = get(test_app(Vec::new()), "/api/v1/impact/cigarettes?aqi=-3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_recommendations() {
        let (status, body) = get(
            test_app(Vec::new()),
            "/api/v1/health/recommendations?aqi=180&sensitive_group=true",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "Unhealthy");
        assert_eq!(body["mask_required"], true);
    }

    /// Symptom submissions are stored and correlated
    #[tokio::test]
    async fn test_symptom_flow() {
        let app = test_app(Vec::new());
        let report = serde_json::json!({
            "lat": 28.61,
            "lon": 77.2,
            "aqi": 185.0,
            "symptoms": ["cough", "headache"],
            "severity": 6
        });

        let (status, body) = post_json(app.clone(), "/api/v1/health/symptoms", report.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "accepted");

        let (_, body) = get(app.clone(), "/api/v1/health/correlation").await;
        assert_eq!(body["correlation"], "insufficient data");
        assert_eq!(body["total_samples"], 1);

        for _ in 0..2 {
            post_json(app.clone(), "/api/v1/health/symptoms", report.clone()).await;
        }
        let (_, body) = get(app.clone(), "/api/v1/health/correlation").await;
        assert_eq!(body["correlation"]["151-200"]["count"], 3);
        assert_eq!(body["correlation"]["151-200"]["avg_severity"], 6.0);

        let invalid = serde_json::json!({
            "lat": 28.61,
            "lon": 77.2,
            "aqi": 185.0,
            "symptoms": [],
            "severity": 11
        });
        let (status, body) = post_json(app, "/api/v1/health/symptoms", invalid).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_location_aqi() {
        let app = test_app(delhi_stations());

        let (status, body) = get(app.clone(), "/api/v1/aqi/location?lat=28.6289&lon=77.2405").await;
        assert_eq!(status, StatusCode::OK);
        assert!((body["aqi"].as_f64().unwrap() - shared::pm25_to_aqi(160.0).unwrap()).abs() < 1e-6);
        let category = shared::AqiCategory::from_aqi(body["aqi"].as_f64().unwrap());
        assert_eq!(body["category"], serde_json::to_value(category).unwrap());
        assert_eq!(body["confidence"], 1.0);
        assert_eq!(body["temperature"], 24.0);

        let (status, body) = get(app.clone(), "/api/v1/aqi/location?lat=28.60&lon=77.22").await;
        assert_eq!(status, StatusCode::OK);
        let aqi = body["aqi"].as_f64().unwrap();
        let lowest = shared::pm25_to_aqi(45.0).unwrap();
        let highest = shared::pm25_to_aqi(210.0).unwrap();
        assert!(aqi >= lowest && aqi <= highest);

        let (status, body) = get(app, "/api/v1/aqi/location?lat=95.0&lon=77.2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "location");

        let (status, body) = get(test_app(Vec::new()), "/api/v1/aqi/location?lat=28.61&lon=77.2").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "DATA_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_location_alert() {
        let (status, body) = get(test_app(delhi_stations()), "/api/v1/alerts?lat=28.61&lon=77.2").await;

        assert_eq!(status, StatusCode::OK);
        let aqi = body["predicted_aqi"].as_f64().unwrap();
        let severity = shared::AlertSeverity::for_aqi(aqi);
        assert_eq!(body["severity"], serde_json::to_value(severity).unwrap());
        assert_eq!(
            body["category"],
            serde_json::to_value(shared::AqiCategory::from_aqi(aqi)).unwrap()
        );
        assert!(!body["alert"].as_str().unwrap().is_empty());
        assert!(!body["recommendations"].as_array().unwrap().is_empty());

        let (status, _) = get(test_app(Vec::new()), "/api/v1/alerts?lat=28.61").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Readings pulled for a grid are browsable afterwards
    #[tokio::test]
    async fn test_historical_readings() {
        let app = test_app(delhi_stations());

        let (_, body) = get(app.clone(), "/api/v1/historical").await;
        assert_eq!(body["count"], 0);

        let (status, _) = get(app.clone(), "/api/v1/aqi/grid?lat=28.61&lon=77.2&radius_km=5").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get(app.clone(), "/api/v1/historical").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 4);

        let (_, body) = get(
            app.clone(),
            "/api/v1/historical?lat=28.6289&lon=77.2405&radius_km=1",
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["readings"][0]["station_id"], "DL-ITO");
        assert_eq!(body["readings"][0]["pm25"], 160.0);

        let (_, body) = get(app.clone(), "/api/v1/historical?limit=2").await;
        assert_eq!(body["readings"].as_array().unwrap().len(), 2);

        let (_, body) = get(app.clone(), "/api/v1/historical?start_time=2099-01-01T00:00:00Z").await;
        assert_eq!(body["count"], 0);

        let (status, body) = get(
            app,
            "/api/v1/historical?start_time=2024-11-05T00:00:00Z&end_time=2024-11-04T00:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "start_time");
    }

    #[tokio::test]
    async fn test_root_and_unknown_route() {
        let app = test_app(Vec::new());
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = get(app, "/api/v1/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
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

        /// Out-of-range coordinates are rejected before any computation
        #[test]
        fn prop_invalid_latitude_rejected(lat in 90.01f64..1000.0) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (status, body) = runtime.block_on(get(
                test_app(delhi_stations()),
                &format!("/api/v1/forecast?lat={}&lon=77.2", lat),
            ));

            prop_assert_eq!(status, StatusCode::BAD_REQUEST);
            prop_assert_eq!(&body["error"]["code"], "INVALID_INPUT");
        }
    }
}
