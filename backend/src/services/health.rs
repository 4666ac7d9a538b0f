//! Health guidance keyed by AQI category

use serde::Serialize;
use shared::{validate_aqi, AqiCategory};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthAdvice {
    pub aqi: f64,
    pub category: AqiCategory,
    pub color: &'static str,
    pub health_impact: &'static str,
    pub outdoor_activities: &'static str,
    pub indoor_activities: &'static str,
    pub mask_required: bool,
    pub sensitive_groups_advice: &'static str,
    pub detailed_recommendations: Vec<&'static str>,
}

/// Advice for a given AQI; `sensitive_group` covers children, the elderly
/// and people with respiratory conditions
pub fn recommendations(aqi: f64, sensitive_group: bool) -> AppResult<HealthAdvice> {
    validate_aqi(aqi).map_err(|msg| AppError::invalid("aqi", msg))?;
    let category = AqiCategory::from_aqi(aqi);

    let advice = match category {
        AqiCategory::Good => HealthAdvice {
            aqi,
            category,
            color: category.color(),
            health_impact: "Air quality is satisfactory and poses little or no risk.",
            outdoor_activities: "Ideal for outdoor activities, exercise and prolonged exposure.",
            indoor_activities: "No restrictions on indoor activities.",
            mask_required: false,
            sensitive_groups_advice: "No special precautions needed.",
            detailed_recommendations: vec![
                "Good day for outdoor exercise",
                "Open windows to air out the house",
                "Morning and evening walks are safe",
            ],
        },
        AqiCategory::Moderate => HealthAdvice {
            aqi,
            category,
            color: category.color(),
            health_impact: "Air quality is acceptable, with some risk for unusually sensitive people.",
            outdoor_activities: "Outdoor activities are generally fine. Sensitive people should limit prolonged exposure.",
            indoor_activities: "Normal indoor activities are fine.",
            mask_required: false,
            sensitive_groups_advice: if sensitive_group {
                "Reduce prolonged outdoor exertion if you notice symptoms."
            } else {
                ""
            },
            detailed_recommendations: if sensitive_group {
                vec![
                    "Keep intense outdoor exercise under two hours",
                    "Take breaks during outdoor activities",
                    "Watch for respiratory symptoms",
                ]
            } else {
                vec![
                    "Most outdoor activities are safe",
                    "Stay hydrated during exercise",
                    "Watch for unusual symptoms",
                ]
            },
        },
        AqiCategory::UnhealthyForSensitive => HealthAdvice {
            aqi,
            category,
            color: category.color(),
            health_impact: "Sensitive groups may experience health effects; the general public is less likely to.",
            outdoor_activities: "Reduce prolonged or heavy outdoor exertion and take more breaks.",
            indoor_activities: "Keep windows closed and use an air purifier if available.",
            mask_required: sensitive_group,
            sensitive_groups_advice: "Reduce heavy outdoor exertion and consider an N95 mask.",
            detailed_recommendations: vec![
                "Keep outdoor activities under one hour",
                "Avoid traffic-heavy roads",
                "Run air purifiers indoors",
                "Keep windows and doors closed",
                "Sensitive groups should wear N95 masks outdoors",
            ],
        },
        AqiCategory::Unhealthy => HealthAdvice {
            aqi,
            category,
            color: category.color(),
            health_impact: "Everyone may begin to experience health effects; sensitive groups more seriously.",
            outdoor_activities: "Avoid prolonged outdoor exertion.",
            indoor_activities: "Stay indoors as much as possible and use air purifiers.",
            mask_required: true,
            sensitive_groups_advice: "Avoid outdoor activities and stay in filtered indoor air.",
            detailed_recommendations: vec![
                "Minimize time outdoors",
                "Wear an N95 mask when going out",
                "Stay away from heavy traffic",
                "Use HEPA air purifiers indoors",
                "Keep all windows and doors closed",
                "Postpone outdoor exercise",
                "Children and the elderly should stay indoors",
            ],
        },
        AqiCategory::VeryUnhealthy => HealthAdvice {
            aqi,
            category,
            color: category.color(),
            health_impact: "Health alert: everyone may experience serious health effects.",
            outdoor_activities: "Avoid all outdoor physical activity.",
            indoor_activities: "Remain indoors and keep activity levels low.",
            mask_required: true,
            sensitive_groups_advice: "Stay indoors with low activity and seek medical help if symptoms appear.",
            detailed_recommendations: vec![
                "Stay indoors",
                "Seal doors and windows",
                "Run air purifiers continuously",
                "Wear an N95 or N99 mask if you must go out",
                "Avoid all physical exertion",
                "Monitor symptoms closely",
                "Keep emergency contacts at hand",
            ],
        },
        AqiCategory::Hazardous => HealthAdvice {
            aqi,
            category,
            color: category.color(),
            health_impact: "Health warning of emergency conditions: everyone is likely to be affected.",
            outdoor_activities: "Avoid all outdoor activities.",
            indoor_activities: "Remain indoors with openings sealed and air purifiers running.",
            mask_required: true,
            sensitive_groups_advice: "Emergency conditions. Stay sealed indoors and seek immediate care for any symptoms.",
            detailed_recommendations: vec![
                "Do not go outside unless absolutely necessary",
                "Seal gaps around doors and windows",
                "Run every available air purifier",
                "Wear an N99 or P100 respirator if you must go out",
                "Avoid all physical activity",
                "Monitor health continuously",
                "Keep emergency medical contacts ready",
                "Schools and offices should close",
            ],
        },
    };

    Ok(advice)
}
