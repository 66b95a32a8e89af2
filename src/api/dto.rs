//! REST API response data transfer objects

use serde::Serialize;
use std::collections::HashMap;

use crate::service::PredictionOutcome;

/// Uniform response envelope for the predict endpoint.
#[derive(Debug, Serialize)]
pub struct PredictEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PredictionDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictEnvelope {
    pub fn ok(outcome: &PredictionOutcome) -> Self {
        Self {
            success: true,
            data: Some(PredictionDto {
                age: outcome.prediction.age,
                gender: outcome.prediction.gender.as_str().to_string(),
                age_confidence: outcome.prediction.age_confidence,
                gender_confidence: outcome.prediction.gender_confidence,
                processing_time: outcome.processing_time_ms,
            }),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionDto {
    pub age: i32,
    pub gender: String,
    pub age_confidence: f32,
    pub gender_confidence: f32,
    /// Wall-clock processing time in milliseconds.
    pub processing_time: u64,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub models_loaded: HashMap<String, bool>,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AgeGenderPrediction, Gender};

    #[test]
    fn test_envelope_ok_wire_shape() {
        let envelope = PredictEnvelope::ok(&PredictionOutcome {
            prediction: AgeGenderPrediction {
                age: 31,
                gender: Gender::Female,
                age_confidence: 0.8,
                gender_confidence: 0.92,
            },
            processing_time_ms: 45,
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["age"], 31);
        assert_eq!(json["data"]["gender"], "female");
        assert!(json["data"]["ageConfidence"].is_number());
        assert!(json["data"]["genderConfidence"].is_number());
        assert_eq!(json["data"]["processingTime"], 45);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_envelope_err_wire_shape() {
        let json = serde_json::to_value(PredictEnvelope::err("bad upload")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "bad upload");
        assert!(json.get("data").is_none());
    }
}
