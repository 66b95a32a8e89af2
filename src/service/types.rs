//! Service-level result types

use std::collections::HashMap;

use crate::engine::AgeGenderPrediction;

/// A completed prediction plus wall-clock processing time.
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub prediction: AgeGenderPrediction,
    pub processing_time_ms: u64,
}

/// Health result
#[derive(Debug, Clone)]
pub struct HealthResult {
    pub healthy: bool,
    pub version: String,
    pub models_loaded: HashMap<String, bool>,
}
