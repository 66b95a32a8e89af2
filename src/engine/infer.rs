//! Prediction execution.
//!
//! Consumes a normalized input tensor and the model registry, runs both
//! forward passes, and maps raw outputs into an [`AgeGenderPrediction`].
//! Every buffer involved is arena-tracked, so failures at any point still
//! release everything before the error surfaces as `Prediction`.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::config::CalibrationConfig;
use crate::engine::registry::ModelRegistry;
use crate::engine::tensor::{TensorArena, TensorBuffer};
use crate::error::PipelineError;
use crate::utils::math::argmax;

/// Gender classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Gender model output order: index 0 = male, index 1 = female.
    fn from_index(idx: usize) -> Self {
        match idx {
            0 => Gender::Male,
            _ => Gender::Female,
        }
    }
}

/// A fully populated attribute prediction. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct AgeGenderPrediction {
    pub age: i32,
    pub gender: Gender,
    /// Placeholder heuristic (baseline plus bounded jitter), not a
    /// calibrated predictive variance. Treat as a rough signal.
    pub age_confidence: f32,
    pub gender_confidence: f32,
}

/// Runs single-image predictions against a ready registry.
pub struct InferenceEngine {
    registry: Arc<ModelRegistry>,
    arena: Arc<TensorArena>,
    calibration: CalibrationConfig,
}

impl InferenceEngine {
    pub fn new(
        registry: Arc<ModelRegistry>,
        arena: Arc<TensorArena>,
        calibration: CalibrationConfig,
    ) -> Self {
        Self {
            registry,
            arena,
            calibration,
        }
    }

    pub fn arena(&self) -> &Arc<TensorArena> {
        &self.arena
    }

    /// Runs both forward passes on an owned normalized input.
    ///
    /// Takes ownership of the input buffer; it is released on every exit
    /// path, as are all forward-pass outputs. Fails with `NotLoaded`
    /// before any computation if the registry is not ready; any later
    /// failure comes back as `Prediction` wrapping the cause.
    pub fn predict(&self, input: TensorBuffer) -> Result<AgeGenderPrediction, PipelineError> {
        let (age_model, gender_model) = self.registry.models().ok_or(PipelineError::NotLoaded)?;

        // `input` stays owned by this frame, so it drops on success and on
        // error alike; intermediates drop inside run_forward.
        self.run_forward(&input, age_model.as_ref(), gender_model.as_ref())
            .map_err(PipelineError::into_prediction)
    }

    fn run_forward(
        &self,
        input: &TensorBuffer,
        age_model: &dyn crate::engine::model::Model,
        gender_model: &dyn crate::engine::model::Model,
    ) -> Result<AgeGenderPrediction, PipelineError> {
        let age_output = age_model.forward(input, &self.arena)?;
        age_output.expect_shape(&[1, 1])?;
        let raw_age = age_output.as_slice()[0];
        age_output.release();

        let age = (raw_age * self.calibration.age_scale + self.calibration.age_offset)
            .clamp(0.0, 100.0)
            .round() as i32;

        let gender_output = gender_model.forward(input, &self.arena)?;
        gender_output.expect_shape(&[1, 2])?;
        let probs = gender_output.as_slice().to_vec();
        gender_output.release();

        let winner = argmax(&probs);
        let gender = Gender::from_index(winner);
        let gender_confidence = probs[winner].clamp(0.0, 1.0);

        let age_confidence = self.age_confidence();

        debug!(
            "Prediction: age={} ({:.3} raw), gender={} ({:.3})",
            age,
            raw_age,
            gender.as_str(),
            gender_confidence
        );

        Ok(AgeGenderPrediction {
            age,
            gender,
            age_confidence,
            gender_confidence,
        })
    }

    /// Placeholder age-confidence heuristic: configured baseline with
    /// bounded jitter, clamped to [0, 1].
    fn age_confidence(&self) -> f32 {
        let jitter = self.calibration.age_confidence_jitter;
        let value = if jitter > 0.0 {
            let offset = rand::thread_rng().gen_range(-jitter..=jitter);
            self.calibration.age_confidence_baseline + offset
        } else {
            self.calibration.age_confidence_baseline
        };
        value.clamp(0.0, 1.0)
    }
}
