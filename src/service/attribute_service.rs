//! Attribute service - core request orchestration
//!
//! Validates an upload, normalizes it, and runs the prediction on a
//! blocking task. One image in flight produces exactly one prediction;
//! each request owns its input buffer end-to-end.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::LimitsConfig;
use crate::engine::preprocess::{decode_image, normalize};
use crate::engine::{InferenceEngine, ModelLoader, ModelLoadingState};
use crate::error::PipelineError;
use crate::utils::image::validate_upload;

use super::types::*;

/// Face attribute inference service
pub struct AttributeService {
    engine: Arc<InferenceEngine>,
    loader: Arc<ModelLoader>,
    limits: LimitsConfig,
}

impl AttributeService {
    pub fn new(
        engine: Arc<InferenceEngine>,
        loader: Arc<ModelLoader>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            engine,
            loader,
            limits,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.limits.max_upload_bytes
    }

    /// Current loading snapshot, for the status endpoint.
    pub fn loading_state(&self) -> ModelLoadingState {
        self.loader.state()
    }

    /// Runs the full pipeline on uploaded image bytes.
    ///
    /// Size and format are validated before any decode attempt. Decode,
    /// normalization and both forward passes run on a blocking task.
    pub async fn predict(&self, image_data: &[u8]) -> Result<PredictionOutcome, PipelineError> {
        validate_upload(image_data, self.limits.max_upload_bytes)?;

        let start = Instant::now();
        let engine = Arc::clone(&self.engine);
        let data = image_data.to_vec();

        let prediction = tokio::task::spawn_blocking(move || {
            let image = decode_image(&data)?;
            let input = normalize(&image, engine.arena())?;
            engine.predict(input)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("inference task failed: {e}")))??;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Predicted age={} gender={} in {}ms",
            prediction.age,
            prediction.gender.as_str(),
            processing_time_ms
        );

        Ok(PredictionOutcome {
            prediction,
            processing_time_ms,
        })
    }

    /// Get health status
    pub fn health(&self) -> HealthResult {
        let loaded = self.loader.state().is_loaded;
        let models_loaded = [("age", loaded), ("gender", loaded)]
            .into_iter()
            .map(|(name, state)| (name.to_string(), state))
            .collect();

        HealthResult {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            models_loaded,
        }
    }
}
