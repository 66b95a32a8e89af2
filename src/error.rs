//! Typed errors for the inference pipeline.
//!
//! Every failure the pipeline can surface maps to one variant here. The
//! REST layer translates variants into HTTP status codes; nothing retries
//! automatically.

/// Errors surfaced by the attribute inference pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Upload rejected before decode (bad size or unsupported format).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The bytes are not a decodable image container.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// Degenerate image geometry (zero width or height).
    #[error("invalid image dimensions {width}x{height}")]
    Dimension { width: u32, height: u32 },

    /// Inference attempted before the model registry is ready.
    #[error("models are not loaded")]
    NotLoaded,

    /// Model construction or warm-up failed. Fatal for the session.
    #[error("model load failed: {0}")]
    Load(String),

    /// A tensor did not have the shape an operation required.
    #[error("tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Wraps any failure during a forward pass, after buffer cleanup.
    #[error("prediction failed: {0}")]
    Prediction(#[source] Box<PipelineError>),

    /// Unexpected runtime failure (e.g. a panicked worker task).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Wraps a pipeline failure into the single error kind `predict` surfaces.
    pub fn into_prediction(self) -> Self {
        match self {
            // Already wrapped, or a precondition failure that must stay distinct.
            PipelineError::Prediction(_) | PipelineError::NotLoaded => self,
            other => PipelineError::Prediction(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_prediction_wraps_cause() {
        let err = PipelineError::ShapeMismatch {
            expected: vec![1, 2],
            actual: vec![2, 1],
        }
        .into_prediction();
        assert!(matches!(err, PipelineError::Prediction(_)));
        assert!(err.to_string().contains("prediction failed"));
    }

    #[test]
    fn test_not_loaded_is_not_wrapped() {
        let err = PipelineError::NotLoaded.into_prediction();
        assert!(matches!(err, PipelineError::NotLoaded));
    }
}
