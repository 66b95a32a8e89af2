//! Inference engine module
//!
//! Provides the attribute inference pipeline:
//! - Arena-tracked tensor buffers with guaranteed release
//! - Image normalization into the canonical model input
//! - In-process model construction with warm-up
//! - Load lifecycle state machine with progress observation
//! - Single-image prediction execution

pub mod infer;
pub mod loader;
pub mod model;
pub mod preprocess;
pub mod registry;
pub mod tensor;

pub use infer::{AgeGenderPrediction, Gender, InferenceEngine};
pub use loader::{ConvNetFactory, ModelFactory, ModelLoader, ModelLoadingState};
pub use model::{ConvNet, Model};
pub use registry::ModelRegistry;
pub use tensor::{TensorArena, TensorBuffer};
