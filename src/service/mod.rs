pub mod attribute_service;
pub mod types;

pub use attribute_service::AttributeService;
pub use types::{HealthResult, PredictionOutcome};
