//! Face Attribute Inference Service Library

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod service;
pub mod utils;

pub use config::Config;
pub use error::PipelineError;
