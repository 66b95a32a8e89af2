//! Shared utilities

pub mod image;
pub mod math;
