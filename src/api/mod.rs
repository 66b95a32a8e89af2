pub mod dto;
pub mod rest;

pub use rest::{create_rest_router, AppState};
