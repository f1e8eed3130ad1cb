//! Facelens - cosmetic face analysis service
//!
//! Accepts face photos, forwards them to a vision-language model with a
//! fixed prompt and returns the model's reply as a strictly validated
//! [`AnalysisResult`].

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{decode, strip_code_fences, DecodeError, ModelRequest, UploadError, UploadPolicy};
pub use models::{AnalysisResult, ApiError, ImageInput, ImageMediaType, SCHEMA_VERSION};
pub use routes::{configure_routes, AnalyzeError, AppState};
pub use services::{GatewayError, GeminiClient, RetryPolicy};
