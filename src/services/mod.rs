// Service exports
pub mod gemini;

pub use gemini::{GatewayError, GeminiClient, RetryPolicy};
