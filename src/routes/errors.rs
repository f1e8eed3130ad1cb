use crate::core::{DecodeError, UploadError};
use crate::models::ApiError;
use crate::services::GatewayError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Terminal failure of one analysis request
///
/// Every variant maps to exactly one HTTP status and is scoped to the
/// request that produced it.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No image file provided")]
    NoFile,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Gemini API key not configured")]
    Unconfigured,

    #[error("Upstream model failure: {0}")]
    UpstreamFailure(#[from] GatewayError),

    #[error("Invalid model response: {0}")]
    InvalidModelResponse(#[from] DecodeError),
}

impl From<UploadError> for AnalyzeError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NoFiles => AnalyzeError::NoFile,
            other => AnalyzeError::InvalidUpload(other.to_string()),
        }
    }
}

impl ResponseError for AnalyzeError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyzeError::NoFile | AnalyzeError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            AnalyzeError::Unconfigured
            | AnalyzeError::UpstreamFailure(_)
            | AnalyzeError::InvalidModelResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body without internal details
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.to_api_error(false))
    }
}

/// An [`AnalyzeError`] paired with the deployment's detail policy.
///
/// Returned by the analysis handler so actix renders the `{error, details?}`
/// body, with `details` present only when the deployment exposes them.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct AnalyzeFailure {
    pub error: AnalyzeError,
    pub expose_details: bool,
}

impl ResponseError for AnalyzeFailure {
    fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.error.to_api_error(self.expose_details))
    }
}

impl AnalyzeError {
    /// Short machine-friendly name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzeError::NoFile => "no_file",
            AnalyzeError::InvalidUpload(_) => "invalid_upload",
            AnalyzeError::Unconfigured => "unconfigured",
            AnalyzeError::UpstreamFailure(_) => "upstream_failure",
            AnalyzeError::InvalidModelResponse(_) => "invalid_model_response",
        }
    }

    /// Build the client-facing body.
    ///
    /// Client errors carry their full message. Server-side failures get a
    /// generic message, with the internal cause in `details` only when
    /// `expose_details` is set.
    pub fn to_api_error(&self, expose_details: bool) -> ApiError {
        let (error, internal) = match self {
            AnalyzeError::NoFile | AnalyzeError::InvalidUpload(_) | AnalyzeError::Unconfigured => {
                (self.to_string(), None)
            }
            AnalyzeError::UpstreamFailure(e) => (
                "An error occurred during analysis. Please try again.".to_string(),
                Some(e.to_string()),
            ),
            AnalyzeError::InvalidModelResponse(e) => (
                "The analysis service returned an unexpected response. Please try again.".to_string(),
                Some(e.to_string()),
            ),
        };

        ApiError {
            error,
            details: internal.filter(|_| expose_details),
        }
    }
}
