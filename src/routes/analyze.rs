use crate::core::{decode, ModelRequest, UploadPolicy};
use crate::models::{AnalysisResult, HealthResponse, UploadCandidate, SCHEMA_VERSION};
use crate::routes::errors::{AnalyzeError, AnalyzeFailure};
use crate::services::GeminiClient;
use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{mime, web, HttpMessage, HttpRequest, HttpResponse, Responder, ResponseError};
use futures_util::TryStreamExt;
use std::sync::Arc;
use tracing::Instrument;

/// Multipart field name carrying image parts
pub const IMAGE_FIELD: &str = "image";

/// Response header advertising the analysis schema version
pub const SCHEMA_HEADER: &str = "X-Analysis-Schema";

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// `None` when no credential was configured at startup
    pub gemini: Option<Arc<GeminiClient>>,
    pub upload_policy: UploadPolicy,
    pub expose_error_details: bool,
}

/// Configure analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/analyze", web::post().to(analyze));
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Analysis endpoint
///
/// POST /analyze
///
/// `multipart/form-data` with one or more `image` parts. Responds with the
/// analysis result on success, or `{ "error": ..., "details"?: ... }`.
async fn analyze(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> Result<HttpResponse, AnalyzeFailure> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("analyze", request_id = %request_id);

    let outcome = run_analysis(&state, &req, payload).instrument(span.clone()).await;
    let _entered = span.enter();

    match outcome {
        Ok(result) => {
            tracing::info!("Analysis completed");
            Ok(HttpResponse::Ok()
                .insert_header((SCHEMA_HEADER, SCHEMA_VERSION))
                .json(result))
        }
        Err(error) => {
            if error.status_code().is_server_error() {
                tracing::error!(kind = error.kind(), "Analysis failed: {}", error);
            } else {
                tracing::info!(kind = error.kind(), "Analysis rejected: {}", error);
            }
            Err(AnalyzeFailure {
                error,
                expose_details: state.expose_error_details,
            })
        }
    }
}

/// Media types are case-insensitive; `Multipart/Form-Data` is a form too.
fn is_multipart_form(req: &HttpRequest) -> bool {
    matches!(
        req.mime_type(),
        Ok(Some(m)) if m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA
    )
}

/// Validate -> build prompt -> call model -> decode
async fn run_analysis(
    state: &AppState,
    req: &HttpRequest,
    payload: Multipart,
) -> Result<AnalysisResult, AnalyzeError> {
    if !is_multipart_form(req) {
        return Err(AnalyzeError::NoFile);
    }

    let candidates = read_candidates(payload, &state.upload_policy).await?;
    let images = state.upload_policy.validate(candidates)?;

    let gemini = state.gemini.as_ref().ok_or(AnalyzeError::Unconfigured)?;

    let request = ModelRequest::build(&images);
    drop(images);

    tracing::info!(
        "Requesting analysis of {} image(s) from {}",
        request.images.len(),
        gemini.model()
    );

    let raw = gemini.generate(&request).await?;

    decode(&raw).map_err(|e| {
        tracing::warn!("Undecodable model output ({} chars): {}", raw.len(), e);
        tracing::debug!("Raw model output: {}", raw);
        AnalyzeError::from(e)
    })
}

fn malformed(err: MultipartError) -> AnalyzeError {
    AnalyzeError::InvalidUpload(format!("Malformed multipart request: {}", err))
}

/// Collect every `image` part from the request body.
///
/// Parts beyond `max_files`, and bytes past `max_file_bytes`, are drained
/// and counted but never buffered.
async fn read_candidates(
    mut payload: Multipart,
    policy: &UploadPolicy,
) -> Result<Vec<UploadCandidate>, AnalyzeError> {
    let mut candidates = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        if field.name() != Some(IMAGE_FIELD) {
            tracing::debug!("Ignoring multipart field {:?}", field.name());
            drain(&mut field).await?;
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let media_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let buffer = candidates.len() < policy.max_files;
        let mut bytes = Vec::new();
        let mut size: u64 = 0;

        while let Some(chunk) = field.try_next().await.map_err(malformed)? {
            size += chunk.len() as u64;
            if buffer && size <= policy.max_file_bytes {
                bytes.extend_from_slice(&chunk);
            } else if !bytes.is_empty() {
                bytes = Vec::new();
            }
        }

        candidates.push(UploadCandidate {
            file_name,
            media_type,
            size,
            bytes,
        });
    }

    Ok(candidates)
}

async fn drain(field: &mut Field) -> Result<(), AnalyzeError> {
    while field.try_next().await.map_err(malformed)?.is_some() {}
    Ok(())
}
