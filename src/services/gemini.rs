use crate::config::GeminiSettings;
use crate::core::ModelRequest;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when calling the model provider
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gemini API key is not configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Model produced no output: {0}")]
    Blocked(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Transport hiccups and provider overload are worth another attempt;
    /// anything about the request or the content is not.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GatewayError::ApiError { status, .. } => matches!(
                StatusCode::from_u16(*status),
                Ok(StatusCode::TOO_MANY_REQUESTS)
                    | Ok(StatusCode::INTERNAL_SERVER_ERROR)
                    | Ok(StatusCode::BAD_GATEWAY)
                    | Ok(StatusCode::SERVICE_UNAVAILABLE)
                    | Ok(StatusCode::GATEWAY_TIMEOUT)
            ),
            _ => false,
        }
    }
}

/// Retry budget for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 4_000,
        }
    }
}

/// Client for the Gemini `generateContent` REST API
///
/// Built once at startup and shared by every worker; holds no per-request
/// state, so concurrent calls need no locking.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
    client: Client,
}

impl GeminiClient {
    /// Create a new client
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, GatewayError> {
        if api_key.trim().is_empty() {
            return Err(GatewayError::MissingApiKey);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            model,
            retry,
            client,
        })
    }

    pub fn from_settings(settings: &GeminiSettings) -> Result<Self, GatewayError> {
        let api_key = settings.api_key.clone().ok_or(GatewayError::MissingApiKey)?;
        Self::new(
            settings.endpoint.clone(),
            api_key,
            settings.model.clone(),
            Duration::from_secs(settings.timeout_secs),
            RetryPolicy {
                max_retries: settings.max_retries,
                initial_delay_ms: settings.initial_retry_delay_ms,
                max_delay_ms: settings.max_retry_delay_ms,
            },
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_delay_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_delay_ms))
            .with_multiplier(2.0)
            .with_randomization_factor(0.5)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Send one analysis request and return the raw completion text.
    ///
    /// Transient failures are retried up to `max_retries` times with
    /// jittered exponential backoff; everything else is returned at once.
    pub async fn generate(&self, request: &ModelRequest) -> Result<String, GatewayError> {
        let body = GenerateContentRequest::from_model_request(request);
        let mut backoff = self.create_backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.execute_request(&body).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::info!("Model call succeeded on attempt {}", attempt);
                    }
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt <= self.retry.max_retries => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_millis(self.retry.max_delay_ms));
                    tracing::warn!(
                        "Transient model error on attempt {}: {}. Retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("Model call failed after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }

    async fn execute_request(&self, body: &GenerateContentRequest<'_>) -> Result<String, GatewayError> {
        tracing::debug!("Calling model {} with {} image(s)", self.model, body.image_count());

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(GatewayError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        // Read errors (a body that stalls past the timeout) stay transport errors
        let bytes = response.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        parsed.into_text()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_model_request(request: &'a ModelRequest) -> Self {
        let mut parts = Vec::with_capacity(request.images.len() + 1);
        parts.push(Part::Text(&request.user_instruction));
        parts.extend(request.images.iter().map(|image| {
            Part::InlineData(InlineData {
                mime_type: image.mime_type,
                data: &image.data,
            })
        }));

        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text(request.system_instruction)],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
        }
    }

    fn image_count(&self) -> usize {
        self.contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter(|p| matches!(p, Part::InlineData(_)))
            .count()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, GatewayError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            GatewayError::Blocked(format!(
                "no candidates returned (block reason: {})",
                block_reason.as_deref().unwrap_or("unspecified")
            ))
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GatewayError::Blocked(format!(
                "empty completion (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unspecified")
            )));
        }

        Ok(text)
    }
}
