//! Image generation API client.
//!
//! [`GenerationClient::generate`] drives a bounded retry loop over the
//! remote endpoint. Rate limiting, 5xx responses, timeouts and connection
//! failures are retried with linear backoff; everything else ends the call on
//! the attempt where it happened.

use crate::request::GenerationRequest;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use imagegen_mcp_common::config::{ApiConfig, MAX_DIMENSION};
use imagegen_mcp_common::error::GenerationFailure;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

/// Maximum number of HTTP calls in flight across all callers.
pub const WORKER_POOL_SIZE: usize = 4;

/// Error bodies are cut to this many characters before being reported.
pub const BODY_EXCERPT_CHARS: usize = 200;

/// Pixel area that gets the unscaled base timeout.
const BASELINE_AREA: u64 = (MAX_DIMENSION as u64) * (MAX_DIMENSION as u64);

/// A base64-encoded image as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode to raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.0)
    }
}

/// Result of a full generation call, retries included.
pub type GenerationOutcome = Result<Vec<EncodedImage>, GenerationFailure>;

/// Attempt counter and linear backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base_delay,
        }
    }

    /// Zero-based index of the current attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_last(&self) -> bool {
        self.attempt + 1 >= self.max_attempts
    }

    /// Delay to wait after the current attempt fails: `base * (attempt + 1)`.
    pub fn backoff(&self) -> Duration {
        self.base_delay.saturating_mul(self.attempt + 1)
    }

    pub fn advance(&mut self) {
        self.attempt += 1;
    }
}

/// Per-attempt timeout, growing linearly with pixel area.
///
/// A 1024x1024 request gets twice the base timeout. Falls back to `base` when
/// the scaled value is not representable.
pub fn attempt_timeout(base: Duration, pixel_area: u64) -> Duration {
    let factor = 1.0 + pixel_area as f64 / BASELINE_AREA as f64;
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base)
}

/// Classification of a single attempt.
#[derive(Debug)]
enum AttemptResult {
    Success(Vec<EncodedImage>),
    Transient(GenerationFailure),
    Terminal(GenerationFailure),
}

#[derive(Debug, Serialize)]
struct GenerationPayload<'a> {
    model: &'a str,
    prompt: &'a str,
    width: u32,
    height: u32,
    steps: u8,
    n: u8,
    response_format: &'static str,
}

impl<'a> GenerationPayload<'a> {
    fn new(model: &'a str, request: &'a GenerationRequest) -> Self {
        Self {
            model,
            prompt: request.prompt(),
            width: request.width(),
            height: request.height(),
            steps: request.steps(),
            n: request.batch_size(),
            response_format: "b64_json",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

/// Client for the image generation endpoint.
///
/// Cloning is cheap; clones share the HTTP connection pool and the worker
/// permits.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    api: ApiConfig,
    workers: Arc<Semaphore>,
}

impl GenerationClient {
    pub fn new(api: ApiConfig) -> Self {
        Self::with_http(api, reqwest::Client::new())
    }

    pub fn with_http(api: ApiConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            api,
            workers: Arc::new(Semaphore::new(WORKER_POOL_SIZE)),
        }
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Generate images for `request`, retrying transient failures.
    ///
    /// When the final attempt fails transiently, that attempt's failure is
    /// returned. `RetriesExhausted` is only seen when no attempt is allowed.
    #[instrument(
        level = "info",
        name = "generate",
        skip(self, request),
        fields(width = request.width(), height = request.height(), steps = request.steps())
    )]
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let payload = GenerationPayload::new(&self.api.model, request);
        let timeout = attempt_timeout(self.api.timeout, request.pixel_area());
        let mut retry = RetryState::new(self.api.max_retries, self.api.retry_delay);

        while retry.attempt() < self.api.max_retries {
            info!(
                attempt = retry.attempt() + 1,
                max_attempts = self.api.max_retries,
                timeout_secs = timeout.as_secs_f64(),
                "Requesting image generation"
            );

            let failure = match self.attempt(&payload, timeout, retry.attempt() + 1).await {
                AttemptResult::Success(images) => {
                    info!(count = images.len(), "Received images from API");
                    return Ok(images);
                }
                AttemptResult::Terminal(failure) => {
                    error!(error = %failure, "Image generation failed");
                    return Err(failure);
                }
                AttemptResult::Transient(failure) => failure,
            };

            if retry.is_last() {
                error!(error = %failure, attempts = retry.attempt() + 1, "Giving up after transient failures");
                return Err(failure);
            }

            let delay = retry.backoff();
            warn!(error = %failure, "Transient failure, will retry");
            info!(delay_ms = delay.as_millis() as u64, "Waiting before retry");
            tokio::time::sleep(delay).await;
            retry.advance();
        }

        error!("No generation attempts were made");
        Err(GenerationFailure::RetriesExhausted)
    }

    /// Run one HTTP exchange on the worker pool and classify it.
    async fn attempt(
        &self,
        payload: &GenerationPayload<'_>,
        timeout: Duration,
        attempt_number: u32,
    ) -> AttemptResult {
        let permit = match Arc::clone(&self.workers).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => return AttemptResult::Terminal(GenerationFailure::InternalError(e.to_string())),
        };

        let call = self
            .http
            .post(&self.api.url)
            .bearer_auth(&self.api.api_key)
            .timeout(timeout)
            .json(payload);

        let task = tokio::spawn(async move {
            let _permit = permit;
            let response = call.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        });

        match task.await {
            Ok(Ok((status, body))) => {
                debug!(status = status.as_u16(), bytes = body.len(), "API responded");
                classify_response(status, &body)
            }
            Ok(Err(e)) => classify_transport_error(&e, attempt_number),
            Err(e) => AttemptResult::Terminal(GenerationFailure::InternalError(format!(
                "worker task failed: {}",
                e
            ))),
        }
    }
}

fn classify_response(status: StatusCode, body: &[u8]) -> AttemptResult {
    match status.as_u16() {
        200 => match serde_json::from_slice::<GenerationResponse>(body) {
            Ok(response) => {
                // Entries without image data are skipped.
                let images: Vec<EncodedImage> = response
                    .data
                    .into_iter()
                    .filter_map(|datum| datum.b64_json)
                    .filter(|b64| !b64.trim().is_empty())
                    .map(EncodedImage)
                    .collect();

                if images.is_empty() {
                    AttemptResult::Terminal(GenerationFailure::EmptyResult)
                } else {
                    AttemptResult::Success(images)
                }
            }
            Err(e) => AttemptResult::Terminal(GenerationFailure::MalformedResponse(format!(
                "{} ({})",
                excerpt(body),
                e
            ))),
        },
        401 => AttemptResult::Terminal(GenerationFailure::AuthError),
        429 => AttemptResult::Transient(GenerationFailure::RateLimited),
        code if code >= 500 => AttemptResult::Transient(GenerationFailure::ServerError {
            status: code,
            body: excerpt(body),
        }),
        code => AttemptResult::Terminal(GenerationFailure::RequestFailed {
            status: code,
            body: excerpt(body),
        }),
    }
}

fn classify_transport_error(err: &reqwest::Error, attempt_number: u32) -> AttemptResult {
    if err.is_timeout() {
        AttemptResult::Transient(GenerationFailure::Timeout {
            attempts: attempt_number,
        })
    } else if err.is_connect() || err.is_request() || err.is_body() {
        AttemptResult::Transient(GenerationFailure::ConnectionError(err.to_string()))
    } else {
        AttemptResult::Terminal(GenerationFailure::InternalError(err.to_string()))
    }
}

/// Lossy UTF-8 view of `body`, cut to [`BODY_EXCERPT_CHARS`].
fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_linear() {
        let mut retry = RetryState::new(3, Duration::from_secs(5));
        assert_eq!(retry.backoff(), Duration::from_secs(5));
        retry.advance();
        assert_eq!(retry.backoff(), Duration::from_secs(10));
        retry.advance();
        assert_eq!(retry.backoff(), Duration::from_secs(15));
    }

    #[test]
    fn test_retry_state_last_attempt() {
        let mut retry = RetryState::new(2, Duration::from_millis(1));
        assert!(!retry.is_last());
        retry.advance();
        assert!(retry.is_last());
        assert_eq!(retry.attempt(), 1);
    }

    #[test]
    fn test_attempt_timeout_scales_with_area() {
        let base = Duration::from_secs(60);
        assert_eq!(attempt_timeout(base, 1024 * 1024), Duration::from_secs(120));
        assert_eq!(attempt_timeout(base, 512 * 512), Duration::from_secs(75));
        assert!(attempt_timeout(base, 1024 * 576) < attempt_timeout(base, 1024 * 768));
    }

    #[test]
    fn test_attempt_timeout_overflow_keeps_base() {
        let base = Duration::from_secs(u64::MAX);
        assert_eq!(attempt_timeout(base, 1024 * 1024), base);
        assert_eq!(attempt_timeout(Duration::MAX, 1), Duration::MAX);
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        let cut = excerpt(body.as_bytes());
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), BODY_EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_excerpt_keeps_short_body() {
        assert_eq!(excerpt(b"bad request"), "bad request");
        assert_eq!(excerpt(&[b'x'; BODY_EXCERPT_CHARS]).len(), BODY_EXCERPT_CHARS);
    }

    #[test]
    fn test_classify_statuses() {
        assert!(matches!(
            classify_response(StatusCode::UNAUTHORIZED, b""),
            AttemptResult::Terminal(GenerationFailure::AuthError)
        ));
        assert!(matches!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, b""),
            AttemptResult::Transient(GenerationFailure::RateLimited)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_GATEWAY, b"upstream"),
            AttemptResult::Transient(GenerationFailure::ServerError { status: 502, .. })
        ));
        assert!(matches!(
            classify_response(StatusCode::NOT_FOUND, b"missing"),
            AttemptResult::Terminal(GenerationFailure::RequestFailed { status: 404, .. })
        ));
        // Only a plain 200 carries images.
        assert!(matches!(
            classify_response(StatusCode::CREATED, br#"{"data":[{"b64_json":"aGk="}]}"#),
            AttemptResult::Terminal(GenerationFailure::RequestFailed { status: 201, .. })
        ));
    }

    #[test]
    fn test_classify_success_payloads() {
        match classify_response(StatusCode::OK, br#"{"data":[{"b64_json":"aGk="},{"b64_json":"aG8="}]}"#) {
            AttemptResult::Success(images) => {
                assert_eq!(images.len(), 2);
                assert_eq!(images[0].decode().unwrap(), b"hi");
            }
            other => panic!("Expected success, got {:?}", other),
        }

        assert!(matches!(
            classify_response(StatusCode::OK, br#"{"data":[]}"#),
            AttemptResult::Terminal(GenerationFailure::EmptyResult)
        ));
        assert!(matches!(
            classify_response(StatusCode::OK, br#"{"images":[]}"#),
            AttemptResult::Terminal(GenerationFailure::MalformedResponse(_))
        ));
        assert!(matches!(
            classify_response(StatusCode::OK, br#"{"data":{"b64_json":"aGk="}}"#),
            AttemptResult::Terminal(GenerationFailure::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_classify_skips_entries_without_image_data() {
        match classify_response(
            StatusCode::OK,
            br#"{"data":[{"url":"http://x"},{"b64_json":""},{"b64_json":"aGk="},{"b64_json":null}]}"#,
        ) {
            AttemptResult::Success(images) => {
                assert_eq!(images, vec![EncodedImage::new("aGk=")]);
            }
            other => panic!("Expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_only_empty_entries_is_empty_result() {
        assert!(matches!(
            classify_response(StatusCode::OK, br#"{"data":[{"b64_json":""}]}"#),
            AttemptResult::Terminal(GenerationFailure::EmptyResult)
        ));
        assert!(matches!(
            classify_response(StatusCode::OK, br#"{"data":[{"url":"http://x"},{"revised_prompt":"x"}]}"#),
            AttemptResult::Terminal(GenerationFailure::EmptyResult)
        ));
    }

    #[test]
    fn test_malformed_response_quotes_body() {
        match classify_response(StatusCode::OK, br#"{"images":["abc"]}"#) {
            AttemptResult::Terminal(GenerationFailure::MalformedResponse(detail)) => {
                assert!(detail.starts_with(r#"{"images":["abc"]}"#), "{}", detail);
            }
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }

        let long_body = format!(r#"{{"unexpected":"{}"}}"#, "z".repeat(400));
        match classify_response(StatusCode::OK, long_body.as_bytes()) {
            AttemptResult::Terminal(GenerationFailure::MalformedResponse(detail)) => {
                assert!(detail.contains("..."));
                assert!(!detail.contains(&"z".repeat(250)));
            }
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_serialization() {
        let request = crate::request::RequestBuilder::new(Default::default())
            .build("a lighthouse", &crate::request::DimensionSpec::AspectRatio("4:3".into()), Some(2))
            .unwrap();
        let json = serde_json::to_value(GenerationPayload::new("flux", &request)).unwrap();

        assert_eq!(json["model"], "flux");
        assert_eq!(json["prompt"], "a lighthouse");
        assert_eq!(json["width"], 1024);
        assert_eq!(json["height"], 768);
        assert_eq!(json["steps"], 2);
        assert_eq!(json["n"], 4);
        assert_eq!(json["response_format"], "b64_json");
    }
}
