//! Client for the generative-language API.
//!
//! [`BackoffCaller`] wraps a [`GenerationTransport`] with a fixed retry
//! budget. Every failure mode of a single attempt (transport error, non-2xx
//! status, empty content, unparseable or wrongly shaped JSON, per-attempt
//! timeout) is retried; after the last attempt a single
//! [`GenerationError::Exhausted`] is returned.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use workbench_app::generation::{BackoffCaller, HttpTransport, MaterialsList, RetryPolicy};
//! use workbench_app::GenerationConfig;
//!
//! # async fn example(project: &workbench_store::Project) -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(&GenerationConfig::default())?;
//! let caller = BackoffCaller::new(Arc::new(transport), RetryPolicy::default());
//!
//! let request = workbench_app::generation::materials_request(project);
//! let list: MaterialsList = caller.call(&request, &CancellationToken::new()).await?;
//! println!("{} materials", list.materials.len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use workbench_store::Project;

use crate::config::GenerationConfig;

// ============================================================================
// Errors
// ============================================================================

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("API call failed with status: {0}")]
    Status(u16),

    /// The response body was not a valid API envelope.
    #[error("malformed response body: {0}")]
    MalformedResponse(String),

    /// No text at `candidates[0].content.parts[0].text`.
    #[error("received empty content from API")]
    EmptyContent,

    /// The model text was not JSON.
    #[error("API returned invalid JSON: {0}")]
    InvalidJson(String),

    /// The model JSON did not have the requested fields.
    #[error("API returned JSON of the wrong shape: {0}")]
    UnexpectedShape(String),

    /// The attempt ran past its deadline.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// Terminal failure of a generation call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Every attempt failed.
    #[error("Failed to communicate with the AI builder service after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        last: AttemptError,
    },

    /// The call was cancelled before it completed.
    #[error("generation request cancelled")]
    Cancelled,
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Retry budget and timing for [`BackoffCaller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Deadline for each attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Returns the wait after failed attempt `attempt` (0-indexed): `2^attempt * base_delay`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use workbench_app::generation::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_after(0), Duration::from_secs(1));
    /// assert_eq!(policy.delay_after(1), Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// Body of a `generateContent` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Prompt contents.
    pub contents: Vec<Content>,
    /// Output constraints.
    pub generation_config: RequestConfig,
}

/// One prompt turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Text parts of the turn.
    pub parts: Vec<Part>,
}

/// A text part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// The text.
    #[serde(default)]
    pub text: Option<String>,
}

/// Structured-output settings of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Always `application/json`.
    pub response_mime_type: String,
    /// Schema the model output must follow.
    pub response_schema: Value,
}

impl GenerateContentRequest {
    /// Builds a JSON-output request from a prompt and a response schema.
    #[must_use]
    pub fn json(prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.into()),
                }],
            }],
            generation_config: RequestConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            },
        }
    }

    /// Returns the prompt text.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.contents
            .first()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// Body of a `generateContent` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    /// Generated candidates; only the first is used.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// A generated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate content.
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Wraps model text the way the API does. Handy for transports and tests.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                }),
            }],
        }
    }

    /// Returns `candidates[0].content.parts[0].text` if present and non-empty.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Sends one `generateContent` request.
#[async_trait]
pub trait GenerationTransport: Send + Sync + fmt::Debug {
    /// Performs a single request with no retries.
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AttemptError>;
}

/// `reqwest`-based transport for the hosted API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport for the configured model.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &GenerationConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint(config),
        })
    }
}

fn endpoint(config: &GenerationConfig) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        config.base_url.trim_end_matches('/'),
        config.model,
        config.api_key
    )
}

/// The endpoint carries the API key, so the URL is stripped from the message.
fn transport_error(e: reqwest::Error) -> AttemptError {
    AttemptError::Transport(e.without_url().to_string())
}

#[async_trait]
impl GenerationTransport for HttpTransport {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AttemptError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(transport_error)?;

        serde_json::from_str(&body).map_err(|e| AttemptError::MalformedResponse(e.to_string()))
    }
}

// ============================================================================
// Backoff Caller
// ============================================================================

/// Retrying wrapper around a [`GenerationTransport`].
#[derive(Debug, Clone)]
pub struct BackoffCaller {
    transport: Arc<dyn GenerationTransport>,
    policy: RetryPolicy,
}

impl BackoffCaller {
    /// Creates a caller with the given transport and policy.
    #[must_use]
    pub fn new(transport: Arc<dyn GenerationTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request` and decodes the model's JSON output as `T`.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Exhausted` once every attempt has failed and
    /// `GenerationError::Cancelled` as soon as `cancel` fires.
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts))]
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<T, GenerationError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = AttemptError::EmptyContent;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.delay_after(attempt - 1);
                debug!(attempt = attempt + 1, delay_ms = delay.as_millis(), "Backing off");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                outcome = tokio::time::timeout(self.policy.attempt_timeout, self.attempt::<T>(request)) => {
                    outcome.unwrap_or(Err(AttemptError::Timeout(self.policy.attempt_timeout)))
                }
            };

            match outcome {
                Ok(value) => {
                    info!(attempt = attempt + 1, "Generation succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Generation attempt failed");
                    last = e;
                }
            }
        }

        error!(attempts, error = %last, "Generation failed after all attempts");
        Err(GenerationError::Exhausted { attempts, last })
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<T, AttemptError> {
        let response = self.transport.generate(request).await?;
        let text = response.text().ok_or(AttemptError::EmptyContent)?;

        let value: Value =
            serde_json::from_str(text).map_err(|_| AttemptError::InvalidJson(text.to_string()))?;
        serde_json::from_value(value).map_err(|e| AttemptError::UnexpectedShape(e.to_string()))
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// Model output for the materials page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialsList {
    /// Cut list and hardware.
    pub materials: Vec<String>,
    /// Required tools.
    pub tools: Vec<String>,
}

/// Model output for the instructions page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSteps {
    /// Ordered construction steps.
    pub steps: Vec<String>,
}

fn describe(project: &Project) -> String {
    format!(
        "{} that is {} inches wide, {} inches high, and {} inches deep, using {} wood and {} inch screws",
        project.project_type,
        project.width,
        project.height,
        project.depth,
        project.wood_type,
        project.screw_length
    )
}

fn string_array(description: &str) -> Value {
    json!({
        "type": "ARRAY",
        "description": description,
        "items": { "type": "STRING" }
    })
}

/// Builds the request for a materials cut list and tool list.
#[must_use]
pub fn materials_request(project: &Project) -> GenerateContentRequest {
    let prompt = format!(
        "Generate a detailed materials cut list and a short list of required tools for a {}. \
         Provide the output as a JSON object with two fields: 'materials' (an array of strings) \
         and 'tools' (an array of strings).",
        describe(project)
    );
    let schema = json!({
        "type": "OBJECT",
        "properties": {
            "materials": string_array("Detailed cut list and hardware."),
            "tools": string_array("Essential tools required.")
        },
        "propertyOrdering": ["materials", "tools"]
    });
    GenerateContentRequest::json(prompt, schema)
}

/// Builds the request for step-by-step build instructions.
#[must_use]
pub fn instructions_request(project: &Project) -> GenerateContentRequest {
    let prompt = format!(
        "Generate detailed, step-by-step woodworking instructions for building a {}. \
         Focus on clear, safe construction steps. Provide the output as a JSON object with one \
         field: 'steps' (an array of strings).",
        describe(project)
    );
    let schema = json!({
        "type": "OBJECT",
        "properties": {
            "steps": string_array("Detailed construction steps.")
        },
        "propertyOrdering": ["steps"]
    });
    GenerateContentRequest::json(prompt, schema)
}
