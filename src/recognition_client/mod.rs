//! RecognitionClient - License plate recognition adapter
//!
//! ## Responsibilities
//!
//! - Send the ALPR prompt and image to the remote vision-language model
//! - Bound the call with a timeout (single attempt, no retry)
//! - Feed the model text through the plate parser
//! - Collapse every failure to the `UNKNOWN` sentinel at the outer boundary

use crate::error::{Error, Result};
use crate::plate_parser::{parse_plate_response, PlateResult, UNKNOWN_PLATE};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default timeout for the recognition backend
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Request mode understood by the recognition backend
const QUERY_KEY: &str = "text+image";

/// Instruction prompt sent with every image
pub const PLATE_PROMPT: &str = r#"Role: You are an Automated License Plate Recognition (ALPR) system.
Task: Analyze the provided image and extract the vehicle license plate number.

Strict Output Rules:
1. Output ONLY a valid JSON object.
2. Format: {"plate_number": "YOUR_RESULT_HERE"}
3. Convert all characters to UPPERCASE.
4. Remove all spaces, dashes ('-'), and special characters. Return only alphanumeric characters (A-Z, 0-9).
5. If the plate is unclear, too small, or not visible, return: {"plate_number": "UNKNOWN"}
6. DO NOT provide any explanations, markdown formatting (like ```json), or conversational text. Just the raw JSON string.
"#;

/// Recognition backend failure
#[derive(Debug, thiserror::Error)]
pub enum RemoteServiceError {
    #[error("recognition backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("recognition backend unreachable: {0}")]
    Transport(String),

    #[error("recognition backend returned status {0}")]
    Status(u16),

    #[error("recognition backend reply not decodable: {0}")]
    Decode(String),
}

/// Request body for the recognition backend
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub key: &'a str,
    pub text_query: &'a str,
    pub image_base64: &'a str,
}

/// Reply from the recognition backend
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: Option<String>,
}

/// Remote plate recognition client
pub struct RecognitionClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl RecognitionClient {
    /// Create new client with the default 30 second timeout
    pub fn new(endpoint: String) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create new client with custom timeout
    pub fn with_timeout(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Recognize a plate, returning `UNKNOWN` on any failure
    pub async fn recognize(&self, image_base64: &str) -> String {
        match self.try_recognize(image_base64).await {
            Ok(result) => result.plate_number,
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Plate recognition failed");
                UNKNOWN_PLATE.to_string()
            }
        }
    }

    /// Recognize a plate, keeping backend failures distinguishable from a
    /// genuine `UNKNOWN` classification
    pub async fn try_recognize(
        &self,
        image_base64: &str,
    ) -> std::result::Result<PlateResult, RemoteServiceError> {
        let started = Instant::now();
        let body = GenerateRequest {
            key: QUERY_KEY,
            text_query: PLATE_PROMPT,
            image_base64,
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            image_len = image_base64.len(),
            "Sending plate recognition request"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        tracing::debug!(
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recognition backend responded"
        );

        if !status.is_success() {
            return Err(RemoteServiceError::Status(status.as_u16()));
        }

        let reply: GenerateResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                RemoteServiceError::Timeout(self.timeout)
            } else {
                RemoteServiceError::Decode(e.to_string())
            }
        })?;

        let text = reply.response.as_deref().unwrap_or("{}");
        let result = parse_plate_response(text);

        tracing::info!(
            plate_number = %result.plate_number,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Plate recognition finished"
        );

        Ok(result)
    }

    fn classify(&self, e: reqwest::Error) -> RemoteServiceError {
        if e.is_timeout() {
            RemoteServiceError::Timeout(self.timeout)
        } else {
            RemoteServiceError::Transport(e.to_string())
        }
    }

    /// Get endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Strip a data-URI header, keeping only the payload after the last `base64,`
pub fn strip_data_uri(image: &str) -> &str {
    image.rsplit("base64,").next().unwrap_or(image)
}
