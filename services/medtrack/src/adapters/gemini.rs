//! services/medtrack/src/adapters/gemini.rs
//!
//! This module contains the adapter for the live text generation endpoint.
//! It implements the `ResponseGenerator` port from the `core` crate against a
//! Gemini-style `generateContent` REST API.

use crate::config::Config;
use async_trait::async_trait;
use medtrack_core::ports::{PortError, PortResult, ResponseGenerator};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
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

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ResponseGenerator` over HTTP.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    generation: GenerationConfig,
    timeout: Duration,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter` with its own HTTP client.
    pub fn new(
        endpoint: &str,
        api_key: String,
        model: String,
        generation: GenerationConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model,
            generation,
            timeout,
        })
    }

    /// Builds the adapter from loaded configuration. Requires an API key.
    pub fn from_config(config: &Config) -> Result<Self, crate::error::AppError> {
        let api_key = config.gemini_api_key.clone().ok_or_else(|| {
            crate::error::AppError::Internal("GEMINI_API_KEY is required".to_string())
        })?;
        let generation = GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        };
        Ok(Self::new(
            &config.gemini_endpoint,
            api_key,
            config.gemini_model.clone(),
            generation,
            config.request_timeout,
        )?)
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }

    fn map_send_error(&self, e: reqwest::Error) -> PortError {
        if e.is_timeout() {
            PortError::Generation(format!(
                "Request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else if e.is_connect() {
            PortError::Generation(format!("Could not reach {}", self.endpoint))
        } else {
            // The request URL carries the API key.
            PortError::Generation(e.without_url().to_string())
        }
    }
}

fn request_body(prompt: &str, generation: GenerationConfig) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![RequestPart { text: prompt }],
        }],
        generation_config: generation,
    }
}

/// Pulls the first candidate's text out of a success envelope.
fn extract_text(envelope: GenerateContentResponse) -> PortResult<String> {
    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| {
            PortError::Generation("Generator response contained no candidate text.".to_string())
        })
}

//=========================================================================================
// `ResponseGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResponseGenerator for GeminiAdapter {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending generation request");

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(prompt, self.generation))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Generator returned an error status");
            return Err(PortError::Generation(format!(
                "Generator returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                PortError::Generation(format!("Malformed generator response: {}", e.without_url()))
            })?;

        extract_text(envelope)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
