//! OpenAI-compatible speech client
//!
//! `POST {base_url}/audio/speech` with a JSON body; the response body is the
//! encoded audio and is streamed back without buffering it whole.

use crate::services::speech_backend::{AudioStream, SpeechBackend, SpeechRequest, SynthesisError};
use crate::settings::Settings;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("narrate-batch/", env!("CARGO_PKG_VERSION"));

/// Request body for the speech endpoint
#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// OpenAI speech API client
pub struct OpenAiSpeechBackend {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiSpeechBackend {
    pub fn new(settings: &Settings) -> Result<Self, SynthesisError> {
        Self::with_endpoint(
            &settings.base_url,
            settings.api_key.clone(),
            settings.request_timeout,
        )
    }

    /// Build a client for an explicit base URL
    ///
    /// `timeout` bounds one attempt end to end, body included.
    pub fn with_endpoint(
        base_url: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, SynthesisError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/audio/speech", base_url.trim_end_matches('/')),
            api_key,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_transport_error(&self, err: reqwest::Error) -> SynthesisError {
        if err.is_timeout() {
            SynthesisError::Timeout(self.timeout)
        } else if err.is_builder() {
            SynthesisError::Client(err.to_string())
        } else {
            SynthesisError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl SpeechBackend for OpenAiSpeechBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<AudioStream, SynthesisError> {
        let body = SpeechBody {
            model: request.model,
            voice: request.voice,
            input: request.input,
            response_format: request.format.as_str(),
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            model = request.model,
            voice = request.voice,
            chars = request.input.chars().count(),
            "Requesting speech synthesis"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SynthesisError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api(status.as_u16(), error_text));
        }

        let timeout = self.timeout;
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout(timeout)
                } else {
                    SynthesisError::Network(e.to_string())
                }
            })
        });

        Ok(stream.boxed())
    }
}
