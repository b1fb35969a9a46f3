//! Speech synthesis backend seam
//!
//! A backend turns one piece of text into a stream of encoded audio bytes.
//! Retries, file handling and concurrency live above this trait, so a
//! backend only performs a single call.

use crate::services::retry::Retryable;
use crate::settings::AudioFormat;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

/// Encoded audio, streamed as it arrives
pub type AudioStream = BoxStream<'static, Result<Bytes, SynthesisError>>;

/// Synthesis errors
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Attempt exceeded the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Credential rejected by the service
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Service answered with no audio
    #[error("Empty audio response")]
    EmptyAudio,

    /// Writing the chunk artifact failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client could not be constructed or the request is malformed
    #[error("Client error: {0}")]
    Client(String),

    /// Run was cancelled before the chunk could be attempted
    #[error("Cancelled")]
    Cancelled,
}

impl Retryable for SynthesisError {
    fn is_transient(&self) -> bool {
        match self {
            SynthesisError::Network(_)
            | SynthesisError::Timeout(_)
            | SynthesisError::EmptyAudio
            | SynthesisError::Io(_) => true,
            SynthesisError::Api(status, _) => *status == 408 || *status == 429 || *status >= 500,
            SynthesisError::InvalidApiKey
            | SynthesisError::Client(_)
            | SynthesisError::Cancelled => false,
        }
    }
}

/// One synthesis call
#[derive(Debug, Clone)]
pub struct SpeechRequest<'a> {
    pub model: &'a str,
    pub voice: &'a str,
    pub input: &'a str,
    pub format: AudioFormat,
}

/// External text-to-speech service
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Backend name for log lines
    fn name(&self) -> &'static str;

    /// Perform one synthesis call and return the audio body as a stream
    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<AudioStream, SynthesisError>;
}
