//! Chunk synthesis with retry
//!
//! Turns one chunk into one audio file in the document's working
//! subdirectory: `{working_area}/{doc}/{doc}_part_{index+1}.{ext}`. Each
//! attempt streams the response body straight to disk; a failed attempt
//! removes its partial file before the next one starts.

use crate::lifecycle::WorkingArea;
use crate::models::{Chunk, ChunkResult};
use crate::services::retry::{retry_with_backoff, RetryPolicy};
use crate::services::speech_backend::{SpeechBackend, SpeechRequest, SynthesisError};
use crate::settings::{AudioFormat, Settings};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Terminal failure of one chunk
#[derive(Debug, Error)]
#[error("Chunk {} failed after {attempts} attempt(s): {source}", .index + 1)]
pub struct ChunkFailure {
    pub index: usize,
    pub attempts: u32,
    #[source]
    pub source: SynthesisError,
}

/// Synthesis client: backend call + retry + artifact file
pub struct SynthesisClient {
    backend: Arc<dyn SpeechBackend>,
    working_area: Arc<WorkingArea>,
    policy: RetryPolicy,
    model: String,
    voice: String,
    format: AudioFormat,
}

impl SynthesisClient {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        working_area: Arc<WorkingArea>,
        settings: &Settings,
    ) -> Self {
        Self {
            backend,
            working_area,
            policy: RetryPolicy::new(
                u32::try_from(settings.retries).unwrap_or(u32::MAX),
                settings.retry_base,
            ),
            model: settings.model.clone(),
            voice: settings.voice.clone(),
            format: settings.audio_format,
        }
    }

    /// Deterministic artifact path for a chunk
    pub fn artifact_path(&self, document_id: &str, index: usize) -> PathBuf {
        self.working_area.document_dir(document_id).join(format!(
            "{}_part_{}.{}",
            document_id,
            index + 1,
            self.format.extension()
        ))
    }

    /// Synthesize `chunk` of `document_id`, retrying transient failures.
    pub async fn synthesize(
        &self,
        chunk: &Chunk,
        document_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ChunkResult, ChunkFailure> {
        if cancel.is_cancelled() {
            return Err(ChunkFailure {
                index: chunk.index,
                attempts: 0,
                source: SynthesisError::Cancelled,
            });
        }

        let path = self.artifact_path(document_id, chunk.index);
        let operation_name = format!("synthesize {} chunk {}", document_id, chunk.number());

        let attempted = retry_with_backoff(&operation_name, &self.policy, cancel, |attempt| {
            let path = path.clone();
            async move {
                tracing::debug!(
                    document = document_id,
                    chunk = chunk.number(),
                    attempt = attempt + 1,
                    backend = self.backend.name(),
                    "Synthesis attempt"
                );
                self.attempt_once(chunk, document_id, &path).await
            }
        })
        .await;

        match attempted.outcome {
            Ok(bytes) => {
                tracing::info!(
                    document = document_id,
                    chunk = chunk.number(),
                    attempts = attempted.attempts,
                    bytes,
                    "Generated audio for chunk"
                );
                Ok(ChunkResult {
                    index: chunk.index,
                    artifact: path,
                    attempts: attempted.attempts,
                    bytes,
                })
            }
            Err(source) => {
                tracing::error!(
                    document = document_id,
                    chunk = chunk.number(),
                    attempts = attempted.attempts,
                    error = %source,
                    "Error generating audio for chunk"
                );
                Err(ChunkFailure {
                    index: chunk.index,
                    attempts: attempted.attempts,
                    source,
                })
            }
        }
    }

    /// One backend call streamed into `path`; returns bytes written
    async fn attempt_once(
        &self,
        chunk: &Chunk,
        document_id: &str,
        path: &Path,
    ) -> Result<u64, SynthesisError> {
        self.working_area.ensure_document_dir(document_id).await?;

        let request = SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: &chunk.text,
            format: self.format,
        };

        let result = async {
            let mut stream = self.backend.synthesize(&request).await?;
            let mut file = tokio::fs::File::create(path).await?;
            let mut written = 0u64;

            while let Some(piece) = stream.next().await {
                let piece = piece?;
                file.write_all(&piece).await?;
                written += piece.len() as u64;
            }
            file.flush().await?;

            if written == 0 {
                return Err(SynthesisError::EmptyAudio);
            }
            Ok(written)
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(path).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::speech_backend::AudioStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fails the first `failures` calls, then returns the input text as audio
    struct FlakyBackend {
        failures: u32,
        error_status: u16,
        calls: AtomicU32,
    }

    impl FlakyBackend {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                error_status: 503,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn synthesize(
            &self,
            request: &SpeechRequest<'_>,
        ) -> Result<AudioStream, SynthesisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SynthesisError::Api(self.error_status, "unavailable".into()));
            }
            let body = Bytes::from(request.input.as_bytes().to_vec());
            Ok(futures::stream::iter(vec![Ok(body)]).boxed())
        }
    }

    /// Streams one piece, then breaks mid-body
    struct BrokenStreamBackend;

    #[async_trait]
    impl SpeechBackend for BrokenStreamBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn synthesize(&self, _: &SpeechRequest<'_>) -> Result<AudioStream, SynthesisError> {
            Ok(futures::stream::iter(vec![
                Ok(Bytes::from_static(b"partial")),
                Err(SynthesisError::Network("connection reset".into())),
            ])
            .boxed())
        }
    }

    fn client(
        backend: Arc<dyn SpeechBackend>,
        temp_dir: &TempDir,
        retries: usize,
    ) -> SynthesisClient {
        let working_area = Arc::new(WorkingArea::create(temp_dir.path().join("work")).unwrap());
        let mut settings = test_settings(temp_dir);
        settings.retries = retries;
        SynthesisClient::new(backend, working_area, &settings)
    }

    fn test_settings(temp_dir: &TempDir) -> Settings {
        Settings {
            api_key: "sk-test".into(),
            input_folder: temp_dir.path().join("input"),
            output_folder: temp_dir.path().join("output"),
            temp_folder: temp_dir.path().join("work"),
            voice: "alloy".into(),
            model: "tts-1".into(),
            debug: false,
            max_workers: 2,
            chunk_workers: 2,
            max_chunk_size: 100,
            retries: 3,
            retry_base: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
            audio_format: AudioFormat::Mp3,
            base_url: "http://localhost".into(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }

    #[test]
    fn test_artifact_path_is_one_based() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(Arc::new(FlakyBackend::new(0)), &temp_dir, 3);

        let path = client.artifact_path("a", 0);
        assert!(path.ends_with("work/a/a_part_1.mp3"));
    }

    #[tokio::test]
    async fn test_first_attempt_success_writes_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(Arc::new(FlakyBackend::new(0)), &temp_dir, 3);
        let chunk = Chunk::new(2, "hello world");

        let result = client
            .synthesize(&chunk, "doc", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.index, 2);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.bytes, 11);
        assert_eq!(std::fs::read(&result.artifact).unwrap(), b"hello world");
        assert!(result.artifact.ends_with("doc/doc_part_3.mp3"));
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(FlakyBackend::new(2));
        let client = client(backend.clone(), &temp_dir, 3);
        let chunk = Chunk::new(0, "third time lucky");

        let result = client
            .synthesize(&chunk, "doc", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert!(result.artifact.exists());

        let entries: Vec<_> = std::fs::read_dir(result.artifact.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1, "exactly one artifact for the chunk");
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_terminal_error() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(FlakyBackend::new(u32::MAX));
        let client = client(backend.clone(), &temp_dir, 3);
        let chunk = Chunk::new(4, "never");

        let failure = client
            .synthesize(&chunk, "doc", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.index, 4);
        assert_eq!(failure.attempts, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(failure.source, SynthesisError::Api(503, _)));
        assert!(!client.artifact_path("doc", 4).exists());
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(FlakyBackend {
            failures: u32::MAX,
            error_status: 400,
            calls: AtomicU32::new(0),
        });
        let client = client(backend.clone(), &temp_dir, 3);

        let failure = client
            .synthesize(&Chunk::new(0, "bad"), "doc", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broken_stream_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(Arc::new(BrokenStreamBackend), &temp_dir, 2);

        let failure = client
            .synthesize(&Chunk::new(0, "text"), "doc", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 2);
        assert!(matches!(failure.source, SynthesisError::Network(_)));
        assert!(!client.artifact_path("doc", 0).exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_makes_no_call() {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(FlakyBackend::new(0));
        let client = client(backend.clone(), &temp_dir, 3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = client
            .synthesize(&Chunk::new(0, "text"), "doc", &cancel)
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 0);
        assert!(matches!(failure.source, SynthesisError::Cancelled));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
