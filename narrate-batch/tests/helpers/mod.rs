//! Test Helper Utilities
//!
//! Fake speech backend, byte-joining concatenator and a temp-folder layout
//! for driving the whole pipeline without network or ffmpeg.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use narrate_batch::lifecycle::WorkingArea;
use narrate_batch::services::{
    AssemblyError, AudioConcatenator, AudioStream, BatchOrchestrator, SpeechBackend, SpeechRequest,
    SynthesisError,
};
use narrate_batch::settings::{AudioFormat, Settings};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Input containing this text is rejected with a permanent error
pub const REJECT_MARKER: &str = "REJECT-ME";

/// Echoes the request text back as "audio"
#[derive(Default)]
pub struct EchoBackend {
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    /// Simulated service latency
    pub latency: Duration,
    /// Never answer; for interruption tests
    pub hang: bool,
}

impl EchoBackend {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SpeechBackend for EchoBackend {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<AudioStream, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hang {
            std::future::pending::<()>().await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if request.input.contains(REJECT_MARKER) {
            return Err(SynthesisError::Api(400, "input rejected".into()));
        }

        let body = Bytes::from(request.input.as_bytes().to_vec());
        Ok(futures::stream::iter(vec![Ok(body)]).boxed())
    }
}

/// Joins the files named in an ffmpeg concat manifest byte for byte
#[derive(Default)]
pub struct ByteConcatenator {
    pub calls: AtomicUsize,
}

/// Paths listed in a concat manifest, in order
pub fn parse_manifest(manifest: &str) -> Vec<PathBuf> {
    manifest
        .lines()
        .filter_map(|line| line.strip_prefix("file '"))
        .filter_map(|rest| rest.strip_suffix('\''))
        .map(|path| PathBuf::from(path.replace(r"'\''", "'")))
        .collect()
}

#[async_trait]
impl AudioConcatenator for ByteConcatenator {
    fn name(&self) -> &'static str {
        "bytes"
    }

    async fn concatenate(
        &self,
        manifest: &Path,
        _parts: &[PathBuf],
        output: &Path,
    ) -> Result<(), AssemblyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let listing = tokio::fs::read_to_string(manifest).await?;

        let mut joined = Vec::new();
        for part in parse_manifest(&listing) {
            joined.extend(tokio::fs::read(&part).await?);
        }
        tokio::fs::write(output, joined).await?;
        Ok(())
    }
}

/// Temp folder with `input/`, `output/` and `work/`
pub struct Workspace {
    pub temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("input")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("output")).unwrap();
        Self { temp_dir }
    }

    pub fn input(&self) -> PathBuf {
        self.temp_dir.path().join("input")
    }

    pub fn output(&self) -> PathBuf {
        self.temp_dir.path().join("output")
    }

    pub fn work(&self) -> PathBuf {
        self.temp_dir.path().join("work")
    }

    pub fn write_document(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.input().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn settings(&self) -> Settings {
        Settings {
            api_key: "sk-test".into(),
            input_folder: self.input(),
            output_folder: self.output(),
            temp_folder: self.work(),
            voice: "alloy".into(),
            model: "tts-1".into(),
            debug: false,
            max_workers: 4,
            chunk_workers: 4,
            max_chunk_size: 4096,
            retries: 3,
            retry_base: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
            audio_format: AudioFormat::Mp3,
            base_url: "http://localhost".into(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

/// Orchestrator wired to the fakes
pub fn orchestrator(
    settings: Settings,
    backend: Arc<EchoBackend>,
    concatenator: Arc<ByteConcatenator>,
) -> (BatchOrchestrator, Arc<WorkingArea>) {
    let working_area = Arc::new(WorkingArea::create(&settings.temp_folder).unwrap());
    let orchestrator = BatchOrchestrator::new(
        Arc::new(settings),
        backend,
        concatenator,
        working_area.clone(),
    );
    (orchestrator, working_area)
}

/// `count` characters of space-separated words
pub fn words(count: usize) -> String {
    "word ".repeat(count / 5 + 1).chars().take(count).collect()
}
