//! Pipeline services

pub mod assembler;
pub mod batch_orchestrator;
pub mod chunker;
pub mod document_runner;
pub mod document_scanner;
pub mod openai_speech;
pub mod retry;
pub mod speech_backend;
pub mod synthesis_client;
pub mod worker_pool;

pub use assembler::{Assembler, AssemblyError, AudioConcatenator, FfmpegConcatenator};
pub use batch_orchestrator::{BatchError, BatchOrchestrator};
pub use chunker::{chunk_document, split_text, ChunkerError};
pub use document_runner::{DocumentError, DocumentRunner};
pub use document_scanner::{DocumentScanner, ScanError};
pub use openai_speech::OpenAiSpeechBackend;
pub use retry::{retry_with_backoff, RetryDecision, RetryPolicy, Retryable};
pub use speech_backend::{AudioStream, SpeechBackend, SpeechRequest, SynthesisError};
pub use synthesis_client::{ChunkFailure, SynthesisClient};
pub use worker_pool::{FailurePolicy, JobOutcome, PoolReport, WorkerPool};
