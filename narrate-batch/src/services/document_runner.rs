//! Per-document pipeline
//!
//! read → chunk → synthesize (bounded, fail-fast) → assemble → relocate
//!
//! Every failure is caught here and turned into the document's report; a
//! failed document leaves its source file where it was so the next run picks
//! it up again.

use crate::lifecycle::WorkingArea;
use crate::models::{Chunk, ChunkResult, Document, DocumentReport, DocumentState, FinalArtifact};
use crate::services::assembler::{Assembler, AssemblyError};
use crate::services::chunker::{chunk_document, ChunkerError};
use crate::services::synthesis_client::{ChunkFailure, SynthesisClient};
use crate::services::worker_pool::{FailurePolicy, WorkerPool};
use crate::settings::{AudioFormat, Settings};
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Document-level errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid UTF-8", .0.display())]
    InvalidUtf8(PathBuf),

    #[error("Chunking failed: {0}")]
    Chunking(#[from] ChunkerError),

    #[error("{failed} of {total} chunk(s) failed; first: {first}")]
    Synthesis {
        failed: usize,
        total: usize,
        #[source]
        first: ChunkFailure,
    },

    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cancelled")]
    Cancelled,
}

impl DocumentError {
    fn state(&self) -> DocumentState {
        match self {
            DocumentError::Cancelled => DocumentState::Cancelled,
            _ => DocumentState::Failed,
        }
    }
}

/// What a successful pipeline run produced
enum Finished {
    /// Empty text; nothing synthesized, source untouched
    Skipped,
    Completed(FinalArtifact),
}

/// Runs one document through the pipeline
pub struct DocumentRunner {
    synthesis: Arc<SynthesisClient>,
    assembler: Arc<Assembler>,
    working_area: Arc<WorkingArea>,
    output_folder: PathBuf,
    max_chunk_size: usize,
    chunk_workers: usize,
    format: AudioFormat,
}

impl DocumentRunner {
    pub fn new(
        settings: &Settings,
        synthesis: Arc<SynthesisClient>,
        assembler: Arc<Assembler>,
        working_area: Arc<WorkingArea>,
    ) -> Self {
        Self {
            synthesis,
            assembler,
            working_area,
            output_folder: settings.output_folder.clone(),
            max_chunk_size: settings.max_chunk_size,
            chunk_workers: settings.chunk_workers,
            format: settings.audio_format,
        }
    }

    /// Process `document` and report its outcome. Never fails the caller.
    pub async fn process(
        &self,
        mut document: Document,
        cancel: &CancellationToken,
    ) -> DocumentReport {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let mut chunk_count = 0;

        if cancel.is_cancelled() {
            return DocumentReport::not_started(&document);
        }

        document.transition_to(DocumentState::InProgress);
        tracing::info!(
            document = %document.id,
            source = %document.source.display(),
            "Processing document"
        );

        let result = self.run_stages(&document, cancel, &mut chunk_count).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        let (output, error) = match result {
            Ok(Finished::Skipped) => {
                tracing::info!(document = %document.id, "Skipping document with no text");
                document.transition_to(DocumentState::Skipped);
                (None, None)
            }
            Ok(Finished::Completed(artifact)) => {
                tracing::info!(
                    document = %document.id,
                    chunks = chunk_count,
                    output = %artifact.path.display(),
                    elapsed_ms,
                    "Document completed"
                );
                document.transition_to(DocumentState::Completed);
                self.working_area.release_document(&document.id).await;
                (Some(artifact.path), None)
            }
            Err(e) => {
                let state = e.state();
                if state == DocumentState::Cancelled {
                    tracing::warn!(document = %document.id, "Document processing cancelled");
                } else {
                    tracing::error!(
                        document = %document.id,
                        error = %e,
                        "Document processing failed"
                    );
                }
                document.transition_to(state);
                (None, Some(e.to_string()))
            }
        };

        DocumentReport {
            document_id: document.id,
            source: document.source,
            state: document.state,
            chunk_count,
            output,
            error,
            started_at,
            elapsed_ms,
        }
    }

    async fn run_stages(
        &self,
        document: &Document,
        cancel: &CancellationToken,
        chunk_count: &mut usize,
    ) -> Result<Finished, DocumentError> {
        let text = read_text(&document.source).await?;

        let chunks = chunk_document(&text, self.max_chunk_size)?;
        if chunks.is_empty() {
            return Ok(Finished::Skipped);
        }
        *chunk_count = chunks.len();

        tracing::info!(
            document = %document.id,
            chunks = chunks.len(),
            "Document split into chunks"
        );

        let results = self.synthesize_chunks(document, chunks, cancel).await?;

        if cancel.is_cancelled() {
            return Err(DocumentError::Cancelled);
        }

        let output_path =
            document.final_artifact_path(&self.output_folder, self.format.extension());
        let artifact = self
            .assembler
            .assemble(
                *chunk_count,
                results,
                &self.working_area.document_dir(&document.id),
                &output_path,
            )
            .await?;

        let processed = document.processed_path(&self.output_folder);
        relocate(&document.source, &processed).await?;
        tracing::debug!(
            document = %document.id,
            to = %processed.display(),
            "Source relocated"
        );

        Ok(Finished::Completed(artifact))
    }

    async fn synthesize_chunks(
        &self,
        document: &Document,
        chunks: Vec<Chunk>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChunkResult>, DocumentError> {
        let total = chunks.len();
        let pool = WorkerPool::new(
            format!("chunks:{}", document.id),
            self.chunk_workers,
            FailurePolicy::FailFast,
        );
        let client = self.synthesis.as_ref();
        let document_id = document.id.as_str();

        let report = pool
            .run(chunks, cancel, |_, chunk, stop| async move {
                client.synthesize(&chunk, document_id, &stop).await
            })
            .await;

        match report.into_completed() {
            Ok(results) => Ok(results),
            Err(_) if cancel.is_cancelled() => Err(DocumentError::Cancelled),
            Err(shortfall) => {
                let failed = shortfall.failures.len();
                match shortfall.failures.into_iter().next() {
                    Some((_, first)) => Err(DocumentError::Synthesis {
                        failed,
                        total,
                        first,
                    }),
                    None => Err(DocumentError::Cancelled),
                }
            }
        }
    }
}

async fn read_text(path: &Path) -> Result<String, DocumentError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| DocumentError::InvalidUtf8(path.to_path_buf()))
}

/// Move `from` to `to`, copying across filesystems when rename cannot
pub async fn relocate(from: &Path, to: &Path) -> Result<(), DocumentError> {
    let relocate_error = |source: io::Error| DocumentError::Relocate {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(relocate_error)?;
    }

    let rename_error = match tokio::fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    // Rename fails across mount points; nothing to fall back on if the source is gone
    if !tokio::fs::try_exists(from).await.unwrap_or(false) {
        return Err(relocate_error(rename_error));
    }

    tracing::debug!(
        from = %from.display(),
        to = %to.display(),
        error = %rename_error,
        "Rename failed, copying instead"
    );

    if let Err(e) = tokio::fs::copy(from, to).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(relocate_error(e));
    }
    tokio::fs::remove_file(from).await.map_err(relocate_error)
}
