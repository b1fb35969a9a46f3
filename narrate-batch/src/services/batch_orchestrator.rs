//! Batch orchestration
//!
//! Discovers the input documents and runs them through [`DocumentRunner`] on
//! a bounded document pool. One document's failure never stops the others.

use crate::lifecycle::WorkingArea;
use crate::models::{BatchSummary, DocumentReport};
use crate::services::assembler::{Assembler, AudioConcatenator};
use crate::services::document_runner::DocumentRunner;
use crate::services::document_scanner::{DocumentScanner, ScanError};
use crate::services::speech_backend::SpeechBackend;
use crate::services::synthesis_client::SynthesisClient;
use crate::services::worker_pool::{FailurePolicy, JobOutcome, WorkerPool};
use crate::settings::Settings;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Errors that stop a batch before any document is processed
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Input discovery failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Input discovery task failed: {0}")]
    ScanTask(#[from] JoinError),
}

/// Top-level batch driver
pub struct BatchOrchestrator {
    settings: Arc<Settings>,
    scanner: DocumentScanner,
    runner: Arc<DocumentRunner>,
}

impl BatchOrchestrator {
    /// Wire up the pipeline from its two external seams
    pub fn new(
        settings: Arc<Settings>,
        backend: Arc<dyn SpeechBackend>,
        concatenator: Arc<dyn AudioConcatenator>,
        working_area: Arc<WorkingArea>,
    ) -> Self {
        let synthesis = Arc::new(SynthesisClient::new(
            backend,
            working_area.clone(),
            &settings,
        ));
        let assembler = Arc::new(Assembler::new(concatenator));
        let runner = Arc::new(DocumentRunner::new(
            &settings,
            synthesis,
            assembler,
            working_area,
        ));

        Self {
            settings,
            scanner: DocumentScanner::new(),
            runner,
        }
    }

    /// Process every document in the input folder
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BatchSummary, BatchError> {
        let run_id = Uuid::new_v4();
        // Directory walk is blocking I/O
        let documents = tokio::task::spawn_blocking({
            let scanner = self.scanner;
            let input_folder = self.settings.input_folder.clone();
            move || scanner.scan(&input_folder)
        })
        .await??;
        let mut summary = BatchSummary::new(run_id, documents.len());

        tracing::info!(
            run_id = %run_id,
            documents = documents.len(),
            max_workers = self.settings.max_workers,
            chunk_workers = self.settings.chunk_workers,
            "Starting batch"
        );

        let pool = WorkerPool::new(
            "documents",
            self.settings.max_workers,
            FailurePolicy::ContinueOnError,
        );
        let runner = self.runner.as_ref();

        let report = pool
            .run(documents.clone(), cancel, |_, document, _| async move {
                // Run token, not the pool's stop token
                Ok::<_, Infallible>(runner.process(document, cancel).await)
            })
            .await;

        for (document, outcome) in documents.iter().zip(report.outcomes) {
            let document_report = match outcome {
                JobOutcome::Completed(document_report) => document_report,
                JobOutcome::NotStarted => DocumentReport::not_started(document),
                JobOutcome::Failed(never) => match never {},
            };
            summary.record(document_report);
        }
        summary.finish();

        tracing::info!(
            run_id = %run_id,
            discovered = summary.discovered,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Batch finished"
        );

        Ok(summary)
    }
}
