//! Batch-level aggregation of document outcomes

use crate::models::{DocumentReport, DocumentState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Summary of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub discovered: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub reports: Vec<DocumentReport>,
}

impl BatchSummary {
    pub fn new(run_id: Uuid, discovered: usize) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            discovered,
            completed: 0,
            failed: 0,
            skipped: 0,
            cancelled: 0,
            reports: Vec::with_capacity(discovered),
        }
    }

    pub fn record(&mut self, report: DocumentReport) {
        match report.state {
            DocumentState::Completed => self.completed += 1,
            DocumentState::Failed => self.failed += 1,
            DocumentState::Skipped => self.skipped += 1,
            DocumentState::Cancelled => self.cancelled += 1,
            // Runner always returns a terminal state; count stragglers as failures
            DocumentState::Unprocessed | DocumentState::InProgress => self.failed += 1,
        }
        self.reports.push(report);
    }

    pub fn finish(&mut self) {
        self.reports.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
