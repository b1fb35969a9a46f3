//! Documents and their per-run outcome

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Suffix given to a source file once its audio has been produced
pub const PROCESSED_MARKER: &str = "processed";

/// Document lifecycle within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentState {
    /// Discovered, not yet picked up
    Unprocessed,
    /// Chunking, synthesis or assembly under way
    InProgress,
    /// Audio written and source relocated
    Completed,
    /// A stage failed; source left in place
    Failed,
    /// Empty or whitespace-only text
    Skipped,
    /// Run interrupted before the document finished
    Cancelled,
}

/// An input text file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File stem; keys the working subdirectory and the output folder
    pub id: String,
    pub source: PathBuf,
    pub state: DocumentState,
}

impl Document {
    /// Build a document from its source path
    ///
    /// Returns `None` when the path has no usable UTF-8 stem.
    pub fn from_path(path: &Path) -> Option<Self> {
        let id = path.file_stem()?.to_str()?.to_string();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            source: path.to_path_buf(),
            state: DocumentState::Unprocessed,
        })
    }

    pub fn transition_to(&mut self, new_state: DocumentState) {
        tracing::debug!(
            document = %self.id,
            old_state = ?self.state,
            new_state = ?new_state,
            "Document state transition"
        );
        self.state = new_state;
    }

    /// `{output}/{id}`
    pub fn output_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.id)
    }

    /// `{output}/{id}/{id}.{ext}`
    pub fn final_artifact_path(&self, output_root: &Path, extension: &str) -> PathBuf {
        self.output_dir(output_root)
            .join(format!("{}.{}", self.id, extension))
    }

    /// `{output}/{id}/{id}.processed.{source ext}`
    pub fn processed_path(&self, output_root: &Path) -> PathBuf {
        let extension = self
            .source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("txt");
        self.output_dir(output_root)
            .join(format!("{}.{}.{}", self.id, PROCESSED_MARKER, extension))
    }
}

/// Outcome record for one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document_id: String,
    pub source: PathBuf,
    pub state: DocumentState,
    pub chunk_count: usize,
    /// Final audio file when completed
    pub output: Option<PathBuf>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl DocumentReport {
    /// Report for a document that never started (run interrupted first)
    pub fn not_started(document: &Document) -> Self {
        Self {
            document_id: document.id.clone(),
            source: document.source.clone(),
            state: DocumentState::Cancelled,
            chunk_count: 0,
            output: None,
            error: None,
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }
}
