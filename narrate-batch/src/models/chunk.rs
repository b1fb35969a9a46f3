//! Chunks and the artifacts produced from them

use serde::Serialize;
use std::path::PathBuf;

/// Bounded slice of a document's text
///
/// `index` is 0-based and defines the playback order of the final artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// 1-based number used in file names and log lines
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Successful synthesis of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkResult {
    /// Index of the chunk this audio belongs to
    pub index: usize,
    /// Audio file inside the working area
    pub artifact: PathBuf,
    /// Attempts used, first try included
    pub attempts: u32,
    /// Bytes written to `artifact`
    pub bytes: u64,
}

/// Final per-document audio file
#[derive(Debug, Clone, Serialize)]
pub struct FinalArtifact {
    pub path: PathBuf,
    /// Contributing chunk results in playback order
    pub parts: Vec<ChunkResult>,
}
