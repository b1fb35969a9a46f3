//! Data model for a batch run

pub mod chunk;
pub mod document;
pub mod summary;

pub use chunk::{Chunk, ChunkResult, FinalArtifact};
pub use document::{Document, DocumentReport, DocumentState};
pub use summary::BatchSummary;
