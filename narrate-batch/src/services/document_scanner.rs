//! Input document discovery
//!
//! Lists the `*.txt` files directly inside the input folder. Subfolders are
//! not searched. Results are sorted by file name so runs are reproducible.

use crate::models::Document;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Extension of eligible input documents
pub const DOCUMENT_EXTENSION: &str = "txt";

/// Document scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Folder itself could not be read
    #[error("Cannot read {0}: {1}")]
    Unreadable(PathBuf, String),
}

/// Input folder scanner
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentScanner;

impl DocumentScanner {
    pub fn new() -> Self {
        Self
    }

    /// Discover documents in `input_folder`
    pub fn scan(&self, input_folder: &Path) -> Result<Vec<Document>, ScanError> {
        if !input_folder.exists() {
            return Err(ScanError::PathNotFound(input_folder.to_path_buf()));
        }

        if !input_folder.is_dir() {
            return Err(ScanError::NotADirectory(input_folder.to_path_buf()));
        }

        let walker = WalkDir::new(input_folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        let mut documents = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // Root unreadable: nothing can be discovered
                Err(e) if e.depth() == 0 => {
                    return Err(ScanError::Unreadable(
                        input_folder.to_path_buf(),
                        e.to_string(),
                    ))
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    continue;
                }
            };

            if !Self::is_eligible(&entry) {
                continue;
            }

            match Document::from_path(entry.path()) {
                Some(document) => documents.push(document),
                None => tracing::warn!(
                    "Skipping file without a usable name: {}",
                    entry.path().display()
                ),
            }
        }

        tracing::info!(
            folder = %input_folder.display(),
            documents = documents.len(),
            "Discovered input documents"
        );

        Ok(documents)
    }

    fn is_eligible(entry: &DirEntry) -> bool {
        if !entry.file_type().is_file() {
            return false;
        }

        let hidden = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false);
        if hidden {
            return false;
        }

        entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == DOCUMENT_EXTENSION)
            .unwrap_or(false)
    }
}
