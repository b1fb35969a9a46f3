//! Audio assembly
//!
//! Orders a document's chunk audio by chunk index and joins it into one file
//! with a lossless stream copy. The concatenation itself sits behind
//! [`AudioConcatenator`]; production uses ffmpeg's concat demuxer.

use crate::models::{ChunkResult, FinalArtifact};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// File name of the concat manifest inside the document's working directory
pub const MANIFEST_FILE_NAME: &str = "concat_list.txt";

/// Assembly errors
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Nothing to assemble
    #[error("No chunk results to assemble")]
    NoChunks,

    /// A chunk index in `0..expected` has no result
    #[error("Missing audio for chunk {}", .index + 1)]
    MissingChunk { index: usize },

    /// A result points at a file that is not on disk
    #[error("Audio for chunk {} not found: {}", .index + 1, .path.display())]
    MissingArtifact { index: usize, path: PathBuf },

    /// Concatenation binary could not be launched
    #[error("Concatenation tool not found: {0}")]
    BinaryNotFound(String),

    /// Concatenation ran and failed
    #[error("Concatenation failed ({status}): {stderr}")]
    ConcatFailed { status: String, stderr: String },

    /// I/O error (manifest write, output directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Joins audio files listed in a manifest into one output file
#[async_trait]
pub trait AudioConcatenator: Send + Sync {
    /// Concatenator name for log lines
    fn name(&self) -> &'static str;

    /// Concatenate the files listed in `manifest` into `output`
    ///
    /// `parts` is the same ordered list the manifest was rendered from.
    async fn concatenate(
        &self,
        manifest: &Path,
        parts: &[PathBuf],
        output: &Path,
    ) -> Result<(), AssemblyError>;
}

/// ffmpeg concat demuxer with stream copy
pub struct FfmpegConcatenator {
    binary: PathBuf,
}

impl FfmpegConcatenator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments after the binary name
    pub fn arguments(manifest: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]
        .into_iter()
        .map(std::ffi::OsString::from)
        .collect();
        args.push(manifest.as_os_str().to_os_string());
        args.push("-c".into());
        args.push("copy".into());
        args.push(output.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl AudioConcatenator for FfmpegConcatenator {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn concatenate(
        &self,
        manifest: &Path,
        _parts: &[PathBuf],
        output: &Path,
    ) -> Result<(), AssemblyError> {
        tracing::debug!(
            binary = %self.binary.display(),
            manifest = %manifest.display(),
            output = %output.display(),
            "Running ffmpeg concat"
        );

        // Dropping the future (interrupted run) kills the child
        let result = tokio::process::Command::new(&self.binary)
            .args(Self::arguments(manifest, output))
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output_status = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssemblyError::BinaryNotFound(
                    self.binary.display().to_string(),
                ));
            }
            Err(e) => return Err(AssemblyError::Io(e)),
        };

        if !output_status.status.success() {
            return Err(AssemblyError::ConcatFailed {
                status: output_status.status.to_string(),
                stderr: String::from_utf8_lossy(&output_status.stderr)
                    .trim()
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Removes the manifest when assembly leaves scope
struct ManifestGuard {
    path: PathBuf,
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                manifest = %self.path.display(),
                error = %e,
                "Failed to remove concat manifest"
            ),
        }
    }
}

/// Sort `results` by chunk index and check that `0..expected` is covered.
pub fn order_results(
    mut results: Vec<ChunkResult>,
    expected: usize,
) -> Result<Vec<ChunkResult>, AssemblyError> {
    if expected == 0 || results.is_empty() {
        return Err(AssemblyError::NoChunks);
    }

    results.sort_by_key(|r| r.index);
    results.dedup_by_key(|r| r.index);

    for position in 0..expected {
        match results.get(position) {
            Some(result) if result.index == position => {}
            _ => return Err(AssemblyError::MissingChunk { index: position }),
        }
    }
    results.truncate(expected);

    Ok(results)
}

/// Render an ffmpeg concat manifest, one `file '...'` line per part
pub fn render_manifest(parts: &[PathBuf]) -> String {
    let mut manifest = String::new();
    for part in parts {
        let escaped = part.to_string_lossy().replace('\'', r"'\''");
        manifest.push_str("file '");
        manifest.push_str(&escaped);
        manifest.push_str("'\n");
    }
    manifest
}

/// Orders chunk audio and drives the concatenator
pub struct Assembler {
    concatenator: Arc<dyn AudioConcatenator>,
}

impl Assembler {
    pub fn new(concatenator: Arc<dyn AudioConcatenator>) -> Self {
        Self { concatenator }
    }

    /// Assemble `expected` chunks from `results` into `output_path`.
    ///
    /// The manifest is written to `manifest_dir` and removed on every exit
    /// path. A failed concatenation leaves no partial output behind.
    pub async fn assemble(
        &self,
        expected: usize,
        results: Vec<ChunkResult>,
        manifest_dir: &Path,
        output_path: &Path,
    ) -> Result<FinalArtifact, AssemblyError> {
        let ordered = order_results(results, expected)?;

        let mut parts = Vec::with_capacity(ordered.len());
        for result in &ordered {
            match tokio::fs::canonicalize(&result.artifact).await {
                Ok(path) if path.is_file() => parts.push(path),
                _ => {
                    return Err(AssemblyError::MissingArtifact {
                        index: result.index,
                        path: result.artifact.clone(),
                    })
                }
            }
        }

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let manifest_path = manifest_dir.join(MANIFEST_FILE_NAME);
        let _guard = ManifestGuard {
            path: manifest_path.clone(),
        };
        tokio::fs::write(&manifest_path, render_manifest(&parts)).await?;

        tracing::debug!(
            concatenator = self.concatenator.name(),
            parts = parts.len(),
            output = %output_path.display(),
            "Assembling audio"
        );

        if let Err(e) = self
            .concatenator
            .concatenate(&manifest_path, &parts, output_path)
            .await
        {
            let _ = tokio::fs::remove_file(output_path).await;
            return Err(e);
        }

        tracing::info!(
            parts = parts.len(),
            output = %output_path.display(),
            "Audio assembled"
        );

        Ok(FinalArtifact {
            path: output_path.to_path_buf(),
            parts: ordered,
        })
    }
}
