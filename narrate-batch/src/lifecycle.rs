//! Working area lifecycle
//!
//! The working area is the scratch folder that holds chunk audio and concat
//! manifests while a batch runs. It is created before any document is
//! processed and removed exactly once, either when the batch finishes or when
//! the process is interrupted.

use crate::models::BatchSummary;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Process-wide scratch folder, one subdirectory per document
#[derive(Debug)]
pub struct WorkingArea {
    root: PathBuf,
    torn_down: AtomicBool,
}

impl WorkingArea {
    /// Create (or reuse) the scratch folder
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!("Working area ready: {}", root.display());
        Ok(Self {
            root,
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `{root}/{document_id}`
    pub fn document_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(document_id)
    }

    /// Create the document subdirectory if missing.
    ///
    /// Safe to call from many chunk tasks at once; losing the creation race
    /// is not an error. Never recreates the root, so a call that completes
    /// after teardown fails instead of leaving a stray folder behind.
    pub async fn ensure_document_dir(&self, document_id: &str) -> io::Result<PathBuf> {
        let dir = self.document_dir(document_id);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(dir),
            Err(e) => Err(e),
        }
    }

    /// Drop a finished document's scratch files early
    pub async fn release_document(&self, document_id: &str) {
        let dir = self.document_dir(document_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(document = document_id, "Released working directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                document = document_id,
                error = %e,
                "Failed to release working directory"
            ),
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Remove the working area recursively.
    ///
    /// Idempotent: only the first call touches the filesystem. Returns whether
    /// this call performed the removal.
    pub fn teardown(&self) -> io::Result<bool> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                info!("Working area removed: {}", self.root.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }
}

impl Drop for WorkingArea {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("Failed to remove working area {}: {}", self.root.display(), e);
        }
    }
}

/// How a bracketed batch ended
#[derive(Debug)]
pub enum RunEnd<T> {
    Finished(T),
    Interrupted,
}

/// Run `batch` inside the working area's lifetime.
///
/// If `interrupt` resolves first, `cancel` is fired and the batch future is
/// dropped without waiting for outstanding work. The working area is torn
/// down on every path.
pub async fn run_until_interrupted<B, I, E>(
    working_area: &WorkingArea,
    cancel: &CancellationToken,
    batch: B,
    interrupt: I,
) -> Result<RunEnd<BatchSummary>, E>
where
    B: Future<Output = Result<BatchSummary, E>>,
    I: Future<Output = ()>,
{
    let end = tokio::select! {
        result = batch => result.map(RunEnd::Finished),
        _ = interrupt => {
            info!("Interrupt received, abandoning outstanding work");
            cancel.cancel();
            Ok(RunEnd::Interrupted)
        }
    };

    if let Err(e) = working_area.teardown() {
        warn!(
            "Failed to remove working area {}: {}",
            working_area.path().display(),
            e
        );
    }

    end
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM
pub async fn shutdown_signal() {
    // A handler that cannot be installed never fires; the batch runs to completion
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
