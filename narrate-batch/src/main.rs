//! narrate-batch - Main entry point
//!
//! Converts every `*.txt` document in the input folder into one audio file.
//! The scratch folder is removed when the batch ends or the process is
//! interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use narrate_batch::lifecycle::{run_until_interrupted, shutdown_signal, RunEnd, WorkingArea};
use narrate_batch::services::{BatchOrchestrator, FfmpegConcatenator, OpenAiSpeechBackend};
use narrate_batch::settings::{CliArgs, Settings};
use narrate_common::config::load_toml_config;
use narrate_common::logging::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let toml_config = load_toml_config(args.config.as_deref())
        .context("Failed to load configuration file")?;
    let settings = Arc::new(
        Settings::resolve(&args, &toml_config).context("Invalid configuration")?,
    );

    init_tracing(settings.debug)?;

    info!("Starting narrate-batch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", settings);

    for folder in [&settings.input_folder, &settings.output_folder] {
        tokio::fs::create_dir_all(folder)
            .await
            .with_context(|| format!("Failed to create folder {}", folder.display()))?;
    }

    let working_area = Arc::new(
        WorkingArea::create(&settings.temp_folder).with_context(|| {
            format!(
                "Failed to create working area {}",
                settings.temp_folder.display()
            )
        })?,
    );

    let backend = Arc::new(
        OpenAiSpeechBackend::new(&settings).context("Failed to create speech client")?,
    );
    let concatenator = Arc::new(FfmpegConcatenator::new(settings.ffmpeg_path.clone()));
    let orchestrator = BatchOrchestrator::new(
        settings.clone(),
        backend,
        concatenator,
        working_area.clone(),
    );

    let cancel = CancellationToken::new();
    let end = run_until_interrupted(
        &working_area,
        &cancel,
        orchestrator.run(&cancel),
        shutdown_signal(),
    )
    .await
    .context("Batch failed")?;

    match end {
        RunEnd::Finished(summary) => {
            let json = serde_json::to_string(&summary).context("Failed to encode summary")?;
            info!(
                "Batch complete: {} completed, {} failed, {} skipped, {} cancelled of {} document(s)",
                summary.completed,
                summary.failed,
                summary.skipped,
                summary.cancelled,
                summary.discovered
            );
            info!("Summary: {}", json);
        }
        RunEnd::Interrupted => {
            info!("Interrupted; working area removed, outstanding work abandoned");
        }
    }

    Ok(())
}
