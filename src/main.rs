use std::path::{Path, PathBuf};

use anyhow::Context;
use fhir::Bundle;
use obds_core::constants::{BUNDLE_FILE_SUFFIX, LEDGER_FILE_EXTENSION};
use obds_core::{CoreConfig, ObservationProcessor, ReportLedger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Outcome of one ledger file.
#[derive(Debug, PartialEq, Eq)]
enum BatchOutcome {
    Written { path: PathBuf, entries: usize },
    Empty,
}

/// Main entry point for the batch runner
///
/// Processes every ledger file in the input directory into a FHIR transaction bundle. Each
/// ledger is an independent batch and runs on its own blocking worker; a failing batch is
/// logged and does not affect the others.
///
/// # Environment Variables
/// - `OBDS_INPUT_DIR`: directory holding `*.json` ledger files (default: "ledgers")
/// - `OBDS_OUTPUT_DIR`: directory bundles are written to (default: "bundles")
/// - `OBDS_FHIR_CONFIG`: code/display configuration file (default: bundled configuration)
/// - `RUST_LOG`: log filter
///
/// # Returns
/// * `Ok(())` - If configuration is valid and the input directory could be scanned
/// * `Err(anyhow::Error)` - If startup fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("obds=info".parse()?)
                .add_directive("adt=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let input_dir = PathBuf::from(std::env::var("OBDS_INPUT_DIR").unwrap_or_else(|_| "ledgers".into()));
    let output_dir =
        PathBuf::from(std::env::var("OBDS_OUTPUT_DIR").unwrap_or_else(|_| "bundles".into()));
    let fhir_config = std::env::var("OBDS_FHIR_CONFIG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    // Configuration problems stop the runner before any batch is accepted.
    let config = CoreConfig::load(fhir_config).context("invalid configuration")?;
    let processor = ObservationProcessor::new(&config);

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;
    let ledgers = ledger_files(&input_dir)?;

    tracing::info!(
        "++ Processing {} ledgers from {} into {}",
        ledgers.len(),
        input_dir.display(),
        output_dir.display()
    );

    let workers: Vec<_> = ledgers
        .into_iter()
        .map(|ledger_path| {
            let processor = processor.clone();
            let output_dir = output_dir.clone();
            tokio::task::spawn_blocking(move || {
                process_ledger(&processor, &ledger_path, &output_dir)
            })
        })
        .collect();

    let (mut written, mut empty, mut failed) = (0usize, 0usize, 0usize);
    for worker in workers {
        match worker.await {
            Ok(Ok(BatchOutcome::Written { path, entries })) => {
                written += 1;
                tracing::info!(path = %path.display(), entries, "bundle written");
            }
            Ok(Ok(BatchOutcome::Empty)) => empty += 1,
            Ok(Err(err)) => {
                failed += 1;
                tracing::error!(error = %format!("{err:#}"), "batch failed");
            }
            Err(err) => {
                failed += 1;
                tracing::error!(error = %err, "batch worker panicked");
            }
        }
    }

    tracing::info!(written, empty, failed, "runner finished");
    Ok(())
}

/// Ledger files of `dir`, sorted by name.
fn ledger_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("cannot read input directory {}", dir.display()))?
    {
        let path = entry?.path();
        let is_ledger = path.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(LEDGER_FILE_EXTENSION)
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(BUNDLE_FILE_SUFFIX));
        if is_ledger {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn bundle_path(ledger_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = ledger_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ledger");
    output_dir.join(format!("{stem}{BUNDLE_FILE_SUFFIX}"))
}

fn process_ledger(
    processor: &ObservationProcessor,
    ledger_path: &Path,
    output_dir: &Path,
) -> anyhow::Result<BatchOutcome> {
    let ledger = ReportLedger::from_file(ledger_path)
        .with_context(|| format!("ledger {}", ledger_path.display()))?;

    let Some(bundle) = processor.process(&ledger) else {
        tracing::info!(ledger = %ledger_path.display(), "no observations; nothing written");
        return Ok(BatchOutcome::Empty);
    };

    let path = bundle_path(ledger_path, output_dir);
    std::fs::write(&path, Bundle::render(&bundle)?)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(BatchOutcome::Written {
        path,
        entries: bundle.len(),
    })
}
