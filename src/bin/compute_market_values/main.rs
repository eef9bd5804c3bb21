//! Market value orchestrator - loads assessor exports, values each area, writes snapshots

use anyhow::{Context, Result};
use chrono::Utc;
use parcel_valuation::valuation::summary::BatchSummary;
use parcel_valuation::valuation::write::{self, WriteStats, DEFAULT_MODEL_VERSION};
use parcel_valuation::valuation::{source, EngineConfig, ValuationEngine};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    info!("Starting market value computation");

    let config = Arc::new(Config::from_env());
    let engine = Arc::new(ValuationEngine::new(EngineConfig::from_env()));
    info!(
        "Configuration loaded (lookback {}d, {} comps, ridge {})",
        engine.lookback_days(),
        engine.target_comp_count(),
        engine.regularization()
    );

    // Each argument is one area export; the file stem is the area id
    let inputs: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        warn!("No input files given. Usage: compute-market-values <area.csv|json|jsonl>...");
        return Ok(());
    }

    let mut handles = Vec::with_capacity(inputs.len());
    for path in inputs {
        let area_id = area_id_for(&path);
        let config = Arc::clone(&config);
        let engine = Arc::clone(&engine);

        let handle = tokio::task::spawn_blocking(move || run_area(&config, &engine, &area_id, &path));
        handles.push(handle);
    }

    let mut failed = 0;
    for handle in handles {
        match handle.await {
            Ok((area_id, Ok(stats))) => {
                info!("✓ {} completed: {}", area_id, stats);
            }
            Ok((area_id, Err(e))) => {
                failed += 1;
                error!("✗ {} failed: {:#}", area_id, e);
            }
            Err(e) => {
                failed += 1;
                error!("✗ Area task panicked: {}", e);
            }
        }
    }

    if failed > 0 {
        warn!("{} area(s) failed", failed);
    }
    info!("Market value computation complete");

    Ok(())
}

/// Value one area end to end. Returns the area id with the outcome so the
/// caller can report it.
fn run_area(
    config: &Config,
    engine: &ValuationEngine,
    area_id: &str,
    path: &Path,
) -> (String, Result<WriteStats>) {
    (area_id.to_string(), value_area(config, engine, area_id, path))
}

fn value_area(config: &Config, engine: &ValuationEngine, area_id: &str, path: &Path) -> Result<WriteStats> {
    info!("=== Area {} ===", area_id);

    // Step 1: Load raw rows
    info!("Step 1/4: Loading {:?}...", path);
    let raw = source::load_records(path).with_context(|| format!("Failed to load {:?}", path))?;
    info!("✓ Loaded {} rows", raw.len());

    // Limit to first N records for testing (optional)
    let raw = if config.limit_records > 0 {
        let limit = config.limit_records.min(raw.len());
        warn!("Limiting to first {} records (testing mode)", limit);
        raw.into_iter().take(limit).collect()
    } else {
        raw
    };

    // Step 2: Clean and value
    info!("Step 2/4: Valuing parcels...");
    let batch = engine.compute(&raw);
    let summary = BatchSummary::from_batch(&batch);
    info!("✓ {}", summary);

    // Step 3: Build snapshots
    info!("Step 3/4: Building snapshots...");
    let (snapshots, skipped) =
        write::build_snapshots(area_id, &batch.valuations, &config.model_version, Utc::now());
    info!("✓ Built {} snapshots ({} without a value)", snapshots.len(), skipped);

    // Step 4: Write
    if config.dry_run {
        info!("Step 4/4: Dry run, nothing written");
        return Ok(WriteStats {
            written: 0,
            skipped: skipped + snapshots.len(),
            errors: 0,
        });
    }

    info!("Step 4/4: Writing snapshots...");
    let output = config.output_dir.join(format!("{}.jsonl", area_id));
    let mut stats = write::write_snapshots(&output, &snapshots)?;
    stats.skipped += skipped;
    info!("✓ Write complete");

    Ok(stats)
}

fn area_id_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
struct Config {
    output_dir: PathBuf,
    limit_records: usize, // 0 = no limit
    dry_run: bool,
    model_version: String,
}

impl Config {
    fn from_env() -> Self {
        Config {
            output_dir: env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "/tmp/parcel_valuations".to_string())
                .into(),

            limit_records: env::var("LIMIT_RECORDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            dry_run: env::var("DRY_RUN")
                .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true"))
                .unwrap_or(false),

            model_version: env::var("MODEL_VERSION").unwrap_or_else(|_| DEFAULT_MODEL_VERSION.to_string()),
        }
    }
}
