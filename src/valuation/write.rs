//! Write functions - turn valuations into persistable snapshots and write them out

use crate::valuation::types::{ComparablePayload, ValuationInputs, ValuationResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

pub const METHODOLOGY_HYBRID_V1: &str = "hybrid_v1";
pub const DEFAULT_MODEL_VERSION: &str = "hybrid-v1.0";

/// Hedonic part of a snapshot payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedonicPayload {
    pub value: Option<f64>,
    pub r2: Option<f64>,
}

/// Serialized evidence stored alongside a market value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub comps: Vec<ComparablePayload>,
    pub inputs: ValuationInputs,
    pub hedonic: HedonicPayload,
}

/// One persisted market value, keyed by (area_id, loc_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketValueSnapshot {
    pub area_id: String,
    pub loc_id: String,
    pub market_value: Option<Decimal>,
    pub market_value_per_sqft: Option<Decimal>,
    pub comparable_value: Option<Decimal>,
    pub comparable_count: usize,
    pub comparable_avg_psf: Option<Decimal>,
    pub hedonic_value: Option<Decimal>,
    pub hedonic_r2: Option<f64>,
    pub valuation_confidence: Option<f64>,
    pub methodology: String,
    pub model_version: String,
    pub valued_at: DateTime<Utc>,
    pub payload: SnapshotPayload,
}

/// Write operation statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteStats {
    pub written: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for WriteStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "written: {}, skipped: {}, errors: {}",
            self.written, self.skipped, self.errors
        )
    }
}

/// Quantize to cents, half away from zero; non-finite values are dropped
pub fn to_cents(value: Option<f64>) -> Option<Decimal> {
    let value = value.filter(|v| v.is_finite())?;
    Decimal::from_f64(value).map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Build snapshots for every valuation that produced a market value.
/// Returns the snapshots and the number of valuations skipped.
pub fn build_snapshots(
    area_id: &str,
    valuations: &[ValuationResult],
    model_version: &str,
    valued_at: DateTime<Utc>,
) -> (Vec<MarketValueSnapshot>, usize) {
    let mut snapshots = Vec::new();
    let mut skipped = 0;

    for valuation in valuations {
        if valuation.market_value.is_none() {
            debug!("Skipping {} (no market value)", valuation.loc_id);
            skipped += 1;
            continue;
        }

        snapshots.push(MarketValueSnapshot {
            area_id: area_id.to_string(),
            loc_id: valuation.loc_id.clone(),
            market_value: to_cents(valuation.market_value),
            market_value_per_sqft: to_cents(valuation.market_value_per_sqft),
            comparable_value: to_cents(valuation.comparable_value),
            comparable_count: valuation.comparable_count,
            comparable_avg_psf: to_cents(valuation.comparable_avg_psf),
            hedonic_value: to_cents(valuation.hedonic_value),
            hedonic_r2: valuation.hedonic_r2,
            valuation_confidence: valuation.confidence,
            methodology: METHODOLOGY_HYBRID_V1.to_string(),
            model_version: model_version.to_string(),
            valued_at,
            payload: SnapshotPayload {
                comps: valuation.comps.iter().map(|c| c.as_payload()).collect(),
                inputs: valuation.inputs.clone(),
                hedonic: HedonicPayload {
                    value: valuation.hedonic_value.filter(|v| v.is_finite()),
                    r2: valuation.hedonic_r2,
                },
            },
        });
    }

    (snapshots, skipped)
}

/// Write snapshots as JSON lines, one per parcel
pub fn write_snapshots(path: &Path, snapshots: &[MarketValueSnapshot]) -> Result<WriteStats> {
    info!("Writing {} snapshots to {:?}", snapshots.len(), path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }

    let file = fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    let mut stats = WriteStats::default();

    for snapshot in snapshots {
        match serde_json::to_writer(&mut writer, snapshot) {
            Ok(()) => {
                writer.write_all(b"\n")?;
                stats.written += 1;
            }
            Err(e) => {
                warn!("Failed to write snapshot {}: {}", snapshot.loc_id, e);
                stats.errors += 1;
            }
        }
    }

    writer.flush()?;
    info!("Write complete: {}", stats);

    Ok(stats)
}
