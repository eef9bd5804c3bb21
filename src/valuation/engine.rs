//! Valuation engine - runs clean, stats, fit, comps and blend for one batch

use crate::valuation::types::{
    BatchValuation, CleanedRecord, RawRecord, ValuationInputs, ValuationResult,
};
use crate::valuation::{blend, clean, comps, hedonic, stats};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 365;
pub const DEFAULT_TARGET_COMP_COUNT: usize = 5;
pub const DEFAULT_REGULARIZATION: f64 = 0.35;

const MIN_LOOKBACK_DAYS: u32 = 30;
const MIN_TARGET_COMP_COUNT: usize = 3;
const MIN_REGULARIZATION: f64 = 0.05;

/// Engine configuration; floors are applied when the engine is built
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub lookback_days: u32,
    pub target_comp_count: usize,
    pub regularization: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            target_comp_count: DEFAULT_TARGET_COMP_COUNT,
            regularization: DEFAULT_REGULARIZATION,
        }
    }
}

impl EngineConfig {
    /// Read overrides from VALUATION_* environment variables
    pub fn from_env() -> Self {
        EngineConfig {
            lookback_days: env::var("VALUATION_LOOKBACK_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOOKBACK_DAYS),

            target_comp_count: env::var("VALUATION_TARGET_COMPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TARGET_COMP_COUNT),

            regularization: env::var("VALUATION_REGULARIZATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REGULARIZATION),
        }
    }
}

/// Hybrid hedonic + comparable-sales valuation engine.
///
/// Holds only its configuration, so one engine can value any number of
/// batches, from any number of threads.
#[derive(Debug, Clone)]
pub struct ValuationEngine {
    lookback_days: u32,
    target_comp_count: usize,
    regularization: f64,
}

impl Default for ValuationEngine {
    fn default() -> Self {
        ValuationEngine::new(EngineConfig::default())
    }
}

impl ValuationEngine {
    pub fn new(config: EngineConfig) -> Self {
        ValuationEngine {
            lookback_days: config.lookback_days.max(MIN_LOOKBACK_DAYS),
            target_comp_count: config.target_comp_count.max(MIN_TARGET_COMP_COUNT),
            regularization: if config.regularization.is_nan() {
                MIN_REGULARIZATION
            } else {
                config.regularization.max(MIN_REGULARIZATION)
            },
        }
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    pub fn target_comp_count(&self) -> usize {
        self.target_comp_count
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    /// Clean raw rows as of today
    pub fn build_clean_records<'a, I>(&self, raw_records: I) -> Vec<CleanedRecord>
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        self.build_clean_records_as_of(raw_records, today())
    }

    pub fn build_clean_records_as_of<'a, I>(&self, raw_records: I, as_of: NaiveDate) -> Vec<CleanedRecord>
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        clean::build_clean_records(raw_records, as_of)
    }

    /// Clean and value a batch of raw rows as of today
    pub fn compute<'a, I>(&self, raw_records: I) -> BatchValuation
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        self.compute_as_of(raw_records, today())
    }

    /// Clean and value a batch of raw rows as of a fixed date
    pub fn compute_as_of<'a, I>(&self, raw_records: I, as_of: NaiveDate) -> BatchValuation
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        let records = clean::build_clean_records(raw_records, as_of);
        self.value_records(&records, as_of)
    }

    /// Value already-cleaned records
    pub fn value_records(&self, records: &[CleanedRecord], as_of: NaiveDate) -> BatchValuation {
        info!("Valuing {} parcels as of {}", records.len(), as_of);

        // Step 1: Recent market evidence
        let recent = stats::recent_sales(records, self.lookback_days, as_of);
        info!("Found {} recent sales", recent.len());

        // Step 2: Population statistics
        let stats = stats::build_stats(&recent);

        // Step 3: Hedonic model (may be unavailable)
        let model = hedonic::fit_model(&recent, &stats, self.regularization);
        let hedonic_r2 = model.as_ref().map(|m| m.r2);

        // Step 4: Value every parcel, sold or not
        let valuations: Vec<ValuationResult> = records
            .iter()
            .map(|record| {
                let comps = comps::select_comparables(
                    record,
                    &recent,
                    self.target_comp_count,
                    self.lookback_days,
                    as_of,
                );
                let (comparable_value, comparable_avg_psf) =
                    comps::comparable_value(record, &comps);
                let hedonic_value = hedonic::predict_value(record, &stats, model.as_ref());

                let (market_value, confidence) = blend::blend_values(
                    record,
                    comparable_value,
                    comps.len(),
                    hedonic_value,
                    hedonic_r2,
                    self.target_comp_count,
                );
                let market_value_per_sqft =
                    blend::market_value_per_sqft(record, market_value, comparable_avg_psf);

                debug!(
                    "Valued {}: {:?} (comps: {}, hedonic: {:?}, confidence: {:?})",
                    record.loc_id,
                    market_value,
                    comps.len(),
                    hedonic_value,
                    confidence
                );

                ValuationResult {
                    loc_id: record.loc_id.clone(),
                    market_value,
                    market_value_per_sqft,
                    comparable_value,
                    comparable_count: comps.len(),
                    comparable_avg_psf,
                    hedonic_value,
                    hedonic_r2,
                    confidence,
                    comps,
                    inputs: ValuationInputs::from(record),
                }
            })
            .collect();

        info!(
            "Valuation complete: {} parcels, {} with a market value",
            valuations.len(),
            valuations.iter().filter(|v| v.market_value.is_some()).count()
        );

        BatchValuation {
            valuations,
            model,
            stats,
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
