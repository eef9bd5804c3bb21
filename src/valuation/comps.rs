//! Comparable selection - rank recent sales by attribute similarity to a target

use crate::valuation::types::{CleanedRecord, ComparableSummary};
use crate::valuation::utils::relative_gap;
use chrono::NaiveDate;
use tracing::debug;

const AREA_GAP_CAP: f64 = 0.5;
const LOT_GAP_CAP: f64 = 0.5;
const LOT_GAP_WEIGHT: f64 = 0.7;
const STYLE_PENALTY: f64 = 0.2;
const ZONING_PENALTY: f64 = 0.1;
const MAX_AGE_PENALTY: f64 = 0.4;

/// Area ratio bounds applied when scaling a comp price to the target
const MIN_AREA_RATIO: f64 = 0.5;
const MAX_AREA_RATIO: f64 = 1.5;

fn both_differ(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a != b)
}

/// Dissimilarity between a candidate sale and the target (lower = closer)
pub fn comparable_distance(
    target: &CleanedRecord,
    candidate: &CleanedRecord,
    lookback_days: u32,
    as_of: NaiveDate,
) -> f64 {
    let area_gap = relative_gap(candidate.living_area, target.living_area, AREA_GAP_CAP);
    let lot_gap = relative_gap(candidate.lot_size, target.lot_size, LOT_GAP_CAP) * LOT_GAP_WEIGHT;

    let style_penalty = if both_differ(&candidate.style, &target.style) {
        STYLE_PENALTY
    } else {
        0.0
    };
    let zoning_penalty = if both_differ(&candidate.zoning, &target.zoning) {
        ZONING_PENALTY
    } else {
        0.0
    };

    // Future-dated sales count as brand new
    let age_penalty = candidate
        .sale_date
        .map(|date| {
            let days_old = (as_of - date).num_days().max(0) as f64;
            MAX_AGE_PENALTY.min(days_old / f64::from(lookback_days))
        })
        .unwrap_or(0.0);

    area_gap + lot_gap + style_penalty + zoning_penalty + age_penalty
}

/// Pick the closest recent sales for a target parcel.
///
/// The pool is same-category sales other than the target itself. When that
/// pool is empty the full recent-sales list is used as is, which may include
/// the target.
pub fn select_comparables(
    target: &CleanedRecord,
    candidates: &[&CleanedRecord],
    target_comp_count: usize,
    lookback_days: u32,
    as_of: NaiveDate,
) -> Vec<ComparableSummary> {
    let mut pool: Vec<&CleanedRecord> = candidates
        .iter()
        .copied()
        .filter(|c| c.loc_id != target.loc_id && c.property_category == target.property_category)
        .collect();
    if pool.is_empty() {
        pool = candidates.to_vec();
    }

    let mut ranked: Vec<(f64, &CleanedRecord)> = pool
        .into_iter()
        .map(|c| (comparable_distance(target, c, lookback_days, as_of), c))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.truncate(target_comp_count * 2);

    let comps: Vec<ComparableSummary> = ranked
        .into_iter()
        .take(target_comp_count)
        .map(|(distance, record)| ComparableSummary {
            loc_id: record.loc_id.clone(),
            sale_price: record.sale_price.unwrap_or(0.0),
            sale_date: record.sale_date.unwrap_or(as_of),
            living_area: record.living_area,
            lot_size: record.lot_size,
            style: record.style.clone(),
            psf: record.sale_price_per_sqft(),
            weight: 1.0 / (1.0 + distance),
            distance,
        })
        .collect();

    debug!("Selected {} comps for {}", comps.len(), target.loc_id);

    comps
}

/// Size-adjusted weighted comp value and weighted average comp psf
pub fn comparable_value(
    target: &CleanedRecord,
    comps: &[ComparableSummary],
) -> (Option<f64>, Option<f64>) {
    let mut price_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut psf_sum = 0.0;
    let mut psf_weight_sum = 0.0;

    for comp in comps {
        if comp.sale_price <= 0.0 {
            continue;
        }

        let mut scaled_price = comp.sale_price;
        if let (Some(target_area), Some(comp_area)) = (target.living_area, comp.living_area) {
            if target_area != 0.0 && comp_area > 0.0 {
                scaled_price *= (target_area / comp_area).clamp(MIN_AREA_RATIO, MAX_AREA_RATIO);
            }
        }

        price_sum += scaled_price * comp.weight;
        weight_sum += comp.weight;

        if let Some(psf) = comp.psf.filter(|p| *p != 0.0) {
            psf_sum += psf * comp.weight;
            psf_weight_sum += comp.weight;
        }
    }

    if weight_sum == 0.0 {
        return (None, None);
    }

    let avg_psf = if psf_weight_sum > 0.0 {
        Some(psf_sum / psf_weight_sum)
    } else {
        None
    };

    (Some(price_sum / weight_sum), avg_psf)
}
