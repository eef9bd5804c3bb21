//! Recent-sales selection and population statistics

use crate::valuation::types::{CleanedRecord, PropertyCategory, ValuationStats};
use crate::valuation::utils::median;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

pub const MIN_SALE_PRICE: f64 = 100.0;
pub const MAX_SALE_PRICE: f64 = 25_000_000.0;

/// Year built assumed when no recent sale carries one
pub const DEFAULT_MEDIAN_YEAR_BUILT: f64 = 1980.0;

/// Records with an in-range price and a sale inside the lookback window.
///
/// The window is whole days and the boundary day is inclusive: with a
/// 365-day lookback, a sale exactly 365 days before `as_of` is recent.
pub fn recent_sales(
    records: &[CleanedRecord],
    lookback_days: u32,
    as_of: NaiveDate,
) -> Vec<&CleanedRecord> {
    let cutoff = as_of - Duration::days(i64::from(lookback_days));

    records
        .iter()
        .filter(|record| match (record.sale_price, record.sale_date) {
            (Some(price), Some(date)) => {
                (MIN_SALE_PRICE..=MAX_SALE_PRICE).contains(&price) && date >= cutoff
            }
            _ => false,
        })
        .collect()
}

/// Compute medians and psf groupings from recent sales only
pub fn build_stats(sales: &[&CleanedRecord]) -> ValuationStats {
    // Zero means "not recorded" in assessor data
    let present = |value: Option<f64>| value.filter(|v| *v != 0.0);

    let total_values: Vec<f64> = sales.iter().filter_map(|s| present(s.total_value)).collect();
    let living_areas: Vec<f64> = sales.iter().filter_map(|s| present(s.living_area)).collect();
    let lot_sizes: Vec<f64> = sales.iter().filter_map(|s| present(s.lot_size)).collect();
    let years: Vec<f64> = sales
        .iter()
        .filter_map(|s| s.year_built)
        .filter(|year| *year != 0)
        .map(f64::from)
        .collect();

    let mut psf_values = Vec::new();
    let mut category_groups: BTreeMap<PropertyCategory, Vec<f64>> = BTreeMap::new();
    let mut style_groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for sale in sales {
        let psf = match sale.sale_price_per_sqft() {
            Some(psf) if psf != 0.0 => psf,
            _ => continue,
        };
        psf_values.push(psf);
        category_groups
            .entry(sale.property_category)
            .or_default()
            .push(psf);
        if let Some(style) = &sale.style {
            style_groups.entry(style.to_lowercase()).or_default().push(psf);
        }
    }

    let stats = ValuationStats {
        median_total_value: median(&total_values).unwrap_or(0.0),
        median_living_area: median(&living_areas).unwrap_or(0.0),
        median_lot_size: median(&lot_sizes).unwrap_or(0.0),
        median_year_built: median(&years).unwrap_or(DEFAULT_MEDIAN_YEAR_BUILT),
        global_psf: median(&psf_values),
        category_psf: group_medians(category_groups),
        style_psf: group_medians(style_groups),
    };

    debug!(
        "Stats from {} sales: global psf {:?}, {} categories, {} styles",
        sales.len(),
        stats.global_psf,
        stats.category_psf.len(),
        stats.style_psf.len()
    );

    stats
}

fn group_medians<K: Ord>(groups: BTreeMap<K, Vec<f64>>) -> BTreeMap<K, f64> {
    groups
        .into_iter()
        .filter_map(|(key, values)| median(&values).map(|m| (key, m)))
        .collect()
}
