//! Hedonic model - ridge regression of sale price on parcel attributes

use crate::valuation::types::{CleanedRecord, HedonicModel, ValuationStats};
use nalgebra::{SMatrix, SVector};
use tracing::{debug, info, warn};

pub const FEATURE_COUNT: usize = 7;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "bias",
    "log_total_value",
    "log_living_area",
    "log_lot_size",
    "year_score",
    "style_psf",
    "category_psf",
];

/// psf used when neither the style, the category nor the batch has one
const FALLBACK_PSF: f64 = 100.0;

pub type FeatureVector = SVector<f64, FEATURE_COUNT>;
type GramMatrix = SMatrix<f64, FEATURE_COUNT, FEATURE_COUNT>;

/// Build the feature vector for any record, filling gaps from batch stats
pub fn build_features(record: &CleanedRecord, stats: &ValuationStats) -> FeatureVector {
    // Non-positive sizes and values are treated as unrecorded
    let with_fallback = |value: Option<f64>, median: f64| {
        value
            .filter(|v| *v > 0.0)
            .or(Some(median).filter(|m| *m > 0.0))
            .unwrap_or(1.0)
    };

    let total_value = with_fallback(record.total_value, stats.median_total_value);
    let living_area = with_fallback(record.living_area, stats.median_living_area);
    let lot_size = with_fallback(record.lot_size, stats.median_lot_size);
    let year = record
        .year_built
        .map(f64::from)
        .unwrap_or(stats.median_year_built);
    let style_price = stats
        .style_price(record.style.as_deref())
        .filter(|p| *p != 0.0)
        .unwrap_or(FALLBACK_PSF);
    let category_price = stats
        .category_price(record.property_category)
        .filter(|p| *p != 0.0)
        .unwrap_or(FALLBACK_PSF);

    FeatureVector::from([
        1.0,
        total_value.ln_1p(),
        living_area.ln_1p(),
        lot_size.ln_1p(),
        (year - 1950.0) / 100.0,
        style_price.ln_1p(),
        category_price.ln_1p(),
    ])
}

/// Fit the model over recent sales; None when there are too few sales
/// or the regularized system cannot be solved
pub fn fit_model(
    sales: &[&CleanedRecord],
    stats: &ValuationStats,
    regularization: f64,
) -> Option<HedonicModel> {
    if sales.len() < FEATURE_COUNT + 2 {
        debug!(
            "Skipping hedonic fit: {} sales, need {}",
            sales.len(),
            FEATURE_COUNT + 2
        );
        return None;
    }

    let rows: Vec<(FeatureVector, f64)> = sales
        .iter()
        .filter_map(|sale| sale.sale_price.map(|price| (build_features(sale, stats), price)))
        .collect();

    let model = solve_ridge(&rows, regularization)?;
    info!(
        "Fitted hedonic model on {} sales (r² {:.3})",
        rows.len(),
        model.r2
    );
    for (name, coefficient) in FEATURE_NAMES.iter().zip(model.coefficients.iter()) {
        debug!("  {}: {:.6}", name, coefficient);
    }
    Some(model)
}

/// coef = (XᵗX + λI)⁻¹ Xᵗy, plus in-sample r²
fn solve_ridge(rows: &[(FeatureVector, f64)], regularization: f64) -> Option<HedonicModel> {
    let mut xtx = GramMatrix::identity() * regularization;
    let mut xty = FeatureVector::zeros();

    for (x, y) in rows {
        xtx += x * x.transpose();
        xty += x.scale(*y);
    }

    let solution = match xtx.lu().solve(&xty) {
        Some(solution) if solution.iter().all(|c| c.is_finite()) => solution,
        _ => {
            warn!("Hedonic system is singular or ill-conditioned; model unavailable");
            return None;
        }
    };

    let n = rows.len() as f64;
    let mean = rows.iter().map(|(_, y)| y).sum::<f64>() / n;
    let ss_total: f64 = if rows.len() > 1 {
        rows.iter().map(|(_, y)| (y - mean).powi(2)).sum()
    } else {
        0.0
    };
    let ss_res: f64 = rows
        .iter()
        .map(|(x, y)| (y - x.dot(&solution)).powi(2))
        .sum();

    let r2 = if ss_total > 0.0 {
        (1.0 - ss_res / ss_total).clamp(0.0, 0.999)
    } else {
        0.0
    };

    let mut coefficients = [0.0; FEATURE_COUNT];
    coefficients.copy_from_slice(solution.as_slice());

    Some(HedonicModel { coefficients, r2 })
}

/// Predict a value for any record; None without a model or when the
/// prediction is not a finite number
pub fn predict_value(
    record: &CleanedRecord,
    stats: &ValuationStats,
    model: Option<&HedonicModel>,
) -> Option<f64> {
    let model = model?;
    let coefficients = FeatureVector::from(model.coefficients);
    let value = build_features(record, stats).dot(&coefficients);

    if value.is_finite() {
        Some(value)
    } else {
        debug!("Discarding non-finite hedonic value for {}", record.loc_id);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::stats::build_stats;
    use crate::valuation::types::PropertyCategory;
    use chrono::NaiveDate;

    fn sale(i: usize, price: f64) -> CleanedRecord {
        CleanedRecord {
            loc_id: format!("S{}", i),
            total_value: Some(price * 0.9),
            land_value: None,
            building_value: None,
            lot_size: Some(5000.0 + 200.0 * i as f64),
            living_area: Some(1200.0 + 90.0 * i as f64),
            style: Some(if i % 2 == 0 { "Colonial" } else { "Ranch" }.to_string()),
            property_category: PropertyCategory::Residential,
            zoning: None,
            year_built: Some(1950 + 5 * i as i32),
            sale_price: Some(price),
            sale_date: NaiveDate::from_ymd_opt(2024, 5, 1),
        }
    }

    fn linear_sales(count: usize) -> Vec<CleanedRecord> {
        (0..count)
            .map(|i| {
                let area = 1200.0 + 90.0 * i as f64;
                sale(i, 200.0 * area + (i % 3) as f64 * 5000.0)
            })
            .collect()
    }

    #[test]
    fn test_too_few_sales() {
        let records = linear_sales(8);
        let sales: Vec<&CleanedRecord> = records.iter().collect();
        let stats = build_stats(&sales);

        assert!(fit_model(&sales, &stats, 0.35).is_none());
    }

    #[test]
    fn test_fit_and_predict() {
        let records = linear_sales(12);
        let sales: Vec<&CleanedRecord> = records.iter().collect();
        let stats = build_stats(&sales);

        let model = fit_model(&sales, &stats, 0.35).unwrap();
        assert!(model.r2 > 0.5 && model.r2 <= 0.999);

        // Unsold parcel inside the training range: truth is about $340k
        let mut target = sale(99, 0.0);
        target.sale_price = None;
        target.total_value = Some(306_000.0);
        target.living_area = Some(1700.0);
        target.lot_size = Some(6100.0);
        target.year_built = Some(1977);

        let value = predict_value(&target, &stats, Some(&model)).unwrap();
        assert!(value > 250_000.0 && value < 450_000.0, "value {}", value);
    }

    #[test]
    fn test_constant_prices_give_zero_r2() {
        let records: Vec<CleanedRecord> = (0..10).map(|i| sale(i, 300_000.0)).collect();
        let sales: Vec<&CleanedRecord> = records.iter().collect();
        let stats = build_stats(&sales);

        let model = fit_model(&sales, &stats, 0.35).unwrap();
        assert_eq!(model.r2, 0.0);
    }

    #[test]
    fn test_negative_inputs_use_median_fallback() {
        let mut records = linear_sales(10);
        records[3].total_value = Some(-5000.0);
        records[4].living_area = Some(-1.0);
        let sales: Vec<&CleanedRecord> = records.iter().collect();
        let stats = build_stats(&sales);

        let features = build_features(&records[3], &stats);
        assert!((features[1] - stats.median_total_value.ln_1p()).abs() < 1e-12);
        assert!(features.iter().all(|f| f.is_finite()));

        // One bad sale no longer disables the model
        let model = fit_model(&sales, &stats, 0.35).unwrap();
        assert!(model.coefficients.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_non_finite_prediction_is_none() {
        let records = linear_sales(12);
        let sales: Vec<&CleanedRecord> = records.iter().collect();
        let stats = build_stats(&sales);

        let mut coefficients = [0.0; FEATURE_COUNT];
        coefficients[1] = f64::INFINITY;
        coefficients[2] = f64::NEG_INFINITY;
        let model = HedonicModel {
            coefficients,
            r2: 0.8,
        };

        assert!(predict_value(&records[0], &stats, Some(&model)).is_none());
    }

    #[test]
    fn test_build_features_fallbacks() {
        let records = linear_sales(10);
        let sales: Vec<&CleanedRecord> = records.iter().collect();
        let stats = build_stats(&sales);

        let mut bare = sale(50, 0.0);
        bare.total_value = None;
        bare.living_area = Some(0.0);
        bare.lot_size = None;
        bare.year_built = None;
        bare.style = Some("Victorian".to_string());
        bare.property_category = PropertyCategory::Industrial;

        let features = build_features(&bare, &stats);
        let global = stats.global_psf.unwrap();

        assert_eq!(features[0], 1.0);
        assert!((features[1] - stats.median_total_value.ln_1p()).abs() < 1e-12);
        assert!((features[2] - stats.median_living_area.ln_1p()).abs() < 1e-12);
        assert!((features[3] - stats.median_lot_size.ln_1p()).abs() < 1e-12);
        assert!((features[4] - (stats.median_year_built - 1950.0) / 100.0).abs() < 1e-12);
        assert!((features[5] - global.ln_1p()).abs() < 1e-12);
        assert!((features[6] - global.ln_1p()).abs() < 1e-12);
    }

    #[test]
    fn test_build_features_empty_stats() {
        let stats = build_stats(&[]);
        let mut bare = sale(0, 0.0);
        bare.total_value = None;
        bare.living_area = None;
        bare.lot_size = None;
        bare.year_built = None;

        let features = build_features(&bare, &stats);

        assert!((features[1] - 1f64.ln_1p()).abs() < 1e-12);
        assert!((features[4] - 0.3).abs() < 1e-12);
        assert!((features[5] - 100f64.ln_1p()).abs() < 1e-12);
    }

    #[test]
    fn test_predict_without_model() {
        let stats = build_stats(&[]);
        assert!(predict_value(&sale(1, 1.0), &stats, None).is_none());
    }
}
