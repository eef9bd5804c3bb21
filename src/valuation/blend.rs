//! Blend functions - combine comp and hedonic estimates into a final value
//! Pure functions, no side effects

use crate::valuation::types::CleanedRecord;

pub const MAX_CONFIDENCE: f64 = 0.95;
const MAX_COMP_ONLY_CONFIDENCE: f64 = 0.9;
const MIN_MODEL_ONLY_CONFIDENCE: f64 = 0.25;

/// Fraction of {total value, living area, lot size, year built} present on a record
pub fn coverage_score(record: &CleanedRecord) -> f64 {
    let present = |value: Option<f64>| value.map_or(false, |v| v != 0.0);

    let filled = [
        present(record.total_value),
        present(record.living_area),
        present(record.lot_size),
        record.year_built.map_or(false, |y| y != 0),
    ]
    .iter()
    .filter(|filled| **filled)
    .count();

    filled as f64 / 4.0
}

/// Final value and confidence from whichever signals are available
pub fn blend_values(
    record: &CleanedRecord,
    comp_value: Option<f64>,
    comp_count: usize,
    hedonic_value: Option<f64>,
    hedonic_r2: Option<f64>,
    target_comp_count: usize,
) -> (Option<f64>, Option<f64>) {
    match (comp_value, hedonic_value) {
        (None, None) => (None, None),

        // Model only
        (None, Some(hedonic)) => {
            let r2 = hedonic_r2.filter(|r| *r != 0.0).unwrap_or(0.2);
            (Some(hedonic), Some(r2.max(MIN_MODEL_ONLY_CONFIDENCE)))
        }

        // Comps only
        (Some(comp), None) => {
            let confidence = MAX_COMP_ONLY_CONFIDENCE.min(0.4 + 0.1 * comp_count as f64);
            (Some(comp), Some(confidence))
        }

        (Some(comp), Some(hedonic)) => {
            let comp_strength = (comp_count as f64 / target_comp_count as f64).min(1.0);
            let model_strength = hedonic_r2.unwrap_or(0.0);

            let comp_weight = 0.45 + 0.35 * comp_strength;
            let model_weight = (0.55 - 0.35 * comp_strength) * (0.5 + 0.5 * model_strength);
            let total = comp_weight + model_weight;

            let blended = (comp_weight / total) * comp + (model_weight / total) * hedonic;
            let confidence = MAX_CONFIDENCE.min(
                0.5 * comp_strength + 0.3 * model_strength + 0.2 * coverage_score(record),
            );

            (Some(blended), Some(confidence))
        }
    }
}

/// Per-sqft market value, falling back to the comps' average psf
pub fn market_value_per_sqft(
    record: &CleanedRecord,
    market_value: Option<f64>,
    comparable_avg_psf: Option<f64>,
) -> Option<f64> {
    let direct = match (market_value, record.living_area) {
        (Some(value), Some(area)) if value != 0.0 => crate::price_per_sqft(value, area),
        _ => None,
    };

    direct.or(comparable_avg_psf.filter(|psf| *psf != 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::types::PropertyCategory;

    fn mock_record() -> CleanedRecord {
        CleanedRecord {
            loc_id: "T1".to_string(),
            total_value: Some(500_000.0),
            land_value: None,
            building_value: None,
            lot_size: Some(7000.0),
            living_area: Some(2000.0),
            style: None,
            property_category: PropertyCategory::Residential,
            zoning: None,
            year_built: None,
            sale_price: None,
            sale_date: None,
        }
    }

    #[test]
    fn test_coverage_score() {
        let record = mock_record();
        assert!((coverage_score(&record) - 0.75).abs() < 1e-12);

        let empty = CleanedRecord {
            total_value: None,
            lot_size: Some(0.0),
            living_area: None,
            ..record
        };
        assert_eq!(coverage_score(&empty), 0.0);
    }

    #[test]
    fn test_blend_neither() {
        assert_eq!(blend_values(&mock_record(), None, 0, None, None, 5), (None, None));
    }

    #[test]
    fn test_blend_comp_only() {
        let (value, confidence) = blend_values(&mock_record(), Some(410_000.0), 2, None, None, 5);
        assert_eq!(value, Some(410_000.0));
        assert!((confidence.unwrap() - 0.6).abs() < 1e-12);

        // Confidence caps at 0.9
        let (_, confidence) = blend_values(&mock_record(), Some(410_000.0), 8, None, None, 5);
        assert!((confidence.unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_blend_model_only() {
        let (value, confidence) = blend_values(&mock_record(), None, 0, Some(390_000.0), Some(0.8), 5);
        assert_eq!(value, Some(390_000.0));
        assert!((confidence.unwrap() - 0.8).abs() < 1e-12);

        let (_, confidence) = blend_values(&mock_record(), None, 0, Some(390_000.0), None, 5);
        assert!((confidence.unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_blend_both() {
        // Full comp strength, r² 0.6
        let (value, confidence) =
            blend_values(&mock_record(), Some(400_000.0), 5, Some(300_000.0), Some(0.6), 5);

        // comp weight 0.8, model weight 0.2 * 0.8 = 0.16
        let expected = (0.8 * 400_000.0 + 0.16 * 300_000.0) / 0.96;
        assert!((value.unwrap() - expected).abs() < 1e-6);

        // 0.5 + 0.18 + 0.2 * 0.75
        assert!((confidence.unwrap() - 0.83).abs() < 1e-12);
    }

    #[test]
    fn test_blend_confidence_is_capped() {
        let mut record = mock_record();
        record.year_built = Some(1990);
        let (_, confidence) =
            blend_values(&record, Some(400_000.0), 5, Some(400_000.0), Some(0.999), 5);
        assert!(confidence.unwrap() <= MAX_CONFIDENCE);
        assert!((confidence.unwrap() - MAX_CONFIDENCE).abs() < 1e-12);
    }

    #[test]
    fn test_market_value_per_sqft() {
        let record = mock_record();
        assert_eq!(market_value_per_sqft(&record, Some(500_000.0), Some(180.0)), Some(250.0));

        let no_area = CleanedRecord {
            living_area: None,
            ..mock_record()
        };
        assert_eq!(market_value_per_sqft(&no_area, Some(500_000.0), Some(180.0)), Some(180.0));
        assert_eq!(market_value_per_sqft(&no_area, Some(500_000.0), None), None);
        assert_eq!(market_value_per_sqft(&record, None, None), None);
    }
}
