// Library module for testable functions

pub mod valuation;

/// Calculate price per square foot of living area
/// Formula: price / living_area, only for a positive area
pub fn price_per_sqft(price: f64, living_area: f64) -> Option<f64> {
    if living_area <= 0.0 {
        return None;
    }
    Some(price / living_area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_per_sqft_calculation() {
        // Test normal case
        let psf = price_per_sqft(450_000.0, 1800.0);
        assert!(psf.is_some());
        assert!((psf.unwrap() - 250.0).abs() < 0.01);
    }

    #[test]
    fn test_price_per_sqft_small_area() {
        // Condo-sized living area
        let psf = price_per_sqft(310_000.0, 640.0);
        assert!((psf.unwrap() - 484.375).abs() < 0.01);
    }

    #[test]
    fn test_price_per_sqft_zero_area() {
        // Test with zero area (should return None)
        assert!(price_per_sqft(300_000.0, 0.0).is_none());
    }

    #[test]
    fn test_price_per_sqft_negative_area() {
        // Test with negative area (should return None)
        assert!(price_per_sqft(300_000.0, -1200.0).is_none());
    }
}
