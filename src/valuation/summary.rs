//! Batch summary - headline numbers for one valued area

use crate::valuation::types::BatchValuation;
use crate::valuation::utils::median;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub parcels: usize,
    pub valued: usize,
    pub with_comps: usize,
    pub without_comps: usize,
    pub avg_comps: f64,
    pub max_comps: usize,
    pub avg_market_value: Option<f64>,
    pub median_market_value: Option<f64>,
    pub avg_confidence: Option<f64>,
    pub model_r2: Option<f64>,
}

impl BatchSummary {
    pub fn from_batch(batch: &BatchValuation) -> Self {
        let valuations = &batch.valuations;
        let parcels = valuations.len();

        let values: Vec<f64> = valuations
            .iter()
            .filter_map(|v| v.market_value)
            .filter(|v| *v != 0.0)
            .collect();
        let confidences: Vec<f64> = valuations.iter().filter_map(|v| v.confidence).collect();
        let with_comps = valuations.iter().filter(|v| v.comparable_count > 0).count();
        let total_comps: usize = valuations.iter().map(|v| v.comparable_count).sum();

        BatchSummary {
            parcels,
            valued: valuations.iter().filter(|v| v.market_value.is_some()).count(),
            with_comps,
            without_comps: parcels - with_comps,
            avg_comps: if parcels > 0 {
                total_comps as f64 / parcels as f64
            } else {
                0.0
            },
            max_comps: valuations.iter().map(|v| v.comparable_count).max().unwrap_or(0),
            avg_market_value: mean(&values),
            median_market_value: median(&values),
            avg_confidence: mean(&confidences),
            model_r2: batch.model.as_ref().map(|m| m.r2),
        }
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let money = |value: Option<f64>| match value {
            Some(v) => format!("${:.0}", v),
            None => "n/a".to_string(),
        };
        let r2 = match self.model_r2 {
            Some(r2) => format!("{:.2}", r2),
            None => "n/a".to_string(),
        };

        write!(
            f,
            "{}/{} valued | {} with comps (avg {:.1}, max {}) | model r² {} | avg {} | median {}",
            self.valued,
            self.parcels,
            self.with_comps,
            self.avg_comps,
            self.max_comps,
            r2,
            money(self.avg_market_value),
            money(self.median_market_value)
        )
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
