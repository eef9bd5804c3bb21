//! Core data types for the valuation pipeline
//! Pure data structures, behavior kept to small accessors

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A raw assessor/sale row: loosely-typed values keyed by column name
pub type RawRecord = HashMap<String, serde_json::Value>;

/// Major property categories derived from the assessor use code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyCategory {
    Residential,
    Commercial,
    Industrial,
    Agricultural,
    Forest,
    Mixed,
    Exempt,
    Other,
    Unknown,
}

impl std::fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyCategory::Residential => write!(f, "Residential"),
            PropertyCategory::Commercial => write!(f, "Commercial"),
            PropertyCategory::Industrial => write!(f, "Industrial"),
            PropertyCategory::Agricultural => write!(f, "Agricultural"),
            PropertyCategory::Forest => write!(f, "Forest"),
            PropertyCategory::Mixed => write!(f, "Mixed"),
            PropertyCategory::Exempt => write!(f, "Exempt"),
            PropertyCategory::Other => write!(f, "Other"),
            PropertyCategory::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Parcel record after alias resolution and coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    // Identification
    pub loc_id: String,

    // Assessment
    pub total_value: Option<f64>,
    pub land_value: Option<f64>,
    pub building_value: Option<f64>,

    // Physical attributes
    pub lot_size: Option<f64>,
    pub living_area: Option<f64>,
    pub style: Option<String>,
    pub property_category: PropertyCategory,
    pub zoning: Option<String>,
    pub year_built: Option<i32>,

    // Last sale
    pub sale_price: Option<f64>,
    pub sale_date: Option<NaiveDate>,
}

impl CleanedRecord {
    /// Sale price per square foot of living area, when both are known
    pub fn sale_price_per_sqft(&self) -> Option<f64> {
        match (self.sale_price, self.living_area) {
            (Some(price), Some(area)) if price != 0.0 => crate::price_per_sqft(price, area),
            _ => None,
        }
    }
}

/// Population statistics over the recent-sales subset of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationStats {
    pub median_total_value: f64,
    pub median_living_area: f64,
    pub median_lot_size: f64,
    pub median_year_built: f64,
    pub global_psf: Option<f64>,
    pub category_psf: BTreeMap<PropertyCategory, f64>,
    pub style_psf: BTreeMap<String, f64>,
}

impl ValuationStats {
    /// Median psf for a style (case-insensitive), falling back to the global psf
    pub fn style_price(&self, style: Option<&str>) -> Option<f64> {
        style
            .and_then(|s| self.style_psf.get(&s.to_lowercase()).copied())
            .or(self.global_psf)
    }

    /// Median psf for a category, falling back to the global psf
    pub fn category_price(&self, category: PropertyCategory) -> Option<f64> {
        self.category_psf.get(&category).copied().or(self.global_psf)
    }
}

/// Fitted ridge regression over the hedonic feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedonicModel {
    pub coefficients: [f64; crate::valuation::hedonic::FEATURE_COUNT],
    pub r2: f64,
}

/// One selected comparable sale for a target parcel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableSummary {
    pub loc_id: String,
    pub sale_price: f64,
    pub sale_date: NaiveDate,
    pub living_area: Option<f64>,
    pub lot_size: Option<f64>,
    pub style: Option<String>,
    pub psf: Option<f64>,
    pub weight: f64,
    pub distance: f64,
}

impl ComparableSummary {
    /// Persistable form: money to cents, weight and distance to 4 decimals
    pub fn as_payload(&self) -> ComparablePayload {
        ComparablePayload {
            loc_id: self.loc_id.clone(),
            sale_price: round_to(self.sale_price, 2),
            sale_date: self.sale_date,
            living_area: self.living_area,
            lot_size: self.lot_size,
            style: self.style.clone(),
            psf: self.psf.map(|psf| round_to(psf, 2)),
            weight: round_to(self.weight, 4),
            distance: round_to(self.distance, 4),
        }
    }
}

/// Serialized comparable embedded in a snapshot payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparablePayload {
    pub loc_id: String,
    pub sale_price: f64,
    pub sale_date: NaiveDate,
    pub living_area: Option<f64>,
    pub lot_size: Option<f64>,
    pub style: Option<String>,
    pub psf: Option<f64>,
    pub weight: f64,
    pub distance: f64,
}

/// Snapshot of the target attributes a valuation was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationInputs {
    pub total_value: Option<f64>,
    pub living_area: Option<f64>,
    pub lot_size: Option<f64>,
    pub year_built: Option<i32>,
}

impl From<&CleanedRecord> for ValuationInputs {
    fn from(record: &CleanedRecord) -> Self {
        ValuationInputs {
            total_value: record.total_value,
            living_area: record.living_area,
            lot_size: record.lot_size,
            year_built: record.year_built,
        }
    }
}

/// Valuation of one parcel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub loc_id: String,
    pub market_value: Option<f64>,
    pub market_value_per_sqft: Option<f64>,
    pub comparable_value: Option<f64>,
    pub comparable_count: usize,
    pub comparable_avg_psf: Option<f64>,
    pub hedonic_value: Option<f64>,
    pub hedonic_r2: Option<f64>,
    pub confidence: Option<f64>, // 0.0-0.95
    pub comps: Vec<ComparableSummary>,
    pub inputs: ValuationInputs,
}

/// Everything one engine call produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchValuation {
    pub valuations: Vec<ValuationResult>,
    pub model: Option<HedonicModel>,
    pub stats: ValuationStats,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
