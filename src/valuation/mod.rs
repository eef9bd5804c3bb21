//! Parcel valuation module - functional pipeline from raw assessor rows to market values

pub mod blend;
pub mod clean;
pub mod comps;
pub mod engine;
pub mod hedonic;
pub mod source;
pub mod stats;
pub mod summary;
pub mod types;
pub mod utils;
pub mod write;

pub use engine::{EngineConfig, ValuationEngine};
pub use types::*;
