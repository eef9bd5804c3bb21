//! Clean functions - resolve raw alias-keyed rows into CleanedRecord structs

use crate::valuation::types::{CleanedRecord, RawRecord};
use crate::valuation::utils::{
    classify_use_code, clean_string, first_present, normalize_loc_id, parse_date,
    parse_float_value, CONDO_MASTER_CODES,
};
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

// Alias keys, in lookup order
const LOC_ID_KEYS: &[&str] = &["LOC_ID", "PAR_ID", "PROP_ID"];
const TOTAL_VALUE_KEYS: &[&str] = &["MARKET_VALUE", "TOTAL_VAL", "TOTAL_VALUE"];
const LAND_VALUE_KEYS: &[&str] = &["LAND_VAL", "LAND_VALUE"];
const BUILDING_VALUE_KEYS: &[&str] = &["BLDG_VAL", "BLDG_VALUE"];
const LOT_SIZE_KEYS: &[&str] = &["LOT_SIZE", "LAND_SF"];
const LIVING_AREA_KEYS: &[&str] = &["BLD_AREA", "LIVING_AREA", "LIV_AREA"];
const USE_CODE_KEYS: &[&str] = &["USE_CODE", "LUC"];
const YEAR_BUILT_KEYS: &[&str] = &["YEAR_BUILT", "YR_BUILT"];
const SALE_PRICE_KEYS: &[&str] = &["LS_PRICE", "SALE_PRICE"];
const SALE_DATE_KEYS: &[&str] = &["LS_DATE", "SALE_DATE"];

const MIN_YEAR_BUILT: i32 = 1600;

/// Clean a batch of raw rows; rows without an identifier are dropped
pub fn build_clean_records<'a, I>(raw_records: I, as_of: NaiveDate) -> Vec<CleanedRecord>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let deduped = dedupe_records(raw_records);
    let total = deduped.len();

    let records: Vec<CleanedRecord> = deduped
        .into_iter()
        .filter_map(|raw| clean_record(raw, as_of))
        .collect();

    info!(
        "Cleaned {} records ({} dropped without an identifier)",
        records.len(),
        total - records.len()
    );

    records
}

/// Resolve one raw row into a CleanedRecord
pub fn clean_record(raw: &RawRecord, as_of: NaiveDate) -> Option<CleanedRecord> {
    let loc_id = match normalize_loc_id(first_present(raw, LOC_ID_KEYS)) {
        Some(id) => id,
        None => {
            debug!("Dropping row without loc_id");
            return None;
        }
    };

    // Year built must be plausible: 1600 through two years out
    let year_built = parse_float_value(first_present(raw, YEAR_BUILT_KEYS))
        .filter(|year| *year != 0.0)
        .map(|year| year.trunc())
        .filter(|year| *year >= MIN_YEAR_BUILT as f64 && *year <= (as_of.year() + 2) as f64)
        .map(|year| year as i32);

    Some(CleanedRecord {
        loc_id,
        total_value: parse_float_value(first_present(raw, TOTAL_VALUE_KEYS)),
        land_value: parse_float_value(first_present(raw, LAND_VALUE_KEYS)),
        building_value: parse_float_value(first_present(raw, BUILDING_VALUE_KEYS)),
        lot_size: parse_float_value(first_present(raw, LOT_SIZE_KEYS)),
        living_area: parse_float_value(first_present(raw, LIVING_AREA_KEYS)),
        style: clean_string(raw.get("STYLE")),
        property_category: classify_use_code(first_present(raw, USE_CODE_KEYS)),
        zoning: clean_string(raw.get("ZONING")),
        year_built,
        sale_price: parse_float_value(first_present(raw, SALE_PRICE_KEYS)),
        sale_date: parse_date(first_present(raw, SALE_DATE_KEYS)),
    })
}

/// Keep one raw row per normalized loc_id, preferring the higher-priority row.
/// Survivors stay in first-occurrence order.
pub fn dedupe_records<'a, I>(raw_records: I) -> Vec<&'a RawRecord>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut best: Vec<&RawRecord> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut unidentified = Vec::new();

    for record in raw_records {
        let loc_id = match normalize_loc_id(first_present(record, LOC_ID_KEYS)) {
            Some(id) => id,
            None => {
                unidentified.push(record);
                continue;
            }
        };

        match slots.get(&loc_id) {
            Some(&slot) => {
                if should_replace(record, best[slot]) {
                    best[slot] = record;
                }
            }
            None => {
                slots.insert(loc_id, best.len());
                best.push(record);
            }
        }
    }

    if best.len() + unidentified.len() > 0 {
        debug!(
            "Deduplicated to {} parcels ({} rows without loc_id)",
            best.len(),
            unidentified.len()
        );
    }

    // Unidentified rows pass through so the cleaner can account for the drop
    best.extend(unidentified);
    best
}

/// Priority of a raw row: higher assessed value first, condo masters last on ties
fn record_priority(record: &RawRecord) -> (f64, i8) {
    let total_value = parse_float_value(first_present(record, TOTAL_VALUE_KEYS)).unwrap_or(0.0);
    let use_code = clean_string(first_present(record, &["LUC", "USE_CODE"]))
        .unwrap_or_default()
        .to_uppercase();
    let condo_rank = if CONDO_MASTER_CODES.contains(&use_code.as_str()) {
        -1
    } else {
        0
    };
    (total_value, condo_rank)
}

/// Determine if a candidate row should replace the one already kept
fn should_replace(candidate: &RawRecord, existing: &RawRecord) -> bool {
    let (candidate_value, candidate_rank) = record_priority(candidate);
    let (existing_value, existing_rank) = record_priority(existing);

    match candidate_value.partial_cmp(&existing_value) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Equal) => candidate_rank > existing_rank,
        _ => false,
    }
}
