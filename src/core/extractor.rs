use crate::core::normalize::pad_code;
use crate::domain::model::{FipsMapping, GeocodeResult, GeocodeResults};
use serde_json::Value;

/// Geography layer the county codes are read from.
const COUNTY_LAYER: &str = "Counties";

/// State + county FIPS of the first address match, if the response has one.
pub fn first_match_fips(result: &GeocodeResult) -> Option<String> {
    let first = result.address_matches()?.first()?;
    let geographies = first.get("geographies")?.as_object()?;

    let county = geographies
        .get(COUNTY_LAYER)
        .and_then(first_with_codes)
        .or_else(|| geographies.values().find_map(first_with_codes))?;

    let state = pad_code(code_text(county.get("STATE")?)?.as_str(), 2);
    let county = pad_code(code_text(county.get("COUNTY")?)?.as_str(), 3);
    let fips = format!("{}{}", state, county);

    (fips.len() == 5 && fips.bytes().all(|b| b.is_ascii_digit())).then_some(fips)
}

fn first_with_codes(layer: &Value) -> Option<&Value> {
    layer
        .as_array()?
        .iter()
        .find(|entry| entry.get("STATE").is_some() && entry.get("COUNTY").is_some())
}

fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reduces raw geocoder responses to `(DUNS, FIPS)` pairs.
///
/// Businesses without a match, or whose lookup failed, are left out.
pub fn extract_fips(results: &GeocodeResults) -> Vec<FipsMapping> {
    let mappings: Vec<FipsMapping> = results
        .iter()
        .filter_map(|(duns, result)| {
            first_match_fips(result).map(|fips| FipsMapping {
                duns: duns.clone(),
                fips,
            })
        })
        .collect();

    tracing::info!(
        "🗺️ Extracted FIPS for {} of {} geocoded businesses",
        mappings.len(),
        results.len()
    );
    mappings
}
