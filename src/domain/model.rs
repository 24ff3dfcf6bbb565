use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DUNS: &str = "DUNS";
pub const STREET: &str = "DSTREET";
pub const CITY: &str = "DCITY";
pub const STATE: &str = "DSTATEAB";
pub const ZIP5: &str = "DZIP5";
pub const PRIMARY_SIC: &str = "DPRIMSI";
pub const EMPLOYEES_HERE: &str = "DEMTLHER";
pub const SALES_VOLUME: &str = "DSALESVO";

/// Columns kept from the full extract for geocoding and aggregation.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    DUNS,
    STREET,
    CITY,
    STATE,
    ZIP5,
    PRIMARY_SIC,
    EMPLOYEES_HERE,
    SALES_VOLUME,
];

/// One parsed line (or one row of a reference table): field name to trimmed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing fields read as the empty string, same as a short line.
    pub fn get(&self, field: &str) -> &str {
        self.data.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.data.insert(field.into(), value.into());
    }

    /// Projection onto `fields`; absent fields become empty strings.
    pub fn keep_columns(&self, fields: &[&str]) -> Record {
        let data = fields
            .iter()
            .map(|f| (f.to_string(), self.get(f).to_string()))
            .collect();
        Record { data }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The columns of a business establishment the pipeline works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    #[serde(rename = "DUNS")]
    pub duns: String,
    #[serde(rename = "DSTREET")]
    pub street: String,
    #[serde(rename = "DCITY")]
    pub city: String,
    #[serde(rename = "DSTATEAB")]
    pub state: String,
    #[serde(rename = "DZIP5")]
    pub zip5: String,
    #[serde(rename = "DPRIMSI")]
    pub primary_sic: String,
    #[serde(rename = "DEMTLHER")]
    pub employees_here: String,
    #[serde(rename = "DSALESVO")]
    pub sales_volume: String,
}

impl Business {
    pub fn from_record(record: &Record) -> Self {
        Self {
            duns: record.get(DUNS).to_string(),
            street: record.get(STREET).to_string(),
            city: record.get(CITY).to_string(),
            state: record.get(STATE).to_string(),
            zip5: record.get(ZIP5).to_string(),
            primary_sic: record.get(PRIMARY_SIC).to_string(),
            employees_here: record.get(EMPLOYEES_HERE).to_string(),
            sales_volume: record.get(SALES_VOLUME).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeRequest {
    pub duns: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl GeocodeRequest {
    /// `None` when the street is missing; such businesses are never submitted.
    pub fn from_business(business: &Business) -> Option<Self> {
        if business.street.trim().is_empty() {
            return None;
        }
        Some(Self {
            duns: business.duns.clone(),
            street: business.street.clone(),
            city: business.city.clone(),
            state: business.state.clone(),
            zip: business.zip5.clone(),
        })
    }
}

/// Raw geocoder outcome for one business.
///
/// `Failed` is written when every attempt errored, so "no address match" (a
/// `Response` with an empty match list) stays distinguishable from "the request
/// never succeeded".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeocodeResult {
    Failed { error: String, attempts: u32 },
    Response(serde_json::Value),
}

impl GeocodeResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, GeocodeResult::Failed { .. })
    }

    /// `result.addressMatches` of a successful response.
    pub fn address_matches(&self) -> Option<&Vec<serde_json::Value>> {
        match self {
            GeocodeResult::Response(body) => body
                .get("result")
                .and_then(|r| r.get("addressMatches"))
                .and_then(|m| m.as_array()),
            GeocodeResult::Failed { .. } => None,
        }
    }

    pub fn has_match(&self) -> bool {
        self.address_matches().is_some_and(|m| !m.is_empty())
    }
}

pub type GeocodeResults = BTreeMap<String, GeocodeResult>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FipsMapping {
    #[serde(rename = "DUNS")]
    pub duns: String,
    #[serde(rename = "FIPS")]
    pub fips: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    #[serde(rename = "FIPS")]
    pub fips: String,
    #[serde(rename = "CZONE")]
    pub czone: String,
}

/// Reference-table row: a ZIP code and the county it lies in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipFips {
    #[serde(rename = "DZIP5")]
    pub zip5: String,
    #[serde(rename = "FIPS")]
    pub fips: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CzoneMapping {
    #[serde(rename = "DUNS")]
    pub duns: String,
    #[serde(rename = "FIPS")]
    pub fips: String,
    #[serde(rename = "CZONE")]
    pub czone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipCzoneMapping {
    #[serde(rename = "DZIP5")]
    pub zip5: String,
    #[serde(rename = "FIPS")]
    pub fips: String,
    #[serde(rename = "CZONE")]
    pub czone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CzoneTable {
    ByDuns(Vec<CzoneMapping>),
    ByZip(Vec<ZipCzoneMapping>),
}

impl CzoneTable {
    pub fn len(&self) -> usize {
        match self {
            CzoneTable::ByDuns(rows) => rows.len(),
            CzoneTable::ByZip(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A business joined to its county and commuting zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    #[serde(rename = "DUNS")]
    pub duns: String,
    #[serde(rename = "DSTREET")]
    pub street: String,
    #[serde(rename = "DCITY")]
    pub city: String,
    #[serde(rename = "DSTATEAB")]
    pub state: String,
    #[serde(rename = "DZIP5")]
    pub zip5: String,
    #[serde(rename = "DPRIMSI")]
    pub primary_sic: String,
    #[serde(rename = "DEMTLHER")]
    pub employees_here: String,
    #[serde(rename = "DSALESVO")]
    pub sales_volume: String,
    #[serde(rename = "FIPS")]
    pub fips: String,
    #[serde(rename = "CZONE")]
    pub czone: String,
}

impl AnalysisRow {
    pub fn join(business: &Business, fips: &str, czone: &str) -> Self {
        Self {
            duns: business.duns.clone(),
            street: business.street.clone(),
            city: business.city.clone(),
            state: business.state.clone(),
            zip5: business.zip5.clone(),
            primary_sic: business.primary_sic.clone(),
            employees_here: business.employees_here.clone(),
            sales_volume: business.sales_volume.clone(),
            fips: fips.to_string(),
            czone: czone.to_string(),
        }
    }
}

/// Analysis row widened with its group aggregates and market shares.
///
/// A share is `None` when its denominator was zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketShareRow {
    #[serde(rename = "DUNS")]
    pub duns: String,
    #[serde(rename = "FIPS")]
    pub fips: String,
    #[serde(rename = "CZONE")]
    pub czone: String,
    #[serde(rename = "DPRIMSI")]
    pub primary_sic: String,
    #[serde(rename = "DEMTLHER")]
    pub employees_here: f64,
    #[serde(rename = "DSALESVO")]
    pub sales_volume: f64,
    #[serde(rename = "TOTAL_FIRMS")]
    pub firm_count: usize,
    #[serde(rename = "TOTAL_EMP_CZONE")]
    pub zone_employee_total: f64,
    #[serde(rename = "TOTAL_SALES")]
    pub group_sales_total: f64,
    #[serde(rename = "MS_EMP")]
    pub employee_share: Option<f64>,
    #[serde(rename = "MS_SALES")]
    pub sales_share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    #[serde(rename = "CZONE")]
    pub czone: String,
    #[serde(rename = "DPRIMSI")]
    pub primary_sic: String,
    #[serde(rename = "HHI_EMP")]
    pub hhi_employment: Option<f64>,
    #[serde(rename = "HHI_SALES")]
    pub hhi_sales: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub businesses: usize,
    pub geocode_responses: Option<GeocodeResults>,
    pub fips_mappings: Vec<FipsMapping>,
    pub czone_table: CzoneTable,
    pub analysis_rows: Vec<AnalysisRow>,
    pub complete_rows: Vec<MarketShareRow>,
    pub index_rows: Vec<IndexRow>,
}
