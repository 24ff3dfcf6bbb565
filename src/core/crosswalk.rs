use crate::core::normalize::{pad_code, ZIP_REFERENCE_COUNTY, ZIP_REFERENCE_STATE, ZIP_REFERENCE_ZIP};
use crate::domain::model::{
    AnalysisRow, Business, CrosswalkEntry, CzoneMapping, FipsMapping, Record, ZipCzoneMapping,
    ZipFips,
};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_FIPS_COLUMN: &str = "cty_fips";
pub const DEFAULT_CZONE_COLUMN: &str = "czone";

fn is_code(value: &str, width: usize) -> bool {
    value.len() == width && value.bytes().all(|b| b.is_ascii_digit())
}

/// County FIPS to commuting zone lookup built from the crosswalk table.
#[derive(Debug, Clone, Default)]
pub struct CrosswalkMapper {
    entries: Vec<CrosswalkEntry>,
    index: HashMap<String, String>,
}

impl CrosswalkMapper {
    pub fn new(entries: Vec<CrosswalkEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            if index.contains_key(&entry.fips) {
                tracing::warn!("Crosswalk lists FIPS {} more than once; keeping the first", entry.fips);
                continue;
            }
            index.insert(entry.fips.clone(), entry.czone.clone());
            kept.push(entry);
        }
        Self {
            entries: kept,
            index,
        }
    }

    /// Reads crosswalk rows, zero-padding both codes to five digits.
    /// Rows whose codes are missing or not numeric are dropped.
    pub fn from_records(records: &[Record], fips_column: &str, czone_column: &str) -> Self {
        let entries: Vec<CrosswalkEntry> = records
            .iter()
            .filter_map(|record| {
                let fips = pad_code(record.get(fips_column), 5);
                let czone = pad_code(record.get(czone_column), 5);
                (is_code(&fips, 5) && is_code(&czone, 5)).then_some(CrosswalkEntry { fips, czone })
            })
            .collect();

        if entries.len() < records.len() {
            tracing::warn!(
                "Dropped {} crosswalk rows without usable '{}'/'{}' codes",
                records.len() - entries.len(),
                fips_column,
                czone_column
            );
        }
        Self::new(entries)
    }

    pub fn entries(&self) -> &[CrosswalkEntry] {
        &self.entries
    }

    pub fn czone_for(&self, fips: &str) -> Option<&str> {
        self.index.get(fips).map(String::as_str)
    }

    /// Inner join of geocoded `(DUNS, FIPS)` pairs on FIPS.
    pub fn map_duns(&self, mappings: &[FipsMapping]) -> Vec<CzoneMapping> {
        let mapped: Vec<CzoneMapping> = mappings
            .iter()
            .filter_map(|m| {
                self.czone_for(&m.fips).map(|czone| CzoneMapping {
                    duns: m.duns.clone(),
                    fips: m.fips.clone(),
                    czone: czone.to_string(),
                })
            })
            .collect();

        tracing::info!(
            "🗺️ Mapped {} of {} businesses to commuting zones",
            mapped.len(),
            mappings.len()
        );
        mapped
    }

    /// Inner join of the ZIP reference on FIPS, then one row per ZIP.
    ///
    /// A ZIP that spans several counties keeps the first row in input order.
    pub fn map_zips(&self, zips: &[ZipFips]) -> Vec<ZipCzoneMapping> {
        let mut seen = HashSet::new();
        let mut joined = 0usize;
        let mut mapped = Vec::new();

        for zip in zips {
            let Some(czone) = self.czone_for(&zip.fips) else {
                continue;
            };
            joined += 1;
            if seen.insert(zip.zip5.clone()) {
                mapped.push(ZipCzoneMapping {
                    zip5: zip.zip5.clone(),
                    fips: zip.fips.clone(),
                    czone: czone.to_string(),
                });
            }
        }

        tracing::info!(
            "🗺️ ZIP mapping: {} reference rows, {} joined to a commuting zone, {} unique ZIPs",
            zips.len(),
            joined,
            mapped.len()
        );
        mapped
    }
}

/// ZIP reference rows (already normalized) as `(ZIP, state + county)` pairs.
pub fn zip_fips_from_records(records: &[Record]) -> Vec<ZipFips> {
    records
        .iter()
        .filter_map(|record| {
            let zip5 = record.get(ZIP_REFERENCE_ZIP);
            let state = record.get(ZIP_REFERENCE_STATE);
            let county = record.get(ZIP_REFERENCE_COUNTY);
            (is_code(zip5, 5) && is_code(state, 2) && is_code(county, 3)).then(|| ZipFips {
                zip5: zip5.to_string(),
                fips: format!("{}{}", state, county),
            })
        })
        .collect()
}

pub fn join_by_duns(businesses: &[Business], mapping: &[CzoneMapping]) -> Vec<AnalysisRow> {
    let index: HashMap<&str, &CzoneMapping> =
        mapping.iter().map(|m| (m.duns.as_str(), m)).collect();

    businesses
        .iter()
        .filter_map(|b| {
            index
                .get(b.duns.as_str())
                .map(|m| AnalysisRow::join(b, &m.fips, &m.czone))
        })
        .collect()
}

pub fn join_by_zip(businesses: &[Business], mapping: &[ZipCzoneMapping]) -> Vec<AnalysisRow> {
    let index: HashMap<&str, &ZipCzoneMapping> =
        mapping.iter().map(|m| (m.zip5.as_str(), m)).collect();

    businesses
        .iter()
        .filter_map(|b| {
            index
                .get(b.zip5.as_str())
                .map(|m| AnalysisRow::join(b, &m.fips, &m.czone))
        })
        .collect()
}
