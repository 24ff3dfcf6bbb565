pub mod geocode_pipeline;
pub mod zip_pipeline;

pub use geocode_pipeline::GeocodePipeline;
pub use zip_pipeline::ZipPipeline;

use crate::config::toml_config::TomlConfig;
use crate::core::aggregate::market_shares;
use crate::core::crosswalk::CrosswalkMapper;
use crate::core::herfindahl::herfindahl_index;
use crate::core::normalize::FieldNormalizer;
use crate::core::parser::{ColumnSpec, FixedWidthParser};
use crate::core::tables::{read_records_from_path, records_to_csv, to_csv};
use crate::core::{Record, Storage, TransformResult};
use crate::domain::model::{AnalysisRow, Business, CzoneTable, IndexRow, MarketShareRow, REQUIRED_COLUMNS};
use crate::utils::error::Result;
use crate::utils::validation;
use std::io::Write;
use std::path::Path;
use zip::write::{FileOptions, ZipWriter};

pub const PARSED_CSV: &str = "parsed.csv";
pub const FIPS_CSV: &str = "fips.csv";
pub const CZONE_CSV: &str = "czone.csv";
pub const ANALYSIS_CSV: &str = "analysis.csv";
pub const COMPLETE_CSV: &str = "complete.csv";
pub const HERFINDAHL_CSV: &str = "herfindahl.csv";

/// Loads the extract.
///
/// A configured pre-parsed table is read when it exists; otherwise the
/// fixed-width file is parsed and the result persisted as `parsed.csv`.
pub(crate) async fn extract_records<S: Storage>(storage: &S, config: &TomlConfig) -> Result<Vec<Record>> {
    if let Some(parsed) = &config.source.parsed_csv {
        if Path::new(parsed).exists() {
            tracing::info!("📄 Reading previously parsed table {}", parsed);
            return read_records_from_path(parsed);
        }
        tracing::warn!("Parsed table {} not found; parsing the fixed-width extract", parsed);
    }

    let text_path = validation::validate_required_field("source.text_path", &config.source.text_path)?;
    let parser = FixedWidthParser::new(ColumnSpec::dnb()).with_workers(config.parse_workers());
    let records = parser.parse_file(text_path)?;

    let fields = parser.spec().output_fields();
    storage.write_file(PARSED_CSV, &records_to_csv(&records, &fields)?).await?;
    tracing::info!("💾 Wrote {} parsed records ({} columns) to {}", records.len(), fields.len(), PARSED_CSV);
    Ok(records)
}

/// Keeps the working columns and zero-pads the identifier, ZIP and industry codes.
pub(crate) fn prepare_businesses(records: &[Record]) -> Vec<Business> {
    let normalizer = FieldNormalizer::dnb();
    records
        .iter()
        .map(|record| {
            let mut kept = record.keep_columns(&REQUIRED_COLUMNS);
            normalizer.normalize(&mut kept);
            Business::from_record(&kept)
        })
        .collect()
}

pub(crate) fn load_crosswalk(config: &TomlConfig) -> Result<CrosswalkMapper> {
    let records = read_records_from_path(&config.crosswalk.path)?;
    let mapper = CrosswalkMapper::from_records(
        &records,
        config.crosswalk.fips_column(),
        config.crosswalk.czone_column(),
    );
    tracing::info!(
        "🗺️ Crosswalk {}: {} counties mapped to commuting zones",
        config.crosswalk.path,
        mapper.entries().len()
    );
    if mapper.entries().is_empty() {
        tracing::warn!(
            "Crosswalk has no usable '{}'/'{}' rows; every business will be dropped",
            config.crosswalk.fips_column(),
            config.crosswalk.czone_column()
        );
    }
    Ok(mapper)
}

/// Market shares followed by the concentration index.
pub(crate) fn concentration(analysis_rows: &[AnalysisRow]) -> (Vec<MarketShareRow>, Vec<IndexRow>) {
    let (complete_rows, summary) = market_shares(analysis_rows);
    if summary.ungrouped_rows > 0 {
        tracing::warn!(
            "{} analysis rows lack a commuting zone or industry code and were left out",
            summary.ungrouped_rows
        );
    }
    let index_rows = herfindahl_index(&complete_rows);
    (complete_rows, index_rows)
}

/// Writes every table of `result`, plus the archive when one is configured.
/// Returns the output directory.
pub(crate) async fn load_tables<S: Storage>(
    storage: &S,
    config: &TomlConfig,
    result: &TransformResult,
) -> Result<String> {
    let mut tables: Vec<(&'static str, Vec<u8>)> = Vec::new();

    if result.geocode_responses.is_some() {
        tables.push((FIPS_CSV, to_csv(&result.fips_mappings)?));
    }
    let czone_csv = match &result.czone_table {
        CzoneTable::ByDuns(rows) => to_csv(rows)?,
        CzoneTable::ByZip(rows) => to_csv(rows)?,
    };
    tables.push((CZONE_CSV, czone_csv));
    tables.push((ANALYSIS_CSV, to_csv(&result.analysis_rows)?));
    tables.push((COMPLETE_CSV, to_csv(&result.complete_rows)?));
    tables.push((HERFINDAHL_CSV, to_csv(&result.index_rows)?));

    for (name, data) in &tables {
        storage.write_file(name, data).await?;
        tracing::debug!("💾 {} ({} bytes)", name, data.len());
    }
    tracing::info!(
        "💾 Saved {} tables: {} mappings, {} analysis rows, {} index rows",
        tables.len(),
        result.czone_table.len(),
        result.analysis_rows.len(),
        result.index_rows.len()
    );

    if let Some(archive) = &config.load.archive {
        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &tables {
                zip.start_file::<_, ()>(*name, FileOptions::default())?;
                zip.write_all(data)?;
            }
            let cursor = zip.finish()?;
            cursor.into_inner()
        };
        storage.write_file(archive, &zip_data).await?;
        tracing::info!("📦 Archived {} tables in {}", tables.len(), archive);
    }

    Ok(config.output_path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CzoneMapping, FipsMapping};
    use crate::utils::error::EtlError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    pub(crate) struct MockStorage {
        pub(crate) files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        pub(crate) async fn get_text(&self, path: &str) -> Option<String> {
            self.files
                .lock()
                .await
                .get(path)
                .map(|d| String::from_utf8_lossy(d).to_string())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files.lock().await.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .await
                .entry(path.to_string())
                .or_default()
                .extend_from_slice(data);
            Ok(())
        }
    }

    /// One extract line with `fields` placed at their layout offsets.
    pub(crate) fn dnb_line(fields: &[(&str, &str)]) -> String {
        let spec = ColumnSpec::dnb();
        let mut line = vec![b' '; spec.record_width()];
        for (name, value) in fields {
            let column = spec
                .columns()
                .iter()
                .find(|c| c.name == *name)
                .unwrap();
            let width = column.end - column.start + 1;
            let bytes = &value.as_bytes()[..value.len().min(width)];
            line[column.start - 1..column.start - 1 + bytes.len()].copy_from_slice(bytes);
        }
        String::from_utf8(line).unwrap()
    }

    fn config(archive: Option<&str>) -> TomlConfig {
        let mut config = TomlConfig::from_toml_str(
            r#"
[pipeline]
name = "test"

[source]
text_path = "extract.txt"

[crosswalk]
path = "cw.csv"

[load]
output_path = "./out"
"#,
        )
        .unwrap();
        config.load.archive = archive.map(str::to_string);
        config
    }

    fn business(duns: &str, sic: &str, employees: &str) -> Business {
        Business {
            duns: duns.to_string(),
            street: "1 MAIN ST".to_string(),
            city: "LOS ANGELES".to_string(),
            state: "CA".to_string(),
            zip5: "90012".to_string(),
            primary_sic: sic.to_string(),
            employees_here: employees.to_string(),
            sales_volume: "100".to_string(),
        }
    }

    #[test]
    fn test_prepare_businesses_pads_codes() {
        let record: Record = [
            ("DUNS", "123456"),
            ("DZIP5", "2101"),
            ("DPRIMSI", "12"),
            ("DSTREET", "1 MAIN ST"),
            ("DCOMP", "ACME"),
        ]
        .into_iter()
        .collect();

        let businesses = prepare_businesses(&[record]);
        assert_eq!(businesses[0].duns, "000123456");
        assert_eq!(businesses[0].zip5, "02101");
        assert_eq!(businesses[0].primary_sic, "0012");
        assert_eq!(businesses[0].street, "1 MAIN ST");
    }

    #[test]
    fn test_concentration_single_firm() {
        let rows = vec![AnalysisRow::join(&business("000000001", "0012", "5"), "06037", "00123")];
        let (complete, index) = concentration(&rows);
        assert_eq!(complete.len(), 1);
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].hhi_employment, Some(1.0));
        assert_eq!(index[0].hhi_sales, Some(1.0));
    }

    #[tokio::test]
    async fn test_load_tables_writes_csvs_and_archive() {
        let storage = MockStorage::default();
        let b = business("000000001", "0012", "5");
        let analysis_rows = vec![AnalysisRow::join(&b, "06037", "00123")];
        let (complete_rows, index_rows) = concentration(&analysis_rows);
        let result = TransformResult {
            businesses: 1,
            geocode_responses: Some(Default::default()),
            fips_mappings: vec![FipsMapping {
                duns: "000000001".to_string(),
                fips: "06037".to_string(),
            }],
            czone_table: CzoneTable::ByDuns(vec![CzoneMapping {
                duns: "000000001".to_string(),
                fips: "06037".to_string(),
                czone: "00123".to_string(),
            }]),
            analysis_rows,
            complete_rows,
            index_rows,
        };

        let output = load_tables(&storage, &config(Some("tables.zip")), &result)
            .await
            .unwrap();
        assert_eq!(output, "./out");

        assert_eq!(
            storage.get_text(FIPS_CSV).await.unwrap(),
            "DUNS,FIPS\n000000001,06037\n"
        );
        assert!(storage
            .get_text(CZONE_CSV)
            .await
            .unwrap()
            .starts_with("DUNS,FIPS,CZONE\n"));
        assert!(storage
            .get_text(HERFINDAHL_CSV)
            .await
            .unwrap()
            .contains("00123,0012,1.0,1.0"));

        let archive = storage.files.lock().await.get("tables.zip").cloned().unwrap();
        let zip = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
        assert_eq!(zip.len(), 5);
    }

    #[tokio::test]
    async fn test_load_tables_without_geocoding_skips_fips_table() {
        let storage = MockStorage::default();
        let result = TransformResult {
            businesses: 0,
            geocode_responses: None,
            fips_mappings: Vec::new(),
            czone_table: CzoneTable::ByZip(Vec::new()),
            analysis_rows: Vec::new(),
            complete_rows: Vec::new(),
            index_rows: Vec::new(),
        };

        load_tables(&storage, &config(None), &result).await.unwrap();
        assert!(storage.get_text(FIPS_CSV).await.is_none());
        assert!(storage.get_text(HERFINDAHL_CSV).await.is_some());
        assert!(storage.files.lock().await.get("tables.zip").is_none());
    }
}
