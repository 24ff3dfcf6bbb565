use super::{concentration, extract_records, load_crosswalk, load_tables, prepare_businesses};
use crate::config::toml_config::TomlConfig;
use crate::core::crosswalk::join_by_duns;
use crate::core::extractor::extract_fips;
use crate::core::geocode::GeocodeClient;
use crate::core::orchestrator::GeocodeOrchestrator;
use crate::core::responses::save_responses;
use crate::core::{Geocoder, Pipeline, Record, Storage, TransformResult};
use crate::domain::model::CzoneTable;
use crate::utils::error::Result;
use std::sync::Arc;

/// Places businesses through street-address geocoding.
pub struct GeocodePipeline<S: Storage, G: Geocoder + 'static = GeocodeClient> {
    storage: S,
    config: TomlConfig,
    geocoder: Arc<G>,
}

impl<S: Storage> GeocodePipeline<S, GeocodeClient> {
    /// Builds the HTTP geocoder from the `[geocoder]` section.
    pub fn new(storage: S, config: TomlConfig) -> Result<Self> {
        let settings = &config.geocoder;
        let client = GeocodeClient::new(
            settings.endpoint.clone(),
            settings.benchmark.clone(),
            settings.vintage.clone(),
            settings.retry_policy(),
        )?;
        tracing::debug!(
            "Geocoder {}: worst case {:?} per address",
            settings.endpoint,
            client.policy().worst_case()
        );
        Ok(Self::with_geocoder(storage, config, client))
    }
}

impl<S: Storage, G: Geocoder + 'static> GeocodePipeline<S, G> {
    pub fn with_geocoder(storage: S, config: TomlConfig, geocoder: G) -> Self {
        Self {
            storage,
            config,
            geocoder: Arc::new(geocoder),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, G: Geocoder + 'static> Pipeline for GeocodePipeline<S, G> {
    async fn extract(&self) -> Result<Vec<Record>> {
        extract_records(&self.storage, &self.config).await
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let businesses = prepare_businesses(&data);
        drop(data);

        // Crosswalk problems should surface before hours of geocoding.
        let crosswalk = load_crosswalk(&self.config)?;

        let orchestrator =
            GeocodeOrchestrator::new(Arc::clone(&self.geocoder), self.config.geocoder.workers());
        let (responses, summary) = orchestrator.geocode_all(&businesses).await?;
        save_responses(&self.storage, &responses).await?;

        let fips_mappings = extract_fips(&responses);
        let czone_mappings = crosswalk.map_duns(&fips_mappings);
        let analysis_rows = join_by_duns(&businesses, &czone_mappings);
        tracing::info!(
            "🔄 {} businesses, {} geocoded, {} with FIPS, {} in a commuting zone",
            businesses.len(),
            summary.submitted,
            fips_mappings.len(),
            analysis_rows.len()
        );

        let (complete_rows, index_rows) = concentration(&analysis_rows);

        Ok(TransformResult {
            businesses: businesses.len(),
            geocode_responses: Some(responses),
            fips_mappings,
            czone_table: CzoneTable::ByDuns(czone_mappings),
            analysis_rows,
            complete_rows,
            index_rows,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        load_tables(&self.storage, &self.config, &result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::tests::{dnb_line, MockStorage};
    use crate::app::pipelines::{ANALYSIS_CSV, HERFINDAHL_CSV, PARSED_CSV};
    use crate::core::responses::RESPONSES_JSON;
    use crate::domain::model::{GeocodeRequest, GeocodeResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers from a fixed street -> (state, county) table.
    struct TableGeocoder {
        places: HashMap<String, (String, String)>,
        calls: AtomicUsize,
    }

    impl TableGeocoder {
        fn new(places: &[(&str, &str, &str)]) -> Self {
            Self {
                places: places
                    .iter()
                    .map(|(street, state, county)| {
                        (street.to_string(), (state.to_string(), county.to_string()))
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Geocoder for TableGeocoder {
        async fn geocode(&self, request: &GeocodeRequest) -> GeocodeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let matches = match self.places.get(&request.street) {
                Some((state, county)) => json!([{
                    "matchedAddress": request.street,
                    "geographies": {"Counties": [{"STATE": state, "COUNTY": county}]}
                }]),
                None => json!([]),
            };
            GeocodeResult::Response(json!({"result": {"addressMatches": matches}}))
        }
    }

    fn setup(dir: &TempDir, lines: &[String]) -> TomlConfig {
        let text = dir.path().join("extract.txt");
        std::fs::write(&text, lines.join("\n")).unwrap();
        let crosswalk = dir.path().join("cw.csv");
        std::fs::write(&crosswalk, "cty_fips,czone\n6037,123\n6059,123\n").unwrap();

        let content = format!(
            r#"
[pipeline]
name = "test"

[source]
text_path = "{}"
parse_workers = 2

[geocoder]
workers = 2

[crosswalk]
path = "{}"

[load]
output_path = "{}"
"#,
            text.display(),
            crosswalk.display(),
            dir.path().join("out").display()
        );
        TomlConfig::from_toml_str(&content).unwrap()
    }

    fn line(duns: &str, street: &str, sic: &str, employees: &str, sales: &str) -> String {
        dnb_line(&[
            ("DUNS", duns),
            ("DCOMP", "ACME"),
            ("DSTREET", street),
            ("DCITY", "LOS ANGELES"),
            ("DSTATEAB", "CA"),
            ("DZIP5", "90012"),
            ("DPRIMSI", sic),
            ("DEMTLHER", employees),
            ("DSALESVO", sales),
        ])
    }

    #[tokio::test]
    async fn test_geocode_pipeline_two_firms_one_zone() {
        let dir = TempDir::new().unwrap();
        let config = setup(
            &dir,
            &[
                line("000000001", "1 MAIN ST", "12", "30", "300"),
                line("000000002", "2 HARBOR BLVD", "12", "10", "100"),
                line("000000003", "", "12", "99", "999"),
                line("000000004", "9 NOWHERE RD", "12", "5", "50"),
            ],
        );
        let geocoder = TableGeocoder::new(&[
            ("1 MAIN ST", "06", "037"),
            ("2 HARBOR BLVD", "06", "059"),
        ]);
        let storage = MockStorage::default();
        let pipeline = GeocodePipeline::with_geocoder(storage.clone(), config, geocoder);

        let records = pipeline.extract().await.unwrap();
        assert_eq!(records.len(), 4);
        let parsed = storage.get_text(PARSED_CSV).await.unwrap();
        assert!(parsed.starts_with("DUNS,DCOMP,"));
        assert!(!parsed.contains("FILLER"));

        let result = pipeline.transform(records).await.unwrap();
        assert_eq!(pipeline.geocoder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.businesses, 4);
        assert_eq!(result.geocode_responses.as_ref().unwrap().len(), 3);
        assert_eq!(result.fips_mappings.len(), 2);
        assert_eq!(result.analysis_rows.len(), 2);
        assert!(result.analysis_rows.iter().all(|r| r.czone == "00123"));
        assert!(storage.get_text(RESPONSES_JSON).await.is_some());

        // shares 0.75 / 0.25 weighted by 1/2 each
        assert_eq!(result.index_rows.len(), 1);
        let row = &result.index_rows[0];
        assert_eq!(row.primary_sic, "0012");
        assert!((row.hhi_employment.unwrap() - 0.5).abs() < 1e-12);
        assert!((row.hhi_sales.unwrap() - 0.5).abs() < 1e-12);

        pipeline.load(result).await.unwrap();
        assert!(storage.get_text(ANALYSIS_CSV).await.is_some());
        assert!(storage
            .get_text(HERFINDAHL_CSV)
            .await
            .unwrap()
            .starts_with("CZONE,DPRIMSI,HHI_EMP,HHI_SALES\n00123,0012,"));
    }

    #[tokio::test]
    async fn test_missing_crosswalk_fails_before_geocoding() {
        let dir = TempDir::new().unwrap();
        let mut config = setup(&dir, &[line("000000001", "1 MAIN ST", "12", "1", "1")]);
        config.crosswalk.path = dir.path().join("absent.csv").display().to_string();

        let geocoder = TableGeocoder::new(&[]);
        let pipeline = GeocodePipeline::with_geocoder(MockStorage::default(), config, geocoder);

        let records = pipeline.extract().await.unwrap();
        assert!(pipeline.transform(records).await.is_err());
        assert_eq!(pipeline.geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reads_pre_parsed_table_when_present() {
        let dir = TempDir::new().unwrap();
        let mut config = setup(&dir, &[]);
        let parsed = dir.path().join("parsed.csv");
        std::fs::write(&parsed, "DUNS,DSTREET,DPRIMSI\n123,1 MAIN ST,12\n").unwrap();
        config.source.parsed_csv = Some(parsed.display().to_string());

        let storage = MockStorage::default();
        let pipeline =
            GeocodePipeline::with_geocoder(storage.clone(), config, TableGeocoder::new(&[]));
        let records = pipeline.extract().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("DUNS"), "123");
        assert!(storage.get_text(PARSED_CSV).await.is_none());
    }
}
