mod common;

use anyhow::Result;
use common::{business_line, county_response};
use czone_hhi::core::responses::{ERROR_LOG, RESPONSES_JSON};
use czone_hhi::domain::model::{GeocodeResult, GeocodeResults};
use czone_hhi::utils::validation::Validate;
use czone_hhi::{EtlEngine, GeocodePipeline, LocalStorage, TomlConfig, ZipPipeline};
use httpmock::prelude::*;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const GEOCODER_PATH: &str = "/geocoder/geographies/address";

fn write_inputs(dir: &Path, lines: &[String]) -> Result<()> {
    std::fs::write(dir.join("extract.txt"), lines.join("\n"))?;
    std::fs::write(
        dir.join("cw_cty_czone.csv"),
        "cty_fips,czone\n6037,123\n36061,19400\n",
    )?;
    Ok(())
}

fn geocode_config(dir: &Path, endpoint: &str, extra: &str) -> Result<TomlConfig> {
    let normalized = dir.to_string_lossy().replace('\\', "/");
    let content = format!(
        r#"
[pipeline]
name = "integration"
mode = "geocode"

[source]
text_path = "{dir}/extract.txt"
parse_workers = 2

[geocoder]
endpoint = "{endpoint}"
retry_attempts = 2
retry_delay_ms = 0
timeout_seconds = 5
workers = 3

[crosswalk]
path = "{dir}/cw_cty_czone.csv"

[load]
output_path = "{dir}/out"
{extra}
"#,
        dir = normalized,
        endpoint = endpoint,
        extra = extra
    );
    let config = TomlConfig::from_toml_str(&content)?;
    config.validate()?;
    Ok(config)
}

fn read_output(dir: &Path, name: &str) -> Result<String> {
    Ok(std::fs::read_to_string(dir.join("out").join(name))?)
}

#[tokio::test]
async fn test_single_firm_zone_has_full_concentration() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_inputs(
        temp_dir.path(),
        &[
            business_line("123456", "100 MAIN ST", "90012", "12", "25", "1000"),
            business_line("000654321", "", "90012", "12", "40", "9000"),
        ],
    )?;

    let server = MockServer::start();
    let geocoder_mock = server.mock(|when, then| {
        when.method(GET)
            .path(GEOCODER_PATH)
            .query_param("street", "100 MAIN ST")
            .query_param("city", "LOS ANGELES")
            .query_param("state", "CA")
            .query_param("zip", "90012")
            .query_param("format", "json");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(county_response("06", "037"));
    });

    let config = geocode_config(temp_dir.path(), &server.url(GEOCODER_PATH), "")?;
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = GeocodePipeline::new(storage, config)?;

    let engine = EtlEngine::new_with_monitoring(pipeline, false);
    let output_path = engine.run().await?;
    geocoder_mock.assert();
    assert!(output_path.ends_with("/out"));

    let responses: GeocodeResults =
        serde_json::from_str(&read_output(temp_dir.path(), RESPONSES_JSON)?)?;
    assert_eq!(responses.len(), 1);
    assert!(responses["000123456"].has_match());

    assert_eq!(
        read_output(temp_dir.path(), "fips.csv")?,
        "DUNS,FIPS\n000123456,06037\n"
    );
    assert_eq!(
        read_output(temp_dir.path(), "czone.csv")?,
        "DUNS,FIPS,CZONE\n000123456,06037,00123\n"
    );
    assert_eq!(
        read_output(temp_dir.path(), "herfindahl.csv")?,
        "CZONE,DPRIMSI,HHI_EMP,HHI_SALES\n00123,0012,1.0,1.0\n"
    );

    let parsed = read_output(temp_dir.path(), "parsed.csv")?;
    assert_eq!(parsed.lines().count(), 3);
    assert!(parsed.lines().next().unwrap_or_default().starts_with("DUNS,DCOMP,DTRADE,DSTREET"));
    Ok(())
}

#[tokio::test]
async fn test_failed_lookups_are_recorded_not_fatal() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_inputs(
        temp_dir.path(),
        &[
            business_line("000000001", "100 MAIN ST", "90012", "5812", "10", "500"),
            business_line("000000002", "1 BROKEN WAY", "10001", "5812", "10", "500"),
            business_line("000000003", "", "10001", "5812", "10", "500"),
        ],
    )?;

    let server = MockServer::start();
    let ok_mock = server.mock(|when, then| {
        when.method(GET)
            .path(GEOCODER_PATH)
            .query_param("street", "100 MAIN ST");
        then.status(200).json_body(county_response("6", "37"));
    });
    let failing_mock = server.mock(|when, then| {
        when.method(GET)
            .path(GEOCODER_PATH)
            .query_param("street", "1 BROKEN WAY");
        then.status(503).body("Service Unavailable");
    });

    let config = geocode_config(
        temp_dir.path(),
        &server.url(GEOCODER_PATH),
        "archive = \"czone_tables.zip\"",
    )?;
    let storage = LocalStorage::new(config.output_path().to_string());
    let engine = EtlEngine::new(GeocodePipeline::new(storage, config)?);
    engine.run().await?;

    ok_mock.assert_hits(1);
    failing_mock.assert_hits(2);

    let responses: GeocodeResults =
        serde_json::from_str(&read_output(temp_dir.path(), RESPONSES_JSON)?)?;
    assert_eq!(responses.len(), 2);
    match &responses["000000002"] {
        GeocodeResult::Failed { error, attempts } => {
            assert_eq!(*attempts, 2);
            assert!(error.contains("503"));
        }
        other => panic!("expected a failure sentinel, got {:?}", other),
    }
    assert!(!responses.contains_key("000000003"));

    let herfindahl = read_output(temp_dir.path(), "herfindahl.csv")?;
    assert_eq!(herfindahl.lines().count(), 2);
    assert!(herfindahl.contains("00123,5812,1.0,1.0"));
    assert!(!temp_dir.path().join("out").join(ERROR_LOG).exists());

    let archive = std::fs::read(temp_dir.path().join("out").join("czone_tables.zip"))?;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive))?;
    let names: Vec<String> = zip.file_names().map(str::to_string).collect();
    assert!(names.contains(&"fips.csv".to_string()));
    assert!(names.contains(&"complete.csv".to_string()));

    let mut complete = String::new();
    zip.by_name("complete.csv")?.read_to_string(&mut complete)?;
    assert!(complete.starts_with(
        "DUNS,FIPS,CZONE,DPRIMSI,DEMTLHER,DSALESVO,TOTAL_FIRMS,TOTAL_EMP_CZONE,TOTAL_SALES,MS_EMP,MS_SALES\n"
    ));
    Ok(())
}

#[tokio::test]
async fn test_zip_mode_end_to_end() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_inputs(
        temp_dir.path(),
        &[
            business_line("000000001", "", "90012", "5812", "30", "300"),
            business_line("000000002", "", "90012", "5812", "10", "100"),
            business_line("000000003", "", "10001", "7372", "7", "70"),
        ],
    )?;
    std::fs::write(
        temp_dir.path().join("zips.csv"),
        "zipcode,statefips,countyfips\n90012,6,37\n10001,36,61\n10001,34,17\n",
    )?;

    let dir = temp_dir.path().to_string_lossy().replace('\\', "/");
    let config = TomlConfig::from_toml_str(&format!(
        r#"
[pipeline]
name = "integration-zip"
mode = "zip"

[source]
text_path = "{dir}/extract.txt"

[crosswalk]
path = "{dir}/cw_cty_czone.csv"

[zip_reference]
path = "{dir}/zips.csv"

[load]
output_path = "{dir}/out"
"#,
        dir = dir
    ))?;
    config.validate()?;

    let storage = LocalStorage::new(config.output_path().to_string());
    let engine = EtlEngine::new(ZipPipeline::new(storage, config));
    engine.run().await?;

    assert_eq!(
        read_output(temp_dir.path(), "czone.csv")?,
        "DZIP5,FIPS,CZONE\n90012,06037,00123\n10001,36061,19400\n"
    );
    assert!(!temp_dir.path().join("out").join("fips.csv").exists());
    assert!(!temp_dir.path().join("out").join(RESPONSES_JSON).exists());

    // (0.75 + 0.25) / 2 for the shared zone, 1.0 for the sole firm
    assert_eq!(
        read_output(temp_dir.path(), "herfindahl.csv")?,
        "CZONE,DPRIMSI,HHI_EMP,HHI_SALES\n00123,5812,0.5,0.5\n19400,7372,1.0,1.0\n"
    );
    Ok(())
}
