use crate::core::crosswalk::{DEFAULT_CZONE_COLUMN, DEFAULT_FIPS_COLUMN};
use crate::core::geocode::{Backoff, RetryPolicy, DEFAULT_BENCHMARK, DEFAULT_ENDPOINT, DEFAULT_VINTAGE};
use crate::core::parser::default_workers;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    pub crosswalk: CrosswalkConfig,
    pub zip_reference: Option<ZipReferenceConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

/// How businesses are placed in counties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Street addresses through the geocoding service.
    #[default]
    Geocode,
    /// ZIP codes through a ZIP-to-county reference table.
    Zip,
}

impl std::str::FromStr for Mode {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "geocode" => Ok(Mode::Geocode),
            "zip" => Ok(Mode::Zip),
            other => Err(EtlError::InvalidConfigValueError {
                field: "pipeline.mode".to_string(),
                value: other.to_string(),
                reason: "expected 'geocode' or 'zip'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Fixed-width extract.
    pub text_path: Option<String>,
    /// Previously parsed table; when set the extract is not parsed again.
    pub parsed_csv: Option<String>,
    pub parse_workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
    #[serde(default = "default_vintage")]
    pub vintage: String,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub backoff: Option<Backoff>,
    pub workers: Option<usize>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_benchmark() -> String {
    DEFAULT_BENCHMARK.to_string()
}

fn default_vintage() -> String {
    DEFAULT_VINTAGE.to_string()
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            benchmark: default_benchmark(),
            vintage: default_vintage(),
            timeout_seconds: None,
            retry_attempts: None,
            retry_delay_ms: None,
            backoff: None,
            workers: None,
        }
    }
}

impl GeocoderConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.retry_attempts.unwrap_or(defaults.max_attempts),
            delay: self
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.delay),
            backoff: self.backoff.unwrap_or(defaults.backoff),
            timeout: self
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosswalkConfig {
    pub path: String,
    pub fips_column: Option<String>,
    pub czone_column: Option<String>,
}

impl CrosswalkConfig {
    pub fn fips_column(&self) -> &str {
        self.fips_column.as_deref().unwrap_or(DEFAULT_FIPS_COLUMN)
    }

    pub fn czone_column(&self) -> &str {
        self.czone_column.as_deref().unwrap_or(DEFAULT_CZONE_COLUMN)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZipReferenceConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    /// Also bundle every CSV output into this zip file.
    pub archive: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DNB_DATA_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;

        match (&self.source.text_path, &self.source.parsed_csv) {
            (None, None) => {
                return Err(EtlError::MissingConfigError {
                    field: "source.text_path".to_string(),
                })
            }
            (_, Some(csv)) => {
                validation::validate_path("source.parsed_csv", csv)?;
                validation::validate_file_extensions("source.parsed_csv", &[csv.clone()], &["csv"])?;
            }
            (Some(text), None) => validation::validate_path("source.text_path", text)?,
        }
        if let Some(workers) = self.source.parse_workers {
            validation::validate_positive_number("source.parse_workers", workers, 1)?;
        }

        validation::validate_path("crosswalk.path", &self.crosswalk.path)?;
        validation::validate_file_extensions("crosswalk.path", &[self.crosswalk.path.clone()], &["csv"])?;
        validation::validate_non_empty_string("crosswalk.fips_column", self.crosswalk.fips_column())?;
        validation::validate_non_empty_string("crosswalk.czone_column", self.crosswalk.czone_column())?;

        validation::validate_path("load.output_path", &self.load.output_path)?;
        if let Some(archive) = &self.load.archive {
            validation::validate_file_extensions("load.archive", &[archive.clone()], &["zip"])?;
        }

        match self.pipeline.mode {
            Mode::Geocode => {
                validation::validate_url("geocoder.endpoint", &self.geocoder.endpoint)?;
                validation::validate_non_empty_string("geocoder.benchmark", &self.geocoder.benchmark)?;
                validation::validate_non_empty_string("geocoder.vintage", &self.geocoder.vintage)?;
                if let Some(workers) = self.geocoder.workers {
                    validation::validate_positive_number("geocoder.workers", workers, 1)?;
                }
                if let Some(attempts) = self.geocoder.retry_attempts {
                    validation::validate_range("geocoder.retry_attempts", attempts, 1, 100)?;
                }
                if let Some(timeout) = self.geocoder.timeout_seconds {
                    validation::validate_range("geocoder.timeout_seconds", timeout, 1, 600)?;
                }
            }
            Mode::Zip => {
                let zip = validation::validate_required_field("zip_reference", &self.zip_reference)?;
                validation::validate_path("zip_reference.path", &zip.path)?;
            }
        }

        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.pipeline.mode
    }

    pub fn output_path(&self) -> &str {
        &self.load.output_path
    }

    pub fn parse_workers(&self) -> usize {
        self.source.parse_workers.unwrap_or_else(default_workers)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
