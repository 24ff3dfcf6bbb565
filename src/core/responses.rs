use crate::domain::model::GeocodeResults;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use serde::Serialize;

pub const RESPONSES_JSON: &str = "geocoded_responses.json";
pub const RESPONSES_TEXT: &str = "geocoded_responses.txt";
pub const ERROR_LOG: &str = "errors.log";

/// One line of the append-only error log.
#[derive(Debug, Serialize)]
pub struct ErrorEntry {
    pub timestamp: String,
    pub context: String,
    pub message: String,
    pub chain: Vec<String>,
}

impl ErrorEntry {
    pub fn new(context: &str, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            context: context.to_string(),
            message: error.to_string(),
            chain,
        }
    }
}

pub async fn append_error_log<S: Storage>(
    storage: &S,
    context: &str,
    error: &(dyn std::error::Error + Send + Sync + 'static),
) -> Result<()> {
    let mut line = serde_json::to_vec(&ErrorEntry::new(context, error))?;
    line.push(b'\n');
    storage.append_file(ERROR_LOG, &line).await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedResponses {
    Json(&'static str),
    Text(&'static str),
}

async fn write_json<S: Storage>(storage: &S, results: &GeocodeResults) -> Result<()> {
    let json = serde_json::to_vec_pretty(results)?;
    storage.write_file(RESPONSES_JSON, &json).await
}

/// Saves raw responses keyed by DUNS.
///
/// If the JSON cannot be produced or written, the failure goes to the error log
/// and a plain-text dump is written instead.
pub async fn save_responses<S: Storage>(storage: &S, results: &GeocodeResults) -> Result<SavedResponses> {
    match write_json(storage, results).await {
        Ok(()) => {
            tracing::info!("💾 Saved {} geocoder responses to {}", results.len(), RESPONSES_JSON);
            Ok(SavedResponses::Json(RESPONSES_JSON))
        }
        Err(e) => {
            tracing::error!(
                "❌ Could not write {}: {}; falling back to {}",
                RESPONSES_JSON,
                e,
                RESPONSES_TEXT
            );
            append_error_log(storage, "saving geocoded responses as JSON", &e).await?;

            let dump = format!("{:#?}", results);
            storage.write_file(RESPONSES_TEXT, dump.as_bytes()).await?;
            Ok(SavedResponses::Text(RESPONSES_TEXT))
        }
    }
}
