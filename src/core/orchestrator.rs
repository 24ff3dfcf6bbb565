use crate::domain::model::{Business, GeocodeRequest, GeocodeResult, GeocodeResults};
use crate::domain::ports::Geocoder;
use crate::utils::error::{EtlError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Splits `items` into at most `workers` contiguous chunks of `ceil(len / workers)`.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let chunk_size = items.len().div_ceil(workers.max(1));

    let mut chunks = Vec::new();
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(chunk_size).collect());
    }
    chunks
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeocodeSummary {
    pub submitted: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub failed: usize,
    pub skipped_no_street: usize,
    pub duplicates: usize,
}

/// Drives a [`Geocoder`] over the whole record set, one worker per chunk.
pub struct GeocodeOrchestrator<G: Geocoder + 'static> {
    geocoder: Arc<G>,
    workers: usize,
}

impl<G: Geocoder + 'static> GeocodeOrchestrator<G> {
    pub fn new(geocoder: Arc<G>, workers: usize) -> Self {
        Self {
            geocoder,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Builds one request per business with a street, first occurrence per DUNS.
    pub fn eligible_requests(businesses: &[Business]) -> (Vec<GeocodeRequest>, GeocodeSummary) {
        let mut summary = GeocodeSummary::default();
        let mut seen = HashSet::new();
        let mut requests = Vec::new();

        for business in businesses {
            let Some(request) = GeocodeRequest::from_business(business) else {
                summary.skipped_no_street += 1;
                continue;
            };
            if !seen.insert(request.duns.clone()) {
                summary.duplicates += 1;
                continue;
            }
            requests.push(request);
        }

        summary.submitted = requests.len();
        (requests, summary)
    }

    pub async fn geocode_all(&self, businesses: &[Business]) -> Result<(GeocodeResults, GeocodeSummary)> {
        let start = Instant::now();
        let (requests, mut summary) = Self::eligible_requests(businesses);

        tracing::info!(
            "🌐 Geocoding {} addresses with {} workers ({} without street, {} duplicate DUNS skipped)",
            summary.submitted,
            self.workers,
            summary.skipped_no_street,
            summary.duplicates
        );

        let results = self.run_chunks(requests).await?;

        for result in results.values() {
            if result.is_failed() {
                summary.failed += 1;
            } else if result.has_match() {
                summary.matched += 1;
            } else {
                summary.unmatched += 1;
            }
        }

        tracing::info!(
            "🌐 Geocoded {} observations in {:?}: {} matched, {} without match, {} failed",
            results.len(),
            start.elapsed(),
            summary.matched,
            summary.unmatched,
            summary.failed
        );
        Ok((results, summary))
    }

    /// Runs every chunk to completion, then merges the per-chunk maps.
    pub async fn run_chunks(&self, requests: Vec<GeocodeRequest>) -> Result<GeocodeResults> {
        let chunks = partition(requests, self.workers);
        let mut tasks = JoinSet::new();

        for (index, chunk) in chunks.into_iter().enumerate() {
            let geocoder = Arc::clone(&self.geocoder);
            tasks.spawn(async move {
                let mut local = HashMap::with_capacity(chunk.len());
                for request in &chunk {
                    let result = geocoder.geocode(request).await;
                    local.insert(request.duns.clone(), result);
                }
                tracing::debug!("🌐 chunk {} finished {} lookups", index, local.len());
                local
            });
        }

        let mut merged = GeocodeResults::new();
        while let Some(joined) = tasks.join_next().await {
            let local: HashMap<String, GeocodeResult> = joined.map_err(|e| {
                EtlError::processing(format!("geocoding worker panicked: {}", e))
            })?;
            for (duns, result) in local {
                if merged.insert(duns.clone(), result).is_some() {
                    tracing::warn!("DUNS {} was geocoded by more than one worker", duns);
                }
            }
        }
        Ok(merged)
    }
}
