use crate::domain::model::{GeocodeRequest, GeocodeResult, Record, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Appends to `path`, creating it if needed. Existing content is never rewritten.
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// One structured-address lookup. Implementations never fail: exhausted retries
/// come back as [`GeocodeResult::Failed`].
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, request: &GeocodeRequest) -> GeocodeResult;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
