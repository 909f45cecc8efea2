use crate::domain::model::{BoundQuery, Dataset, ExtractionResult};
use crate::utils::error::{ClientError, Result};
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_url(&self) -> &str;
    fn batch_cap(&self) -> usize;
    fn request_timeout(&self) -> Duration;
    fn retry_attempts(&self) -> u32;
    fn retry_base_delay(&self) -> Duration;
    fn strict_placeholders(&self) -> bool;
}

/// The remote extraction service, seen as one grouped request/response call.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Returns exactly one result per entry of `selected`, in the same order.
    async fn submit(
        &self,
        selected: &[BoundQuery],
        context: &Dataset,
        template: &str,
        column: &str,
    ) -> std::result::Result<Vec<ExtractionResult>, ClientError>;
}
