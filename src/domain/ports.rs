use crate::domain::model::{Deal, Extracted, Page, PageRequest, Pipeline, PipelineSelector, Report};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

pub trait Storage: Send + Sync {
    /// Stores a finished report and returns where it ended up. Implementations
    /// must never leave a partially written file under the returned name.
    fn write_file(
        &self,
        file_name: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<PathBuf>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn access_token(&self) -> &str;
    fn output_dir(&self) -> &str;
    fn page_size(&self) -> u32;
    fn request_timeout(&self) -> Duration;
    fn pipeline_selector(&self) -> PipelineSelector;
    fn max_attempts(&self) -> u32;
}

/// Read access to the CRM's pipeline and deal listings.
#[async_trait]
pub trait CrmSource: Send + Sync {
    async fn pipelines(&self) -> Result<Vec<Pipeline>>;
    async fn deal_page(&self, request: &PageRequest) -> Result<Page<Deal>>;
}

#[async_trait]
pub trait ExportJob: Send + Sync {
    async fn extract(&self) -> Result<Extracted>;
    async fn transform(&self, data: Extracted) -> Result<Report>;
    async fn load(&self, report: Report) -> Result<PathBuf>;
}
