use crate::core::client::{ApiSettings, CrmClient};
use crate::core::deals::{normalize, DealFetcher};
use crate::core::pipelines::PipelineFetcher;
use crate::core::retry::RetryPolicy;
use crate::core::xlsx::{report_file_name, XlsxReportWriter};
use crate::core::{ConfigProvider, CrmSource, ExportJob, Extracted, Report, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::Local;
use std::path::PathBuf;

/// Exports one pipeline's deals from a [`CrmSource`] into [`Storage`].
pub struct DealExportJob<S: Storage, C: ConfigProvider, Src: CrmSource = CrmClient> {
    storage: S,
    config: C,
    source: Src,
}

impl<S: Storage, C: ConfigProvider> DealExportJob<S, C, CrmClient> {
    /// Builds the HTTP client from `config`. The token is only handed to the client.
    pub fn new(storage: S, config: C) -> Result<Self> {
        let client = CrmClient::new(ApiSettings {
            base_url: config.api_base_url().to_string(),
            access_token: config.access_token().to_string(),
            timeout: config.request_timeout(),
        })?;
        Ok(Self::with_source(storage, config, client))
    }
}

impl<S: Storage, C: ConfigProvider, Src: CrmSource> DealExportJob<S, C, Src> {
    pub fn with_source(storage: S, config: C, source: Src) -> Self {
        Self {
            storage,
            config,
            source,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_attempts())
    }
}

#[async_trait]
impl<S: Storage, C: ConfigProvider, Src: CrmSource> ExportJob for DealExportJob<S, C, Src> {
    async fn extract(&self) -> Result<Extracted> {
        let retry = self.retry_policy();
        let selector = self.config.pipeline_selector();

        let pipeline = PipelineFetcher::new(&self.source, retry)
            .fetch_selected(&selector)
            .await?;
        tracing::info!("Exporting pipeline '{}' ({})", pipeline.label, pipeline.id);

        let deals = DealFetcher::new(&self.source, self.config.page_size(), retry)
            .fetch_all(&pipeline.id)
            .await?;

        Ok(Extracted { pipeline, deals })
    }

    async fn transform(&self, data: Extracted) -> Result<Report> {
        let rows = data.deals.iter().map(normalize).collect();
        Ok(Report {
            pipeline: data.pipeline,
            rows,
            generated_at: Local::now(),
        })
    }

    async fn load(&self, report: Report) -> Result<PathBuf> {
        let bytes = XlsxReportWriter::render(&report)?;
        let file_name = report_file_name(&report);
        tracing::debug!("Rendered {} bytes for {}", bytes.len(), file_name);

        self.storage.write_file(&file_name, &bytes).await
    }
}
