use crate::core::ExportJob;
use crate::utils::error::Result;
use std::path::PathBuf;
use std::time::Instant;

pub struct ExportEngine<J: ExportJob> {
    job: J,
}

impl<J: ExportJob> ExportEngine<J> {
    pub fn new(job: J) -> Self {
        Self { job }
    }

    /// One full export. Nothing is written unless extract and transform succeed.
    pub async fn run(&self) -> Result<PathBuf> {
        let started = Instant::now();
        tracing::info!("Starting deal export");

        // Extract
        tracing::debug!("Fetching pipelines and deals");
        let extracted = self.job.extract().await?;
        tracing::info!(
            "Extracted {} deal(s) from '{}'",
            extracted.deals.len(),
            extracted.pipeline.label
        );

        // Transform
        let report = self.job.transform(extracted).await?;
        tracing::debug!("Normalized {} row(s)", report.rows.len());

        // Load
        let output_path = self.job.load(report).await?;
        tracing::info!(
            "Report saved to {} in {:.2?}",
            output_path.display(),
            started.elapsed()
        );

        Ok(output_path)
    }
}
