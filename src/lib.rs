pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, ReportSettings};
#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use crate::core::{demo::DemoCrm, engine::ExportEngine, job::DealExportJob};
pub use utils::error::{ReportError, Result};

use crate::core::ConfigProvider;
use crate::utils::validation::Validate;
use std::path::PathBuf;

/// Exports once using `HUBSPOT_API_KEY` (and optionally `HUBSPOT_API_BASE_URL`)
/// from the environment. Fails before any request when the token is missing.
pub async fn run_once() -> Result<PathBuf> {
    run_with(ReportSettings::from_env()).await
}

pub async fn run_with(settings: ReportSettings) -> Result<PathBuf> {
    settings.validate()?;
    tracing::debug!("Export settings: {:?}", settings);

    let storage = LocalStorage::new(settings.output_dir());
    let job = DealExportJob::new(storage, settings)?;
    ExportEngine::new(job).run().await
}

/// Same report format fed by [`DemoCrm`]; no credentials involved.
pub async fn run_demo(output_dir: &str) -> Result<PathBuf> {
    let settings = ReportSettings {
        output_dir: output_dir.to_string(),
        ..ReportSettings::default()
    };
    let storage = LocalStorage::new(output_dir);
    let job = DealExportJob::with_source(storage, settings, DemoCrm::default());
    ExportEngine::new(job).run().await
}
