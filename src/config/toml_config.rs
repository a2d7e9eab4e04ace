use crate::config::{ReportSettings, DEFAULT_OUTPUT_DIR};
use crate::core::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::core::deals::DEFAULT_PAGE_SIZE;
use crate::core::retry::DEFAULT_MAX_ATTEMPTS;
use crate::core::PipelineSelector;
use crate::utils::error::{ReportError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional file form of the export settings. Every table may be omitted.
///
/// ```toml
/// [api]
/// access_token = "${HUBSPOT_API_KEY}"
///
/// [pipeline]
/// label = "Sales Pipeline"
///
/// [output]
/// dir = "reports"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub page_size: Option<u32>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// At most one of `id` and `label`; neither means the first pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub id: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| ReportError::ConfigError {
            message: format!("Cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| ReportError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left in
    /// place so validation can name them.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            ReportError::ConfigError {
                message: format!("Invalid placeholder pattern: {}", e),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn pipeline_selector(&self) -> Result<PipelineSelector> {
        match (&self.pipeline.id, &self.pipeline.label) {
            (Some(_), Some(_)) => Err(ReportError::InvalidConfigValueError {
                field: "pipeline".to_string(),
                value: "id + label".to_string(),
                reason: "Set either pipeline.id or pipeline.label, not both".to_string(),
            }),
            (Some(id), None) => Ok(PipelineSelector::ById(id.clone())),
            (None, Some(label)) => Ok(PipelineSelector::ByLabel(label.clone())),
            (None, None) => Ok(PipelineSelector::First),
        }
    }

    /// Missing values fall back to the built-in defaults.
    pub fn into_settings(self) -> Result<ReportSettings> {
        let pipeline = self.pipeline_selector()?;
        Ok(ReportSettings {
            api_base_url: self
                .api
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            access_token: self.api.access_token.unwrap_or_default(),
            output_dir: self
                .output
                .dir
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            page_size: self.api.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            timeout_seconds: self
                .api
                .timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT.as_secs()),
            pipeline,
            max_attempts: self.retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.pipeline_selector()?;
        if let Some(url) = &self.api.base_url {
            crate::utils::validation::validate_url("api.base_url", url)?;
        }
        if let Some(dir) = &self.output.dir {
            crate::utils::validation::validate_path("output.dir", dir)?;
        }
        if let Some(token) = &self.api.access_token {
            crate::utils::validation::validate_secret("api.access_token", token)?;
        }
        Ok(())
    }
}
