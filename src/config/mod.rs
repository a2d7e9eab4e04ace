pub mod cli;
pub mod toml_config;

use crate::core::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::core::deals::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::core::retry::DEFAULT_MAX_ATTEMPTS;
use crate::core::{ConfigProvider, PipelineSelector};
use crate::utils::error::{ReportError, Result};
use crate::utils::validation::{validate_path, validate_range, validate_secret, validate_url, Validate};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const TOKEN_ENV: &str = "HUBSPOT_API_KEY";
pub const BASE_URL_ENV: &str = "HUBSPOT_API_BASE_URL";
pub const DEFAULT_OUTPUT_DIR: &str = "reports";
pub const DOTENV_FILE: &str = ".env";
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;
pub const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// Fully resolved settings for one export run.
#[derive(Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub api_base_url: String,
    pub access_token: String,
    pub output_dir: String,
    pub page_size: u32,
    pub timeout_seconds: u64,
    pub pipeline: PipelineSelector,
    pub max_attempts: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            access_token: String::new(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
            pipeline: PipelineSelector::First,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl fmt::Debug for ReportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSettings")
            .field("api_base_url", &self.api_base_url)
            .field("access_token", &"<redacted>")
            .field("output_dir", &self.output_dir)
            .field("page_size", &self.page_size)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("pipeline", &self.pipeline)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl ReportSettings {
    /// Defaults overlaid with `HUBSPOT_API_KEY` and `HUBSPOT_API_BASE_URL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(token) = lookup(TOKEN_ENV) {
            settings.access_token = token;
        }
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            settings.api_base_url = url;
        }
        settings
    }
}

/// Copies `KEY=value` lines from `path` into the process environment.
/// Variables that are already set keep their value. Returns `false` when the
/// file does not exist.
pub fn load_dotenv(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(ReportError::ConfigError {
            message: format!("Cannot load {}: {}", path.display(), e),
        }),
    }
}

impl ConfigProvider for ReportSettings {
    fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn access_token(&self) -> &str {
        &self.access_token
    }

    fn output_dir(&self) -> &str {
        &self.output_dir
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn pipeline_selector(&self) -> PipelineSelector {
        self.pipeline.clone()
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Validate for ReportSettings {
    fn validate(&self) -> Result<()> {
        validate_secret(TOKEN_ENV, &self.access_token)?;
        validate_url("api_base_url", &self.api_base_url)?;
        validate_path("output_dir", &self.output_dir)?;
        validate_range("page_size", self.page_size, 1, MAX_PAGE_SIZE)?;
        validate_range("timeout_seconds", self.timeout_seconds, 1, MAX_TIMEOUT_SECONDS)?;
        validate_range("max_attempts", self.max_attempts, 1, MAX_ATTEMPTS_LIMIT)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
pub use self::command_line::{CliConfig, Command};

#[cfg(feature = "cli")]
mod command_line {
    use super::toml_config::TomlConfig;
    use super::{ReportSettings, BASE_URL_ENV, TOKEN_ENV};
    use crate::core::schedule::WeeklySchedule;
    use crate::core::PipelineSelector;
    use crate::utils::error::Result;
    use chrono::{NaiveTime, Weekday};
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "deal-report", version)]
    #[command(about = "Exports a CRM deal pipeline to a formatted XLSX report")]
    pub struct CliConfig {
        #[command(subcommand)]
        pub command: Option<Command>,

        /// Private app access token
        #[arg(long, env = TOKEN_ENV, hide_env_values = true, global = true)]
        pub token: Option<String>,

        #[arg(long, env = BASE_URL_ENV, global = true)]
        pub api_base_url: Option<String>,

        /// Directory reports are written to [default: reports]
        #[arg(long, global = true)]
        pub output_dir: Option<String>,

        #[arg(long, global = true, conflicts_with = "pipeline_label")]
        pub pipeline_id: Option<String>,

        /// Case-insensitive pipeline label
        #[arg(long, global = true)]
        pub pipeline_label: Option<String>,

        /// Deals per page, 1-100 [default: 100]
        #[arg(long, global = true)]
        pub page_size: Option<u32>,

        /// Per-request timeout [default: 30]
        #[arg(long, global = true)]
        pub timeout_seconds: Option<u64>,

        /// Attempts per request for transient failures [default: 3]
        #[arg(long, global = true)]
        pub max_attempts: Option<u32>,

        /// Optional TOML file; flags and environment take precedence
        #[arg(long, global = true)]
        pub config: Option<PathBuf>,

        #[arg(short, long, global = true, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, global = true, help = "Log as JSON lines")]
        pub json_logs: bool,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Export once and print the report path
        Run,
        /// Export on a weekly slot until interrupted
        Schedule {
            #[arg(long, default_value = "mon", value_parser = parse_weekday)]
            weekday: Weekday,
            /// Local time, HH:MM
            #[arg(long, default_value = "09:00", value_parser = parse_time)]
            at: NaiveTime,
            /// Also export immediately on startup
            #[arg(long)]
            run_now: bool,
        },
        /// Write a report from built-in sample deals, no API access needed
        Demo,
    }

    impl Command {
        pub fn schedule(&self) -> Option<(WeeklySchedule, bool)> {
            match self {
                Command::Schedule {
                    weekday,
                    at,
                    run_now,
                } => Some((WeeklySchedule::new(*weekday, *at), *run_now)),
                _ => None,
            }
        }
    }

    fn parse_weekday(s: &str) -> std::result::Result<Weekday, String> {
        s.trim()
            .parse::<Weekday>()
            .map_err(|_| format!("'{}' is not a weekday (mon, tue, ...)", s))
    }

    fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
            .map_err(|_| format!("'{}' is not a time of day (HH:MM)", s))
    }

    impl CliConfig {
        pub fn command(&self) -> Command {
            self.command.clone().unwrap_or(Command::Run)
        }

        /// Defaults, then the TOML file, then environment and flags.
        pub fn resolve(&self) -> Result<ReportSettings> {
            let mut settings = match &self.config {
                Some(path) => {
                    tracing::debug!("Loading configuration from {}", path.display());
                    TomlConfig::from_file(path)?.into_settings()?
                }
                None => ReportSettings::default(),
            };
            self.overlay(&mut settings);
            Ok(settings)
        }

        fn overlay(&self, settings: &mut ReportSettings) {
            if let Some(token) = &self.token {
                settings.access_token = token.clone();
            }
            if let Some(url) = self.api_base_url.as_ref().filter(|u| !u.trim().is_empty()) {
                settings.api_base_url = url.clone();
            }
            if let Some(dir) = &self.output_dir {
                settings.output_dir = dir.clone();
            }
            if let Some(id) = &self.pipeline_id {
                settings.pipeline = PipelineSelector::ById(id.clone());
            } else if let Some(label) = &self.pipeline_label {
                settings.pipeline = PipelineSelector::ByLabel(label.clone());
            }
            if let Some(page_size) = self.page_size {
                settings.page_size = page_size;
            }
            if let Some(timeout) = self.timeout_seconds {
                settings.timeout_seconds = timeout;
            }
            if let Some(attempts) = self.max_attempts {
                settings.max_attempts = attempts;
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ReportSettings {
        ReportSettings {
            access_token: "pat-na1-1234".to_string(),
            ..ReportSettings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = ReportSettings::default();
        assert_eq!(settings.api_base_url, "https://api.hubapi.com");
        assert_eq!(settings.output_dir, "reports");
        assert_eq!(settings.page_size, 100);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.pipeline_selector(), PipelineSelector::First);
    }

    #[test]
    fn test_from_lookup_reads_token_and_base_url() {
        let settings = ReportSettings::from_lookup(|name| match name {
            TOKEN_ENV => Some("pat-env".to_string()),
            BASE_URL_ENV => Some("http://localhost:1234".to_string()),
            _ => None,
        });
        assert_eq!(settings.access_token, "pat-env");
        assert_eq!(settings.api_base_url, "http://localhost:1234");
    }

    #[test]
    fn test_missing_token_is_reported_by_name() {
        let err = ReportSettings::from_lookup(|_| None).validate().unwrap_err();
        match err {
            ReportError::MissingConfigError { field } => assert_eq!(field, TOKEN_ENV),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(valid().validate().is_ok());

        let bad = [
            ReportSettings {
                api_base_url: "api.hubapi.com".to_string(),
                ..valid()
            },
            ReportSettings {
                page_size: 0,
                ..valid()
            },
            ReportSettings {
                page_size: 101,
                ..valid()
            },
            ReportSettings {
                timeout_seconds: 0,
                ..valid()
            },
            ReportSettings {
                max_attempts: 11,
                ..valid()
            },
            ReportSettings {
                output_dir: String::new(),
                ..valid()
            },
        ];
        for settings in bad {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }

    #[test]
    fn test_dotenv_fills_unset_variables_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DOTENV_FILE);
        std::fs::write(
            &path,
            "DEAL_REPORT_DOTENV_ONLY=pat-from-file\nDEAL_REPORT_DOTENV_EXPORTED=pat-from-file\n",
        )
        .unwrap();
        std::env::remove_var("DEAL_REPORT_DOTENV_ONLY");
        std::env::set_var("DEAL_REPORT_DOTENV_EXPORTED", "pat-exported");

        assert!(load_dotenv(&path).unwrap());

        let settings = ReportSettings::from_lookup(|name| match name {
            TOKEN_ENV => std::env::var("DEAL_REPORT_DOTENV_ONLY").ok(),
            _ => None,
        });
        assert_eq!(settings.access_token, "pat-from-file");
        assert_eq!(
            std::env::var("DEAL_REPORT_DOTENV_EXPORTED").unwrap(),
            "pat-exported"
        );

        std::env::remove_var("DEAL_REPORT_DOTENV_ONLY");
        std::env::remove_var("DEAL_REPORT_DOTENV_EXPORTED");
    }

    #[test]
    fn test_missing_dotenv_is_not_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!load_dotenv(&dir.path().join(DOTENV_FILE)).unwrap());
    }

    #[test]
    fn test_malformed_dotenv_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DOTENV_FILE);
        std::fs::write(&path, "NOT A VALID LINE\n").unwrap();

        assert!(matches!(
            load_dotenv(&path),
            Err(ReportError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_debug_output_hides_token() {
        let debug = format!("{:?}", valid());
        assert!(!debug.contains("pat-na1-1234"));
        assert!(debug.contains("<redacted>"));
    }
}
