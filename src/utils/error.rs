use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("CRM rejected the access token (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("CRM resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Transient CRM failure: {message}")]
    Transient { message: String },

    #[error("CRM request failed{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Request { status: Option<u16>, message: String },

    #[error("Unexpected CRM response: {message}")]
    Decode { message: String },

    #[error("No pipelines returned by the CRM")]
    NoPipelines,

    #[error("No pipeline matches {selector}")]
    PipelineNotFound { selector: String },

    #[error("Failed to write report to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Api,
    Network,
    Data,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ReportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReportError::Authentication { .. } => ErrorCategory::Authentication,
            ReportError::NotFound { .. }
            | ReportError::Request { .. }
            | ReportError::Decode { .. } => ErrorCategory::Api,
            ReportError::Transient { .. } => ErrorCategory::Network,
            ReportError::NoPipelines | ReportError::PipelineNotFound { .. } => ErrorCategory::Data,
            ReportError::Write { .. } | ReportError::ZipError(_) | ReportError::IoError(_) => {
                ErrorCategory::Storage
            }
            ReportError::ConfigError { .. }
            | ReportError::MissingConfigError { .. }
            | ReportError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ReportError::Transient { .. } => ErrorSeverity::Medium,
            ReportError::Authentication { .. } | ReportError::Write { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    /// Only network-level and server-side failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReportError::Transient { .. })
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ReportError::Authentication { .. } => {
                "Check HUBSPOT_API_KEY: the private app token must be valid and carry the crm.objects.deals.read scope".to_string()
            }
            ReportError::NotFound { resource } => {
                format!("Verify the API base URL and that {} exists for this account", resource)
            }
            ReportError::Transient { .. } => {
                "The CRM or the network is temporarily unavailable; try again later".to_string()
            }
            ReportError::Request { .. } | ReportError::Decode { .. } => {
                "Check the API base URL and the CRM API status page".to_string()
            }
            ReportError::NoPipelines => {
                "Create a deal pipeline in the CRM before exporting".to_string()
            }
            ReportError::PipelineNotFound { .. } => {
                "Check --pipeline-id / --pipeline-label against the pipelines listed in the log".to_string()
            }
            ReportError::Write { path, .. } => format!(
                "Make sure {} is writable and the disk has free space",
                path.parent().unwrap_or(path).display()
            ),
            ReportError::ZipError(_) | ReportError::IoError(_) => {
                "Check file permissions and available disk space".to_string()
            }
            ReportError::ConfigError { .. }
            | ReportError::MissingConfigError { .. }
            | ReportError::InvalidConfigValueError { .. } => {
                "Fix the configuration (flags, environment or TOML file) and run again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ReportError::Authentication { .. } => {
                "Authentication with the CRM failed".to_string()
            }
            ReportError::MissingConfigError { field } => {
                format!("Required setting '{}' is not set", field)
            }
            ReportError::NoPipelines => "There are no deal pipelines to export".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            ReportError::Transient {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ReportError::Decode {
                message: err.to_string(),
            }
        } else {
            ReportError::Request {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(ReportError::Transient {
            message: "503".to_string()
        }
        .is_retryable());
        assert!(!ReportError::Authentication {
            status: 401,
            message: "expired".to_string()
        }
        .is_retryable());
        assert!(!ReportError::NoPipelines.is_retryable());
    }

    #[test]
    fn test_exit_codes_follow_severity() {
        let auth = ReportError::Authentication {
            status: 403,
            message: "scope".to_string(),
        };
        assert_eq!(auth.category(), ErrorCategory::Authentication);
        assert_eq!(auth.exit_code(), 3);
        assert_eq!(ReportError::NoPipelines.exit_code(), 1);
        assert_eq!(
            ReportError::Transient {
                message: "timeout".to_string()
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_request_error_message_includes_status() {
        let err = ReportError::Request {
            status: Some(400),
            message: "bad filter".to_string(),
        };
        assert_eq!(err.to_string(), "CRM request failed (HTTP 400): bad filter");

        let err = ReportError::Request {
            status: None,
            message: "redirect loop".to_string(),
        };
        assert_eq!(err.to_string(), "CRM request failed: redirect loop");
    }
}
