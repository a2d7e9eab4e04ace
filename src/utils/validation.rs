use crate::utils::error::{ReportError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ReportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ReportError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ReportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ReportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ReportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// Secrets are never echoed back in the error, only described.
pub fn validate_secret(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ReportError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    if value.contains("${") {
        return Err(ReportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: "<redacted>".to_string(),
            reason: "Contains an unresolved ${VAR} placeholder; is the variable exported?"
                .to_string(),
        });
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ReportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: "<redacted>".to_string(),
            reason: "Tokens cannot contain whitespace".to_string(),
        });
    }

    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ReportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("api_base_url", "https://api.hubapi.com").is_ok());
        assert!(validate_url("api_base_url", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("api_base_url", "").is_err());
        assert!(validate_url("api_base_url", "invalid-url").is_err());
        assert!(validate_url("api_base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_secret() {
        assert!(validate_secret("access_token", "pat-na1-0000").is_ok());
        assert!(matches!(
            validate_secret("access_token", "  "),
            Err(ReportError::MissingConfigError { .. })
        ));
        assert!(validate_secret("access_token", "${HUBSPOT_API_KEY}").is_err());
        assert!(validate_secret("access_token", "pat na1").is_err());
    }

    #[test]
    fn test_secret_is_not_leaked_in_error() {
        let err = validate_secret("access_token", "pat na1 secret").unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("page_size", 100u32, 1, 100).is_ok());
        assert!(validate_range("page_size", 0u32, 1, 100).is_err());
        assert!(validate_range("page_size", 101u32, 1, 100).is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("output_dir", "reports").is_ok());
        assert!(validate_path("output_dir", "").is_err());
        assert!(validate_path("output_dir", "rep\0orts").is_err());
    }
}
