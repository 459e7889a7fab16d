use crate::utils::error::{PortalError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 設定值不合法時的錯誤
fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> PortalError {
    PortalError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }
    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

/// 上傳檔名的副檔名白名單檢查 (不分大小寫)
pub fn validate_file_extension(
    field_name: &str,
    file_name: &str,
    allowed_extensions: &[&str],
) -> Result<()> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| invalid(field_name, file_name, "File has no extension"))?;

    let lowered = extension.to_ascii_lowercase();
    if allowed_extensions.iter().any(|allowed| *allowed == lowered) {
        return Ok(());
    }
    Err(invalid(
        field_name,
        file_name,
        format!(
            "Unsupported file extension: {}. Allowed extensions: {}",
            extension,
            allowed_extensions.join(", ")
        ),
    ))
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| PortalError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be empty or whitespace-only"));
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
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
            .unwrap_or_else(|e| panic!("email pattern must compile: {}", e))
    })
}

/// 表單層級的驗證錯誤，直接回給使用者
pub fn validate_email(value: &str) -> Result<()> {
    if email_regex().is_match(value.trim()) {
        Ok(())
    } else {
        Err(PortalError::validation(format!(
            "'{}' is not a valid email address",
            value
        )))
    }
}

pub fn require_text(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PortalError::validation(format!("{} is required", label)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("firebase.firestore_url", "https://example.com").is_ok());
        assert!(validate_url("firebase.firestore_url", "http://example.com").is_ok());
        assert!(validate_url("firebase.firestore_url", "").is_err());
        assert!(validate_url("firebase.firestore_url", "invalid-url").is_err());
        assert!(validate_url("firebase.firestore_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("session.retry_attempts", 3, 1).is_ok());
        assert!(validate_positive_number("session.retry_attempts", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        let allowed = ["pdf", "xlsx"];
        assert!(validate_file_extension("file", "manifest.PDF", &allowed).is_ok());
        assert!(validate_file_extension("file", "stats.xlsx", &allowed).is_ok());
        assert!(validate_file_extension("file", "script.exe", &allowed).is_err());
        assert!(validate_file_extension("file", "README", &allowed).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("harbour.master@port-moresby.pg").is_ok());
        assert!(validate_email(" ops@lae.port.pg ").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }
}
