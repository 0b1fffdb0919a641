use crate::utils::error::{Result, UpdateError};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(UpdateError::validation(format!("{} cannot be empty", field_name)));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(UpdateError::validation(format!(
                "{}: unsupported URL scheme: {}",
                field_name, scheme
            ))),
        },
        Err(e) => Err(UpdateError::validation(format!(
            "{}: invalid URL format: {}",
            field_name, e
        ))),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(UpdateError::validation(format!(
            "{} cannot be empty or whitespace-only",
            field_name
        )));
    }
    Ok(())
}

/// 目標目錄必須存在、是目錄且可寫入。在任何變更前檢查。
pub fn validate_target_directory(directory: &Path) -> Result<()> {
    if !directory.is_dir() {
        return Err(UpdateError::validation(format!(
            "target directory does not exist: {}",
            directory.display()
        )));
    }

    // 以實際建立暫存檔判斷是否可寫入，權限位元無法反映 ACL 或唯讀掛載
    if let Err(e) = tempfile::tempfile_in(directory) {
        tracing::debug!("Write probe in {} failed: {}", directory.display(), e);
        return Err(UpdateError::validation(format!(
            "target directory is not writable: {}",
            directory.display()
        )));
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
        return Err(UpdateError::validation(format!(
            "{} must be between {} and {} (got {})",
            field_name, min, max, value
        )));
    }
    Ok(())
}
