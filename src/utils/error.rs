use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Archive retrieval failed: {message}")]
    RetrievalError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Archive error: {message}")]
    ArchiveError { message: String },

    #[error("{context}: {source}")]
    IoError {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Backup failed: {message}")]
    BackupError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Retrieval,
    Archive,
    Filesystem,
    Validation,
    Backup,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl UpdateError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            context: context.into(),
            source,
        }
    }

    /// 帶路徑的 IO 錯誤，例如 "could not copy file: /srv/app/index.php"
    pub fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{}: {}", action, path.display()), source)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::ArchiveError {
            message: message.into(),
        }
    }

    pub fn backup(message: impl Into<String>) -> Self {
        Self::BackupError {
            message: message.into(),
        }
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::RetrievalError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RetrievalError { .. } | Self::HttpError(_) | Self::SerializationError(_) => {
                ErrorCategory::Retrieval
            }
            Self::ArchiveError { .. } => ErrorCategory::Archive,
            Self::IoError { .. } => ErrorCategory::Filesystem,
            Self::ValidationError { .. } => ErrorCategory::Validation,
            Self::BackupError { .. } => ErrorCategory::Backup,
            Self::ConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路問題通常重試即可
            ErrorCategory::Retrieval => ErrorSeverity::Medium,
            ErrorCategory::Validation | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Archive | ErrorCategory::Backup => ErrorSeverity::High,
            // 合併途中失敗，目標目錄可能只更新了一部分
            ErrorCategory::Filesystem => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::RetrievalError { message } => format!("Could not download the branch: {}", message),
            Self::HttpError(e) if e.is_timeout() => {
                "The request to the remote host timed out".to_string()
            }
            Self::HttpError(_) => {
                "The remote host could not be reached. Check owner/repository or your network connection"
                    .to_string()
            }
            Self::ArchiveError { message } => format!("The downloaded archive is unusable: {}", message),
            Self::IoError { .. } => format!("File system operation failed: {}", self),
            Self::ValidationError { message } => message.clone(),
            Self::BackupError { message } => format!("Backup could not be created: {}", message),
            Self::ConfigError { message } => format!("Configuration problem: {}", message),
            Self::SerializationError(_) => "The remote API returned an unexpected response".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Retrieval => {
                "Verify the owner, repository and branch names, then retry in a moment"
            }
            ErrorCategory::Archive => "Retry the download; the archive may have been truncated",
            ErrorCategory::Filesystem => {
                "Check permissions and free disk space; restore from the backup archive if the target is partially updated"
            }
            ErrorCategory::Validation => {
                "Make sure the target directory exists and is writable before running an update"
            }
            ErrorCategory::Backup => {
                "Check that the target directory is readable and has room for the backup archive"
            }
            ErrorCategory::Configuration => "Fix or delete the configuration file and run again",
        }
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;
