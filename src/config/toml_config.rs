use crate::core::exclusion::ExclusionSet;
use crate::utils::error::{Result, UpdateError};
use crate::utils::validation::{validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "update.config.toml";

/// 在兩次執行之間保存的設定 (owner、repository、排除規則)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    pub owner: String,
    pub repository: String,
    pub excludes: ExclusionSet,
    pub github: GitHubSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub api_base: String,
    pub download_base: String,
    pub api_timeout_seconds: u64,
    pub download_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            download_base: "https://codeload.github.com".to_string(),
            api_timeout_seconds: 20,
            download_timeout_seconds: 120,
            user_agent: "repo-updater".to_string(),
        }
    }
}

impl UpdaterConfig {
    /// 從 TOML 檔案載入設定，檔案不存在時回傳預設值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(UpdateError::io_at("could not read configuration", path, e)),
        }
    }

    /// 從 TOML 字串解析設定
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| UpdateError::config(format!("TOML parsing error: {}", e)))
    }

    /// 替換環境變數 (例如 ${UPDATER_OWNER})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| UpdateError::config(format!("invalid placeholder pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn has_repository(&self) -> bool {
        !self.owner.trim().is_empty() && !self.repository.trim().is_empty()
    }

    /// 寫回設定檔。owner 或 repository 為空時不寫入。
    ///
    /// 先寫入同目錄的暫存檔再改名，避免留下寫到一半的設定。
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        if !self.has_repository() {
            return Ok(false);
        }

        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| UpdateError::config(format!("could not serialize configuration: {}", e)))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| UpdateError::io_at("could not write configuration to", dir, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| UpdateError::io_at("could not write configuration to", path, e))?;
        file.persist(path)
            .map_err(|e| UpdateError::io_at("could not save configuration", path, e.error))?;

        tracing::debug!("Configuration saved to {}", path.display());
        Ok(true)
    }
}

impl Validate for UpdaterConfig {
    fn validate(&self) -> Result<()> {
        validate_url("github.api_base", &self.github.api_base)?;
        validate_url("github.download_base", &self.github.download_base)?;
        validate_range("github.api_timeout_seconds", self.github.api_timeout_seconds, 1, 600)?;
        validate_range(
            "github.download_timeout_seconds",
            self.github.download_timeout_seconds,
            1,
            3600,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
owner = "acme"
repository = "site"
excludes = ["config.php", "storage/", "./config.php"]

[github]
api_timeout_seconds = 5
"#;

        let config = UpdaterConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.owner, "acme");
        assert_eq!(config.repository, "site");
        assert_eq!(config.excludes.to_strings(), vec!["config.php", "storage"]);
        assert_eq!(config.github.api_timeout_seconds, 5);
        assert_eq!(config.github.download_timeout_seconds, 120);
        assert_eq!(config.github.api_base, "https://api.github.com");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("REPO_UPDATER_TEST_OWNER", "from-env");

        let config =
            UpdaterConfig::from_toml_str("owner = \"${REPO_UPDATER_TEST_OWNER}\"\nrepository = \"r\"")
                .unwrap();
        assert_eq!(config.owner, "from-env");

        std::env::remove_var("REPO_UPDATER_TEST_OWNER");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = UpdaterConfig::from_file(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, UpdaterConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = UpdaterConfig::from_toml_str("owner = [").unwrap_err();
        assert!(matches!(err, UpdateError::ConfigError { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let config = UpdaterConfig {
            owner: "acme".to_string(),
            repository: "site".to_string(),
            excludes: ExclusionSet::parse("config.php\nstorage"),
            ..UpdaterConfig::default()
        };

        assert!(config.save(&path).unwrap());
        assert_eq!(UpdaterConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_save_skipped_without_repository() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        assert!(!UpdaterConfig::default().save(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_config_validation() {
        let mut config = UpdaterConfig::default();
        assert!(config.validate().is_ok());

        config.github.api_base = "invalid-url".to_string();
        assert!(config.validate().is_err());
    }
}
