// Runtime configuration. A single JSON file holds the OAuth client
// credentials, the top-level directory map and optional endpoint
// overrides; `DRIVEZIP_CONFIG` points at an alternate file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Upload byte ceiling for the versioned-name flow: 50 GiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024 * 1024;

fn default_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_upload_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_token_endpoint() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where the cached OAuth token lives. Defaults to `token.json` next
    /// to the config file.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// Top-level directory label to remote folder id. A BTreeMap keeps the
    /// menu order stable between runs.
    pub directories: BTreeMap<String, String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    /// Pre-filled uploader tag for folder-named uploads.
    #[serde(default)]
    pub uploader_tag: Option<String>,
}

impl AppConfig {
    /// Load the configuration from `DRIVEZIP_CONFIG` or the default
    /// per-user location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        if config.directories.is_empty() {
            bail!("Config lists no top-level directories; add at least one under \"directories\"");
        }
        Ok(config)
    }

    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| config_dir().join("token.json"))
    }
}

/// Path of the config file: the env override when set, otherwise the
/// per-user config directory.
pub fn config_path() -> PathBuf {
    std::env::var_os("DRIVEZIP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir().join("config.json"))
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drivezip")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let json = r#"{
            "client_id": "client-1",
            "client_secret": "secret-1",
            "directories": { "ACS": "folder-acs" }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.directories["ACS"], "folder-acs");
        assert_eq!(config.api_base, "https://www.googleapis.com");
        assert_eq!(config.token_endpoint, "https://oauth2.googleapis.com/token");
        assert!(config.uploader_tag.is_none());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let json = r#"{
            "client_id": "client-1",
            "client_secret": "secret-1",
            "token_path": "/tmp/t.json",
            "directories": { "ACS": "folder-acs" },
            "api_base": "http://localhost:9999",
            "upload_base": "http://localhost:9999",
            "token_endpoint": "http://localhost:9999/token",
            "uploader_tag": "maya"
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_base, "http://localhost:9999");
        assert_eq!(config.token_path(), PathBuf::from("/tmp/t.json"));
        assert_eq!(config.uploader_tag.as_deref(), Some("maya"));
    }

    #[test]
    fn empty_directory_map_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"client_id":"c","client_secret":"s","directories":{}}"#,
        )
        .unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("top-level directories"));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let path = PathBuf::from("/definitely/not/here/config.json");
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config.json"));
    }
}
