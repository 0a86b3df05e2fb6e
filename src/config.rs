//! Dashboard configuration stored in ~/.yliftdaily/config.json.
//!
//! Every field has a serde default so a partial (or absent) file still
//! yields a usable config. `API_URL` from the environment overrides the
//! file's `apiUrl`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment key for the backend base URL.
pub const API_URL_ENV: &str = "API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default = "default_accounts_refresh_secs")]
    pub accounts_refresh_secs: u64,
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,
    #[serde(default = "default_initial_retries")]
    pub initial_retries: u32,
    #[serde(default = "default_refresh_retries")]
    pub refresh_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_startup_floor_secs")]
    pub startup_floor_secs: u64,
    /// Treat a newly seen account as a hint that store activity changed.
    #[serde(default = "default_true")]
    pub force_activity_on_new_account: bool,
    /// When false, the first successful accounts fetch seeds the known set silently.
    #[serde(default = "default_true")]
    pub notify_on_first_load: bool,
}

fn default_accounts_refresh_secs() -> u64 {
    10
}

fn default_watchdog_interval_secs() -> u64 {
    60
}

fn default_inactivity_threshold_secs() -> u64 {
    1800
}

fn default_initial_retries() -> u32 {
    3
}

fn default_refresh_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_startup_floor_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            accounts_refresh_secs: default_accounts_refresh_secs(),
            watchdog_interval_secs: default_watchdog_interval_secs(),
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
            initial_retries: default_initial_retries(),
            refresh_retries: default_refresh_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            startup_floor_secs: default_startup_floor_secs(),
            force_activity_on_new_account: true,
            notify_on_first_load: true,
        }
    }
}

impl DashboardConfig {
    pub fn accounts_refresh_period(&self) -> Duration {
        Duration::from_secs(self.accounts_refresh_secs.max(1))
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn startup_floor(&self) -> Duration {
        Duration::from_secs(self.startup_floor_secs)
    }

    /// Apply `API_URL` from the environment, if set and non-empty.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = Some(url);
            }
        }
        self
    }
}

pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".yliftdaily").join("config.json"))
}

/// Load configuration from ~/.yliftdaily/config.json, then apply `API_URL`.
pub fn load_config() -> Result<DashboardConfig, String> {
    let path = config_path()?;
    Ok(load_config_from(&path)?.with_env_override())
}

/// Load configuration from an explicit path. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<DashboardConfig, String> {
    if !path.exists() {
        log::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(DashboardConfig::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config_from(&temp.path().join("config.json")).unwrap();

        assert!(config.api_url.is_none());
        assert_eq!(config.accounts_refresh_secs, 10);
        assert_eq!(config.watchdog_interval_secs, 60);
        assert_eq!(config.inactivity_threshold_secs, 1800);
        assert_eq!(config.initial_retries, 3);
        assert_eq!(config.refresh_retries, 2);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{ "apiUrl": "https://api.example.com/", "inactivityThresholdSecs": 300 }"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();

        assert_eq!(config.api_url.as_deref(), Some("https://api.example.com/"));
        assert_eq!(config.inactivity_threshold(), Duration::from_secs(300));
        assert_eq!(config.accounts_refresh_secs, 10);
        assert!(config.force_activity_on_new_account);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn test_zero_periods_are_clamped() {
        let config = DashboardConfig {
            accounts_refresh_secs: 0,
            watchdog_interval_secs: 0,
            ..DashboardConfig::default()
        };

        assert_eq!(config.accounts_refresh_period(), Duration::from_secs(1));
        assert_eq!(config.watchdog_period(), Duration::from_secs(1));
    }
}
