//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `TESSERA_API_KEY`, `TESSERA_API_URL`
//! 2. Project-local: `.tessera/config.toml`
//! 3. Global: `~/.tessera/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tessera_core::{Result, TesseraError};

pub const DEFAULT_API_URL: &str = "https://cloud.leonardo.ai/api/rest/v1";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POLL_INTERVAL_SECS: f64 = 10.0;
const DEFAULT_TRANSIENT_ERROR_LIMIT: u32 = 3;
const DEFAULT_WORKER_THREADS: usize = 2;

/// `[service]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// `[polling]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollingSection {
    #[serde(default)]
    pub interval_secs: Option<f64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub transient_error_limit: Option<u32>,
}

/// `[workspace]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSection {
    #[serde(default)]
    pub subdirectory: Option<String>,
    #[serde(default)]
    pub export_file: Option<String>,
}

/// `[scheduler]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesseraConfigFile {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub workspace: WorkspaceSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone)]
pub struct TesseraConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: f64,
    /// Unset means poll until the job completes or is stopped
    pub max_poll_attempts: Option<u32>,
    pub transient_error_limit: u32,
    pub workspace_subdirectory: String,
    pub export_file: String,
    pub worker_threads: usize,
}

impl Default for TesseraConfig {
    fn default() -> Self {
        Self::resolve(TesseraConfigFile::default())
    }
}

impl TesseraConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = TesseraConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".tessera/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config);
        Self::resolve(config).validated()
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Self::resolve(config).validated()
    }

    /// Reject values that cannot drive the poll loop
    fn validated(self) -> Result<Self> {
        let secs = self.poll_interval_secs;
        if secs.is_nan() || secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
            return Err(TesseraError::ConfigError(format!(
                "polling.interval_secs must be a positive number of seconds, got {}",
                secs
            )));
        }
        Ok(self)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS))
    }

    fn resolve(file: TesseraConfigFile) -> Self {
        Self {
            api_key: file.service.api_key,
            api_url: file
                .service
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            request_timeout_secs: file
                .service
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            poll_interval_secs: file
                .polling
                .interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: file.polling.max_attempts,
            transient_error_limit: file
                .polling
                .transient_error_limit
                .unwrap_or(DEFAULT_TRANSIENT_ERROR_LIMIT),
            workspace_subdirectory: file
                .workspace
                .subdirectory
                .unwrap_or_else(|| "tessera_tmp".to_string()),
            export_file: file
                .workspace
                .export_file
                .unwrap_or_else(|| "tmp.obj".to_string()),
            worker_threads: file
                .scheduler
                .worker_threads
                .unwrap_or(DEFAULT_WORKER_THREADS),
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".tessera").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<TesseraConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            TesseraError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn merge_into(base: &mut TesseraConfigFile, overlay: TesseraConfigFile) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut base.service.api_key, overlay.service.api_key);
        take(&mut base.service.api_url, overlay.service.api_url);
        take(
            &mut base.service.request_timeout_secs,
            overlay.service.request_timeout_secs,
        );
        take(&mut base.polling.interval_secs, overlay.polling.interval_secs);
        take(&mut base.polling.max_attempts, overlay.polling.max_attempts);
        take(
            &mut base.polling.transient_error_limit,
            overlay.polling.transient_error_limit,
        );
        take(&mut base.workspace.subdirectory, overlay.workspace.subdirectory);
        take(&mut base.workspace.export_file, overlay.workspace.export_file);
        take(
            &mut base.scheduler.worker_threads,
            overlay.scheduler.worker_threads,
        );
    }

    fn apply_env_overrides(config: &mut TesseraConfigFile) {
        if let Ok(key) = std::env::var("TESSERA_API_KEY") {
            config.service.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("TESSERA_API_URL") {
            config.service.api_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("tessera_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_file() {
        let config_str = r#"
[service]
api_url = "https://api.example.com/v1"
request_timeout_secs = 15

[polling]
interval_secs = 2.5
max_attempts = 40

[workspace]
subdirectory = "textures_tmp"
"#;
        let path = temp_config(config_str);
        let config = TesseraConfig::load_from_file(&path).unwrap();

        assert_eq!(config.api_url, "https://api.example.com/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.poll_interval(), Duration::from_millis(2500));
        assert_eq!(config.max_poll_attempts, Some(40));
        assert_eq!(config.transient_error_limit, 3);
        assert_eq!(config.workspace_subdirectory, "textures_tmp");
        assert_eq!(config.export_file, "tmp.obj");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_defaults() {
        let config = TesseraConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.max_poll_attempts, None);
        assert_eq!(config.worker_threads, 2);
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = TesseraConfig {
            api_key: Some("   ".to_string()),
            ..TesseraConfig::default()
        };
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut base: TesseraConfigFile = toml::from_str(
            r#"
[service]
api_key = "global-key"
[polling]
max_attempts = 10
"#,
        )
        .unwrap();
        let overlay: TesseraConfigFile = toml::from_str(
            r#"
[polling]
interval_secs = 1.0
"#,
        )
        .unwrap();

        TesseraConfig::merge_into(&mut base, overlay);
        let config = TesseraConfig::resolve(base);
        assert_eq!(config.api_key.as_deref(), Some("global-key"));
        assert_eq!(config.max_poll_attempts, Some(10));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_unusable_poll_interval_is_rejected() {
        for value in ["inf", "nan", "0.0", "-2.0", "1e300"] {
            let path = temp_config(&format!("[polling]\ninterval_secs = {}\n", value));
            let result = TesseraConfig::load_from_file(&path);
            assert!(
                matches!(result, Err(TesseraError::ConfigError(_))),
                "interval_secs = {} should be rejected",
                value
            );
            std::fs::remove_file(&path).ok();
            std::fs::remove_dir(path.parent().unwrap()).ok();
        }
    }

    #[test]
    fn test_poll_interval_never_panics_on_bad_field() {
        let config = TesseraConfig {
            poll_interval_secs: f64::INFINITY,
            ..TesseraConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let path = temp_config("[polling\ninterval_secs = ");
        let result = TesseraConfig::load_from_file(&path);
        assert!(matches!(result, Err(TesseraError::ConfigError(_))));
        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }
}
