use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Request `user-modify-playback-state` and allow skip/toggle commands.
    #[serde(default = "default_transport_controls")]
    pub transport_controls: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_extra_fetch_delay_ms")]
    pub extra_fetch_delay_ms: u64,
    #[serde(default = "default_expiry_margin_ms")]
    pub expiry_margin_ms: i64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:3000/index.html".to_string()
}

fn default_transport_controls() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_extra_fetch_delay_ms() -> u64 {
    300
}

fn default_expiry_margin_ms() -> i64 {
    300_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_consecutive_errors() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
            transport_controls: default_transport_controls(),
            poll_interval_ms: default_poll_interval_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            extra_fetch_delay_ms: default_extra_fetch_delay_ms(),
            expiry_margin_ms: default_expiry_margin_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".nowplaying"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn session_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("session.json"))
    }

    pub fn load() -> AppResult<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> AppResult<()> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)?;
        let path = Self::config_path()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Environment wins over the file so the client id can stay out of it.
    pub fn apply_env(&mut self) {
        if let Ok(client_id) = std::env::var(CLIENT_ID_ENV) {
            if !client_id.trim().is_empty() {
                self.client_id = client_id.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.client_id.is_empty() {
            return Err(AppError::Config(format!(
                "No client id configured. Set {} or edit the config file.",
                CLIENT_ID_ENV
            )));
        }
        if self.poll_interval_ms == 0 || self.progress_interval_ms == 0 {
            return Err(AppError::Config("Intervals must be non-zero".into()));
        }
        if self.max_consecutive_errors == 0 {
            return Err(AppError::Config(
                "max_consecutive_errors must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn extra_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.extra_fetch_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
