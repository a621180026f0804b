use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageConfig,
    latency: LatencyConfig,
    chat: ChatConfig,
    auth: AuthConfig,
    dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct StorageConfig {
    data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct LatencyConfig {
    otp_ms: u64,
    room_ms: u64,
    history_ms: u64,
    reply_min_ms: u64,
    reply_max_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            otp_ms: 1000,
            room_ms: 500,
            history_ms: 1000,
            reply_min_ms: 1000,
            reply_max_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ChatConfig {
    page_size: usize,
    history_pages: u32,
    max_image_bytes: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            history_pages: 5,
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct AuthConfig {
    resend_cooldown_secs: u64,
    default_user_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            resend_cooldown_secs: 30,
            default_user_name: "User".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct DashboardConfig {
    search_debounce_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 300,
        }
    }
}

/// Simulated backend delays.
#[derive(Debug, Clone)]
pub struct Latency {
    pub otp: Duration,
    pub room: Duration,
    pub history: Duration,
    pub reply_min: Duration,
    pub reply_max: Duration,
}

impl Latency {
    /// No artificial delay anywhere. Useful for tests that don't care about timing.
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            otp: Duration::ZERO,
            room: Duration::ZERO,
            history: Duration::ZERO,
            reply_min: Duration::ZERO,
            reply_max: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub latency: Latency,
    pub page_size: usize,
    pub history_pages: u32,
    pub max_image_bytes: u64,
    pub resend_cooldown: Duration,
    pub default_user_name: String,
    pub search_debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        ConfigFile::default().into()
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let reply_min = Duration::from_millis(file.latency.reply_min_ms);
        let reply_max = Duration::from_millis(file.latency.reply_max_ms).max(reply_min);

        Self {
            data_dir: file.storage.data_dir.into(),
            latency: Latency {
                otp: Duration::from_millis(file.latency.otp_ms),
                room: Duration::from_millis(file.latency.room_ms),
                history: Duration::from_millis(file.latency.history_ms),
                reply_min,
                reply_max,
            },
            page_size: file.chat.page_size.max(1),
            history_pages: file.chat.history_pages,
            max_image_bytes: file.chat.max_image_bytes,
            resend_cooldown: Duration::from_secs(file.auth.resend_cooldown_secs),
            default_user_name: file.auth.default_user_name,
            search_debounce: Duration::from_millis(file.dashboard.search_debounce_ms),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;
        Ok(config_file.into())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn load() -> Result<Self> {
        let path = Path::new("config.toml");
        if !path.exists() {
            warn!("config.toml not found, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }
}
