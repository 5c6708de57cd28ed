use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{Channel, ChannelKind, Server};
use crate::error::{ClientError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";

const ENV_API_URL: &str = "GUILD_CHAT_API_URL";
const ENV_WS_URL: &str = "GUILD_CHAT_WS_URL";
const ENV_DATA_DIR: &str = "GUILD_CHAT_DATA_DIR";

/// How repeated upvotes by the same user are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicy {
    /// One upvote per user per post; repeats are dropped before any request.
    #[default]
    Idempotent,
    /// Every upvote is forwarded to the backend.
    Cumulative,
}

/// Bounded exponential backoff for realtime connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryConfig {
    /// Delay before attempt `attempt + 1`, doubling from the initial value.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
    pub retry: RetryConfig,
    pub vote_policy: VotePolicy,
    pub servers: Vec<Server>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:4000/api".to_string(),
            ws_base_url: "ws://localhost:4001".to_string(),
            request_timeout_secs: 15,
            data_dir: PathBuf::from("data"),
            retry: RetryConfig::default(),
            vote_policy: VotePolicy::default(),
            servers: default_servers(),
        }
    }
}

impl AppConfig {
    pub fn server(&self, name: &str) -> Option<&Server> {
        self.servers.iter().find(|server| server.name == name)
    }

    /// Apply `GUILD_CHAT_*` environment overrides (after `.env` is loaded).
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Ok(url) = env::var(ENV_WS_URL) {
            self.ws_base_url = url;
        }
        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(ClientError::Config(format!(
                "api_base_url must be http(s): {}",
                self.api_base_url
            )));
        }
        if !self.ws_base_url.starts_with("ws://") && !self.ws_base_url.starts_with("wss://") {
            return Err(ClientError::Config(format!(
                "ws_base_url must be ws(s): {}",
                self.ws_base_url
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ClientError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_servers() -> Vec<Server> {
    vec![
        Server {
            name: "Server1".to_string(),
            channels: vec![
                Channel::new("general", ChannelKind::Message),
                Channel::new("bulletin", ChannelKind::Board),
            ],
        },
        Server {
            name: "Server2".to_string(),
            channels: vec![
                Channel::new("off-topic", ChannelKind::Message),
                Channel::new("announcements", ChannelKind::Board),
            ],
        },
    ]
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

/// Rename a channel in the catalogue stored at `path`.
pub fn persist_channel_rename(path: &str, server: &str, from: &str, to: &str) {
    let mut config = load_config(path);
    let renamed = config
        .servers
        .iter_mut()
        .filter(|entry| entry.name == server)
        .flat_map(|entry| entry.channels.iter_mut())
        .find(|channel| channel.name == from)
        .map(|channel| channel.name = to.to_string())
        .is_some();

    if !renamed {
        log::warn!("Channel {server}/{from} not in {path}; rename not persisted");
        return;
    }

    if let Err(err) = save_config(path, &config) {
        log::error!("Failed to write config {}: {err}", path);
    } else {
        log::info!("Persisted rename {server}/{from} -> {to} to {path}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config("/nonexistent/guild_chat/client.json");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server("Server1").unwrap().channels.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(
            &path,
            r#"{"api_base_url":"https://chat.example.com/api","vote_policy":"cumulative"}"#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.api_base_url, "https://chat.example.com/api");
        assert_eq!(config.vote_policy, VotePolicy::Cumulative);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_rename_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/client.json");
        let path = path.to_str().unwrap();
        save_config(path, &AppConfig::default()).unwrap();

        persist_channel_rename(path, "Server1", "general", "lobby");

        let config = load_config(path);
        let server = config.server("Server1").unwrap();
        assert!(server.channel("lobby").is_some());
        assert!(server.channel("general").is_none());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 6,
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
        };
        assert_eq!(retry.backoff_ms(1), 100);
        assert_eq!(retry.backoff_ms(2), 200);
        assert_eq!(retry.backoff_ms(3), 400);
        assert_eq!(retry.backoff_ms(4), 500);
        assert_eq!(retry.backoff_ms(70), 500);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = AppConfig {
            ws_base_url: "http://localhost:4001".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }
}
