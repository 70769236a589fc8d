use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::VK_API_BASE;
use crate::engine::Campaign;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Env var that overrides `vk.token`.
pub const TOKEN_VAR: &str = "VK_TOKEN";

/// Env var that overrides `tracker.cookie` for the scrape strategy.
pub const COOKIE_VAR: &str = "VK_COOKIE";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub vk: VkConfig,
    pub tracker: TrackerConfig,
    pub campaign: Campaign,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// VK credentials and the group whose wall receives updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VkConfig {
    /// User access token with `wall` and `offline` scopes.
    #[serde(default)]
    pub token: String,
    /// Where to get a fresh token; printed when VK reports an expired one.
    #[serde(default)]
    pub login_url: String,
    /// Group id (positive). Wall calls use `-group_id` as owner.
    pub group_id: i64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Where the current place comes from. Exactly one strategy per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TrackerConfig {
    /// Scrape the reporter's bug-tracker profile page.
    Scrape {
        profile_url: String,
        /// Value of the `remixsid` session cookie.
        #[serde(default)]
        cookie: String,
    },
    /// Ask a tracker API method for the reporter's top position.
    Api {
        reporter_id: i64,
        #[serde(default = "default_tracker_method")]
        method: String,
    },
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Sleep between polling iterations, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Sleep before the first iteration, in milliseconds.
    #[serde(default = "default_warmup")]
    pub warmup_ms: u64,
}

fn default_api_base() -> String {
    VK_API_BASE.to_string()
}

fn default_tracker_method() -> String {
    "bugtracker.getReporterStats".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_warmup() -> u64 {
    10
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            warmup_ms: default_warmup(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Replace secrets with `VK_TOKEN` / `VK_COOKIE` when those are set.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(TOKEN_VAR).ok(),
            std::env::var(COOKIE_VAR).ok(),
        )
    }

    pub fn with_overrides(mut self, token: Option<String>, cookie: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.vk.token = token.trim().to_string();
        }
        if let (Some(value), TrackerConfig::Scrape { cookie, .. }) =
            (cookie.filter(|c| !c.trim().is_empty()), &mut self.tracker)
        {
            *cookie = value.trim().to_string();
        }
        self
    }
}
