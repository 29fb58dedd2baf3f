//! Environment settings for the demo server.

use std::time::Duration;

use leaguehub::prelude::{DraftConfig, RosterError, StaticRoster};
use serde::Deserialize;
use tracing::info;

/// Everything read from `LEAGUEHUB_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Leagues and members, `league:alice,bob;other:carol`.
    #[serde(default)]
    pub rosters: String,

    #[serde(default = "default_num_rounds")]
    pub num_rounds: u32,

    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    #[serde(default)]
    pub shuffle_order: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("environment variable error: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid LEAGUEHUB_ROSTERS: {0}")]
    Roster(#[from] RosterError),
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_num_rounds() -> u32 {
    3
}

fn default_turn_timeout_secs() -> u64 {
    60
}

impl Settings {
    pub const PREFIX: &'static str = "LEAGUEHUB_";

    /// Loads settings from the environment, after merging a `.env` file
    /// if one exists.
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        let settings = envy::prefixed(Self::PREFIX).from_env::<Settings>()?;
        info!(bind = %settings.bind, "configuration loaded");
        Ok(settings)
    }

    pub fn roster(&self) -> Result<StaticRoster, SettingsError> {
        Ok(StaticRoster::parse(&self.rosters)?)
    }

    pub fn draft_config(&self) -> DraftConfig {
        DraftConfig {
            num_rounds: self.num_rounds,
            turn_timeout: Duration::from_secs(self.turn_timeout_secs),
            shuffle_order: self.shuffle_order,
        }
    }
}
