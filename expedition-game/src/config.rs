//! Tunable expedition rules and service endpoints.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    DEFAULT_ADVANCE_PATH, DEFAULT_BASE_URL, DEFAULT_BATTLE_PATH, DEFAULT_MOVE_PATH,
    DEFAULT_START_PATH, DEFAULT_STEPS_PER_FOOD, DEFAULT_TIMEOUT_SECS,
};

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpeditionConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must start with `/` (got `{value}`)")]
    RelativePath { field: &'static str, value: String },
}

/// Movement pricing and run-ending rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpeditionCfg {
    #[serde(default = "ExpeditionCfg::default_steps_per_food")]
    pub steps_per_food: u32,
    /// Stepping onto the goal node completes the run.
    #[serde(default = "ExpeditionCfg::default_true")]
    pub goal_ends_run: bool,
    /// Losing (or drawing) a boss battle completes the run.
    #[serde(default = "ExpeditionCfg::default_true")]
    pub boss_loss_ends_run: bool,
    /// Winning a boss battle completes the run.
    #[serde(default)]
    pub boss_victory_ends_run: bool,
}

impl ExpeditionCfg {
    #[must_use]
    pub const fn default_steps_per_food() -> u32 {
        DEFAULT_STEPS_PER_FOOD
    }

    const fn default_true() -> bool {
        true
    }

    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Load and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns [`ExpeditionConfigError`] when `steps_per_food` is zero.
    pub fn validate(&self) -> Result<(), ExpeditionConfigError> {
        if self.steps_per_food == 0 {
            return Err(ExpeditionConfigError::MinViolation {
                field: "steps_per_food",
                min: 1,
                value: 0,
            });
        }
        Ok(())
    }
}

impl Default for ExpeditionCfg {
    fn default() -> Self {
        Self {
            steps_per_food: Self::default_steps_per_food(),
            goal_ends_run: true,
            boss_loss_ends_run: true,
            boss_victory_ends_run: false,
        }
    }
}

/// Location of the expedition and battle endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "ServiceConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "ServiceConfig::default_start_path")]
    pub start_path: String,
    #[serde(default = "ServiceConfig::default_move_path")]
    pub move_path: String,
    #[serde(default = "ServiceConfig::default_advance_path")]
    pub advance_path: String,
    #[serde(default = "ServiceConfig::default_battle_path")]
    pub battle_path: String,
    /// Bearer token identifying the player session.
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default = "ServiceConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServiceConfig {
    fn default_base_url() -> String {
        DEFAULT_BASE_URL.to_string()
    }

    fn default_start_path() -> String {
        DEFAULT_START_PATH.to_string()
    }

    fn default_move_path() -> String {
        DEFAULT_MOVE_PATH.to_string()
    }

    fn default_advance_path() -> String {
        DEFAULT_ADVANCE_PATH.to_string()
    }

    fn default_battle_path() -> String {
        DEFAULT_BATTLE_PATH.to_string()
    }

    const fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Load and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is invalid.
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns [`ExpeditionConfigError`] for an empty base URL, a path that
    /// does not start with `/`, or a zero timeout.
    pub fn validate(&self) -> Result<(), ExpeditionConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ExpeditionConfigError::Empty { field: "base_url" });
        }
        for (field, value) in [
            ("start_path", &self.start_path),
            ("move_path", &self.move_path),
            ("advance_path", &self.advance_path),
            ("battle_path", &self.battle_path),
        ] {
            if !value.starts_with('/') {
                return Err(ExpeditionConfigError::RelativePath {
                    field,
                    value: value.clone(),
                });
            }
        }
        if self.timeout_secs == 0 {
            return Err(ExpeditionConfigError::MinViolation {
                field: "timeout_secs",
                min: 1,
                value: 0,
            });
        }
        Ok(())
    }

    /// Absolute URL for an endpoint path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            start_path: Self::default_start_path(),
            move_path: Self::default_move_path(),
            advance_path: Self::default_advance_path(),
            battle_path: Self::default_battle_path(),
            session_token: None,
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}
