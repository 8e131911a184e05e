// SPDX-License-Identifier: MIT

//! Engine configuration
//!
//! Settings come from serde (a definition file section) or from the
//! environment:
//! - `AGENTFLOW_STEP_LIMIT` - maximum node executions per run
//! - `AGENTFLOW_MODEL_TIMEOUT_SECS` - per-call language model timeout
//! - `MODEL_NAME` - model used by agents that do not name one
//! - `MAX_TOKENS` - completion length cap passed to the model service

use crate::adk::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_STEP_LIMIT: usize = 25;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(50);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub step_limit: usize,
    pub model_timeout_secs: u64,
    pub default_model: String,
    pub max_tokens: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
            model_timeout_secs: DEFAULT_MODEL_TIMEOUT.as_secs(),
            default_model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
        }
    }
}

impl EngineConfig {
    /// Read settings from process environment variables
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(limit) = parse_var(&lookup, "AGENTFLOW_STEP_LIMIT")? {
            config.step_limit = limit;
        }
        if let Some(secs) = parse_var(&lookup, "AGENTFLOW_MODEL_TIMEOUT_SECS")? {
            config.model_timeout_secs = secs;
        }
        if let Some(model) = lookup("MODEL_NAME").filter(|m| !m.trim().is_empty()) {
            config.default_model = model.trim().to_string();
        }
        config.max_tokens = parse_var(&lookup, "MAX_TOKENS")?;

        if config.step_limit == 0 {
            return Err(ConfigurationError::InvalidSetting {
                key: "AGENTFLOW_STEP_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigurationError::InvalidSetting {
                key: key.to_string(),
                message: format!("'{}': {}", raw, e),
            }),
    }
}
