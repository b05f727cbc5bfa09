use crate::constants::RunnerConstants;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What the run thread does once no request is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleBehavior {
    /// Block until the next request arrives.
    #[default]
    Wait,
    /// Emit `SHUTDOWN` and exit as soon as the queue is empty.
    ExitWhenDrained,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub idle_behavior: IdleBehavior,
    pub thread_name_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            idle_behavior: IdleBehavior::default(),
            thread_name_prefix: RunnerConstants::THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    #[must_use]
    pub const fn with_idle_behavior(mut self, idle_behavior: IdleBehavior) -> Self {
        self.idle_behavior = idle_behavior;
        self
    }
}
