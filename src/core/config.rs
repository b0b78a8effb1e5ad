

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{PurgeError, Result};


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {

    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,


    pub concurrent_group_lookups: bool,
    /// Refuse to delete when a direct-reference lookup degraded to zero.
    pub block_on_degraded: bool,
    pub interventions_block_deletion: bool,


    pub verify_plan_before_execute: bool,
    pub rollback_on_failure: bool,
}

impl PurgeConfig {

    pub fn new() -> Self {
        Self {
            max_retries: crate::DEFAULT_MAX_RETRIES,
            initial_retry_delay_ms: crate::DEFAULT_INITIAL_RETRY_DELAY_MS,
            max_retry_delay_ms: crate::DEFAULT_MAX_RETRY_DELAY_MS,

            concurrent_group_lookups: true,
            block_on_degraded: true,
            interventions_block_deletion: false,

            verify_plan_before_execute: true,
            rollback_on_failure: true,
        }
    }


    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Some(retries) = env_parse("PURGE_MAX_RETRIES") {
            config.max_retries = retries;
        }
        if let Some(delay) = env_parse("PURGE_INITIAL_RETRY_DELAY_MS") {
            config.initial_retry_delay_ms = delay;
        }
        if let Some(delay) = env_parse("PURGE_MAX_RETRY_DELAY_MS") {
            config.max_retry_delay_ms = delay;
        }
        if let Some(flag) = env_parse("PURGE_CONCURRENT_GROUP_LOOKUPS") {
            config.concurrent_group_lookups = flag;
        }
        if let Some(flag) = env_parse("PURGE_BLOCK_ON_DEGRADED") {
            config.block_on_degraded = flag;
        }
        if let Some(flag) = env_parse("PURGE_INTERVENTIONS_BLOCK_DELETION") {
            config.interventions_block_deletion = flag;
        }
        if let Some(flag) = env_parse("PURGE_VERIFY_PLAN_BEFORE_EXECUTE") {
            config.verify_plan_before_execute = flag;
        }
        if let Some(flag) = env_parse("PURGE_ROLLBACK_ON_FAILURE") {
            config.rollback_on_failure = flag;
        }

        config
    }

    /// Layers `path` (any format the `config` crate recognises) under
    /// `PURGE_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("PURGE").try_parsing(true))
            .build()
            .map_err(|e| PurgeError::Config(format!("{}: {}", path.display(), e)))?;

        settings
            .try_deserialize()
            .map_err(|e| PurgeError::Config(e.to_string()))
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
