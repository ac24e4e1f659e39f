use std::collections::HashMap;
use thiserror::Error;

use crate::domain::Decimal;
use crate::services::ExchangeSettings;
use crate::store::FlushPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub index_flush_policy: FlushPolicy,
    pub max_hourly_change: Decimal,
    pub attendance_reward_per_day: i64,
    pub random_walk_seed: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let flush_every = env_map
            .get("INDEX_FLUSH_EVERY")
            .map(|s| s.as_str())
            .unwrap_or("50")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "INDEX_FLUSH_EVERY".to_string(),
                    "must be a valid u32".to_string(),
                )
            })?;

        let max_hourly_change = env_map
            .get("INDEX_MAX_HOURLY_CHANGE")
            .map(|s| s.as_str())
            .unwrap_or("0.01")
            .parse::<Decimal>()
            .ok()
            .filter(|rate| !rate.is_negative())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "INDEX_MAX_HOURLY_CHANGE".to_string(),
                    "must be a non-negative decimal".to_string(),
                )
            })?;

        let attendance_reward_per_day = env_map
            .get("ATTENDANCE_REWARD_PER_DAY")
            .map(|s| s.as_str())
            .unwrap_or("100")
            .parse::<i64>()
            .ok()
            .filter(|reward| *reward >= 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ATTENDANCE_REWARD_PER_DAY".to_string(),
                    "must be a non-negative i64".to_string(),
                )
            })?;

        let random_walk_seed = match env_map.get("RANDOM_WALK_SEED") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RANDOM_WALK_SEED".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?),
            None => None,
        };

        Ok(Config {
            port,
            database_path,
            index_flush_policy: FlushPolicy::every(flush_every),
            max_hourly_change,
            attendance_reward_per_day,
            random_walk_seed,
        })
    }

    pub fn exchange_settings(&self) -> ExchangeSettings {
        ExchangeSettings {
            max_hourly_change: self.max_hourly_change,
            reward_per_day: self.attendance_reward_per_day,
            random_seed: self.random_walk_seed,
        }
    }
}
