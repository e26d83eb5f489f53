use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FeedError, Result};
use crate::services::quota::QuotaPolicy;
use crate::services::ranking::ScoringWeights;

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub database: Option<DatabaseConfig>,
    pub redis: Option<RedisConfig>,
    /// JSON fixture backing the in-memory adapters when no database is configured
    pub fixture_path: Option<String>,
    pub composer: ComposerConfig,
    pub scoring: ScoringWeights,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Orchestration policy for the feed composer.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub quotas: QuotaPolicy,
    pub max_consecutive_kind: usize,
    pub max_consecutive_author: usize,
    /// Default deadline for a whole request; `None` waits for collaborators.
    pub deadline: Option<Duration>,
    pub max_in_flight_fetches: usize,
    /// Upper bound on the following set pulled from the graph store
    pub max_following: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            quotas: QuotaPolicy::default(),
            max_consecutive_kind: 2,
            max_consecutive_author: 2,
            deadline: None,
            max_in_flight_fetches: 8,
            max_following: 5000,
        }
    }
}

impl ComposerConfig {
    pub fn validate(&self) -> Result<()> {
        self.quotas.validate()?;
        if self.max_consecutive_kind == 0 || self.max_consecutive_author == 0 {
            return Err(FeedError::Config(
                "diversity run limits must be at least 1".to_string(),
            ));
        }
        if self.max_in_flight_fetches == 0 {
            return Err(FeedError::Config(
                "max_in_flight_fetches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = ComposerConfig::default();
        let default_quotas = QuotaPolicy::default();

        let composer = ComposerConfig {
            quotas: QuotaPolicy {
                short_post_share: env_or("FEED_SHORT_POST_SHARE", default_quotas.short_post_share)?,
                poll_share: env_or("FEED_POLL_SHARE", default_quotas.poll_share)?,
                story_share: env_or("FEED_STORY_SHARE", default_quotas.story_share)?,
                discovery_share: env_or("FEED_DISCOVERY_SHARE", default_quotas.discovery_share)?,
            },
            max_consecutive_kind: env_or("FEED_MAX_CONSECUTIVE_KIND", defaults.max_consecutive_kind)?,
            max_consecutive_author: env_or(
                "FEED_MAX_CONSECUTIVE_AUTHOR",
                defaults.max_consecutive_author,
            )?,
            deadline: env_opt::<u64>("FEED_DEADLINE_MS")?.map(Duration::from_millis),
            max_in_flight_fetches: env_or(
                "FEED_MAX_IN_FLIGHT_FETCHES",
                defaults.max_in_flight_fetches,
            )?,
            max_following: env_or("FEED_MAX_FOLLOWING", defaults.max_following)?,
        };
        composer.validate()?;

        let scoring: ScoringWeights = envy::prefixed("FEED_SCORING_")
            .from_env()
            .map_err(|e| FeedError::Config(format!("scoring weights: {}", e)))?;
        scoring.validate()?;

        Ok(Config {
            service: ServiceConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "feed-engine".to_string()),
            },
            database: match env::var("DATABASE_URL") {
                Ok(url) if !url.is_empty() => Some(DatabaseConfig {
                    url,
                    max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
                }),
                _ => None,
            },
            redis: env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.is_empty())
                .map(|url| RedisConfig { url }),
            fixture_path: env::var("FEED_FIXTURE_PATH").ok().filter(|p| !p.is_empty()),
            composer,
            scoring,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    Ok(env_opt(key)?.unwrap_or(default))
}

fn env_opt<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| FeedError::Config(format!("{} has an invalid value '{}'", key, raw))),
        _ => Ok(None),
    }
}
