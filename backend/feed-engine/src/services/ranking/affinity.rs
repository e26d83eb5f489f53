// ============================================
// Viewer Affinity Lookup
// ============================================
// How strongly a viewer is drawn to an author, in [0, 1].
// Served from Redis hashes keyed per viewer, or from fixtures.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::debug;

/// Weight used whenever no affinity is known
pub const NEUTRAL_AFFINITY: f64 = 0.0;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AffinityLookup: Send + Sync {
    async fn affinity(&self, viewer_id: &str, author_id: &str) -> Result<f64>;
}

/// Key format: affinity:{viewer_id}, field = author_id
pub struct RedisAffinityLookup {
    redis: redis::Client,
}

impl RedisAffinityLookup {
    pub fn new(redis: redis::Client) -> Self {
        Self { redis }
    }

    fn key(viewer_id: &str) -> String {
        format!("affinity:{}", viewer_id)
    }
}

#[async_trait]
impl AffinityLookup for RedisAffinityLookup {
    async fn affinity(&self, viewer_id: &str, author_id: &str) -> Result<f64> {
        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .context("Failed to get Redis connection")?;

        let key = Self::key(viewer_id);
        let value: Option<f64> = conn
            .hget(&key, author_id)
            .await
            .with_context(|| format!("HGET {} {}", key, author_id))?;

        if value.is_none() {
            debug!(viewer_id, author_id, "No affinity recorded");
        }
        Ok(value.unwrap_or(NEUTRAL_AFFINITY))
    }
}

/// Fixed (viewer, author) weights.
#[derive(Debug, Clone, Default)]
pub struct StaticAffinityLookup {
    weights: HashMap<String, HashMap<String, f64>>,
}

impl StaticAffinityLookup {
    pub fn new(weights: HashMap<String, HashMap<String, f64>>) -> Self {
        Self { weights }
    }
}

#[async_trait]
impl AffinityLookup for StaticAffinityLookup {
    async fn affinity(&self, viewer_id: &str, author_id: &str) -> Result<f64> {
        Ok(self
            .weights
            .get(viewer_id)
            .and_then(|authors| authors.get(author_id))
            .copied()
            .unwrap_or(NEUTRAL_AFFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup_defaults_to_neutral() {
        let mut weights = HashMap::new();
        weights.insert(
            "viewer".to_string(),
            [("alice".to_string(), 0.8)].into_iter().collect(),
        );
        let lookup = StaticAffinityLookup::new(weights);

        assert_eq!(lookup.affinity("viewer", "alice").await.unwrap(), 0.8);
        assert_eq!(lookup.affinity("viewer", "bob").await.unwrap(), NEUTRAL_AFFINITY);
        assert_eq!(lookup.affinity("other", "alice").await.unwrap(), NEUTRAL_AFFINITY);
    }

    #[test]
    fn test_redis_key_format() {
        assert_eq!(RedisAffinityLookup::key("v1"), "affinity:v1");
    }
}
