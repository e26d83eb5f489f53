use super::SocialGraphResolver;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Follow graph backed by the `follows` table.
#[derive(Clone)]
pub struct PgGraphResolver {
    pool: PgPool,
    max_following: usize,
}

impl PgGraphResolver {
    pub fn new(pool: PgPool, max_following: usize) -> Self {
        Self {
            pool,
            max_following: max_following.max(1),
        }
    }
}

#[async_trait]
impl SocialGraphResolver for PgGraphResolver {
    async fn resolve_following(&self, viewer_id: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT following_id FROM follows
             WHERE follower_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(viewer_id)
        .bind(self.max_following as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query follows")?;

        if rows.len() == self.max_following {
            warn!(
                viewer_id = %viewer_id,
                max_following = self.max_following,
                "Following set truncated"
            );
        }

        let following: HashSet<String> = rows.into_iter().map(|(id,)| id).collect();
        debug!(viewer_id = %viewer_id, following = following.len(), "Resolved following set");

        Ok(following)
    }
}
