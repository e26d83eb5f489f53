//! Social graph resolver
//!
//! Read-only view of who a viewer follows. An empty set is a valid answer and
//! distinct from a failure; what to do on failure is the composer's call.

mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

pub use postgres::PgGraphResolver;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialGraphResolver: Send + Sync {
    /// Identities the viewer follows
    async fn resolve_following(&self, viewer_id: &str) -> Result<HashSet<String>>;
}

/// In-memory follow graph, loaded from fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticGraphResolver {
    following: HashMap<String, HashSet<String>>,
}

impl StaticGraphResolver {
    pub fn new(following: HashMap<String, HashSet<String>>) -> Self {
        Self { following }
    }

    pub fn follow(&mut self, viewer_id: &str, author_id: &str) {
        self.following
            .entry(viewer_id.to_string())
            .or_default()
            .insert(author_id.to_string());
    }
}

#[async_trait]
impl SocialGraphResolver for StaticGraphResolver {
    async fn resolve_following(&self, viewer_id: &str) -> Result<HashSet<String>> {
        Ok(self.following.get(viewer_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver() {
        let mut graph = StaticGraphResolver::default();
        graph.follow("viewer", "alice");
        graph.follow("viewer", "bob");
        graph.follow("viewer", "alice");

        let following = graph.resolve_following("viewer").await.unwrap();
        assert_eq!(following.len(), 2);
        assert!(following.contains("alice"));

        let nobody = graph.resolve_following("stranger").await.unwrap();
        assert!(nobody.is_empty());
    }
}
