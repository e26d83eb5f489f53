//! JSON fixtures for the in-memory adapters
//!
//! ```json
//! {
//!   "follows": { "viewer": ["alice", "bob"] },
//!   "records": [
//!     { "kind": "shortPost", "id": 101, "author": { "externalId": "alice" },
//!       "text": "hi", "createdAt": "2024-05-01T12:00:00Z" }
//!   ],
//!   "affinity": { "viewer": { "alice": 0.8 } }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::models::{ContentKind, NativeRecord};
use crate::services::content::{ContentSources, InMemoryContentRepository};
use crate::services::graph::StaticGraphResolver;
use crate::services::ranking::StaticAffinityLookup;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedFixture {
    #[serde(default)]
    pub follows: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub records: Vec<NativeRecord>,
    #[serde(default)]
    pub affinity: HashMap<String, HashMap<String, f64>>,
}

impl FeedFixture {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture = Self::from_json(&raw)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))?;

        info!(
            path = %path.display(),
            records = fixture.records.len(),
            viewers = fixture.follows.len(),
            "Loaded feed fixture"
        );
        Ok(fixture)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn graph(&self) -> StaticGraphResolver {
        let mut graph = StaticGraphResolver::default();
        for (viewer, authors) in &self.follows {
            for author in authors {
                graph.follow(viewer, author);
            }
        }
        graph
    }

    pub fn affinity_lookup(&self) -> StaticAffinityLookup {
        StaticAffinityLookup::new(self.affinity.clone())
    }

    /// One in-memory repository per kind, holding that kind's records.
    pub fn repositories(&self) -> HashMap<ContentKind, Arc<InMemoryContentRepository>> {
        ContentKind::ALL
            .iter()
            .map(|&kind| {
                let records = self
                    .records
                    .iter()
                    .filter(|record| record.kind() == kind)
                    .cloned()
                    .collect();
                (kind, Arc::new(InMemoryContentRepository::from_records(kind, records)))
            })
            .collect()
    }

    pub fn sources(&self) -> ContentSources {
        let repos = self.repositories();
        let repo = |kind: ContentKind| -> Arc<InMemoryContentRepository> {
            repos
                .get(&kind)
                .cloned()
                .unwrap_or_else(|| Arc::new(InMemoryContentRepository::new(kind)))
        };
        ContentSources::new(
            repo(ContentKind::ShortPost),
            repo(ContentKind::Poll),
            repo(ContentKind::Story),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::content::{AuthorFilter, ContentFilter, ContentRepository};
    use crate::services::graph::SocialGraphResolver;
    use crate::services::ranking::AffinityLookup;
    use crate::models::StatusConstraints;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FIXTURE: &str = r#"{
        "follows": { "viewer": ["alice"] },
        "records": [
            { "kind": "shortPost", "id": 101, "author": { "externalId": "alice" },
              "text": "hi", "createdAt": "2024-05-01T12:00:00Z" },
            { "kind": "poll", "id": 102, "creatorId": "bob", "question": "tabs?",
              "options": [{ "label": "yes", "voteCount": 3 }], "totalVotes": 3,
              "createdAt": "2024-05-01T12:05:00Z" },
            { "kind": "story", "id": 103, "authorId": "carol", "title": "Essay",
              "published": true, "createdAt": "2024-05-01T12:10:00Z" }
        ],
        "affinity": { "viewer": { "alice": 0.9 } }
    }"#;

    #[tokio::test]
    async fn test_fixture_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(FIXTURE.as_bytes()).unwrap();

        let fixture = FeedFixture::from_path(temp_file.path()).await.unwrap();
        assert_eq!(fixture.records.len(), 3);

        let following = fixture.graph().resolve_following("viewer").await.unwrap();
        assert!(following.contains("alice"));

        let affinity = fixture.affinity_lookup().affinity("viewer", "alice").await.unwrap();
        assert_eq!(affinity, 0.9);

        let sources = fixture.sources();
        let filter = ContentFilter {
            author_filter: AuthorFilter::Any,
            cursor: None,
            status: StatusConstraints::for_kind(ContentKind::Poll),
            quota: 10,
        };
        let polls = sources.get(ContentKind::Poll).find(&filter).await.unwrap();
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].kind(), ContentKind::Poll);
    }

    #[tokio::test]
    async fn test_missing_fixture_fails() {
        assert!(FeedFixture::from_path("/nonexistent/fixture.json").await.is_err());
    }

    #[test]
    fn test_malformed_fixture_fails() {
        assert!(FeedFixture::from_json(r#"{ "records": [{ "kind": "video" }] }"#).is_err());
    }
}
