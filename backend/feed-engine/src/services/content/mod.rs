//! Content repository contract
//!
//! Each content kind is owned by its own repository. The engine only reads
//! through this trait: author-set membership, an exclusive cursor bound,
//! per-kind status constraints and a quota.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{ContentId, ContentKind, NativeRecord, StatusConstraints};

pub use memory::InMemoryContentRepository;
pub use postgres::PgContentRepository;

/// Author-set membership filter.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorFilter {
    Any,
    In(Arc<HashSet<String>>),
    NotIn(Arc<HashSet<String>>),
}

impl AuthorFilter {
    pub fn matches(&self, author_id: &str) -> bool {
        match self {
            AuthorFilter::Any => true,
            AuthorFilter::In(set) => set.contains(author_id),
            AuthorFilter::NotIn(set) => !set.contains(author_id),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorFilter::Any => "any",
            AuthorFilter::In(_) => "in",
            AuthorFilter::NotIn(_) => "not_in",
        }
    }
}

/// Page query: newest-first, strictly older than `cursor`, at most `quota` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFilter {
    pub author_filter: AuthorFilter,
    pub cursor: Option<ContentId>,
    pub status: StatusConstraints,
    pub quota: usize,
}

/// Count query: rows strictly newer than `since`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountFilter {
    pub author_filter: AuthorFilter,
    pub since: ContentId,
    pub status: StatusConstraints,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    fn kind(&self) -> ContentKind;

    /// Records matching `filter`, newest first
    async fn find(&self, filter: &ContentFilter) -> Result<Vec<NativeRecord>>;

    /// Number of records matching `filter`, without loading them
    async fn count_newer(&self, filter: &CountFilter) -> Result<u64>;

    /// Whether a record with this id exists, regardless of status
    async fn exists(&self, id: ContentId) -> Result<bool>;
}

/// One repository per content kind.
#[derive(Clone)]
pub struct ContentSources {
    short_posts: Arc<dyn ContentRepository>,
    polls: Arc<dyn ContentRepository>,
    stories: Arc<dyn ContentRepository>,
}

impl ContentSources {
    pub fn new(
        short_posts: Arc<dyn ContentRepository>,
        polls: Arc<dyn ContentRepository>,
        stories: Arc<dyn ContentRepository>,
    ) -> Self {
        Self {
            short_posts,
            polls,
            stories,
        }
    }

    pub fn get(&self, kind: ContentKind) -> &Arc<dyn ContentRepository> {
        match kind {
            ContentKind::ShortPost => &self.short_posts,
            ContentKind::Poll => &self.polls,
            ContentKind::Story => &self.stories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_filter_matches() {
        let set: Arc<HashSet<String>> =
            Arc::new(["alice".to_string(), "bob".to_string()].into_iter().collect());

        assert!(AuthorFilter::Any.matches("anyone"));
        assert!(AuthorFilter::In(set.clone()).matches("alice"));
        assert!(!AuthorFilter::In(set.clone()).matches("carol"));
        assert!(!AuthorFilter::In(set.clone()).matches(""));
        assert!(AuthorFilter::NotIn(set.clone()).matches("carol"));
        assert!(AuthorFilter::NotIn(set.clone()).matches(""));
        assert!(!AuthorFilter::NotIn(set).matches("bob"));
    }
}
