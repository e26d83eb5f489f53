//! Content fetchers
//!
//! Uniform, read-only access to every content kind. Records come back from
//! the kind's repository, are normalized, and are guaranteed newest-first and
//! within quota regardless of what the repository returned.

use std::cmp::Reverse;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{FeedError, Result};
use crate::metrics;
use crate::models::{ContentId, ContentKind, RawContentItem};
use crate::services::content::{ContentFilter, ContentSources, CountFilter};
use crate::services::normalize;

#[derive(Clone)]
pub struct ContentFetcher {
    sources: ContentSources,
}

impl ContentFetcher {
    pub fn new(sources: ContentSources) -> Self {
        Self { sources }
    }

    /// Up to `filter.quota` items of `kind`, newest first.
    pub async fn fetch(&self, kind: ContentKind, filter: &ContentFilter) -> Result<Vec<RawContentItem>> {
        if filter.quota == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let records = self
            .sources
            .get(kind)
            .find(filter)
            .await
            .map_err(|e| FeedError::content_fetch(kind, format!("{:#}", e)))?;
        metrics::record_fetch_duration(kind, started.elapsed());

        let fetched = records.len();
        let mut items: Vec<RawContentItem> = records
            .into_iter()
            .filter(|record| {
                let own_kind = record.kind() == kind;
                if !own_kind {
                    warn!(expected = %kind, actual = %record.kind(), id = %record.id(), "Repository returned foreign record");
                }
                own_kind
            })
            .filter(|record| filter.cursor.map_or(true, |cursor| record.id() < cursor))
            .map(normalize::normalize)
            .collect();

        items.sort_by_key(|item| Reverse((item.created_at, item.id)));
        items.truncate(filter.quota);

        debug!(
            kind = %kind,
            author_filter = filter.author_filter.as_str(),
            quota = filter.quota,
            fetched,
            returned = items.len(),
            "Fetched content"
        );

        Ok(items)
    }

    pub async fn count(&self, kind: ContentKind, filter: &CountFilter) -> Result<u64> {
        self.sources
            .get(kind)
            .count_newer(filter)
            .await
            .map_err(|e| FeedError::content_fetch(kind, format!("{:#}", e)))
    }

    pub async fn contains(&self, kind: ContentKind, id: ContentId) -> Result<bool> {
        self.sources
            .get(kind)
            .exists(id)
            .await
            .map_err(|e| FeedError::content_fetch(kind, format!("{:#}", e)))
    }
}
