use super::{ContentFilter, ContentRepository, CountFilter};
use crate::models::{ContentId, ContentKind, NativeRecord};
use crate::services::normalize;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// In-memory repository for a single content kind.
///
/// Used by the developer harness and tests. Supports simulated outages and
/// latency, and counts how often it is queried.
pub struct InMemoryContentRepository {
    kind: ContentKind,
    records: RwLock<Vec<NativeRecord>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    find_calls: AtomicUsize,
    count_calls: AtomicUsize,
}

impl InMemoryContentRepository {
    pub fn new(kind: ContentKind) -> Self {
        Self::from_records(kind, Vec::new())
    }

    /// Records of another kind are dropped.
    pub fn from_records(kind: ContentKind, records: Vec<NativeRecord>) -> Self {
        let records = records
            .into_iter()
            .filter(|record| {
                let matches = record.kind() == kind;
                if !matches {
                    warn!(
                        expected = %kind,
                        actual = %record.kind(),
                        id = %record.id(),
                        "Dropping record of foreign kind"
                    );
                }
                matches
            })
            .collect();

        Self {
            kind,
            records: RwLock::new(records),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            find_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
        }
    }

    pub async fn insert(&self, record: NativeRecord) -> Result<()> {
        if record.kind() != self.kind {
            bail!(
                "cannot store {} record {} in {} repository",
                record.kind(),
                record.id(),
                self.kind
            );
        }
        self.records.write().await.push(record);
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    async fn simulate_io(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("{} store unavailable", self.kind);
        }
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    fn kind(&self) -> ContentKind {
        self.kind
    }

    async fn find(&self, filter: &ContentFilter) -> Result<Vec<NativeRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;

        let records = self.records.read().await;
        let mut matched: Vec<NativeRecord> = records
            .iter()
            .filter(|record| record.satisfies(&filter.status))
            .filter(|record| filter.cursor.map_or(true, |cursor| record.id() < cursor))
            .filter(|record| filter.author_filter.matches(&normalize::author_id(record)))
            .cloned()
            .collect();

        matched.sort_by_key(|record| Reverse((record.created_at(), record.id())));
        matched.truncate(filter.quota);

        Ok(matched)
    }

    async fn count_newer(&self, filter: &CountFilter) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;

        let records = self.records.read().await;
        let count = records
            .iter()
            .filter(|record| record.satisfies(&filter.status))
            .filter(|record| record.id() > filter.since)
            .filter(|record| filter.author_filter.matches(&normalize::author_id(record)))
            .count();

        Ok(count as u64)
    }

    async fn exists(&self, id: ContentId) -> Result<bool> {
        self.simulate_io().await?;
        Ok(self.records.read().await.iter().any(|record| record.id() == id))
    }
}
