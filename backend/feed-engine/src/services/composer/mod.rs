//! Feed composer
//!
//! Request flow: resolve graph → plan fetches → fetch concurrently →
//! normalize → score → diversify (home tab) → truncate → respond.
//!
//! On the home tab truncation keeps at least one item of every kind that
//! was fetched, as long as the page has room for one per kind.
//!
//! Degradation policy:
//! - graph failure is fatal in graph-only mode, and degrades to discovery-only
//!   (empty following set) in graph-plus-discovery mode
//! - on a kind tab any fetch failure is fatal; on the home tab a failed kind
//!   contributes nothing, unless every kind failed
//! - scoring failures are always fatal

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::ComposerConfig;
use crate::error::{FeedError, Result};
use crate::metrics;
use crate::models::{
    ContentId, ContentKind, FeedMetadata, FeedMode, FeedQuery, FeedResponse, FeedTab,
    NewContentCount, NewContentQuery, Pagination, RawContentItem, ScoredItem, StatusConstraints,
};
use crate::services::content::{AuthorFilter, ContentFilter, CountFilter};
use crate::services::diversity::DiversityLayer;
use crate::services::fanout::{join_bounded, try_join_bounded, with_deadline};
use crate::services::fetch::ContentFetcher;
use crate::services::graph::SocialGraphResolver;
use crate::services::ranking::{compare_scored, FeedScorer, ScoringContext};

/// One repository query within a request.
#[derive(Debug, Clone)]
struct FetchPlan {
    kind: ContentKind,
    filter: ContentFilter,
}

/// Followed identities, and whether they had to be replaced by the empty set.
struct ResolvedGraph {
    following: Arc<HashSet<String>>,
    degraded: bool,
}

pub struct FeedComposer {
    graph: Arc<dyn SocialGraphResolver>,
    fetcher: ContentFetcher,
    scorer: FeedScorer,
    diversity: DiversityLayer,
    config: ComposerConfig,
}

impl FeedComposer {
    pub fn new(
        graph: Arc<dyn SocialGraphResolver>,
        fetcher: ContentFetcher,
        scorer: FeedScorer,
        config: ComposerConfig,
    ) -> Self {
        let diversity =
            DiversityLayer::new(config.max_consecutive_kind, config.max_consecutive_author);
        Self {
            graph,
            fetcher,
            scorer,
            diversity,
            config,
        }
    }

    /// Compose one page under the configured default deadline.
    pub async fn compose(&self, viewer_id: &str, query: &FeedQuery) -> Result<FeedResponse> {
        self.compose_with_deadline(viewer_id, query, self.config.deadline)
            .await
    }

    #[instrument(
        skip(self, query),
        fields(
            feed_mode = query.feed_mode.as_str(),
            tab = query.tab.as_str(),
            sort_mode = query.sort_mode.as_str()
        )
    )]
    pub async fn compose_with_deadline(
        &self,
        viewer_id: &str,
        query: &FeedQuery,
        deadline: Option<Duration>,
    ) -> Result<FeedResponse> {
        let started = Instant::now();
        let result = with_deadline(deadline, self.compose_page(viewer_id, query)).await;

        let status = match &result {
            Ok(response) if response.metadata.degraded => "degraded",
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_request("compose", query.feed_mode.as_str(), query.tab.as_str(), status);
        metrics::record_request_duration("compose", started.elapsed());

        match &result {
            Ok(response) => {
                metrics::record_items_returned(response.items.len());
                info!(
                    count = response.pagination.count,
                    has_more = response.pagination.has_more,
                    degraded = response.metadata.degraded,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Feed composed"
                );
            }
            Err(e) => warn!(error = %e, kind = e.kind(), "Feed composition failed"),
        }

        result
    }

    async fn compose_page(&self, viewer_id: &str, query: &FeedQuery) -> Result<FeedResponse> {
        let limit = query.limit.max(1);
        let cursor = query
            .cursor
            .as_deref()
            .map(ContentId::parse_cursor)
            .transpose()?;

        let graph = self.resolve_graph(viewer_id, query.feed_mode).await?;

        if query.feed_mode == FeedMode::GraphOnly && graph.following.is_empty() {
            debug!("Empty following set, skipping fetch");
            return Ok(FeedResponse::empty(query));
        }

        if let Some(cursor) = cursor {
            self.validate_cursor(query.tab, cursor).await?;
        }

        let plans = self.plan_fetches(query, limit, cursor, &graph.following);
        let (items, degraded_kinds) = self.execute(query.tab, &plans).await?;
        let items = dedupe(items);

        let ctx = ScoringContext {
            viewer_id,
            following: &graph.following,
            now: Utc::now(),
        };
        let mut ranked = self.scorer.score(&items, query.sort_mode, &ctx).await?;

        if query.tab.is_aggregate() {
            ranked = self.diversity.apply(ranked);
        }

        let has_more = ranked.len() > limit;
        if query.tab.is_aggregate() {
            ranked = self.truncate_home(ranked, limit);
        } else {
            ranked.truncate(limit);
        }
        let next_cursor = ranked.last().map(|scored| scored.item.id.to_string());

        let mut metadata = FeedMetadata::for_query(query);
        metadata.graph_degraded = graph.degraded;
        metadata.degraded = graph.degraded || !degraded_kinds.is_empty();
        metadata.degraded_kinds = degraded_kinds;

        Ok(FeedResponse {
            pagination: Pagination {
                next_cursor,
                has_more,
                count: ranked.len(),
            },
            items: ranked,
            metadata,
        })
    }

    /// Cut the home feed to `limit`, swapping in the best item of any kind
    /// that would otherwise be cut entirely. The item displaced is the
    /// lowest-ranked one whose kind keeps another item on the page.
    fn truncate_home(&self, mut ranked: Vec<ScoredItem>, limit: usize) -> Vec<ScoredItem> {
        if ranked.len() <= limit {
            return ranked;
        }
        let mut rest = ranked.split_off(limit);
        let mut page = ranked;
        let mut swapped = false;

        for kind in ContentKind::ALL {
            if page.iter().any(|scored| scored.item.kind == kind) {
                continue;
            }
            let Some(candidate) = rest.iter().position(|scored| scored.item.kind == kind) else {
                continue;
            };
            let victim = page.iter().rposition(|scored| {
                page.iter()
                    .filter(|other| other.item.kind == scored.item.kind)
                    .count()
                    > 1
            });
            let Some(victim) = victim else {
                break;
            };

            debug!(kind = %kind, "Swapping starved kind onto page");
            page.remove(victim);
            page.push(rest.remove(candidate));
            swapped = true;
        }

        if swapped {
            page.sort_by(compare_scored);
            page = self.diversity.apply(page);
        }
        page
    }

    async fn resolve_graph(&self, viewer_id: &str, feed_mode: FeedMode) -> Result<ResolvedGraph> {
        match self.graph.resolve_following(viewer_id).await {
            Ok(following) => {
                debug!(following = following.len(), "Resolved following set");
                Ok(ResolvedGraph {
                    following: Arc::new(following),
                    degraded: false,
                })
            }
            Err(e) => match feed_mode {
                FeedMode::GraphOnly => Err(FeedError::GraphResolution(format!("{:#}", e))),
                FeedMode::GraphPlusDiscovery => {
                    warn!(error = %e, "Graph resolution failed, serving discovery only");
                    metrics::record_degraded("graph");
                    Ok(ResolvedGraph {
                        following: Arc::new(HashSet::new()),
                        degraded: true,
                    })
                }
            },
        }
    }

    /// The cursor must name an existing item of the tab's kind, or of any
    /// kind on the home tab. A home cursor is a bare id passed to every kind
    /// as its exclusive upper bound, so any kind holding that id vouches for it.
    async fn validate_cursor(&self, tab: FeedTab, cursor: ContentId) -> Result<()> {
        if let Some(kind) = tab.kind() {
            return if self.fetcher.contains(kind, cursor).await? {
                Ok(())
            } else {
                Err(FeedError::InvalidCursor(format!(
                    "{} does not refer to a {}",
                    cursor, kind
                )))
            };
        }

        let lookups = join_bounded(
            ContentKind::ALL
                .iter()
                .map(|&kind| self.fetcher.contains(kind, cursor)),
            self.config.max_in_flight_fetches,
        )
        .await;

        let mut unknown = 0usize;
        for lookup in lookups {
            match lookup {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => {
                    unknown += 1;
                    warn!(error = %e, "Cursor lookup failed");
                }
            }
        }

        if unknown > 0 {
            // The kinds that failed here will degrade during fetch anyway.
            debug!(%cursor, unknown, "Accepting unconfirmed cursor");
            return Ok(());
        }

        Err(FeedError::InvalidCursor(format!(
            "{} does not refer to any content",
            cursor
        )))
    }

    fn plan_fetches(
        &self,
        query: &FeedQuery,
        limit: usize,
        cursor: Option<ContentId>,
        following: &Arc<HashSet<String>>,
    ) -> Vec<FetchPlan> {
        let quotas = &self.config.quotas;
        let mut plans = Vec::new();

        for kind in query.tab.kinds() {
            let quota = quotas.kind_quota(query.tab, kind, limit);
            let plan = |author_filter: AuthorFilter, quota: usize| FetchPlan {
                kind,
                filter: ContentFilter {
                    author_filter,
                    cursor,
                    status: StatusConstraints::for_kind(kind),
                    quota,
                },
            };

            match query.feed_mode {
                FeedMode::GraphOnly => {
                    if quota > 0 {
                        plans.push(plan(AuthorFilter::In(following.clone()), quota));
                    }
                }
                FeedMode::GraphPlusDiscovery => {
                    let split = quotas.split_discovery(quota, !following.is_empty());
                    if split.in_set > 0 {
                        plans.push(plan(AuthorFilter::In(following.clone()), split.in_set));
                    }
                    if split.discovery > 0 {
                        plans.push(plan(AuthorFilter::NotIn(following.clone()), split.discovery));
                    }
                }
            }
        }

        debug!(
            plans = plans.len(),
            quotas = ?plans.iter().map(|p| (p.kind.as_str(), p.filter.author_filter.as_str(), p.filter.quota)).collect::<Vec<_>>(),
            "Planned fetches"
        );
        plans
    }

    /// Run every plan. Returns the fetched items and the kinds that were
    /// dropped from the home tab.
    async fn execute(
        &self,
        tab: FeedTab,
        plans: &[FetchPlan],
    ) -> Result<(Vec<RawContentItem>, Vec<ContentKind>)> {
        let max_in_flight = self.config.max_in_flight_fetches;

        if !tab.is_aggregate() {
            let batches = try_join_bounded(
                plans
                    .iter()
                    .map(|plan| self.fetcher.fetch(plan.kind, &plan.filter)),
                max_in_flight,
            )
            .await?;
            return Ok((batches.into_iter().flatten().collect(), Vec::new()));
        }

        let outcomes = join_bounded(
            plans.iter().map(|plan| async move {
                (plan.kind, self.fetcher.fetch(plan.kind, &plan.filter).await)
            }),
            max_in_flight,
        )
        .await;

        let attempted: BTreeSet<ContentKind> = plans.iter().map(|plan| plan.kind).collect();
        let mut failed: BTreeMap<ContentKind, FeedError> = BTreeMap::new();
        let mut items = Vec::new();
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(batch) => items.extend(batch),
                Err(e) => {
                    failed.entry(kind).or_insert(e);
                }
            }
        }

        if failed.len() == attempted.len() {
            if let Some((_, first)) = failed.pop_first() {
                warn!(kinds = attempted.len(), "Every content kind failed");
                return Err(first);
            }
        }

        for (kind, error) in &failed {
            warn!(kind = %kind, error = %error, "Dropping failed kind from home feed");
            metrics::record_degraded(kind.as_str());
        }
        // A kind is all or nothing, even if one of its sub-fetches succeeded.
        items.retain(|item: &RawContentItem| !failed.contains_key(&item.kind));

        Ok((items, failed.into_keys().collect()))
    }

    /// Count items newer than `query.since` under the configured default deadline.
    pub async fn count_new(&self, viewer_id: &str, query: &NewContentQuery) -> Result<NewContentCount> {
        self.count_new_with_deadline(viewer_id, query, self.config.deadline)
            .await
    }

    #[instrument(
        skip(self, query),
        fields(feed_mode = query.feed_mode.as_str(), tab = query.tab.as_str())
    )]
    pub async fn count_new_with_deadline(
        &self,
        viewer_id: &str,
        query: &NewContentQuery,
        deadline: Option<Duration>,
    ) -> Result<NewContentCount> {
        let started = Instant::now();
        let result = with_deadline(deadline, self.count_newer(viewer_id, query)).await;

        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::record_request("count_new", query.feed_mode.as_str(), query.tab.as_str(), status);
        metrics::record_request_duration("count_new", started.elapsed());

        match &result {
            Ok(count) => debug!(count = count.count, "Counted new content"),
            Err(e) => warn!(error = %e, kind = e.kind(), "New content count failed"),
        }

        result
    }

    async fn count_newer(&self, viewer_id: &str, query: &NewContentQuery) -> Result<NewContentCount> {
        let since = ContentId::parse_cursor(&query.since)?;

        // Discovery mode counts in-set and out-of-set authors alike, which is
        // every author, so the graph is only needed in graph-only mode.
        let author_filter = match query.feed_mode {
            FeedMode::GraphOnly => {
                let graph = self.resolve_graph(viewer_id, FeedMode::GraphOnly).await?;
                if graph.following.is_empty() {
                    return Ok(NewContentCount { count: 0 });
                }
                AuthorFilter::In(graph.following)
            }
            FeedMode::GraphPlusDiscovery => AuthorFilter::Any,
        };

        let filters: Vec<(ContentKind, CountFilter)> = query
            .tab
            .kinds()
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    CountFilter {
                        author_filter: author_filter.clone(),
                        since,
                        status: StatusConstraints::for_kind(kind),
                    },
                )
            })
            .collect();
        let max_in_flight = self.config.max_in_flight_fetches;

        if !query.tab.is_aggregate() {
            let counts = try_join_bounded(
                filters
                    .iter()
                    .map(|(kind, filter)| self.fetcher.count(*kind, filter)),
                max_in_flight,
            )
            .await?;
            return Ok(NewContentCount {
                count: counts.into_iter().sum(),
            });
        }

        let outcomes = join_bounded(
            filters
                .iter()
                .map(|(kind, filter)| self.fetcher.count(*kind, filter)),
            max_in_flight,
        )
        .await;

        let mut total = 0u64;
        let mut first_error = None;
        let mut failures = 0usize;
        for ((kind, _), outcome) in filters.iter().zip(outcomes) {
            match outcome {
                Ok(count) => total += count,
                Err(e) => {
                    failures += 1;
                    warn!(kind = %kind, error = %e, "Leaving failed kind out of new content count");
                    metrics::record_degraded(kind.as_str());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if failures == filters.len() => Err(e),
            _ => Ok(NewContentCount { count: total }),
        }
    }
}

/// Keep the first occurrence of each item. Ids are only unique within a kind.
fn dedupe(items: Vec<RawContentItem>) -> Vec<RawContentItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert((item.kind, item.id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmbeddedAuthor, NativeRecord, ShortPostRecord, SortMode};
    use crate::services::content::{ContentSources, MockContentRepository};
    use crate::services::graph::MockSocialGraphResolver;
    use crate::services::ranking::ScoringWeights;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn post(id: i64, author: &str) -> NativeRecord {
        NativeRecord::ShortPost(ShortPostRecord {
            id: ContentId(id),
            author: Some(EmbeddedAuthor {
                external_id: Some(author.to_string()),
                display_name: None,
            }),
            text: String::new(),
            media_urls: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                + ChronoDuration::minutes(id),
            like_count: 0,
            comment_count: 0,
            is_deleted: false,
        })
    }

    fn graph(following: &'static [&'static str]) -> Arc<MockSocialGraphResolver> {
        let mut graph = MockSocialGraphResolver::new();
        graph
            .expect_resolve_following()
            .returning(move |_| Ok(following.iter().map(|s| s.to_string()).collect()));
        Arc::new(graph)
    }

    fn failing_graph() -> Arc<MockSocialGraphResolver> {
        let mut graph = MockSocialGraphResolver::new();
        graph
            .expect_resolve_following()
            .returning(|_| Err(anyhow::anyhow!("graph store unavailable")));
        Arc::new(graph)
    }

    fn untouched() -> MockContentRepository {
        let mut repo = MockContentRepository::new();
        repo.expect_find().never();
        repo.expect_count_newer().never();
        repo.expect_exists().never();
        repo
    }

    fn empty_repo() -> MockContentRepository {
        let mut repo = MockContentRepository::new();
        repo.expect_find().returning(|_| Ok(vec![]));
        repo.expect_count_newer().returning(|_| Ok(0));
        repo.expect_exists().returning(|_| Ok(false));
        repo
    }

    fn failing_repo() -> MockContentRepository {
        let mut repo = MockContentRepository::new();
        repo.expect_find()
            .returning(|_| Err(anyhow::anyhow!("store unavailable")));
        repo.expect_count_newer()
            .returning(|_| Err(anyhow::anyhow!("store unavailable")));
        repo.expect_exists()
            .returning(|_| Err(anyhow::anyhow!("store unavailable")));
        repo
    }

    fn composer(
        graph: Arc<MockSocialGraphResolver>,
        short_posts: MockContentRepository,
        polls: MockContentRepository,
        stories: MockContentRepository,
    ) -> FeedComposer {
        let sources = ContentSources::new(Arc::new(short_posts), Arc::new(polls), Arc::new(stories));
        FeedComposer::new(
            graph,
            ContentFetcher::new(sources),
            FeedScorer::new(ScoringWeights::default()),
            ComposerConfig::default(),
        )
    }

    fn query(feed_mode: FeedMode, tab: FeedTab) -> FeedQuery {
        FeedQuery {
            feed_mode,
            tab,
            cursor: None,
            limit: 10,
            sort_mode: SortMode::Newest,
        }
    }

    #[tokio::test]
    async fn test_graph_only_empty_following_skips_fetch() {
        let composer = composer(graph(&[]), untouched(), untouched(), untouched());
        let mut q = query(FeedMode::GraphOnly, FeedTab::Home);
        q.cursor = Some("500".to_string());

        let response = composer.compose("viewer", &q).await.unwrap();
        assert!(response.items.is_empty());
        assert!(!response.pagination.has_more);
        assert_eq!(response.pagination.next_cursor, None);
        assert_eq!(response.pagination.count, 0);
    }

    #[tokio::test]
    async fn test_graph_failure_is_fatal_in_graph_only_mode() {
        let composer = composer(failing_graph(), untouched(), untouched(), untouched());
        let err = composer
            .compose("viewer", &query(FeedMode::GraphOnly, FeedTab::ShortPost))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::GraphResolution(_)));
    }

    #[tokio::test]
    async fn test_graph_failure_degrades_to_discovery() {
        let mut posts = MockContentRepository::new();
        posts
            .expect_find()
            .withf(|filter| {
                matches!(&filter.author_filter, AuthorFilter::NotIn(set) if set.is_empty())
                    && filter.quota == 11
            })
            .times(1)
            .returning(|_| Ok(vec![post(2, "stranger"), post(1, "stranger")]));

        let composer = composer(failing_graph(), posts, untouched(), untouched());
        let response = composer
            .compose("viewer", &query(FeedMode::GraphPlusDiscovery, FeedTab::ShortPost))
            .await
            .unwrap();

        assert_eq!(response.items.len(), 2);
        assert!(response.metadata.degraded);
        assert!(response.metadata.graph_degraded);
    }

    #[tokio::test]
    async fn test_discovery_splits_quota_between_plans() {
        let mut posts = MockContentRepository::new();
        posts
            .expect_find()
            .withf(|filter| matches!(filter.author_filter, AuthorFilter::In(_)) && filter.quota == 8)
            .times(1)
            .returning(|_| Ok(vec![post(5, "friend")]));
        posts
            .expect_find()
            .withf(|filter| matches!(filter.author_filter, AuthorFilter::NotIn(_)) && filter.quota == 3)
            .times(1)
            .returning(|_| Ok(vec![post(4, "stranger")]));

        let composer = composer(graph(&["friend"]), posts, untouched(), untouched());
        let response = composer
            .compose("viewer", &query(FeedMode::GraphPlusDiscovery, FeedTab::ShortPost))
            .await
            .unwrap();

        let authors: Vec<&str> = response.items.iter().map(|s| s.item.author_id.as_str()).collect();
        assert_eq!(authors, vec!["friend", "stranger"]);
        assert!(!response.metadata.degraded);
    }

    #[tokio::test]
    async fn test_malformed_cursor_rejected_before_any_call() {
        let mut graph = MockSocialGraphResolver::new();
        graph.expect_resolve_following().never();

        let composer = composer(Arc::new(graph), untouched(), untouched(), untouched());
        let mut q = query(FeedMode::GraphOnly, FeedTab::Home);
        q.cursor = Some("not-a-cursor".to_string());

        let err = composer.compose("viewer", &q).await.unwrap_err();
        assert!(matches!(err, FeedError::InvalidCursor(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_cursor_rejected_before_fetch() {
        let mut polls = MockContentRepository::new();
        polls.expect_exists().times(1).returning(|_| Ok(false));
        polls.expect_find().never();

        let composer = composer(graph(&["friend"]), untouched(), polls, untouched());
        let mut q = query(FeedMode::GraphOnly, FeedTab::Poll);
        q.cursor = Some("42".to_string());

        let err = composer.compose("viewer", &q).await.unwrap_err();
        assert!(matches!(err, FeedError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn test_home_cursor_accepted_when_any_kind_has_it() {
        let mut stories = MockContentRepository::new();
        stories.expect_exists().returning(|id| Ok(id == ContentId(42)));
        stories.expect_find().returning(|_| Ok(vec![]));

        let composer = composer(graph(&["friend"]), empty_repo(), empty_repo(), stories);
        let mut q = query(FeedMode::GraphOnly, FeedTab::Home);
        q.cursor = Some("42".to_string());

        let response = composer.compose("viewer", &q).await.unwrap();
        assert!(response.items.is_empty());
    }

    #[tokio::test]
    async fn test_kind_tab_fetch_failure_is_fatal() {
        let composer = composer(graph(&["friend"]), failing_repo(), untouched(), untouched());
        let err = composer
            .compose("viewer", &query(FeedMode::GraphOnly, FeedTab::ShortPost))
            .await
            .unwrap_err();

        match err {
            FeedError::ContentFetch { kind, .. } => assert_eq!(kind, ContentKind::ShortPost),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_home_tab_degrades_failed_kind() {
        let mut posts = MockContentRepository::new();
        posts
            .expect_find()
            .returning(|_| Ok(vec![post(3, "friend"), post(2, "friend")]));

        let composer = composer(graph(&["friend"]), posts, failing_repo(), empty_repo());
        let response = composer
            .compose("viewer", &query(FeedMode::GraphOnly, FeedTab::Home))
            .await
            .unwrap();

        assert_eq!(response.items.len(), 2);
        assert!(response.metadata.degraded);
        assert_eq!(response.metadata.degraded_kinds, vec![ContentKind::Poll]);
    }

    #[tokio::test]
    async fn test_home_tab_fails_when_every_kind_fails() {
        let composer = composer(graph(&["friend"]), failing_repo(), failing_repo(), failing_repo());
        let err = composer
            .compose("viewer", &query(FeedMode::GraphOnly, FeedTab::Home))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::ContentFetch { .. }));
    }

    #[tokio::test]
    async fn test_pagination_fields() {
        let mut posts = MockContentRepository::new();
        posts
            .expect_find()
            .returning(|_| Ok((1..=5).rev().map(|id| post(id, "friend")).collect()));

        let composer = composer(graph(&["friend"]), posts, untouched(), untouched());
        let mut q = query(FeedMode::GraphOnly, FeedTab::ShortPost);
        q.limit = 3;

        let response = composer.compose("viewer", &q).await.unwrap();
        let ids: Vec<i64> = response.items.iter().map(|s| s.item.id.0).collect();
        assert_eq!(ids, vec![5, 4, 3]);
        assert!(response.pagination.has_more);
        assert_eq!(response.pagination.next_cursor.as_deref(), Some("3"));
        assert_eq!(response.pagination.count, 3);
    }

    #[tokio::test]
    async fn test_count_in_discovery_mode_skips_graph() {
        let mut graph = MockSocialGraphResolver::new();
        graph.expect_resolve_following().never();

        let mut posts = MockContentRepository::new();
        posts
            .expect_count_newer()
            .withf(|filter| filter.author_filter == AuthorFilter::Any && filter.since == ContentId(10))
            .returning(|_| Ok(4));
        let mut polls = MockContentRepository::new();
        polls.expect_count_newer().returning(|_| Ok(2));

        let composer = composer(Arc::new(graph), posts, polls, empty_repo());
        let count = composer
            .count_new(
                "viewer",
                &NewContentQuery {
                    feed_mode: FeedMode::GraphPlusDiscovery,
                    tab: FeedTab::Home,
                    since: "10".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(count.count, 6);
    }

    #[tokio::test]
    async fn test_count_graph_only_with_empty_graph_is_zero() {
        let composer = composer(graph(&[]), untouched(), untouched(), untouched());
        let count = composer
            .count_new(
                "viewer",
                &NewContentQuery {
                    feed_mode: FeedMode::GraphOnly,
                    tab: FeedTab::Home,
                    since: "10".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(count.count, 0);
    }

    #[tokio::test]
    async fn test_count_home_degrades_failed_kind() {
        let mut posts = MockContentRepository::new();
        posts.expect_count_newer().returning(|_| Ok(3));

        let composer = composer(graph(&["friend"]), posts, failing_repo(), failing_repo());
        let count = composer
            .count_new(
                "viewer",
                &NewContentQuery {
                    feed_mode: FeedMode::GraphOnly,
                    tab: FeedTab::Home,
                    since: "1".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(count.count, 3);
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let items: Vec<RawContentItem> = [post(1, "a"), post(2, "b"), post(1, "c")]
            .into_iter()
            .map(crate::services::normalize::normalize)
            .collect();

        let deduped = dedupe(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].author_id, "a");
    }

    #[test]
    fn test_dedupe_keeps_same_id_across_kinds() {
        let poll = NativeRecord::Poll(crate::models::PollRecord {
            id: ContentId(1),
            creator_id: Some("a".to_string()),
            question: String::new(),
            options: vec![],
            status: crate::models::PollStatus::Active,
            total_votes: 0,
            reaction_count: 0,
            comment_count: 0,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            ends_at: None,
            is_deleted: false,
        });
        let items: Vec<RawContentItem> = [post(1, "a"), poll]
            .into_iter()
            .map(crate::services::normalize::normalize)
            .collect();

        let deduped = dedupe(items);
        let kinds: Vec<ContentKind> = deduped.iter().map(|item| item.kind).collect();
        assert_eq!(kinds, vec![ContentKind::ShortPost, ContentKind::Poll]);
    }
}
