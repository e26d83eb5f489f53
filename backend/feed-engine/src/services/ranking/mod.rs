/// Ranking Module
///
/// Assigns every normalized item a comparable score and orders the merged
/// candidate set.
///
/// # Sort modes
/// - **newest**: score is the creation time, pure reverse-chronological
/// - **relevance**: recency decay × engagement × follow boost × affinity boost
///
/// The relevance weights are configuration (`FEED_SCORING_*`), not a
/// contract. What is guaranteed: deterministic for a fixed `now`, monotonic
/// in each engagement count, decreasing with age.
pub mod affinity;

pub use affinity::{AffinityLookup, RedisAffinityLookup, StaticAffinityLookup, NEUTRAL_AFFINITY};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{FeedError, Result};
use crate::metrics;
use crate::models::{Priority, RawContentItem, ScoredItem, SortMode};
use crate::utils::exponential_decay;

/// Tunable relevance policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_reaction_weight")]
    pub reaction_weight: f64,
    #[serde(default = "default_comment_weight")]
    pub comment_weight: f64,
    /// Polls only
    #[serde(default = "default_vote_weight")]
    pub vote_weight: f64,
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    /// Relative boost for authors the viewer follows
    #[serde(default = "default_follow_boost")]
    pub follow_boost: f64,
    /// Relative boost at full viewer affinity
    #[serde(default = "default_affinity_boost")]
    pub affinity_boost: f64,
}

fn default_reaction_weight() -> f64 {
    1.0
}

fn default_comment_weight() -> f64 {
    2.0
}

fn default_vote_weight() -> f64 {
    0.5
}

fn default_half_life_hours() -> f64 {
    24.0
}

fn default_follow_boost() -> f64 {
    0.25
}

fn default_affinity_boost() -> f64 {
    0.5
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            reaction_weight: default_reaction_weight(),
            comment_weight: default_comment_weight(),
            vote_weight: default_vote_weight(),
            half_life_hours: default_half_life_hours(),
            follow_boost: default_follow_boost(),
            affinity_boost: default_affinity_boost(),
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("reaction_weight", self.reaction_weight),
            ("comment_weight", self.comment_weight),
            ("vote_weight", self.vote_weight),
            ("follow_boost", self.follow_boost),
            ("affinity_boost", self.affinity_boost),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(FeedError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !self.half_life_hours.is_finite() || self.half_life_hours <= 0.0 {
            return Err(FeedError::Config(format!(
                "half_life_hours must be positive, got {}",
                self.half_life_hours
            )));
        }
        Ok(())
    }
}

/// Per-request inputs to scoring. `now` is captured once so that every item
/// in a request is aged against the same instant.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub viewer_id: &'a str,
    pub following: &'a HashSet<String>,
    pub now: DateTime<Utc>,
}

/// Scorer - 對候選集打分排序
pub struct FeedScorer {
    weights: ScoringWeights,
    affinity: Option<Arc<dyn AffinityLookup>>,
}

impl FeedScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            weights,
            affinity: None,
        }
    }

    pub fn with_affinity(weights: ScoringWeights, affinity: Arc<dyn AffinityLookup>) -> Self {
        Self {
            weights,
            affinity: Some(affinity),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score every item and return them best-first.
    ///
    /// Never drops items. A single non-finite score fails the whole batch.
    pub async fn score(
        &self,
        items: &[RawContentItem],
        sort_mode: SortMode,
        ctx: &ScoringContext<'_>,
    ) -> Result<Vec<ScoredItem>> {
        let affinities = match sort_mode {
            SortMode::Relevance => self.load_affinities(items, ctx.viewer_id).await,
            SortMode::Newest => HashMap::new(),
        };

        let mut scored = Vec::with_capacity(items.len());
        for item in items {
            let score = match sort_mode {
                SortMode::Newest => newest_score(item),
                SortMode::Relevance => {
                    let affinity = affinities
                        .get(item.author_id.as_str())
                        .copied()
                        .unwrap_or(NEUTRAL_AFFINITY);
                    self.relevance_score(item, ctx, affinity)
                }
            };

            if !score.is_finite() {
                return Err(FeedError::Scoring(format!(
                    "non-finite score {} for {} {}",
                    score, item.kind, item.id
                )));
            }

            let priority = if is_followed(ctx.following, &item.author_id) {
                Priority::Graph
            } else {
                Priority::Discovery
            };

            scored.push(ScoredItem {
                item: item.clone(),
                score,
                priority,
            });
        }

        scored.sort_by(compare_scored);
        Ok(scored)
    }

    fn relevance_score(&self, item: &RawContentItem, ctx: &ScoringContext<'_>, affinity: f64) -> f64 {
        let w = &self.weights;

        let age_ms = (ctx.now - item.created_at).num_milliseconds().max(0);
        let age_hours = age_ms as f64 / 3_600_000.0;
        let recency = exponential_decay(age_hours, w.half_life_hours);

        let engagement = w.reaction_weight * item.reaction_count as f64
            + w.comment_weight * item.comment_count as f64
            + w.vote_weight * item.vote_count.unwrap_or(0) as f64;
        let engagement_factor = 1.0 + engagement.ln_1p();

        let follow_factor = if is_followed(ctx.following, &item.author_id) {
            1.0 + w.follow_boost
        } else {
            1.0
        };
        let affinity_factor = 1.0 + w.affinity_boost * affinity.clamp(0.0, 1.0);

        recency * engagement_factor * follow_factor * affinity_factor
    }

    /// One lookup per distinct author. Failures degrade to neutral.
    async fn load_affinities<'a>(
        &self,
        items: &'a [RawContentItem],
        viewer_id: &str,
    ) -> HashMap<&'a str, f64> {
        let Some(lookup) = &self.affinity else {
            return HashMap::new();
        };

        let authors: HashSet<&str> = items
            .iter()
            .map(|item| item.author_id.as_str())
            .filter(|author| !author.is_empty())
            .collect();

        let results = join_all(authors.into_iter().map(|author| async move {
            (author, lookup.affinity(viewer_id, author).await)
        }))
        .await;

        let mut affinities = HashMap::with_capacity(results.len());
        let mut failures = 0usize;
        for (author, result) in results {
            match result {
                Ok(weight) if weight.is_finite() => {
                    affinities.insert(author, weight);
                }
                Ok(weight) => {
                    warn!(viewer_id, author_id = author, weight, "Ignoring non-finite affinity");
                }
                Err(e) => {
                    failures += 1;
                    debug!(viewer_id, author_id = author, error = %e, "Affinity lookup failed");
                }
            }
        }

        if failures > 0 {
            warn!(viewer_id, failures, "Affinity lookup degraded to neutral weights");
            metrics::record_degraded("affinity");
        }

        affinities
    }
}

fn is_followed(following: &HashSet<String>, author_id: &str) -> bool {
    !author_id.is_empty() && following.contains(author_id)
}

/// Microsecond timestamps stay exact in an f64 for centuries around the epoch.
fn newest_score(item: &RawContentItem) -> f64 {
    item.created_at.timestamp_micros() as f64
}

/// Score descending, then `created_at` descending, then `id` descending.
pub fn compare_scored(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.item.created_at.cmp(&a.item.created_at))
        .then_with(|| b.item.id.cmp(&a.item.id))
}
