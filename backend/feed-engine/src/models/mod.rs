//! Feed data model
//!
//! Request/response envelopes and the kind-agnostic `RawContentItem` that
//! every content kind is normalized into before ranking.

pub mod records;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

pub use records::{
    EmbeddedAuthor, NativeRecord, PollOption, PollRecord, PollStatus, ShortPostRecord,
    StatusConstraints, StoryRecord,
};

/// Content kinds that can appear in a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    ShortPost,
    Poll,
    Story,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::ShortPost, ContentKind::Poll, ContentKind::Story];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::ShortPost => "short_post",
            ContentKind::Poll => "poll",
            ContentKind::Story => "story",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content identifier.
///
/// Ids are assigned monotonically at creation time, so within one kind a
/// larger id is always a newer item. The same value doubles as the opaque
/// pagination cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub i64);

impl ContentId {
    /// Parse a client-supplied cursor token.
    pub fn parse_cursor(raw: &str) -> Result<Self, FeedError> {
        raw.parse()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(FeedError::InvalidCursor("cursor is empty".to_string()));
        }
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| FeedError::InvalidCursor(format!("malformed cursor '{}'", s)))?;
        if value < 0 {
            return Err(FeedError::InvalidCursor(format!(
                "cursor '{}' is out of range",
                s
            )));
        }
        Ok(ContentId(value))
    }
}

/// Kind-agnostic envelope produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContentItem {
    pub id: ContentId,
    pub kind: ContentKind,
    pub payload: ContentPayload,
    pub created_at: DateTime<Utc>,
    /// Empty when the source record carries no resolvable author.
    pub author_id: String,
    pub reaction_count: u64,
    pub comment_count: u64,
    /// Only set for polls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
}

/// Kind-specific body of an item. Ranking and diversity never look inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentPayload {
    ShortPost(ShortPostPayload),
    Poll(PollPayload),
    Story(StoryPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortPostPayload {
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPayload {
    pub question: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPayload {
    pub title: String,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

/// Which fetch plan produced an item. Observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Graph,
    Discovery,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Graph => "graph",
            Priority::Discovery => "discovery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: RawContentItem,
    pub score: f64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedMode {
    /// Only authors the viewer follows.
    GraphOnly,
    /// Followed authors plus a minority share of everyone else ("for you").
    GraphPlusDiscovery,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::GraphOnly => "graph_only",
            FeedMode::GraphPlusDiscovery => "graph_plus_discovery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedTab {
    Home,
    ShortPost,
    Poll,
    Story,
}

impl FeedTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedTab::Home => "home",
            FeedTab::ShortPost => "short_post",
            FeedTab::Poll => "poll",
            FeedTab::Story => "story",
        }
    }

    /// The single kind shown by a kind tab; `None` for the aggregate tab.
    pub fn kind(&self) -> Option<ContentKind> {
        match self {
            FeedTab::Home => None,
            FeedTab::ShortPost => Some(ContentKind::ShortPost),
            FeedTab::Poll => Some(ContentKind::Poll),
            FeedTab::Story => Some(ContentKind::Story),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, FeedTab::Home)
    }

    /// Kinds that must be fetched to serve this tab.
    pub fn kinds(&self) -> Vec<ContentKind> {
        match self.kind() {
            Some(kind) => vec![kind],
            None => ContentKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    /// Pure reverse-chronological order.
    Newest,
    /// Recency decay combined with engagement and viewer affinity.
    #[default]
    Relevance,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Newest => "newest",
            SortMode::Relevance => "relevance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub feed_mode: FeedMode,
    pub tab: FeedTab,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sort_mode: SortMode,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetadata {
    pub feed_mode: FeedMode,
    pub tab: FeedTab,
    pub sort_mode: SortMode,
    /// Set when part of the feed could not be loaded and was left out.
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_kinds: Vec<ContentKind>,
    #[serde(default)]
    pub graph_degraded: bool,
}

impl FeedMetadata {
    pub fn for_query(query: &FeedQuery) -> Self {
        Self {
            feed_mode: query.feed_mode,
            tab: query.tab,
            sort_mode: query.sort_mode,
            degraded: false,
            degraded_kinds: Vec::new(),
            graph_degraded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub items: Vec<ScoredItem>,
    pub pagination: Pagination,
    pub metadata: FeedMetadata,
}

impl FeedResponse {
    pub fn empty(query: &FeedQuery) -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination {
                next_cursor: None,
                has_more: false,
                count: 0,
            },
            metadata: FeedMetadata::for_query(query),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContentQuery {
    pub feed_mode: FeedMode,
    pub tab: FeedTab,
    pub since: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContentCount {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_parsing() {
        assert_eq!(ContentId::parse_cursor("105").unwrap(), ContentId(105));
        assert_eq!(ContentId::parse_cursor(" 7 ").unwrap(), ContentId(7));
        assert!(matches!(
            ContentId::parse_cursor("abc"),
            Err(FeedError::InvalidCursor(_))
        ));
        assert!(matches!(
            ContentId::parse_cursor(""),
            Err(FeedError::InvalidCursor(_))
        ));
        assert!(matches!(
            ContentId::parse_cursor("-3"),
            Err(FeedError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_tab_kinds() {
        assert_eq!(FeedTab::Home.kinds().len(), 3);
        assert_eq!(FeedTab::Poll.kinds(), vec![ContentKind::Poll]);
        assert!(FeedTab::Home.is_aggregate());
        assert!(!FeedTab::Story.is_aggregate());
    }

    #[test]
    fn test_query_defaults_from_json() {
        let query: FeedQuery =
            serde_json::from_str(r#"{"feedMode":"graphOnly","tab":"home"}"#).unwrap();
        assert_eq!(query.limit, 20);
        assert_eq!(query.sort_mode, SortMode::Relevance);
        assert!(query.cursor.is_none());
    }

    #[test]
    fn test_scored_item_serializes_flat() {
        let item = ScoredItem {
            item: RawContentItem {
                id: ContentId(42),
                kind: ContentKind::Poll,
                payload: ContentPayload::Poll(PollPayload {
                    question: "Tabs or spaces?".to_string(),
                    options: vec![],
                    ends_at: None,
                }),
                created_at: Utc::now(),
                author_id: "alice".to_string(),
                reaction_count: 1,
                comment_count: 2,
                vote_count: Some(3),
            },
            score: 0.5,
            priority: Priority::Graph,
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["kind"], "poll");
        assert_eq!(json["payload"]["type"], "poll");
        assert_eq!(json["voteCount"], 3);
        assert_eq!(json["priority"], "graph");
    }
}
