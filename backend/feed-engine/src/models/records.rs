use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentId, ContentKind};

/// Author object embedded in a record by the owning repository.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedAuthor {
    /// Identity used by the social graph.
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortPostRecord {
    pub id: ContentId,
    #[serde(default)]
    pub author: Option<EmbeddedAuthor>,
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PollStatus {
    #[default]
    Active,
    Closed,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Active => "active",
            PollStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub label: String,
    #[serde(default)]
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRecord {
    pub id: ContentId,
    #[serde(default)]
    pub creator_id: Option<String>,
    pub question: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub status: PollStatus,
    #[serde(default)]
    pub total_votes: u64,
    #[serde(default)]
    pub reaction_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub id: ContentId,
    #[serde(default)]
    pub author: Option<EmbeddedAuthor>,
    /// Legacy flat author column, still populated for older stories.
    #[serde(default)]
    pub author_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub reaction_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// A record as stored by one of the content repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NativeRecord {
    ShortPost(ShortPostRecord),
    Poll(PollRecord),
    Story(StoryRecord),
}

impl NativeRecord {
    pub fn kind(&self) -> ContentKind {
        match self {
            NativeRecord::ShortPost(_) => ContentKind::ShortPost,
            NativeRecord::Poll(_) => ContentKind::Poll,
            NativeRecord::Story(_) => ContentKind::Story,
        }
    }

    pub fn id(&self) -> ContentId {
        match self {
            NativeRecord::ShortPost(r) => r.id,
            NativeRecord::Poll(r) => r.id,
            NativeRecord::Story(r) => r.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            NativeRecord::ShortPost(r) => r.created_at,
            NativeRecord::Poll(r) => r.created_at,
            NativeRecord::Story(r) => r.created_at,
        }
    }

    /// Whether the record is visible under the given status constraints.
    pub fn satisfies(&self, constraints: &StatusConstraints) -> bool {
        let (deleted, closed, published) = match self {
            NativeRecord::ShortPost(r) => (r.is_deleted, false, true),
            NativeRecord::Poll(r) => (r.is_deleted, r.status == PollStatus::Closed, true),
            NativeRecord::Story(r) => (r.is_deleted, false, r.published),
        };

        !(constraints.exclude_deleted && deleted
            || constraints.exclude_closed && closed
            || constraints.require_published && !published)
    }
}

/// Visibility rules a repository applies on top of author and cursor filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusConstraints {
    pub exclude_deleted: bool,
    pub exclude_closed: bool,
    pub require_published: bool,
}

impl StatusConstraints {
    pub fn for_kind(kind: ContentKind) -> Self {
        match kind {
            ContentKind::ShortPost => Self {
                exclude_deleted: true,
                ..Self::default()
            },
            ContentKind::Poll => Self {
                exclude_deleted: true,
                exclude_closed: true,
                ..Self::default()
            },
            ContentKind::Story => Self {
                exclude_deleted: true,
                require_published: true,
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(status: PollStatus, is_deleted: bool) -> NativeRecord {
        NativeRecord::Poll(PollRecord {
            id: ContentId(1),
            creator_id: Some("carol".to_string()),
            question: "Coffee or tea?".to_string(),
            options: vec![],
            status,
            total_votes: 0,
            reaction_count: 0,
            comment_count: 0,
            created_at: Utc::now(),
            ends_at: None,
            is_deleted,
        })
    }

    #[test]
    fn test_closed_and_deleted_polls_are_hidden() {
        let constraints = StatusConstraints::for_kind(ContentKind::Poll);
        assert!(poll(PollStatus::Active, false).satisfies(&constraints));
        assert!(!poll(PollStatus::Closed, false).satisfies(&constraints));
        assert!(!poll(PollStatus::Active, true).satisfies(&constraints));
        // Without constraints everything is visible
        assert!(poll(PollStatus::Closed, true).satisfies(&StatusConstraints::default()));
    }

    #[test]
    fn test_unpublished_stories_are_hidden() {
        let story = |published| {
            NativeRecord::Story(StoryRecord {
                id: ContentId(9),
                author: None,
                author_id: Some("dave".to_string()),
                title: "Draft".to_string(),
                body: String::new(),
                cover_image_url: None,
                published,
                reaction_count: 0,
                comment_count: 0,
                created_at: Utc::now(),
                is_deleted: false,
            })
        };
        let constraints = StatusConstraints::for_kind(ContentKind::Story);
        assert!(story(true).satisfies(&constraints));
        assert!(!story(false).satisfies(&constraints));
    }
}
