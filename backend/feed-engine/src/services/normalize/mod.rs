//! Item normalizer
//!
//! Maps each kind's native record into a `RawContentItem`. Author identity
//! is resolved by a fixed per-kind adapter rather than by inspecting the
//! record's shape at runtime.

use crate::models::{
    ContentKind, ContentPayload, EmbeddedAuthor, NativeRecord, PollPayload, PollRecord,
    RawContentItem, ShortPostPayload, ShortPostRecord, StoryPayload, StoryRecord,
};

/// Maximum characters of a story body carried in the feed excerpt
const STORY_EXCERPT_CHARS: usize = 280;

pub fn normalize(record: NativeRecord) -> RawContentItem {
    match record {
        NativeRecord::ShortPost(r) => normalize_short_post(r),
        NativeRecord::Poll(r) => normalize_poll(r),
        NativeRecord::Story(r) => normalize_story(r),
    }
}

/// Author identity of a native record; empty when nothing resolves.
pub fn author_id(record: &NativeRecord) -> String {
    match record {
        NativeRecord::ShortPost(r) => short_post_author(r),
        NativeRecord::Poll(r) => poll_author(r),
        NativeRecord::Story(r) => story_author(r),
    }
}

fn embedded_identity(author: Option<&EmbeddedAuthor>) -> Option<&str> {
    author
        .and_then(|a| a.external_id.as_deref())
        .filter(|id| !id.is_empty())
}

fn flat_identity(author_id: Option<&String>) -> Option<&str> {
    author_id.map(String::as_str).filter(|id| !id.is_empty())
}

fn short_post_author(record: &ShortPostRecord) -> String {
    embedded_identity(record.author.as_ref())
        .unwrap_or_default()
        .to_string()
}

fn poll_author(record: &PollRecord) -> String {
    flat_identity(record.creator_id.as_ref())
        .unwrap_or_default()
        .to_string()
}

// Stories carry both shapes; the embedded author wins over the legacy column.
fn story_author(record: &StoryRecord) -> String {
    embedded_identity(record.author.as_ref())
        .or_else(|| flat_identity(record.author_id.as_ref()))
        .unwrap_or_default()
        .to_string()
}

fn normalize_short_post(record: ShortPostRecord) -> RawContentItem {
    let author_id = short_post_author(&record);
    RawContentItem {
        id: record.id,
        kind: ContentKind::ShortPost,
        payload: ContentPayload::ShortPost(ShortPostPayload {
            text: record.text,
            media_urls: record.media_urls,
        }),
        created_at: record.created_at,
        author_id,
        reaction_count: record.like_count,
        comment_count: record.comment_count,
        vote_count: None,
    }
}

fn normalize_poll(record: PollRecord) -> RawContentItem {
    let author_id = poll_author(&record);
    RawContentItem {
        id: record.id,
        kind: ContentKind::Poll,
        payload: ContentPayload::Poll(PollPayload {
            question: record.question,
            options: record.options,
            ends_at: record.ends_at,
        }),
        created_at: record.created_at,
        author_id,
        reaction_count: record.reaction_count,
        comment_count: record.comment_count,
        vote_count: Some(record.total_votes),
    }
}

fn normalize_story(record: StoryRecord) -> RawContentItem {
    let author_id = story_author(&record);
    RawContentItem {
        id: record.id,
        kind: ContentKind::Story,
        payload: ContentPayload::Story(StoryPayload {
            title: record.title,
            excerpt: excerpt(&record.body),
            cover_image_url: record.cover_image_url,
        }),
        created_at: record.created_at,
        author_id,
        reaction_count: record.reaction_count,
        comment_count: record.comment_count,
        vote_count: None,
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(STORY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}…", body[..cut].trim_end()),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentId, PollOption, PollStatus};
    use chrono::Utc;

    fn short_post(author: Option<EmbeddedAuthor>) -> ShortPostRecord {
        ShortPostRecord {
            id: ContentId(10),
            author,
            text: "hello".to_string(),
            media_urls: vec![],
            created_at: Utc::now(),
            like_count: 4,
            comment_count: 1,
            is_deleted: false,
        }
    }

    fn story(author: Option<EmbeddedAuthor>, author_id: Option<&str>) -> StoryRecord {
        StoryRecord {
            id: ContentId(30),
            author,
            author_id: author_id.map(str::to_string),
            title: "Long read".to_string(),
            body: "Once upon a time".to_string(),
            cover_image_url: None,
            published: true,
            reaction_count: 2,
            comment_count: 0,
            created_at: Utc::now(),
            is_deleted: false,
        }
    }

    fn embedded(id: &str) -> Option<EmbeddedAuthor> {
        Some(EmbeddedAuthor {
            external_id: Some(id.to_string()),
            display_name: None,
        })
    }

    #[test]
    fn test_short_post_uses_embedded_author() {
        let item = normalize(NativeRecord::ShortPost(short_post(embedded("alice"))));
        assert_eq!(item.kind, ContentKind::ShortPost);
        assert_eq!(item.author_id, "alice");
        assert_eq!(item.reaction_count, 4);
        assert_eq!(item.vote_count, None);
    }

    #[test]
    fn test_missing_author_becomes_empty_string() {
        let item = normalize(NativeRecord::ShortPost(short_post(None)));
        assert_eq!(item.author_id, "");

        let item = normalize(NativeRecord::ShortPost(short_post(Some(
            EmbeddedAuthor::default(),
        ))));
        assert_eq!(item.author_id, "");
    }

    #[test]
    fn test_story_prefers_embedded_then_flat() {
        let both = normalize(NativeRecord::Story(story(embedded("bob"), Some("legacy"))));
        assert_eq!(both.author_id, "bob");

        let flat_only = normalize(NativeRecord::Story(story(None, Some("legacy"))));
        assert_eq!(flat_only.author_id, "legacy");

        let empty_embedded = normalize(NativeRecord::Story(story(
            Some(EmbeddedAuthor::default()),
            Some("legacy"),
        )));
        assert_eq!(empty_embedded.author_id, "legacy");

        let neither = normalize(NativeRecord::Story(story(None, None)));
        assert_eq!(neither.author_id, "");
    }

    #[test]
    fn test_poll_carries_vote_count() {
        let record = PollRecord {
            id: ContentId(20),
            creator_id: Some("carol".to_string()),
            question: "Best editor?".to_string(),
            options: vec![PollOption {
                label: "vim".to_string(),
                vote_count: 7,
            }],
            status: PollStatus::Active,
            total_votes: 7,
            reaction_count: 1,
            comment_count: 3,
            created_at: Utc::now(),
            ends_at: None,
            is_deleted: false,
        };

        let item = normalize(NativeRecord::Poll(record));
        assert_eq!(item.kind, ContentKind::Poll);
        assert_eq!(item.author_id, "carol");
        assert_eq!(item.vote_count, Some(7));
    }

    #[test]
    fn test_story_excerpt_is_truncated() {
        let mut record = story(None, Some("dave"));
        record.body = "x".repeat(STORY_EXCERPT_CHARS + 50);

        let item = normalize(NativeRecord::Story(record));
        match item.payload {
            ContentPayload::Story(payload) => {
                assert_eq!(payload.excerpt.chars().count(), STORY_EXCERPT_CHARS + 1);
                assert!(payload.excerpt.ends_with('…'));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
