use super::{AuthorFilter, ContentFilter, ContentRepository, CountFilter};
use crate::models::{
    ContentId, ContentKind, EmbeddedAuthor, NativeRecord, PollOption, PollRecord, PollStatus,
    ShortPostRecord, StatusConstraints, StoryRecord,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Read-only repository over the content tables owned by content-service.
#[derive(Clone)]
pub struct PgContentRepository {
    pool: PgPool,
    kind: ContentKind,
}

impl PgContentRepository {
    pub fn new(pool: PgPool, kind: ContentKind) -> Self {
        Self { pool, kind }
    }

    fn table(&self) -> &'static str {
        match self.kind {
            ContentKind::ShortPost => "posts",
            ContentKind::Poll => "polls",
            ContentKind::Story => "stories",
        }
    }

    fn author_expr(&self) -> &'static str {
        match self.kind {
            ContentKind::ShortPost => "author_id",
            ContentKind::Poll => "creator_id",
            ContentKind::Story => "COALESCE(NULLIF(author_external_id, ''), author_id)",
        }
    }

    fn columns(&self) -> &'static str {
        match self.kind {
            ContentKind::ShortPost => {
                "id, author_id, author_display_name, content, media_urls, like_count, \
                 comment_count, created_at, is_deleted"
            }
            ContentKind::Poll => {
                "id, creator_id, question, options, status, total_votes, reaction_count, \
                 comment_count, created_at, ends_at, is_deleted"
            }
            ContentKind::Story => {
                "id, author_external_id, author_display_name, author_id, title, body, \
                 cover_image_url, published, reaction_count, comment_count, created_at, is_deleted"
            }
        }
    }

    fn push_constraints(
        &self,
        builder: &mut QueryBuilder<'_, Postgres>,
        status: &StatusConstraints,
        author_filter: &AuthorFilter,
    ) {
        if status.exclude_deleted {
            builder.push(" AND is_deleted = FALSE");
        }
        if status.exclude_closed && self.kind == ContentKind::Poll {
            builder.push(" AND status <> 'closed'");
        }
        if status.require_published && self.kind == ContentKind::Story {
            builder.push(" AND published = TRUE");
        }

        match author_filter {
            AuthorFilter::Any => {}
            AuthorFilter::In(set) => {
                let ids: Vec<String> = set.iter().cloned().collect();
                builder
                    .push(" AND ")
                    .push(self.author_expr())
                    .push(" = ANY(")
                    .push_bind(ids)
                    .push(")");
            }
            AuthorFilter::NotIn(set) if set.is_empty() => {}
            AuthorFilter::NotIn(set) => {
                let ids: Vec<String> = set.iter().cloned().collect();
                builder
                    .push(" AND (")
                    .push(self.author_expr())
                    .push(" IS NULL OR NOT (")
                    .push(self.author_expr())
                    .push(" = ANY(")
                    .push_bind(ids)
                    .push(")))");
            }
        }
    }

    async fn find_posts(&self, mut builder: QueryBuilder<'_, Postgres>) -> Result<Vec<NativeRecord>> {
        let rows = builder.build_query_as::<PostRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(PostRow::into_record).collect())
    }

    async fn find_polls(&self, mut builder: QueryBuilder<'_, Postgres>) -> Result<Vec<NativeRecord>> {
        let rows = builder.build_query_as::<PollRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(PollRow::into_record).collect())
    }

    async fn find_stories(
        &self,
        mut builder: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<NativeRecord>> {
        let rows = builder.build_query_as::<StoryRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(StoryRow::into_record).collect())
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    fn kind(&self) -> ContentKind {
        self.kind
    }

    async fn find(&self, filter: &ContentFilter) -> Result<Vec<NativeRecord>> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        builder
            .push(self.columns())
            .push(" FROM ")
            .push(self.table())
            .push(" WHERE TRUE");
        self.push_constraints(&mut builder, &filter.status, &filter.author_filter);
        if let Some(cursor) = filter.cursor {
            builder.push(" AND id < ").push_bind(cursor.0);
        }
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.quota as i64);

        let records = match self.kind {
            ContentKind::ShortPost => self.find_posts(builder).await,
            ContentKind::Poll => self.find_polls(builder).await,
            ContentKind::Story => self.find_stories(builder).await,
        };

        records.with_context(|| format!("Failed to query {}", self.table()))
    }

    async fn count_newer(&self, filter: &CountFilter) -> Result<u64> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM ");
        builder.push(self.table()).push(" WHERE TRUE");
        self.push_constraints(&mut builder, &filter.status, &filter.author_filter);
        builder.push(" AND id > ").push_bind(filter.since.0);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", self.table()))?;

        Ok(count.max(0) as u64)
    }

    async fn exists(&self, id: ContentId) -> Result<bool> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT EXISTS(SELECT 1 FROM ");
        builder
            .push(self.table())
            .push(" WHERE id = ")
            .push_bind(id.0)
            .push(")");

        let exists = builder
            .build_query_scalar::<bool>()
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to look up {} {}", self.table(), id))?;

        Ok(exists)
    }
}

fn non_negative(value: i64) -> u64 {
    value.max(0) as u64
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    author_id: Option<String>,
    author_display_name: Option<String>,
    content: String,
    media_urls: Option<Vec<String>>,
    like_count: i64,
    comment_count: i64,
    created_at: DateTime<Utc>,
    is_deleted: bool,
}

impl PostRow {
    fn into_record(self) -> NativeRecord {
        let author = (self.author_id.is_some() || self.author_display_name.is_some()).then(|| {
            EmbeddedAuthor {
                external_id: self.author_id,
                display_name: self.author_display_name,
            }
        });

        NativeRecord::ShortPost(ShortPostRecord {
            id: ContentId(self.id),
            author,
            text: self.content,
            media_urls: self.media_urls.unwrap_or_default(),
            created_at: self.created_at,
            like_count: non_negative(self.like_count),
            comment_count: non_negative(self.comment_count),
            is_deleted: self.is_deleted,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PollRow {
    id: i64,
    creator_id: Option<String>,
    question: String,
    options: Json<Vec<PollOption>>,
    status: String,
    total_votes: i64,
    reaction_count: i64,
    comment_count: i64,
    created_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    is_deleted: bool,
}

impl PollRow {
    fn into_record(self) -> NativeRecord {
        let status = if self.status == PollStatus::Closed.as_str() {
            PollStatus::Closed
        } else {
            PollStatus::Active
        };

        NativeRecord::Poll(PollRecord {
            id: ContentId(self.id),
            creator_id: self.creator_id,
            question: self.question,
            options: self.options.0,
            status,
            total_votes: non_negative(self.total_votes),
            reaction_count: non_negative(self.reaction_count),
            comment_count: non_negative(self.comment_count),
            created_at: self.created_at,
            ends_at: self.ends_at,
            is_deleted: self.is_deleted,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StoryRow {
    id: i64,
    author_external_id: Option<String>,
    author_display_name: Option<String>,
    author_id: Option<String>,
    title: String,
    body: String,
    cover_image_url: Option<String>,
    published: bool,
    reaction_count: i64,
    comment_count: i64,
    created_at: DateTime<Utc>,
    is_deleted: bool,
}

impl StoryRow {
    fn into_record(self) -> NativeRecord {
        let author = self.author_external_id.map(|external_id| EmbeddedAuthor {
            external_id: Some(external_id),
            display_name: self.author_display_name,
        });

        NativeRecord::Story(StoryRecord {
            id: ContentId(self.id),
            author,
            author_id: self.author_id,
            title: self.title,
            body: self.body,
            cover_image_url: self.cover_image_url,
            published: self.published,
            reaction_count: non_negative(self.reaction_count),
            comment_count: non_negative(self.comment_count),
            created_at: self.created_at,
            is_deleted: self.is_deleted,
        })
    }
}
