pub mod composer;
pub mod content;
pub mod diversity;
pub mod fanout;
pub mod fetch;
pub mod graph;
pub mod normalize;
pub mod quota;
pub mod ranking;

pub use composer::FeedComposer;
pub use content::{
    AuthorFilter, ContentFilter, ContentRepository, ContentSources, CountFilter,
    InMemoryContentRepository, PgContentRepository,
};
pub use diversity::DiversityLayer;
pub use fetch::ContentFetcher;
pub use graph::{PgGraphResolver, SocialGraphResolver, StaticGraphResolver};
pub use quota::QuotaPolicy;
pub use ranking::{
    AffinityLookup, FeedScorer, RedisAffinityLookup, ScoringContext, ScoringWeights,
    StaticAffinityLookup,
};
