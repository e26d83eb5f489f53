use anyhow::{bail, Context};
use feed_engine::models::{ContentKind, FeedMode, FeedQuery, FeedTab, NewContentQuery, SortMode};
use feed_engine::services::{
    AffinityLookup, ContentSources, FeedComposer, FeedScorer, PgContentRepository,
    PgGraphResolver, RedisAffinityLookup, SocialGraphResolver,
};
use feed_engine::{Config, ContentFetcher, FeedFixture};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One request, read from `FEED_QUERY_*`.
#[derive(Debug, Deserialize)]
struct HarnessQuery {
    viewer_id: String,
    #[serde(default = "default_feed_mode")]
    feed_mode: FeedMode,
    #[serde(default = "default_tab")]
    tab: FeedTab,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    sort_mode: SortMode,
    /// Switches to a new-content count
    #[serde(default)]
    since: Option<String>,
}

fn default_feed_mode() -> FeedMode {
    FeedMode::GraphPlusDiscovery
}

fn default_tab() -> FeedTab {
    FeedTab::Home
}

fn default_limit() -> usize {
    20
}

struct Collaborators {
    graph: Arc<dyn SocialGraphResolver>,
    sources: ContentSources,
    affinity: Option<Arc<dyn AffinityLookup>>,
}

async fn build_collaborators(config: &Config) -> anyhow::Result<Collaborators> {
    let mut collaborators = if let Some(database) = &config.database {
        let pool = PgPoolOptions::new()
            .max_connections(database.max_connections)
            .connect(&database.url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        info!(max_connections = database.max_connections, "Using PostgreSQL collaborators");

        Collaborators {
            graph: Arc::new(PgGraphResolver::new(
                pool.clone(),
                config.composer.max_following,
            )),
            sources: ContentSources::new(
                Arc::new(PgContentRepository::new(pool.clone(), ContentKind::ShortPost)),
                Arc::new(PgContentRepository::new(pool.clone(), ContentKind::Poll)),
                Arc::new(PgContentRepository::new(pool, ContentKind::Story)),
            ),
            affinity: None,
        }
    } else if let Some(path) = &config.fixture_path {
        let fixture = FeedFixture::from_path(path).await?;
        Collaborators {
            graph: Arc::new(fixture.graph()),
            sources: fixture.sources(),
            affinity: Some(Arc::new(fixture.affinity_lookup())),
        }
    } else {
        bail!("Set DATABASE_URL or FEED_FIXTURE_PATH");
    };

    if let Some(redis) = &config.redis {
        let client = redis::Client::open(redis.url.clone()).context("Failed to create Redis client")?;
        collaborators.affinity = Some(Arc::new(RedisAffinityLookup::new(client)));
        info!("Using Redis affinity lookup");
    }

    Ok(collaborators)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Output goes to stdout; logs to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("Failed to load config")?;
    info!("Starting {}", config.service.service_name);

    let request: HarnessQuery = envy::prefixed("FEED_QUERY_")
        .from_env()
        .context("Failed to read FEED_QUERY_* request")?;

    let collaborators = build_collaborators(&config).await?;
    let scorer = match collaborators.affinity {
        Some(affinity) => FeedScorer::with_affinity(config.scoring.clone(), affinity),
        None => FeedScorer::new(config.scoring.clone()),
    };
    let composer = FeedComposer::new(
        collaborators.graph,
        ContentFetcher::new(collaborators.sources),
        scorer,
        config.composer.clone(),
    );

    let output = match request.since {
        Some(since) => {
            let query = NewContentQuery {
                feed_mode: request.feed_mode,
                tab: request.tab,
                since,
            };
            composer
                .count_new(&request.viewer_id, &query)
                .await
                .map(serde_json::to_value)
        }
        None => {
            let query = FeedQuery {
                feed_mode: request.feed_mode,
                tab: request.tab,
                cursor: request.cursor,
                limit: request.limit,
                sort_mode: request.sort_mode,
            };
            composer
                .compose(&request.viewer_id, &query)
                .await
                .map(serde_json::to_value)
        }
    };

    match output {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value?)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Request failed");
            println!("{}", serde_json::to_string_pretty(&e.to_body())?);
            std::process::exit(if e.is_client_error() { 2 } else { 1 });
        }
    }
}
