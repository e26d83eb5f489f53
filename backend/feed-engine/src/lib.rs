pub mod config;
pub mod error;
pub mod fixtures;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{ComposerConfig, Config};
pub use error::{ErrorBody, FeedError, Result};
pub use fixtures::FeedFixture;
pub use services::{ContentFetcher, DiversityLayer, FeedComposer, FeedScorer};
