// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod config;
pub mod error;
pub mod mapper;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod rule;
pub mod sink;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::config::Config;
pub use crate::error::{FailureKind, PipelineError};
pub use crate::pipeline::{Pipeline, RunSummary, Stage};
pub use crate::rule::Rule;
pub use crate::sink::OutputFormat;
pub use crate::source::{FeedSource, FixtureFeedSource, HttpFeedSource};

/// Run the pipeline once against the HTTP source.
pub async fn run_configured(config: Config) -> Result<RunSummary, PipelineError> {
    Pipeline::new(config, HttpFeedSource::new()).run().await
}
