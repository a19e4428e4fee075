// src/pipeline.rs
//! One run: compile → fetch → filter → map → serialize → write.
//!
//! A [`Pipeline`] is consumed by [`Pipeline::run`]; stages only move forward
//! and the first error ends the run in `Failed(kind)`.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;

use crate::config::Config;
use crate::error::{FailureKind, FetchError, PipelineError};
use crate::mapper::{map_feed, map_item, MetaTemplates};
use crate::model::CanonicalFeed;
use crate::output::Destination;
use crate::rule::{ItemFields, Rule};
use crate::sink::{self, OutputFormat};
use crate::source::{FeedSource, SourceFeed, SourceItem};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_items_fetched_total", "Items parsed from the source feed.");
        describe_counter!("feed_items_kept_total", "Items accepted by include_if.");
        describe_counter!("feed_items_dropped_total", "Items rejected by include_if.");
        describe_counter!("feed_fetch_errors_total", "Source fetch errors.");
        describe_histogram!("feed_fetch_ms", "Fetch + parse time in milliseconds.");
        describe_gauge!(
            "feed_pipeline_last_run_ts",
            "Unix ts when a pipeline run last completed."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configured,
    Compiled,
    Fetched,
    Filtered,
    Mapped,
    Emitted,
    Failed(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub kept: usize,
    pub format: OutputFormat,
    pub destination: Destination,
    /// Stages visited, in order.
    pub stages: Vec<Stage>,
}

pub struct Pipeline {
    config: Config,
    source: Box<dyn FeedSource>,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(config: Config, source: impl FeedSource + 'static) -> Self {
        Self {
            config,
            source: Box::new(source),
            stages: vec![Stage::Configured],
        }
    }

    pub async fn run(mut self) -> Result<RunSummary, PipelineError> {
        ensure_metrics_described();
        match self.execute().await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.advance(Stage::Failed(e.kind()));
                tracing::error!(
                    target: "pipeline",
                    phase = e.phase(),
                    stages = ?self.stages,
                    error = %e,
                    "pipeline run failed"
                );
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<RunSummary, PipelineError> {
        // Compile first: a bad rule should not cost a network round trip.
        let rule = Rule::compile(&self.config.include_if)?;
        self.advance(Stage::Compiled);

        let feed = self.fetch().await?;
        self.advance(Stage::Fetched);
        counter!("feed_items_fetched_total").increment(feed.items.len() as u64);

        let kept = filter_items(&rule, &feed.items)?;
        self.advance(Stage::Filtered);
        let dropped = feed.items.len() - kept.len();
        counter!("feed_items_kept_total").increment(kept.len() as u64);
        counter!("feed_items_dropped_total").increment(dropped as u64);

        let canonical = build_feed(&feed, &kept, &self.config.meta);
        self.advance(Stage::Mapped);

        // Render fully before touching the destination.
        let bytes = sink::serialize(&canonical, self.config.to_fmt)?;
        let destination = Destination::parse(&self.config.to);
        destination.write_all(&bytes)?;
        self.advance(Stage::Emitted);

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        gauge!("feed_pipeline_last_run_ts").set(now as f64);

        tracing::info!(
            target: "pipeline",
            source = self.source.name(),
            fetched = feed.items.len(),
            kept = kept.len(),
            dropped = dropped,
            format = %self.config.to_fmt,
            destination = %destination,
            bytes = bytes.len(),
            "feed written"
        );

        Ok(RunSummary {
            fetched: feed.items.len(),
            kept: kept.len(),
            format: self.config.to_fmt,
            destination,
            stages: self.stages.clone(),
        })
    }

    /// Fetch under the configured deadline. The source gets the same value
    /// for its own request timeout; this outer bound also covers parsing.
    async fn fetch(&self) -> Result<SourceFeed, PipelineError> {
        let url = self.config.from.as_str();
        let timeout = self.config.fetch_timeout;
        let t0 = Instant::now();

        tracing::debug!(target: "pipeline", url, timeout = ?timeout, source = self.source.name(), "fetching feed");
        let feed = match tokio::time::timeout(timeout, self.source.fetch(url, timeout)).await {
            Ok(res) => res?,
            Err(_elapsed) => {
                counter!("feed_fetch_errors_total").increment(1);
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                }
                .into());
            }
        };

        histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(target: "pipeline", items = feed.items.len(), title = %feed.title, "feed parsed");
        Ok(feed)
    }

    fn advance(&mut self, stage: Stage) {
        tracing::trace!(target: "pipeline", ?stage, "stage");
        self.stages.push(stage);
    }
}

/// Apply `rule` to every item in source order. The first evaluation error
/// aborts with the offending item's index.
pub fn filter_items<'a>(
    rule: &Rule,
    items: &'a [SourceItem],
) -> Result<Vec<&'a SourceItem>, PipelineError> {
    let mut kept = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let keep = rule
            .evaluate(&ItemFields::from(item))
            .map_err(|source| PipelineError::Evaluate { index, source })?;
        if keep {
            kept.push(item);
        } else {
            tracing::trace!(target: "pipeline", index, title = %item.title, "item dropped");
        }
    }
    Ok(kept)
}

/// Feed metadata plus the accepted items, in order.
pub fn build_feed(source: &SourceFeed, kept: &[&SourceItem], meta: &MetaTemplates) -> CanonicalFeed {
    let mut feed = map_feed(source, meta);
    for item in kept {
        feed.add(map_item(item));
    }
    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::EvalError;

    fn item(title: &str, description: &str) -> SourceItem {
        SourceItem {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    #[test]
    fn filter_keeps_source_order() {
        let items = vec![
            item("a", "keep"),
            item("b", "drop"),
            item("c", "keep"),
            item("d", "keep"),
        ];
        let rule = Rule::compile("description == 'keep'").unwrap();
        let kept = filter_items(&rule, &items).unwrap();
        let titles: Vec<_> = kept.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c", "d"]);
    }

    #[test]
    fn accept_all_keeps_everything() {
        let items = vec![item("a", ""), item("b", "")];
        for src in ["", "   \n\t"] {
            let rule = Rule::compile(src).unwrap();
            assert!(rule.is_accept_all());
            assert_eq!(filter_items(&rule, &items).unwrap().len(), 2);
        }
    }

    #[test]
    fn evaluation_error_reports_item_index() {
        let items = vec![item("12", ""), item("x", ""), item("y", "")];
        let rule = Rule::compile("int(title) > 0").unwrap();
        match filter_items(&rule, &items) {
            Err(PipelineError::Evaluate { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(source, EvalError::InvalidConversion(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn build_feed_maps_only_kept_items() {
        let src = SourceFeed {
            title: "T".into(),
            items: vec![item("a", ""), item("b", "")],
            ..Default::default()
        };
        let kept = vec![&src.items[1]];
        let feed = build_feed(&src, &kept, &MetaTemplates::default());
        assert_eq!(feed.title, "T");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title, "b");
    }
}
