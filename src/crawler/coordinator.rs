//! Harvest coordinator - one run from history load to summary
//!
//! A run loads the identifier history, estimates the page budget, walks the
//! listing pages, fetches details for what was accepted, commits the output
//! artifact and only then flushes the history.

use crate::config::{select_source, Config, HarvestConfig, PacingConfig};
use crate::crawler::budget::PageBudgetEstimator;
use crate::crawler::pipeline::{DetailFetchPipeline, PipelineSettings};
use crate::crawler::quota::QuotaBoundedCollector;
use crate::crawler::walker::{FrontierWalker, WalkReport, WalkSettings};
use crate::crawler::{HttpSessionFactory, SessionFactory};
use crate::output::{CsvSink, FlushStatus, OutputResult, OutputSink, RunSummary};
use crate::source::{SelectorSource, Source};
use crate::storage::{open_dedup_store, DedupStore};
use crate::GleanError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Drives one harvest run for a single source
pub struct RunCoordinator {
    source: Arc<dyn Source>,
    sessions: Arc<dyn SessionFactory>,
    dedup: DedupStore,
    harvest: HarvestConfig,
    pacing: PacingConfig,
    output_dir: PathBuf,
}

impl RunCoordinator {
    pub fn new(
        source: Arc<dyn Source>,
        sessions: Arc<dyn SessionFactory>,
        dedup: DedupStore,
        harvest: HarvestConfig,
        pacing: PacingConfig,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            source,
            sessions,
            dedup,
            harvest,
            pacing,
            output_dir,
        }
    }

    /// Builds a coordinator for the source picked from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `source` - Source name or `name/category` label; random when `None`
    /// * `category` - Optional category filter
    ///
    /// # Returns
    ///
    /// * `Ok(RunCoordinator)` - Ready to run
    /// * `Err(GleanError)` - No matching source, or the dedup store could not be opened
    pub fn from_config(
        config: &Config,
        source: Option<&str>,
        category: Option<&str>,
    ) -> Result<Self, GleanError> {
        let source_config = select_source(config, source, category)?;
        let source = SelectorSource::new(source_config.clone())?;
        let dedup = open_dedup_store(&config.dedup, source.dedup_scope())?;
        let sessions = HttpSessionFactory::new(config.session.clone());

        Ok(Self::new(
            Arc::new(source),
            Arc::new(sessions),
            dedup,
            config.harvest.clone(),
            config.pacing.clone(),
            PathBuf::from(&config.output.directory),
        ))
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Runs the harvest
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run finished; per-item failures are in the summary
    /// * `Err(GleanError)` - No session could be opened, or the output could not be created
    pub async fn run(&mut self) -> Result<RunSummary, GleanError> {
        self.run_with(|source, directory| {
            CsvSink::create(
                directory,
                source.name(),
                source.category(),
                source.columns(),
            )
        })
        .await
    }

    /// Runs the harvest, writing records to the sink `open_sink` creates
    ///
    /// The sink is only opened once the walk accepted at least one item.
    async fn run_with<S, F>(&mut self, open_sink: F) -> Result<RunSummary, GleanError>
    where
        S: OutputSink,
        F: FnOnce(&dyn Source, &Path) -> OutputResult<S>,
    {
        let started = Instant::now();
        let label = self.source.label();

        tracing::info!(
            "Starting harvest of {} (quota {}, {} worker(s))",
            label,
            self.harvest.quota,
            self.harvest.workers
        );

        self.dedup.load();

        let mut session =
            self.sessions
                .create()
                .map_err(|reason| GleanError::SessionUnavailable {
                    source_label: label.clone(),
                    reason,
                })?;

        let estimator = PageBudgetEstimator::new(self.harvest.page_size, self.harvest.max_pages);
        let page_budget = estimator
            .estimate(self.source.as_ref(), session.as_mut())
            .await;

        let walker = FrontierWalker::new(
            self.source.as_ref(),
            &self.dedup,
            QuotaBoundedCollector::new(self.harvest.quota),
            WalkSettings {
                max_consecutive_empty_pages: self.harvest.max_consecutive_empty_pages,
                page_pause: self.pacing.page_pause_ms,
            },
        );
        let walk = walker.walk(session.as_mut(), page_budget).await;
        drop(session);

        tracing::info!(
            "Walk finished after page {}: {} new of {} candidates ({})",
            walk.last_page,
            walk.accepted.len(),
            walk.candidates_found,
            walk.stop_reason
        );

        let mut summary = self.empty_summary(page_budget, &walk);

        if walk.accepted.is_empty() {
            tracing::info!("Nothing new for {}, skipping detail fetch", label);
            summary.elapsed = started.elapsed();
            summary.log();
            return Ok(summary);
        }

        let mut sink = open_sink(self.source.as_ref(), &self.output_dir)?;

        let pipeline = DetailFetchPipeline::new(
            Arc::clone(&self.source),
            Arc::clone(&self.sessions),
            PipelineSettings::from_config(&self.harvest, &self.pacing),
        );
        let report = pipeline.run(walk.accepted, &mut self.dedup, &mut sink).await;

        summary.committed = report.committed;
        summary.skipped = report.skipped;
        summary.failed = report.failed;
        summary.outcomes = report.outcomes;

        match sink.finalize() {
            Ok(Some(path)) => {
                summary.artifact = Some(path);
                summary.flush = self.flush_history();
            }
            Ok(None) => {
                tracing::info!("No records committed, no artifact written");
            }
            Err(e) => {
                tracing::error!(
                    "Could not commit output artifact, history left unchanged: {}",
                    e
                );
                summary.flush = FlushStatus::Withheld(format!("artifact not committed: {}", e));
            }
        }

        summary.elapsed = started.elapsed();
        summary.log();
        Ok(summary)
    }

    fn flush_history(&mut self) -> FlushStatus {
        match self.dedup.flush() {
            Ok(true) => {
                tracing::info!(
                    scope = %self.dedup.scope(),
                    "History now holds {} identifiers",
                    self.dedup.len()
                );
                FlushStatus::Flushed
            }
            Ok(false) => FlushStatus::Skipped,
            Err(e) => {
                tracing::error!(
                    scope = %self.dedup.scope(),
                    "Failed to flush identifier history: {}",
                    e
                );
                FlushStatus::Failed(e.to_string())
            }
        }
    }

    fn empty_summary(&self, page_budget: u32, walk: &WalkReport) -> RunSummary {
        RunSummary {
            source: self.source.label(),
            scope: self.dedup.scope().to_string(),
            page_budget,
            pages_scanned: walk.pages_scanned,
            pages_failed: walk.pages_failed,
            candidates_found: walk.candidates_found,
            accepted: walk.accepted.len(),
            committed: 0,
            skipped: 0,
            failed: 0,
            stop_reason: walk.stop_reason,
            artifact: None,
            flush: FlushStatus::Skipped,
            elapsed: Duration::ZERO,
            outcomes: Vec::new(),
        }
    }
}

/// Runs a complete harvest for one configured source
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `source` - Source name or label; one is picked at random when `None`
/// * `category` - Optional category filter
pub async fn run_harvest(
    config: Config,
    source: Option<&str>,
    category: Option<&str>,
) -> Result<RunSummary, GleanError> {
    let mut coordinator = RunCoordinator::from_config(&config, source, category)?;
    coordinator.run().await
}
