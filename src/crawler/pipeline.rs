//! Detail fetch pipeline
//!
//! Workers pull accepted candidates from a shared queue in collection order.
//! Each worker owns its session and its pacing counters. Fetch results travel
//! over a channel to the caller's task, which is the only place that appends
//! to the output sink or grows the dedup store.

use crate::config::{HarvestConfig, PacingConfig};
use crate::crawler::pacing::{Cadence, PauseSchedule};
use crate::crawler::{FetchError, PageSession, SessionFactory};
use crate::output::{DetailRecord, OutputSink};
use crate::source::Source;
use crate::state::{CandidateLink, FailReason, ItemOutcome, SkipReason};
use crate::storage::DedupStore;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Worker count, pacing and retry policy
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub workers: usize,
    pub pauses: PauseSchedule,
    pub long_pause_every: u32,
    pub rotate_session_every: u32,
    /// Total attempts per item for transient failures
    pub max_attempts: u32,
    /// Backoff step; attempt `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl PipelineSettings {
    pub fn from_config(harvest: &HarvestConfig, pacing: &PacingConfig) -> Self {
        Self {
            workers: harvest.workers,
            pauses: PauseSchedule::from_config(pacing),
            long_pause_every: pacing.long_pause_every,
            rotate_session_every: pacing.rotate_session_every,
            max_attempts: pacing.max_attempts,
            retry_backoff: Duration::from_millis(pacing.retry_backoff_ms),
        }
    }
}

/// Outcomes of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// One outcome per item, in commit order
    pub outcomes: Vec<ItemOutcome>,
    pub committed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Detail fetch attempts including retries
    pub attempts: usize,
    pub sessions_opened: usize,
}

impl PipelineReport {
    fn record(&mut self, outcome: ItemOutcome) {
        match &outcome {
            ItemOutcome::Committed { .. } => self.committed += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Message from a worker to the committing owner
struct FetchOutcome {
    worker: usize,
    candidate: CandidateLink,
    result: Result<DetailRecord, FailReason>,
    attempts: u32,
}

type SharedQueue = Arc<Mutex<VecDeque<CandidateLink>>>;

/// Fetches detail records for accepted candidates
pub struct DetailFetchPipeline {
    source: Arc<dyn Source>,
    sessions: Arc<dyn SessionFactory>,
    settings: PipelineSettings,
}

impl DetailFetchPipeline {
    pub fn new(
        source: Arc<dyn Source>,
        sessions: Arc<dyn SessionFactory>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            sessions,
            settings,
        }
    }

    /// Processes every item exactly once
    ///
    /// Successful records are appended to `sink` and only then added to
    /// `dedup`. Failed items are left out of `dedup` so a later run retries
    /// them.
    pub async fn run(
        &self,
        items: Vec<CandidateLink>,
        dedup: &mut DedupStore,
        sink: &mut dyn OutputSink,
    ) -> PipelineReport {
        let mut report = PipelineReport::default();
        if items.is_empty() {
            return report;
        }

        let total = items.len();
        let workers = self.settings.workers.clamp(1, total);
        info!(
            source = %self.source.label(),
            "Fetching {} detail pages with {} worker(s)",
            total, workers
        );

        let queue: SharedQueue = Arc::new(Mutex::new(VecDeque::from(items)));
        let (tx, mut rx) = mpsc::channel::<FetchOutcome>(workers * 2);

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            handles.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&self.source),
                Arc::clone(&self.sessions),
                self.settings.clone(),
                Arc::clone(&queue),
                tx.clone(),
            )));
        }
        drop(tx);

        while let Some(message) = rx.recv().await {
            report.attempts += message.attempts as usize;
            let outcome = commit(message, dedup, sink);
            report.record(outcome);

            let done = report.outcomes.len();
            if done % 10 == 0 || done == total {
                info!(
                    "Detail progress: {}/{} ({} committed, {} failed)",
                    done, total, report.committed, report.failed
                );
            }
        }

        for (worker, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(opened) => report.sessions_opened += opened,
                Err(e) => warn!(worker, "Detail worker ended abnormally: {}", e),
            }
        }

        report
    }
}

/// Applies one fetch result; the single writer for sink and store
fn commit(message: FetchOutcome, dedup: &mut DedupStore, sink: &mut dyn OutputSink) -> ItemOutcome {
    let FetchOutcome {
        worker,
        candidate,
        result,
        ..
    } = message;
    let identifier = candidate.identifier;

    let record = match result {
        Ok(record) => record,
        Err(reason) => {
            warn!(
                worker,
                identifier = %identifier,
                url = %candidate.url,
                "Detail not committed, will retry next run: {}",
                reason
            );
            return ItemOutcome::Failed { identifier, reason };
        }
    };

    if dedup.contains(&identifier) {
        debug!(identifier = %identifier, "Already committed, skipping");
        return ItemOutcome::Skipped {
            identifier,
            reason: SkipReason::AlreadyCommitted,
        };
    }

    if record.is_blank() {
        warn!(
            identifier = %identifier,
            url = %candidate.url,
            "Detail page had no extractable fields"
        );
        return ItemOutcome::Skipped {
            identifier,
            reason: SkipReason::EmptyRecord,
        };
    }

    match sink.append(&record) {
        Ok(()) => {
            dedup.add(identifier.clone());
            debug!(worker, identifier = %identifier, "Committed");
            ItemOutcome::Committed { identifier }
        }
        Err(e) => {
            warn!(identifier = %identifier, "Output rejected record: {}", e);
            ItemOutcome::Failed {
                identifier,
                reason: FailReason::Output(e.to_string()),
            }
        }
    }
}

fn next_item(queue: &SharedQueue) -> Option<CandidateLink> {
    let mut guard = match queue.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.pop_front()
}

fn has_more(queue: &SharedQueue) -> bool {
    match queue.lock() {
        Ok(guard) => !guard.is_empty(),
        Err(poisoned) => !poisoned.into_inner().is_empty(),
    }
}

/// One detail worker; returns the number of sessions it opened
async fn run_worker(
    worker: usize,
    source: Arc<dyn Source>,
    sessions: Arc<dyn SessionFactory>,
    settings: PipelineSettings,
    queue: SharedQueue,
    tx: mpsc::Sender<FetchOutcome>,
) -> usize {
    let mut cadence = Cadence::new(settings.long_pause_every, settings.rotate_session_every);
    let mut session: Option<Box<dyn PageSession>> = None;
    let mut opened = 0;

    while let Some(candidate) = next_item(&queue) {
        if session.is_none() {
            match sessions.create() {
                Ok(created) => {
                    debug!(worker, session = created.id(), "Worker session opened");
                    session = Some(created);
                    opened += 1;
                }
                Err(e) => {
                    warn!(worker, "Could not open session: {}", e);
                    let message = FetchOutcome {
                        worker,
                        candidate,
                        result: Err(FailReason::Session(e.to_string())),
                        attempts: 0,
                    };
                    if tx.send(message).await.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        let Some(active) = session.as_mut() else {
            continue;
        };

        let (result, attempts) =
            fetch_with_retry(source.as_ref(), &mut **active, &candidate, &settings).await;
        let success = result.is_ok();

        let message = FetchOutcome {
            worker,
            candidate,
            result: result.map_err(|e| FailReason::Fetch(e.to_string())),
            attempts,
        };
        if tx.send(message).await.is_err() {
            break;
        }

        let action = cadence.record(success, has_more(&queue));
        if action.rotate_session {
            info!(worker, "Rotating session after {} fetches", cadence.fetches());
            session = None;
        }

        let pause = settings.pauses.duration(action.pause);
        if !pause.is_zero() {
            debug!(worker, kind = ?action.pause, "Pausing {:?}", pause);
            tokio::time::sleep(pause).await;
        }
    }

    opened
}

/// Fetches one detail page, retrying transient failures with linear backoff
async fn fetch_with_retry(
    source: &dyn Source,
    session: &mut dyn PageSession,
    candidate: &CandidateLink,
    settings: &PipelineSettings,
) -> (Result<DetailRecord, FetchError>, u32) {
    let mut attempt: u32 = 1;
    loop {
        match source.fetch_detail(session, candidate).await {
            Ok(record) => return (Ok(record), attempt),
            Err(e) if e.is_transient() && attempt < settings.max_attempts => {
                let backoff = settings.retry_backoff * attempt;
                warn!(
                    identifier = %candidate.identifier,
                    url = %candidate.url,
                    attempt,
                    "Transient failure, retrying in {:?}: {}",
                    backoff,
                    e
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}
