//! Stage orchestration.
//!
//! Each public method is one batch stage invoked by the scheduler. A stage
//! takes its lock, reads the items in its input status, calls collaborators
//! and commits one transition per item. Items are independent: a failure on
//! one never aborts the others.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{CollaboratorError, Collaborators};
use crate::config::ResolvedConfig;
use crate::digest::{
    aggregate, render_digest, week_ending_on_or_before, DigestSettings, DigestWindow, HighlightMap,
};
use crate::domain::{ExportMark, ItemStatus, ItemType, MediaItem, Tags};
use crate::export::paths::{daily_digest_relative_path, weekly_digest_relative_path};
use crate::export::{manual_rating, write_atomic, ExportOutcome, Exporter};
use crate::ingest::{admit, Admission};
use crate::store::{ItemStore, Listing, StatusCount, StoreError, UpsertOutcome};

use super::env::{Clock, ContentHasher, Sha256Hasher, SystemClock};
use super::lifecycle::{advance, advance_by_id, LifecycleError};
use super::lock::{Stage, StageLock};
use super::report::StageReport;
use super::retry::{RetryDecision, RetryPolicy};
use super::state_machine::{Event, ExportRecord, TransitionError};

/// Reason recorded on items abandoned mid-processing by a crashed run
pub const INTERRUPTED_REASON: &str = "interrupted: left in_progress by a previous run";

/// Stage settings derived from configuration
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub lock_dir: PathBuf,
    pub export_root: PathBuf,
    pub max_tags_per_doc: usize,
    pub collaborator_timeout: Duration,
    pub weekly_day: Weekday,
    pub digest: DigestSettings,
}

impl StageSettings {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            lock_dir: config.lock_dir(),
            export_root: config.export_root(),
            max_tags_per_doc: config.max_tags_per_doc,
            collaborator_timeout: config.collaborator_timeout,
            weekly_day: config.weekly_day,
            digest: config.digest.clone(),
        }
    }
}

/// Which items an export run considers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// Newly summarized items only
    New,

    /// Summarized and exported items published on this date
    Date(NaiveDate),

    /// Every summarized and exported item
    All,
}

/// Runs the batch stages against one store
pub struct Orchestrator {
    store: Arc<dyn ItemStore>,
    collaborators: Collaborators,
    retry: RetryPolicy,
    settings: StageSettings,
    clock: Arc<dyn Clock>,
    exporter: Exporter,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ItemStore>,
        collaborators: Collaborators,
        retry: RetryPolicy,
        settings: StageSettings,
    ) -> Self {
        let exporter = Exporter::new(settings.export_root.clone(), Arc::new(Sha256Hasher));
        Self {
            store,
            collaborators,
            retry,
            settings,
            clock: Arc::new(SystemClock),
            exporter,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.exporter = Exporter::new(self.settings.export_root.clone(), hasher);
        self
    }

    pub fn store(&self) -> &dyn ItemStore {
        self.store.as_ref()
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self, stage: Stage) -> Result<Option<StageLock>> {
        let lock = StageLock::try_acquire(&self.settings.lock_dir, stage)
            .with_context(|| format!("Failed to take {} lock", stage))?;
        if lock.is_none() {
            info!(%stage, "Another run holds the stage lock, exiting");
        }
        Ok(lock)
    }

    /// Run a collaborator call under the configured timeout
    async fn call<T, F>(&self, fut: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let limit = self.settings.collaborator_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
        }
    }

    // ------------------------------------------------------------------
    // discover
    // ------------------------------------------------------------------

    /// Ask the discoverer for new items and record them as `pending`
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn discover(&self, since: Option<DateTime<Utc>>) -> Result<StageReport> {
        let stage = Stage::Discover;
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };
        let discoverer = self
            .collaborators
            .discoverer
            .clone()
            .context("No discover command configured (collaborators.discover)")?;

        let found = self
            .call(discoverer.discover(since))
            .await
            .map_err(|reason| anyhow::anyhow!("Discovery failed: {}", reason))?;
        info!(count = found.len(), "Discovery returned entries");

        let mut report = StageReport::new(stage);
        for entry in found {
            match admit(entry, since, self.now()) {
                Admission::Admit(item) => match self.store.upsert_discovered(&item) {
                    Ok(UpsertOutcome::Inserted) => {
                        debug!(id = %item.external_id, item_type = %item.item_type, "New item");
                        report.succeeded += 1;
                    }
                    Ok(UpsertOutcome::Existing) => report.skipped += 1,
                    Err(e) => {
                        warn!(id = %item.external_id, error = %e, "Failed to record discovered item");
                        report.record_failure(false);
                    }
                },
                Admission::TooOld => report.skipped += 1,
                Admission::Reject(reason) => {
                    warn!(%reason, "Rejected discovered entry");
                    report.record_failure(false);
                }
            }
        }

        info!(%report, "Discovery finished");
        Ok(report)
    }

    // ------------------------------------------------------------------
    // process
    // ------------------------------------------------------------------

    /// Process pending items of one or both types
    pub async fn process(
        &self,
        item_type: Option<ItemType>,
        limit: Option<usize>,
        retries: bool,
    ) -> Result<StageReport> {
        let types: Vec<ItemType> = match item_type {
            Some(t) => vec![t],
            None => ItemType::ALL.to_vec(),
        };

        let mut combined: Option<StageReport> = None;
        for t in types {
            let report = self.process_type(t, limit, retries).await?;
            match combined.as_mut() {
                Some(total) => total.merge(report),
                None => combined = Some(report),
            }
        }

        Ok(combined.unwrap_or_else(|| StageReport::new(Stage::Process(ItemType::Episode))))
    }

    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    async fn process_type(
        &self,
        item_type: ItemType,
        limit: Option<usize>,
        retries: bool,
    ) -> Result<StageReport> {
        let stage = Stage::Process(item_type);
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };
        let mut report = StageReport::new(stage);

        self.recover_orphans(item_type, &mut report)?;
        if retries {
            self.requeue_failed(item_type, &mut report)?;
        }

        let pending = readable(
            self.store
                .list_by_status(ItemStatus::Pending, Some(item_type), limit)?,
            &mut report,
        );
        if pending.is_empty() {
            debug!("Nothing pending");
            return Ok(report);
        }
        let processor = self
            .collaborators
            .processor(item_type)
            .with_context(|| format!("No process command configured for {}", item_type))?;

        let ceiling = self.retry.ceiling(item_type);
        for item in pending {
            let claimed = match advance(self.store(), &item, Event::Claimed, ceiling, self.now()) {
                Ok(claimed) => claimed,
                Err(e) if e.is_lost_race() => {
                    debug!(id = %item.external_id, "Claimed by someone else");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(id = %item.external_id, error = %e, "Failed to claim item");
                    report.record_failure(true);
                    continue;
                }
            };

            let event = match self.call(processor.process(&claimed)).await {
                Ok(output) => Event::Succeeded {
                    artifact: output.artifact,
                },
                Err(reason) => Event::Failed { reason },
            };
            self.commit_outcome(&claimed, event, &mut report);
        }

        info!(%report, "Processing finished");
        Ok(report)
    }

    /// Fail items a previous run left `in_progress`
    fn recover_orphans(&self, item_type: ItemType, report: &mut StageReport) -> Result<()> {
        let orphans = readable(
            self.store
                .list_by_status(ItemStatus::InProgress, Some(item_type), None)?,
            report,
        );
        for orphan in orphans {
            warn!(id = %orphan.external_id, "Recovering item left in_progress");
            self.commit_outcome(
                &orphan,
                Event::Failed {
                    reason: INTERRUPTED_REASON.to_string(),
                },
                report,
            );
        }
        Ok(())
    }

    /// Move failed items below their ceiling back to `pending`
    fn requeue_failed(&self, item_type: ItemType, report: &mut StageReport) -> Result<()> {
        let failed = readable(
            self.store
                .list_by_status(ItemStatus::Failed, Some(item_type), None)?,
            report,
        );
        let ceiling = self.retry.ceiling(item_type);

        for item in failed {
            match self.retry.decide(item.attempt_count, item_type) {
                RetryDecision::RetryAfter(delay) => {
                    match advance(self.store(), &item, Event::AutoRetried, ceiling, self.now()) {
                        Ok(_) => info!(
                            id = %item.external_id,
                            attempt = item.attempt_count,
                            backoff_secs = delay.as_secs(),
                            "Requeued failed item"
                        ),
                        Err(e) => warn!(id = %item.external_id, error = %e, "Requeue failed"),
                    }
                }
                RetryDecision::GiveUp => {
                    debug!(id = %item.external_id, "At retry ceiling, left parked");
                }
            }
        }
        Ok(())
    }

    /// Commit a success or failure and account for it in the report
    fn commit_outcome(&self, item: &MediaItem, event: Event, report: &mut StageReport) {
        let ceiling = self.retry.ceiling(item.item_type);
        let failing = matches!(event, Event::Failed { .. });

        match advance(self.store(), item, event, ceiling, self.now()) {
            Ok(updated) if failing => {
                let reason = updated.error_reason.as_deref().unwrap_or_default();
                match self.retry.decide(updated.attempt_count, updated.item_type) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            id = %updated.external_id,
                            attempt = updated.attempt_count,
                            retry_in_secs = delay.as_secs(),
                            %reason,
                            "Item failed, will retry"
                        );
                        report.record_failure(false);
                    }
                    RetryDecision::GiveUp => {
                        error!(
                            id = %updated.external_id,
                            attempt = updated.attempt_count,
                            %reason,
                            "Item failed permanently; needs manual retry"
                        );
                        report.record_failure(true);
                    }
                }
            }
            Ok(updated) => {
                info!(id = %updated.external_id, status = %updated.status, "Item advanced");
                report.succeeded += 1;
            }
            Err(e) if e.is_lost_race() => {
                debug!(id = %item.external_id, "Item moved by another run");
                report.skipped += 1;
            }
            Err(LifecycleError::Transition(TransitionError::GuardFailed { reason, .. }))
                if !failing =>
            {
                // Collaborator output rejected by a guard: record it as a failure
                let event = Event::Failed {
                    reason: format!("invalid collaborator output: {}", reason),
                };
                self.commit_outcome(item, event, report);
            }
            Err(e) => {
                error!(id = %item.external_id, error = %e, "Failed to commit transition");
                report.record_failure(true);
            }
        }
    }

    // ------------------------------------------------------------------
    // summarize
    // ------------------------------------------------------------------

    /// Summarize completed items
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn summarize(&self, limit: Option<usize>) -> Result<StageReport> {
        let stage = Stage::Summarize;
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };
        let mut report = StageReport::new(stage);

        let completed = readable(
            self.store.list_by_status(ItemStatus::Completed, None, limit)?,
            &mut report,
        );
        if completed.is_empty() {
            debug!("Nothing to summarize");
            return Ok(report);
        }
        let summarizer = self
            .collaborators
            .summarizer
            .clone()
            .context("No summarize command configured (collaborators.summarize)")?;

        for item in completed {
            let event = match self.call(summarizer.summarize(&item)).await {
                Ok(payload) => {
                    let tags = Tags::with_limit(payload.tags.iter(), self.settings.max_tags_per_doc);
                    Event::Summarized { payload, tags }
                }
                Err(reason) => Event::Failed { reason },
            };
            self.commit_outcome(&item, event, &mut report);
        }

        info!(%report, "Summarization finished");
        Ok(report)
    }

    // ------------------------------------------------------------------
    // export
    // ------------------------------------------------------------------

    /// Export summarized items as notes
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn export(&self, scope: ExportScope, dry_run: bool) -> Result<StageReport> {
        let stage = Stage::Export;
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };
        let mut report = StageReport::new(stage);

        let mut listing = self.store.list_by_status(ItemStatus::Summarized, None, None)?;
        match scope {
            ExportScope::New => {}
            ExportScope::Date(_) | ExportScope::All => {
                let exported = self.store.list_by_status(ItemStatus::Exported, None, None)?;
                listing.items.extend(exported.items);
                listing.corrupt.extend(exported.corrupt);
            }
        }
        let mut candidates = readable(listing, &mut report);
        if let ExportScope::Date(date) = scope {
            candidates.retain(|item| item.publish_date() == date);
        }

        for item in candidates {
            if dry_run {
                match self.exporter.plan(&item) {
                    Ok((outcome, _)) => {
                        info!(id = %item.external_id, path = %outcome.path().display(), ?outcome, "Dry run");
                        match outcome {
                            ExportOutcome::Written { .. } => report.succeeded += 1,
                            _ => report.skipped += 1,
                        }
                    }
                    Err(e) => {
                        error!(id = %item.external_id, error = %e, "Export would fail");
                        report.record_failure(true);
                    }
                }
                continue;
            }

            match self.exporter.export_item(&item) {
                Ok(outcome) => self.record_export(&item, outcome, &mut report),
                Err(e) => {
                    error!(id = %item.external_id, error = %e, "Export failed");
                    report.record_failure(true);
                }
            }
        }

        info!(%report, "Export finished");
        Ok(report)
    }

    fn record_export(&self, item: &MediaItem, outcome: ExportOutcome, report: &mut StageReport) {
        let (record, written) = match outcome {
            ExportOutcome::Written { content_hash, .. } => (
                Some(ExportRecord {
                    mark: ExportMark::Written,
                    content_hash: Some(content_hash),
                }),
                true,
            ),
            ExportOutcome::SkippedPreserved { .. } => {
                if item.status == ItemStatus::Exported
                    && item.export_mark == Some(ExportMark::Verified)
                {
                    report.skipped += 1;
                    return;
                }
                (
                    Some(ExportRecord {
                        mark: ExportMark::Verified,
                        content_hash: None,
                    }),
                    false,
                )
            }
            ExportOutcome::SkippedUnchanged { .. } => {
                if item.status == ItemStatus::Exported {
                    report.skipped += 1;
                    return;
                }
                (None, false)
            }
        };

        let ceiling = self.retry.ceiling(item.item_type);
        match advance(self.store(), item, Event::Exported { record }, ceiling, self.now()) {
            Ok(_) if written => report.succeeded += 1,
            Ok(_) => report.skipped += 1,
            Err(e) if e.is_lost_race() => report.skipped += 1,
            Err(e) => {
                error!(id = %item.external_id, error = %e, "Failed to record export");
                report.record_failure(true);
            }
        }
    }

    // ------------------------------------------------------------------
    // digests
    // ------------------------------------------------------------------

    /// Build the daily digest for `date` (default: today)
    #[instrument(skip(self, overrides), fields(run_id = %Uuid::new_v4()))]
    pub async fn build_daily(
        &self,
        date: Option<NaiveDate>,
        overrides: Option<HighlightMap>,
    ) -> Result<StageReport> {
        let stage = Stage::DigestDaily;
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };

        let date = date.unwrap_or_else(|| self.clock.today());
        let window = DigestWindow::daily(date);
        self.write_digest(stage, window, &daily_digest_relative_path(date), overrides)
    }

    /// Build the weekly digest ending on `ending` (default: the most recent
    /// configured week-end day)
    #[instrument(skip(self, overrides), fields(run_id = %Uuid::new_v4()))]
    pub async fn build_weekly(
        &self,
        ending: Option<NaiveDate>,
        overrides: Option<HighlightMap>,
    ) -> Result<StageReport> {
        let stage = Stage::DigestWeekly;
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };

        let ending = ending
            .unwrap_or_else(|| week_ending_on_or_before(self.clock.today(), self.settings.weekly_day));
        let window = DigestWindow::weekly(ending);
        self.write_digest(stage, window, &weekly_digest_relative_path(ending), overrides)
    }

    fn write_digest(
        &self,
        stage: Stage,
        window: DigestWindow,
        relative_path: &Path,
        overrides: Option<HighlightMap>,
    ) -> Result<StageReport> {
        let mut report = StageReport::new(stage);

        let items = readable(
            self.store.list_in_window(window.start(), window.end())?,
            &mut report,
        );
        let mut highlights = HighlightMap::from_payloads(&items);
        if let Some(overrides) = overrides {
            highlights = highlights.overlay(overrides);
        }

        let digest_dir = relative_path.parent().unwrap_or(Path::new(""));
        let digest = aggregate(window, &items, &highlights, &self.settings.digest, digest_dir);
        let content = render_digest(&digest);

        let path = self.settings.export_root.join(relative_path);
        report.artifact = Some(path.clone());

        let unchanged = std::fs::read(&path)
            .map(|existing| existing == content.as_bytes())
            .unwrap_or(false);
        if unchanged {
            info!(path = %path.display(), "Digest unchanged");
            report.skipped += 1;
            return Ok(report);
        }

        match write_atomic(&path, content.as_bytes()) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    items = digest.entries.len(),
                    failures = digest.failures.len(),
                    "Wrote digest"
                );
                report.succeeded += 1;
            }
            Err(e) => {
                error!(error = %e, "Failed to write digest");
                report.record_failure(true);
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // admin
    // ------------------------------------------------------------------

    /// Reset failed items to `pending` with a fresh attempt budget
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn retry(&self, ids: &[String]) -> Result<StageReport> {
        self.admin(ids, || Event::ManuallyRetried, "Retried")
    }

    /// Mark items as deliberately skipped
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn skip(&self, ids: &[String]) -> Result<StageReport> {
        self.admin(ids, || Event::Skipped, "Skipped")
    }

    fn admin(&self, ids: &[String], event: impl Fn() -> Event, verb: &str) -> Result<StageReport> {
        let stage = Stage::Admin;
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };
        let mut report = StageReport::new(stage);

        for id in ids {
            let ceiling = |item: &MediaItem| self.retry.ceiling(item.item_type);
            match advance_by_id(self.store(), id, event(), ceiling, self.now()) {
                Ok(item) => {
                    info!(%id, status = %item.status, "{} item", verb);
                    report.succeeded += 1;
                }
                Err(LifecycleError::Store(StoreError::NotFound(_))) => {
                    error!(%id, "No such item");
                    report.record_failure(true);
                }
                Err(e) => {
                    error!(%id, error = %e, "{} refused", verb);
                    report.record_failure(true);
                }
            }
        }

        Ok(report)
    }

    /// Copy manual ratings from exported notes into the store
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn sync_ratings(&self) -> Result<StageReport> {
        let stage = Stage::Admin;
        let Some(_lock) = self.lock(stage)? else {
            return Ok(StageReport::locked(stage));
        };
        let mut report = StageReport::new(stage);

        let exported = readable(
            self.store.list_by_status(ItemStatus::Exported, None, None)?,
            &mut report,
        );
        for item in exported {
            let path = self.exporter.locate(&item);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(id = %item.external_id, "Note missing, nothing to sync");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(id = %item.external_id, path = %path.display(), error = %e, "Failed to read note");
                    report.record_failure(false);
                    continue;
                }
            };

            let rating = manual_rating(&content);
            if rating == item.rating_manual {
                report.skipped += 1;
                continue;
            }
            if let Err(e) = self.store.set_manual_rating(&item.external_id, rating.as_deref()) {
                error!(id = %item.external_id, error = %e, "Failed to record manual rating");
                report.record_failure(true);
                continue;
            }
            info!(id = %item.external_id, rating = ?rating, "Synced manual rating");
            report.succeeded += 1;
        }

        Ok(report)
    }

    /// Item counts per type and status
    pub fn status(&self) -> Result<Vec<StatusCount>> {
        Ok(self.store.status_counts()?)
    }
}

/// Readable items of a listing; each unreadable row is a permanent failure
fn readable(listing: Listing, report: &mut StageReport) -> Vec<MediaItem> {
    for row in &listing.corrupt {
        error!(id = %row.external_id, reason = %row.reason, "Unreadable item row; needs repair");
        report.record_failure(true);
    }
    listing.items
}
