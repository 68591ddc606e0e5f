//! Sync orchestrator: one pass from cursor read to cursor advance.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use checkpoint::{read_or_sentinel, CursorStore, SyncCursor};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use notion_sink::RemoteStore;
use serde::Serialize;
use sqlite_notion_sync_sqlite_source::ChangeSelector;
use sync_core::RemoteRecord;
use tracing::{debug, error, info, warn};

use super::dispatcher::{BatchDispatcher, DispatchReport};
use super::oracle::{Disposition, ExistenceOracle, ExistencePolicy, FilterReport};

/// Where the cursor moves once a pass has dispatched its change set.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdvancePolicy {
    /// To the current time, regardless of failed items
    #[default]
    Now,
    /// To the last record of the longest delivered-or-suppressed prefix of the
    /// change set; failed records are selected again next pass
    Delivered,
}

/// States of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    ReadingCursor,
    Selecting,
    Filtering,
    Dispatching,
    AdvancingCursor,
    /// The last pass failed while reading the cursor or selecting changes
    Aborted,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::ReadingCursor => "reading_cursor",
            SyncState::Selecting => "selecting",
            SyncState::Filtering => "filtering",
            SyncState::Dispatching => "dispatching",
            SyncState::AdvancingCursor => "advancing_cursor",
            SyncState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Validated pass settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub request_timeout: Duration,
    pub existence_policy: ExistencePolicy,
    pub advance_policy: AdvancePolicy,
    /// Cursor position used before the first successful pass
    pub bootstrap_position: String,
    pub dry_run: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            existence_policy: ExistencePolicy::FailOpen,
            advance_policy: AdvancePolicy::Now,
            bootstrap_position: String::new(),
            dry_run: false,
        }
    }
}

/// Summary of a pass that selected at least one record.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub cursor_before: SyncCursor,
    /// The cursor written by this pass; `None` when it did not move
    pub cursor_after: Option<SyncCursor>,
    pub selected: usize,
    pub remote_duplicates: usize,
    pub local_duplicates: usize,
    pub unverified: usize,
    pub dispatch: DispatchReport,
    pub completed_at: DateTime<Utc>,
}

impl PassReport {
    pub fn delivered(&self) -> usize {
        self.dispatch.delivered()
    }

    pub fn failed(&self) -> usize {
        self.dispatch.failed()
    }
}

/// How a call to [`SyncEngine::run_pass`] ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    /// Nothing newer than the cursor; nothing was written
    NoNewData { cursor: SyncCursor },
    Completed(PassReport),
    /// Another pass was still running
    Skipped,
}

/// Orchestrates sync passes over injected collaborators.
pub struct SyncEngine {
    cursor_store: Arc<dyn CursorStore>,
    selector: Arc<dyn ChangeSelector>,
    oracle: ExistenceOracle,
    dispatcher: BatchDispatcher,
    settings: EngineSettings,
    running: tokio::sync::Mutex<()>,
    state: Mutex<SyncState>,
}

impl SyncEngine {
    pub fn new(
        cursor_store: Arc<dyn CursorStore>,
        selector: Arc<dyn ChangeSelector>,
        remote: Arc<dyn RemoteStore>,
        settings: EngineSettings,
    ) -> Self {
        let oracle = ExistenceOracle::new(
            Arc::clone(&remote),
            settings.existence_policy,
            settings.request_timeout,
        );
        let dispatcher = BatchDispatcher::new(remote, settings.request_timeout);
        Self {
            cursor_store,
            selector,
            oracle,
            dispatcher,
            settings,
            running: tokio::sync::Mutex::new(()),
            state: Mutex::new(SyncState::Idle),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(SyncState::Aborted)
    }

    fn transition(&self, next: SyncState) {
        if let Ok(mut state) = self.state.lock() {
            debug!("Sync state: {} -> {next}", *state);
            *state = next;
        }
    }

    /// Run one synchronization pass.
    ///
    /// Returns [`PassOutcome::Skipped`] without touching anything if another
    /// pass is in progress.
    ///
    /// # Errors
    /// * Cursor read or change selection failed; the pass is aborted and the
    ///   cursor is unchanged
    /// * The new cursor could not be written; the next pass selects the same
    ///   records again
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Previous sync pass still running, skipping this trigger");
            return Ok(PassOutcome::Skipped);
        };

        self.transition(SyncState::ReadingCursor);
        let cursor_before =
            match read_or_sentinel(self.cursor_store.as_ref(), &self.settings.bootstrap_position)
                .await
            {
                Ok(cursor) => cursor,
                Err(e) => return Err(self.abort(e.context("Failed to read sync cursor"))),
            };
        info!("Last sync cursor: '{}'", cursor_before.to_cli_string());

        self.transition(SyncState::Selecting);
        let records = match self.selector.select_since(&cursor_before).await {
            Ok(records) => records,
            Err(e) => return Err(self.abort(e.context("Failed to select new records"))),
        };

        if records.is_empty() {
            info!("No new data to sync");
            self.transition(SyncState::Idle);
            return Ok(PassOutcome::NoNewData {
                cursor: cursor_before,
            });
        }
        let selected = records.len();
        // Positions in selection order, for the delivered advance policy.
        let positions: Vec<String> = records.iter().map(|r| r.position.clone()).collect();

        self.transition(SyncState::Filtering);
        let filter = self.oracle.filter(records).await;
        info!(
            "Syncing {} new records to Notion ({} selected, {} already present)",
            filter.retained.len(),
            selected,
            selected - filter.retained.len()
        );

        self.transition(SyncState::Dispatching);
        let remote_records: Vec<RemoteRecord> =
            filter.retained.iter().map(RemoteRecord::from_source).collect();
        let dispatch = if self.settings.dry_run {
            info!(
                "Dry run: would create {} remote records",
                remote_records.len()
            );
            DispatchReport::default()
        } else {
            self.dispatcher
                .deliver(
                    &remote_records,
                    self.settings.batch_size,
                    self.settings.batch_delay,
                )
                .await
        };

        self.transition(SyncState::AdvancingCursor);
        let cursor_after = if self.settings.dry_run {
            None
        } else {
            let next = self.next_cursor(&cursor_before, &positions, &filter, &dispatch);
            match next {
                Some(next) => {
                    if let Err(e) = self.cursor_store.write_cursor(&next).await {
                        self.transition(SyncState::Idle);
                        error!("Failed to advance sync cursor: {e:#}");
                        return Err(e.context("Failed to advance sync cursor"));
                    }
                    Some(next)
                }
                None => None,
            }
        };

        let report = PassReport {
            cursor_before,
            cursor_after,
            selected,
            remote_duplicates: filter.count(Disposition::RemoteDuplicate),
            local_duplicates: filter.count(Disposition::LocalDuplicate),
            unverified: filter.count(Disposition::Unverified),
            dispatch,
            completed_at: Utc::now(),
        };
        info!(
            "Sync complete: cursor '{}' -> '{}', {} selected, {} delivered, {} failed, {} duplicates, finished at {}",
            report.cursor_before.to_cli_string(),
            report
                .cursor_after
                .as_ref()
                .unwrap_or(&report.cursor_before)
                .to_cli_string(),
            report.selected,
            report.delivered(),
            report.failed(),
            report.remote_duplicates + report.local_duplicates,
            report.completed_at.to_rfc3339()
        );

        self.transition(SyncState::Idle);
        Ok(PassOutcome::Completed(report))
    }

    fn abort(&self, e: anyhow::Error) -> anyhow::Error {
        self.transition(SyncState::Aborted);
        error!("Sync pass aborted, cursor unchanged: {e:#}");
        e
    }

    /// The cursor to persist after dispatch, or `None` when it would not move
    /// forward.
    fn next_cursor(
        &self,
        before: &SyncCursor,
        positions: &[String],
        filter: &FilterReport,
        dispatch: &DispatchReport,
    ) -> Option<SyncCursor> {
        let candidate = match self.settings.advance_policy {
            AdvancePolicy::Now => Some(SyncCursor::now()),
            AdvancePolicy::Delivered => {
                delivered_prefix_end(positions, &filter.dispositions, dispatch)
                    .map(SyncCursor::new)
            }
        }?;

        let next = before.advanced_to(candidate);
        if next.position == before.position {
            debug!("Sync cursor stays at '{}'", before.to_cli_string());
            return None;
        }
        Some(next)
    }
}

/// Position of the last record in the longest prefix of the change set that
/// was delivered or needed no delivery.
fn delivered_prefix_end(
    positions: &[String],
    dispositions: &[Disposition],
    dispatch: &DispatchReport,
) -> Option<String> {
    let mut outcomes = dispatch.outcomes();
    let mut last = None;

    for (position, disposition) in positions.iter().zip(dispositions) {
        let accounted = match disposition {
            Disposition::Retained => outcomes.next().is_some_and(|o| o.is_delivered()),
            other => other.is_accounted(),
        };
        if !accounted {
            break;
        }
        last = Some(position.clone());
    }

    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRemote, FakeSelector, FlakyCursorStore};
    use checkpoint::MemoryStore;
    use sync_core::SourceRecord;

    fn records(ids: &[&str]) -> Vec<SourceRecord> {
        ids.iter()
            .map(|id| SourceRecord::new(*id, format!("name {id}"), "summary", format!("/files/{id}")))
            .collect()
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            batch_delay: Duration::ZERO,
            ..EngineSettings::default()
        }
    }

    fn engine(
        store: &Arc<MemoryStore>,
        selector: &Arc<FakeSelector>,
        remote: &Arc<FakeRemote>,
        settings: EngineSettings,
    ) -> SyncEngine {
        SyncEngine::new(store.clone(), selector.clone(), remote.clone(), settings)
    }

    #[tokio::test]
    async fn test_empty_change_set_touches_nothing() {
        let store = Arc::new(MemoryStore::with_cursor(SyncCursor::new("z")));
        let selector = Arc::new(FakeSelector::new(records(&["a", "b"])));
        let remote = Arc::new(FakeRemote::new());

        let outcome = engine(&store, &selector, &remote, settings())
            .run_pass()
            .await
            .unwrap();

        assert!(matches!(outcome, PassOutcome::NoNewData { .. }));
        assert_eq!(remote.queries(), 0);
        assert_eq!(remote.creates(), 0);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_pass_delivers_and_advances_to_now() {
        let store = Arc::new(MemoryStore::new());
        let selector = Arc::new(FakeSelector::new(records(&["a", "b", "c"])));
        let remote = Arc::new(FakeRemote::new());
        let engine = engine(&store, &selector, &remote, settings());

        let before = Utc::now();
        let PassOutcome::Completed(report) = engine.run_pass().await.unwrap() else {
            panic!("expected a completed pass");
        };

        assert_eq!(report.selected, 3);
        assert_eq!(report.delivered(), 3);
        assert_eq!(report.cursor_before.position, "");
        let after = report.cursor_after.unwrap();
        assert!(after.updated_at >= before);
        assert_eq!(store.current().unwrap(), after);
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_cursor_read_failure_aborts_without_write() {
        let store = Arc::new(FlakyCursorStore::failing_reads());
        let selector = Arc::new(FakeSelector::new(records(&["a"])));
        let remote = Arc::new(FakeRemote::new());
        let engine = SyncEngine::new(store.clone(), selector.clone(), remote.clone(), settings());

        let err = engine.run_pass().await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read sync cursor"));
        assert_eq!(engine.state(), SyncState::Aborted);
        assert_eq!(selector.calls(), 0);
        assert_eq!(store.inner().writes(), 0);
    }

    #[tokio::test]
    async fn test_selection_failure_aborts_without_write() {
        let store = Arc::new(MemoryStore::with_cursor(SyncCursor::new("a")));
        let selector = Arc::new(FakeSelector::failing());
        let remote = Arc::new(FakeRemote::new());
        let engine = engine(&store, &selector, &remote, settings());

        let err = engine.run_pass().await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to select new records"));
        assert_eq!(engine.state(), SyncState::Aborted);
        assert_eq!(store.writes(), 0);
        assert_eq!(store.current().unwrap().position, "a");
        assert_eq!(remote.queries(), 0);
    }

    #[tokio::test]
    async fn test_cursor_write_failure_is_surfaced() {
        let store = Arc::new(FlakyCursorStore::failing_writes());
        let selector = Arc::new(FakeSelector::new(records(&["a"])));
        let remote = Arc::new(FakeRemote::new());
        let engine = SyncEngine::new(store.clone(), selector, remote.clone(), settings());

        let err = engine.run_pass().await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to advance sync cursor"));
        assert_eq!(remote.creates(), 1);
        assert!(store.inner().current().is_none());
    }

    #[tokio::test]
    async fn test_all_duplicates_still_advance_cursor() {
        let store = Arc::new(MemoryStore::new());
        let selector = Arc::new(FakeSelector::new(records(&["a", "b"])));
        let remote = Arc::new(FakeRemote::new().with_existing(["/files/a", "/files/b"]));

        let PassOutcome::Completed(report) = engine(&store, &selector, &remote, settings())
            .run_pass()
            .await
            .unwrap()
        else {
            panic!("expected a completed pass");
        };

        assert_eq!(report.remote_duplicates, 2);
        assert_eq!(report.dispatch.chunks(), 0);
        assert_eq!(remote.creates(), 0);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_delivered_policy_holds_back_first_failure() {
        let store = Arc::new(MemoryStore::new());
        let selector = Arc::new(FakeSelector::new(records(&["a", "b", "c", "d"])));
        let remote = Arc::new(
            FakeRemote::new()
                .with_existing(["/files/b"])
                .with_create_failures(["/files/c"]),
        );
        let settings = EngineSettings {
            advance_policy: AdvancePolicy::Delivered,
            ..settings()
        };

        let PassOutcome::Completed(report) = engine(&store, &selector, &remote, settings)
            .run_pass()
            .await
            .unwrap()
        else {
            panic!("expected a completed pass");
        };

        // a delivered, b suppressed, c failed: cursor stops at b
        assert_eq!(report.cursor_after.as_ref().unwrap().position, "b");
        assert_eq!(report.failed(), 1);
        // d was still delivered
        assert_eq!(report.delivered(), 2);
    }

    #[tokio::test]
    async fn test_delivered_policy_first_failure_keeps_cursor() {
        let store = Arc::new(MemoryStore::with_cursor(SyncCursor::new("0")));
        let selector = Arc::new(FakeSelector::new(records(&["a", "b"])));
        let remote = Arc::new(FakeRemote::new().with_create_failures(["/files/a"]));
        let settings = EngineSettings {
            advance_policy: AdvancePolicy::Delivered,
            ..settings()
        };

        let PassOutcome::Completed(report) = engine(&store, &selector, &remote, settings)
            .run_pass()
            .await
            .unwrap()
        else {
            panic!("expected a completed pass");
        };

        assert!(report.cursor_after.is_none());
        assert_eq!(store.writes(), 0);
        assert_eq!(store.current().unwrap().position, "0");
    }

    #[tokio::test]
    async fn test_now_policy_never_moves_cursor_backwards() {
        let future = SyncCursor::new("9999-01-01T00:00:00.000Z");
        let store = Arc::new(MemoryStore::with_cursor(future.clone()));
        let mut selected = records(&["a"]);
        selected[0].position = "9999-12-31T00:00:00.000Z".to_string();
        let selector = Arc::new(FakeSelector::new(selected));
        let remote = Arc::new(FakeRemote::new());

        let PassOutcome::Completed(report) = engine(&store, &selector, &remote, settings())
            .run_pass()
            .await
            .unwrap()
        else {
            panic!("expected a completed pass");
        };

        assert!(report.cursor_after.is_none());
        assert_eq!(store.current().unwrap().position, future.position);
    }

    #[tokio::test]
    async fn test_now_policy_advances_from_integer_cursor() {
        let store = Arc::new(MemoryStore::with_cursor(SyncCursor::new("5")));
        let selector = Arc::new(FakeSelector::new(records(&["4", "6"])));
        let remote = Arc::new(FakeRemote::new());
        let engine = engine(&store, &selector, &remote, settings());

        let PassOutcome::Completed(report) = engine.run_pass().await.unwrap() else {
            panic!("expected a completed pass");
        };

        assert_eq!(report.selected, 1);
        let after = report.cursor_after.as_ref().unwrap();
        assert!(DateTime::parse_from_rfc3339(&after.position).is_ok());
        assert_eq!(store.writes(), 1);
        assert_eq!(remote.created(), vec!["/files/6".to_string()]);

        let outcome = engine.run_pass().await.unwrap();
        assert!(matches!(outcome, PassOutcome::NoNewData { .. }));
        assert_eq!(remote.creates(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_creates_nothing_and_keeps_cursor() {
        let store = Arc::new(MemoryStore::new());
        let selector = Arc::new(FakeSelector::new(records(&["a", "b"])));
        let remote = Arc::new(FakeRemote::new());
        let settings = EngineSettings {
            dry_run: true,
            ..settings()
        };

        engine(&store, &selector, &remote, settings)
            .run_pass()
            .await
            .unwrap();

        assert_eq!(remote.queries(), 2);
        assert_eq!(remote.creates(), 0);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_pass_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let selector = Arc::new(FakeSelector::new(records(&["a"])));
        let remote = Arc::new(FakeRemote::new().with_create_latency(Duration::from_millis(50)));
        let engine = Arc::new(engine(&store, &selector, &remote, settings()));

        let (first, second) = tokio::join!(engine.run_pass(), async {
            tokio::task::yield_now().await;
            engine.run_pass().await
        });

        assert!(matches!(first.unwrap(), PassOutcome::Completed(_)));
        assert!(matches!(second.unwrap(), PassOutcome::Skipped));
        assert_eq!(selector.calls(), 1);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_pass_outcome_json_is_tagged() {
        let json = serde_json::to_value(PassOutcome::NoNewData {
            cursor: SyncCursor::new("12"),
        })
        .unwrap();
        assert_eq!(json["outcome"], "no_new_data");
        assert_eq!(json["cursor"]["position"], "12");

        let json = serde_json::to_value(PassOutcome::Skipped).unwrap();
        assert_eq!(json["outcome"], "skipped");
    }

    #[test]
    fn test_delivered_prefix_end_without_records() {
        assert_eq!(
            delivered_prefix_end(&[], &[], &DispatchReport::default()),
            None
        );
    }
}
