//! Remote existence checks and duplicate filtering.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use notion_sink::RemoteStore;
use sync_core::SourceRecord;
use tracing::{debug, warn};

/// How a failed existence check is interpreted.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExistencePolicy {
    /// Treat as not found; the record is delivered and may end up duplicated
    #[default]
    FailOpen,
    /// Treat as found; the record is skipped this pass
    FailClosed,
}

/// Raw answer of one existence query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    Exists { remote_id: String },
    Absent,
    /// The query failed or timed out
    Unknown { error: String },
}

/// What filtering decided for one selected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Scheduled for delivery
    Retained,
    /// A remote record with the same locator exists
    RemoteDuplicate,
    /// An earlier record of the same change set has the same locator
    LocalDuplicate,
    /// Existence unknown and skipped under [`ExistencePolicy::FailClosed`]
    Unverified,
}

impl Disposition {
    /// Whether the record needs no delivery to count as mirrored.
    pub fn is_accounted(&self) -> bool {
        matches!(
            self,
            Disposition::RemoteDuplicate | Disposition::LocalDuplicate
        )
    }
}

/// Result of filtering a change set.
#[derive(Debug, Default)]
pub struct FilterReport {
    /// One entry per selected record, in selection order
    pub dispositions: Vec<Disposition>,
    /// Records to deliver, in selection order
    pub retained: Vec<SourceRecord>,
}

impl FilterReport {
    pub fn count(&self, disposition: Disposition) -> usize {
        self.dispositions
            .iter()
            .filter(|d| **d == disposition)
            .count()
    }
}

/// Best-effort answer to "does this record already exist remotely?".
pub struct ExistenceOracle {
    remote: Arc<dyn RemoteStore>,
    policy: ExistencePolicy,
    timeout: Duration,
}

impl ExistenceOracle {
    pub fn new(remote: Arc<dyn RemoteStore>, policy: ExistencePolicy, timeout: Duration) -> Self {
        Self {
            remote,
            policy,
            timeout,
        }
    }

    /// Query the remote index for `locator`.
    ///
    /// An empty locator cannot identify anything and is reported absent
    /// without a query.
    pub async fn query(&self, locator: &str) -> Existence {
        if locator.is_empty() {
            return Existence::Absent;
        }
        match tokio::time::timeout(self.timeout, self.remote.find_by_locator(locator)).await {
            Ok(Ok(Some(remote_id))) => Existence::Exists { remote_id },
            Ok(Ok(None)) => Existence::Absent,
            Ok(Err(e)) => Existence::Unknown {
                error: format!("{e:#}"),
            },
            Err(_) => Existence::Unknown {
                error: format!("existence query timed out after {:?}", self.timeout),
            },
        }
    }

    /// Whether `record` should be treated as already present remotely, with
    /// the failure policy applied.
    pub async fn exists(&self, record: &SourceRecord) -> bool {
        self.classify(record).await != Disposition::Retained
    }

    /// Query the remote index for `record` and apply the failure policy.
    async fn classify(&self, record: &SourceRecord) -> Disposition {
        match self.query(&record.locator).await {
            Existence::Absent => Disposition::Retained,
            Existence::Exists { remote_id } => {
                debug!(
                    "Record {} already exists remotely as {remote_id} (locator: {})",
                    record.id, record.locator
                );
                Disposition::RemoteDuplicate
            }
            Existence::Unknown { error } => match self.policy {
                ExistencePolicy::FailOpen => {
                    warn!(
                        "Existence check failed for record {} (locator: {}): {error}; delivering anyway",
                        record.id, record.locator
                    );
                    Disposition::Retained
                }
                ExistencePolicy::FailClosed => {
                    warn!(
                        "Existence check failed for record {} (locator: {}): {error}; skipping",
                        record.id, record.locator
                    );
                    Disposition::Unverified
                }
            },
        }
    }

    /// Run every selected record through the oracle, one query at a time,
    /// keeping the non-duplicates in order.
    pub async fn filter(&self, records: Vec<SourceRecord>) -> FilterReport {
        let mut report = FilterReport {
            dispositions: Vec::with_capacity(records.len()),
            retained: Vec::with_capacity(records.len()),
        };
        let mut seen = HashSet::new();

        for record in records {
            if !record.locator.is_empty() && !seen.insert(record.locator.clone()) {
                debug!(
                    "Record {} repeats locator {} within this pass",
                    record.id, record.locator
                );
                report.dispositions.push(Disposition::LocalDuplicate);
                continue;
            }

            let disposition = self.classify(&record).await;

            if disposition == Disposition::Retained {
                report.retained.push(record);
            }
            report.dispositions.push(disposition);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRemote;

    fn record(id: &str, locator: &str) -> SourceRecord {
        SourceRecord::new(id, format!("name {id}"), "", locator)
    }

    fn oracle(remote: &Arc<FakeRemote>, policy: ExistencePolicy) -> ExistenceOracle {
        ExistenceOracle::new(remote.clone(), policy, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_query_reports_existing_locator() {
        let remote = Arc::new(FakeRemote::new().with_existing(["/a"]));
        let oracle = oracle(&remote, ExistencePolicy::FailOpen);

        assert!(matches!(oracle.query("/a").await, Existence::Exists { .. }));
        assert_eq!(oracle.query("/b").await, Existence::Absent);
        assert_eq!(remote.queries(), 2);
    }

    #[tokio::test]
    async fn test_query_skips_empty_locator() {
        let remote = Arc::new(FakeRemote::new());
        let oracle = oracle(&remote, ExistencePolicy::FailOpen);

        assert_eq!(oracle.query("").await, Existence::Absent);
        assert_eq!(remote.queries(), 0);
    }

    #[tokio::test]
    async fn test_exists_fail_open_on_query_error() {
        let remote = Arc::new(FakeRemote::new().with_query_failures(["/a"]));
        assert!(!oracle(&remote, ExistencePolicy::FailOpen).exists(&record("1", "/a")).await);
        assert!(oracle(&remote, ExistencePolicy::FailClosed).exists(&record("1", "/a")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_timeout_is_unknown() {
        let remote = Arc::new(FakeRemote::new().with_query_latency(Duration::from_secs(60)));
        let oracle = oracle(&remote, ExistencePolicy::FailOpen);

        match oracle.query("/a").await {
            Existence::Unknown { error } => assert!(error.contains("timed out")),
            other => panic!("unexpected existence: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_filter_excludes_remote_duplicates_in_order() {
        let remote = Arc::new(FakeRemote::new().with_existing(["/b"]));
        let report = oracle(&remote, ExistencePolicy::FailOpen)
            .filter(vec![record("1", "/a"), record("2", "/b"), record("3", "/c")])
            .await;

        let ids: Vec<_> = report.retained.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(
            report.dispositions,
            vec![
                Disposition::Retained,
                Disposition::RemoteDuplicate,
                Disposition::Retained
            ]
        );
    }

    #[tokio::test]
    async fn test_filter_suppresses_repeated_locator_within_pass() {
        let remote = Arc::new(FakeRemote::new());
        let report = oracle(&remote, ExistencePolicy::FailOpen)
            .filter(vec![record("1", "/a"), record("2", "/a"), record("3", "")])
            .await;

        assert_eq!(report.retained.len(), 2);
        assert_eq!(report.count(Disposition::LocalDuplicate), 1);
        // Second "/a" never reaches the remote; empty locators are not queried
        assert_eq!(remote.queries(), 1);
    }

    #[tokio::test]
    async fn test_filter_fail_closed_marks_unverified() {
        let remote = Arc::new(FakeRemote::new().with_query_failures(["/b"]));
        let report = oracle(&remote, ExistencePolicy::FailClosed)
            .filter(vec![record("1", "/a"), record("2", "/b")])
            .await;

        assert_eq!(report.retained.len(), 1);
        assert_eq!(report.dispositions[1], Disposition::Unverified);
        assert!(!Disposition::Unverified.is_accounted());
    }

    #[tokio::test]
    async fn test_filter_fail_open_retains_unknown() {
        let remote = Arc::new(FakeRemote::new().with_query_failures(["/b"]));
        let report = oracle(&remote, ExistencePolicy::FailOpen)
            .filter(vec![record("1", "/a"), record("2", "/b")])
            .await;

        assert_eq!(report.retained.len(), 2);
    }

    #[tokio::test]
    async fn test_exists_agrees_with_filter_under_both_policies() {
        let remote = Arc::new(
            FakeRemote::new()
                .with_existing(["/dup"])
                .with_query_failures(["/down"]),
        );
        let candidates = vec![record("1", "/new"), record("2", "/dup"), record("3", "/down")];

        for policy in [ExistencePolicy::FailOpen, ExistencePolicy::FailClosed] {
            let oracle = oracle(&remote, policy);
            let report = oracle.filter(candidates.clone()).await;
            for (record, disposition) in candidates.iter().zip(&report.dispositions) {
                assert_eq!(
                    oracle.exists(record).await,
                    *disposition != Disposition::Retained,
                    "{policy:?} {}",
                    record.locator
                );
            }
        }
    }
}
