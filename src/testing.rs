//! In-memory collaborators for exercising the sync engine without SQLite or
//! Notion.
//!
//! Each fake counts the calls it receives so tests can assert exactly which
//! side effects a pass produced.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use checkpoint::{CursorStore, MemoryStore, SyncCursor};
use notion_sink::RemoteStore;
use sqlite_notion_sync_sqlite_source::ChangeSelector;
use sync_core::{RemoteRecord, SourceRecord};

/// RemoteStore keyed by locator.
///
/// Successfully created records become visible to later existence queries,
/// like pages in a real database.
#[derive(Default)]
pub struct FakeRemote {
    pages: Mutex<HashMap<String, String>>,
    created: Mutex<Vec<String>>,
    query_failures: HashSet<String>,
    create_failures: HashSet<String>,
    query_latency: Duration,
    create_latency: Duration,
    queries: AtomicUsize,
    creates: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate remote pages with these locators.
    pub fn with_existing<I, S>(self, locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut pages) = self.pages.lock() {
            for (i, locator) in locators.into_iter().enumerate() {
                pages.insert(locator.into(), format!("existing-{i}"));
            }
        }
        self
    }

    /// Existence queries for these locators fail.
    pub fn with_query_failures<I, S>(mut self, locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_failures = locators.into_iter().map(Into::into).collect();
        self
    }

    /// Creates for these locators are rejected.
    pub fn with_create_failures<I, S>(mut self, locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_failures = locators.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_query_latency(mut self, latency: Duration) -> Self {
        self.query_latency = latency;
        self
    }

    pub fn with_create_latency(mut self, latency: Duration) -> Self {
        self.create_latency = latency;
        self
    }

    /// Existence queries received.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Create attempts received, including rejected ones.
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Highest number of creates observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Locators of successfully created records, in completion order.
    pub fn created(&self) -> Vec<String> {
        self.created
            .lock()
            .map(|created| created.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn create_record(&self, record: &RemoteRecord) -> Result<String> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        // Give sibling creates of the same batch a chance to start.
        if self.create_latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.create_latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.create_failures.contains(&record.locator) {
            bail!("validation_error: rejected record {}", record.source_id);
        }

        let id = format!("page-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.pages
            .lock()
            .map_err(|_| anyhow!("fake remote lock poisoned"))?
            .insert(record.locator.clone(), id.clone());
        self.created
            .lock()
            .map_err(|_| anyhow!("fake remote lock poisoned"))?
            .push(record.locator.clone());
        Ok(id)
    }

    async fn find_by_locator(&self, locator: &str) -> Result<Option<String>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.query_latency.is_zero() {
            tokio::time::sleep(self.query_latency).await;
        }
        if self.query_failures.contains(locator) {
            bail!("service unavailable while querying {locator}");
        }
        let pages = self
            .pages
            .lock()
            .map_err(|_| anyhow!("fake remote lock poisoned"))?;
        Ok(pages.get(locator).cloned())
    }
}

/// ChangeSelector over a fixed list of records.
pub struct FakeSelector {
    records: Mutex<Vec<SourceRecord>>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSelector {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A selector whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeSelector for FakeSelector {
    async fn select_since(&self, cursor: &SyncCursor) -> Result<Vec<SourceRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("database is locked");
        }
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("fake selector lock poisoned"))?;
        Ok(records
            .iter()
            .filter(|r| {
                cursor.position.is_empty()
                    || SyncCursor::new(r.position.clone()).cmp_position(cursor)
                        == CmpOrdering::Greater
            })
            .cloned()
            .collect())
    }
}

/// MemoryStore whose reads or writes can be made to fail.
#[derive(Default)]
pub struct FlakyCursorStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyCursorStore {
    pub fn failing_reads() -> Self {
        let store = Self::default();
        store.fail_reads.store(true, Ordering::SeqCst);
        store
    }

    pub fn failing_writes() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl CursorStore for FlakyCursorStore {
    fn backend(&self) -> &'static str {
        "flaky-memory"
    }

    async fn read_cursor(&self) -> Result<Option<SyncCursor>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("cursor storage unavailable");
        }
        self.inner.read_cursor().await
    }

    async fn write_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("cursor storage is read-only");
        }
        self.inner.write_cursor(cursor).await
    }
}
