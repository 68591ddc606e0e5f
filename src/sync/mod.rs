//! Incremental sync engine
//!
//! One pass reads the cursor, selects rows newer than it, drops rows that
//! already exist remotely, delivers the rest in rate-limited batches and
//! finally advances the cursor:
//!
//! ```text
//! CursorStore ──> ChangeSelector ──> ExistenceOracle ──> BatchDispatcher ──> CursorStore
//!   (read)          (id > cursor)     (per candidate)     (chunked fan-out)    (advance)
//! ```
//!
//! The [`Scheduler`] triggers one pass at startup and one per interval.
//! Passes never overlap: the scheduler awaits each pass, and
//! [`SyncEngine::run_pass`] skips when another pass holds the engine.
//!
//! # Delivery guarantees
//!
//! Delivery is at-least-once with locator-based dedup. Existence checks are
//! best-effort; with [`ExistencePolicy::FailOpen`] a failed check may create a
//! duplicate page. With the default [`AdvancePolicy::Now`] the cursor moves to
//! the current time even when some creates failed, so failed rows are not
//! retried; [`AdvancePolicy::Delivered`] holds the cursor at the last row of
//! the delivered prefix instead.

mod dispatcher;
mod engine;
mod oracle;
mod scheduler;

pub use dispatcher::{BatchDispatcher, DispatchReport};
pub use engine::{
    AdvancePolicy, EngineSettings, PassOutcome, PassReport, SyncEngine, SyncState,
};
pub use oracle::{Disposition, Existence, ExistenceOracle, ExistencePolicy, FilterReport};
pub use scheduler::{Scheduler, SchedulerStats};
