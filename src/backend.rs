//! The backing persistence context, as the hook layer sees it.
//!
//! Change tracking, validation, and commit mechanics are somebody else's
//! problem; the dispatch engine only needs the narrow surface below. An
//! in-memory implementation for tests and prototyping lives in
//! [`crate::testing::MemoryBackend`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::EntityRef;
use crate::error::{CommitError, ValidationError};
use crate::op::EntityOp;

/// One tracked entity and its current tentative operation.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Handle to the tracked entity.
    pub entity: EntityRef,
    /// The operation the tracker currently has pending for it.
    pub op: EntityOp,
}

/// Callback invoked once per entity materialized from storage.
pub type MaterializedCallback = Arc<dyn Fn(&EntityRef) + Send + Sync>;

/// Identifies one materialization subscription, for unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// The wrapped persistence context.
///
/// A save cycle calls these in a fixed order: [`pending_entries`](Backend::pending_entries)
/// to snapshot, [`validation_enabled`](Backend::validation_enabled) and
/// [`validate`](Backend::validate) between the two pre-save passes, then
/// [`commit`](Backend::commit) (or its async twin). The commit is expected
/// to enforce validation itself when enabled — the hook layer never
/// short-circuits it.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Every tracked entry with its current operation, including
    /// `Unchanged` ones; callers filter.
    fn pending_entries(&self) -> Vec<PendingEntry>;

    /// Re-mark a tracked entity's pending operation.
    ///
    /// Called when a pre-save hook redirects an operation, so the commit
    /// honors the redirect.
    fn set_pending_op(&self, entity: &EntityRef, op: EntityOp);

    /// Whether validation runs as part of a save.
    fn validation_enabled(&self) -> bool;

    /// Per-entity validation check.
    fn validate(&self, entity: &EntityRef) -> Result<(), ValidationError>;

    /// Write all pending operations. Returns the number of entities written.
    fn commit(&self) -> Result<usize, CommitError>;

    /// Awaitable variant of [`commit`](Backend::commit).
    async fn commit_async(&self) -> Result<usize, CommitError>;

    /// Subscribe to per-entity materialization events.
    ///
    /// Backends with no event source keep the default, which reports the
    /// subscription as unavailable; the hook layer then skips post-load
    /// dispatch silently.
    fn subscribe_materialized(&self, callback: MaterializedCallback) -> Option<SubscriptionId> {
        let _ = callback;
        None
    }

    /// Release a subscription handed out by
    /// [`subscribe_materialized`](Backend::subscribe_materialized).
    fn unsubscribe_materialized(&self, id: SubscriptionId) {
        let _ = id;
    }
}
