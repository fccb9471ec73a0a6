//! In-memory backend for tests and prototyping.
//!
//! Provides [`MemoryBackend`]: a configurable change tracker that
//! implements [`Backend`] without any real storage behind it.
//!
//! - Seed rows with [`seed`](MemoryBackend::seed), stage work with
//!   [`add`](MemoryBackend::add) / [`mark_modified`](MemoryBackend::mark_modified) /
//!   [`mark_deleted`](MemoryBackend::mark_deleted)
//! - Register validation rules and storage constraints as closures
//! - Inject a commit failure with [`fail_next_commit`](MemoryBackend::fail_next_commit)
//! - Fire materialization events with [`materialize`](MemoryBackend::materialize)
//! - Observe outcomes via [`operation_of`](MemoryBackend::operation_of),
//!   [`is_stored`](MemoryBackend::is_stored), and [`commit_count`](MemoryBackend::commit_count)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{Backend, MaterializedCallback, PendingEntry, SubscriptionId};
use crate::entity::{Entity, EntityRef};
use crate::error::{CommitError, ValidationError};
use crate::op::EntityOp;

type Check = Arc<dyn Fn(&dyn Entity) -> Result<(), ValidationError> + Send + Sync>;

struct Tracked {
    entity: EntityRef,
    op: EntityOp,
    stored: bool,
}

#[derive(Default)]
struct Inner {
    tracked: Vec<Tracked>,
    validators: Vec<Check>,
    constraints: Vec<Check>,
    listeners: Vec<(SubscriptionId, MaterializedCallback)>,
    next_subscription: u64,
    commits: u32,
    fail_next_commit: Option<CommitError>,
}

/// An in-memory change tracker implementing [`Backend`].
///
/// Validators model the application-level validation pass (honored only
/// while validation is enabled); constraints model storage-level rules the
/// commit enforces regardless, the way a NOT NULL column would.
pub struct MemoryBackend {
    validation_enabled: AtomicBool,
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    /// An empty tracker with validation enabled.
    pub fn new() -> Self {
        Self {
            validation_enabled: AtomicBool::new(true),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Track an entity as already stored, with no pending work.
    pub fn seed(&self, entity: &EntityRef) {
        self.inner.lock().tracked.push(Tracked {
            entity: entity.clone(),
            op: EntityOp::Unchanged,
            stored: true,
        });
    }

    /// Track an entity as pending insert.
    pub fn add(&self, entity: &EntityRef) {
        self.inner.lock().tracked.push(Tracked {
            entity: entity.clone(),
            op: EntityOp::Added,
            stored: false,
        });
    }

    /// Mark a tracked entity as pending update.
    pub fn mark_modified(&self, entity: &EntityRef) {
        self.set_pending_op(entity, EntityOp::Modified);
    }

    /// Mark a tracked entity as pending delete.
    pub fn mark_deleted(&self, entity: &EntityRef) {
        self.set_pending_op(entity, EntityOp::Deleted);
    }

    /// Track an entity as freshly loaded and fire the materialization
    /// event for it.
    pub fn materialize(&self, entity: &EntityRef) {
        let listeners: Vec<MaterializedCallback> = {
            let mut inner = self.inner.lock();
            inner.tracked.push(Tracked {
                entity: entity.clone(),
                op: EntityOp::Unchanged,
                stored: true,
            });
            inner
                .listeners
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect()
        };
        // Listeners run outside the lock; they dispatch hooks that may call
        // back into this tracker.
        for callback in listeners {
            callback(entity);
        }
    }

    /// Register an application-level validation rule.
    pub fn add_validator(
        &self,
        check: impl Fn(&dyn Entity) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) {
        self.inner.lock().validators.push(Arc::new(check));
    }

    /// Register a storage-level constraint, enforced by every commit.
    pub fn add_constraint(
        &self,
        check: impl Fn(&dyn Entity) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) {
        self.inner.lock().constraints.push(Arc::new(check));
    }

    /// Toggle the validation pass.
    pub fn set_validation_enabled(&self, enabled: bool) {
        self.validation_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Make the next commit fail with `error` before touching anything.
    pub fn fail_next_commit(&self, error: CommitError) {
        self.inner.lock().fail_next_commit = Some(error);
    }

    /// The tracked entity's current operation, if tracked.
    pub fn operation_of(&self, entity: &EntityRef) -> Option<EntityOp> {
        self.inner
            .lock()
            .tracked
            .iter()
            .find(|t| t.entity.ptr_eq(entity))
            .map(|t| t.op)
    }

    /// Whether the entity currently has a row in storage.
    pub fn is_stored(&self, entity: &EntityRef) -> bool {
        self.inner
            .lock()
            .tracked
            .iter()
            .any(|t| t.entity.ptr_eq(entity) && t.stored)
    }

    /// Number of stored rows.
    pub fn stored_count(&self) -> usize {
        self.inner.lock().tracked.iter().filter(|t| t.stored).count()
    }

    /// How many times a commit was attempted.
    pub fn commit_count(&self) -> u32 {
        self.inner.lock().commits
    }

    /// Number of live materialization subscriptions.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    fn apply_commit(&self) -> Result<usize, CommitError> {
        // Snapshot entries and checks, then run them outside the lock.
        let (entries, validators, constraints, injected) = {
            let mut inner = self.inner.lock();
            inner.commits += 1;
            let entries: Vec<(EntityRef, EntityOp)> = inner
                .tracked
                .iter()
                .map(|t| (t.entity.clone(), t.op))
                .collect();
            (
                entries,
                inner.validators.clone(),
                inner.constraints.clone(),
                inner.fail_next_commit.take(),
            )
        };

        if let Some(error) = injected {
            return Err(error);
        }

        if self.validation_enabled.load(Ordering::Relaxed) {
            for (entity, op) in &entries {
                if *op == EntityOp::Unchanged {
                    continue;
                }
                for check in &validators {
                    entity.with(|e| check(e))?;
                }
            }
        }

        for (entity, op) in &entries {
            if !op.is_pending() {
                continue;
            }
            for check in &constraints {
                entity
                    .with(|e| check(e))
                    .map_err(|err| CommitError::Constraint(err.to_string()))?;
            }
        }

        let mut inner = self.inner.lock();
        let mut written = 0;
        inner.tracked.retain_mut(|t| match t.op {
            EntityOp::Added => {
                t.op = EntityOp::Unchanged;
                t.stored = true;
                written += 1;
                true
            }
            EntityOp::Modified => {
                t.op = EntityOp::Unchanged;
                written += 1;
                true
            }
            EntityOp::Deleted => {
                written += 1;
                false
            }
            EntityOp::Unchanged | EntityOp::Detached => true,
        });
        Ok(written)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn pending_entries(&self) -> Vec<PendingEntry> {
        self.inner
            .lock()
            .tracked
            .iter()
            .map(|t| PendingEntry {
                entity: t.entity.clone(),
                op: t.op,
            })
            .collect()
    }

    fn set_pending_op(&self, entity: &EntityRef, op: EntityOp) {
        let mut inner = self.inner.lock();
        if let Some(tracked) = inner.tracked.iter_mut().find(|t| t.entity.ptr_eq(entity)) {
            tracked.op = op;
        }
    }

    fn validation_enabled(&self) -> bool {
        self.validation_enabled.load(Ordering::Relaxed)
    }

    fn validate(&self, entity: &EntityRef) -> Result<(), ValidationError> {
        let validators = self.inner.lock().validators.clone();
        for check in &validators {
            entity.with(|e| check(e))?;
        }
        Ok(())
    }

    fn commit(&self) -> Result<usize, CommitError> {
        self.apply_commit()
    }

    async fn commit_async(&self) -> Result<usize, CommitError> {
        self.apply_commit()
    }

    fn subscribe_materialized(&self, callback: MaterializedCallback) -> Option<SubscriptionId> {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.listeners.push((id, callback));
        Some(id)
    }

    fn unsubscribe_materialized(&self, id: SubscriptionId) {
        self.inner.lock().listeners.retain(|(sub, _)| *sub != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Row {
        label: String,
    }

    #[test]
    fn commit_moves_added_entities_to_unchanged_and_stores_them() {
        let backend = MemoryBackend::new();
        let entity = EntityRef::new(Row::default());
        backend.add(&entity);

        let written = backend.commit().expect("commit should succeed");

        assert_eq!(written, 1);
        assert_eq!(backend.operation_of(&entity), Some(EntityOp::Unchanged));
        assert!(backend.is_stored(&entity));
    }

    #[test]
    fn commit_removes_deleted_entities() {
        let backend = MemoryBackend::new();
        let entity = EntityRef::new(Row::default());
        backend.seed(&entity);
        backend.mark_deleted(&entity);

        backend.commit().expect("commit should succeed");

        assert_eq!(backend.operation_of(&entity), None);
        assert_eq!(backend.stored_count(), 0);
    }

    #[test]
    fn validators_gate_the_commit_only_while_enabled() {
        let backend = MemoryBackend::new();
        backend.add_validator(|entity| {
            let row = entity
                .as_any()
                .downcast_ref::<Row>()
                .ok_or_else(|| ValidationError::new::<Row>("wrong type"))?;
            if row.label.is_empty() {
                return Err(ValidationError::new::<Row>("label required"));
            }
            Ok(())
        });
        let entity = EntityRef::new(Row::default());
        backend.add(&entity);

        let err = backend.commit().expect_err("validation should fail");
        assert!(matches!(err, CommitError::Validation(_)));

        backend.set_validation_enabled(false);
        backend.commit().expect("disabled validation lets it through");
    }

    #[test]
    fn constraints_fail_the_commit_even_with_validation_disabled() {
        let backend = MemoryBackend::new();
        backend.set_validation_enabled(false);
        backend.add_constraint(|_| Err(ValidationError::new::<Row>("unique index")));
        let entity = EntityRef::new(Row::default());
        backend.add(&entity);

        let err = backend.commit().expect_err("constraint should fail");
        assert!(matches!(err, CommitError::Constraint(_)));
    }

    #[test]
    fn injected_failure_fires_once() {
        let backend = MemoryBackend::new();
        let entity = EntityRef::new(Row::default());
        backend.add(&entity);
        backend.fail_next_commit(CommitError::Connection("socket closed".into()));

        let err = backend.commit().expect_err("injected failure");
        assert!(matches!(err, CommitError::Connection(_)));
        assert_eq!(backend.operation_of(&entity), Some(EntityOp::Added));

        backend.commit().expect("next commit succeeds");
        assert_eq!(backend.commit_count(), 2);
    }

    #[test]
    fn materialize_fires_subscribed_listeners() {
        let backend = MemoryBackend::new();
        let seen = Arc::new(Mutex::new(0u32));
        let id = {
            let seen = Arc::clone(&seen);
            backend
                .subscribe_materialized(Arc::new(move |_| *seen.lock() += 1))
                .expect("memory backend has an event source")
        };

        backend.materialize(&EntityRef::new(Row::default()));
        assert_eq!(*seen.lock(), 1);

        backend.unsubscribe_materialized(id);
        backend.materialize(&EntityRef::new(Row::default()));
        assert_eq!(*seen.lock(), 1);
        assert_eq!(backend.listener_count(), 0);
    }
}
