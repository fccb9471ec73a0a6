//! The per-cycle dispatch state machine.

use std::sync::Arc;

use crate::backend::Backend;
use crate::entity::EntityRef;
use crate::error::HookError;
use crate::hooks::hook::{PostSaveHook, PreSaveHook};
use crate::metadata::{ContextHandle, HookMetadata};
use crate::op::EntityOp;

/// One snapshotted pending entity.
///
/// Identity is fixed for the whole cycle; only `pre_save_op` moves, and
/// only when a pre-save hook redirects the operation.
pub(crate) struct SnapshotEntry {
    pub(crate) entity: EntityRef,
    pub(crate) pre_save_op: EntityOp,
}

/// The authoritative operation set for one save cycle.
///
/// Computed once before any hook runs and reused, unmodified in identity,
/// through both the pre- and post-save phases. Post-save hooks match
/// against `pre_save_op` — never the tracker's post-commit state, which has
/// legitimately moved on to `Unchanged`.
pub(crate) struct SaveCycle {
    entries: Vec<SnapshotEntry>,
    context: ContextHandle,
}

impl SaveCycle {
    /// Snapshot every tracked entity with a pending operation.
    pub(crate) fn snapshot<S: Backend>(backend: &S, context: ContextHandle) -> Self {
        let entries = backend
            .pending_entries()
            .into_iter()
            .filter(|entry| entry.op.is_pending())
            .map(|entry| SnapshotEntry {
                entity: entry.entity,
                pre_save_op: entry.op,
            })
            .collect();
        Self { entries, context }
    }

    /// Run one pre-save pass over the snapshot.
    ///
    /// Only hooks whose `requires_validation` matches the requested flavor
    /// run; each is filtered per entry by operation-set membership, checked
    /// against the entry's *current* `pre_save_op` so a redirect made by an
    /// earlier hook is what later hooks match against. A redirect is also
    /// written through to the backend, so the eventual commit honors it.
    pub(crate) fn run_pre_pass<S: Backend>(
        &mut self,
        backend: &S,
        hooks: &[Arc<dyn PreSaveHook>],
        requires_validation: bool,
    ) -> Result<(), HookError> {
        for entry in &mut self.entries {
            for hook in hooks {
                if hook.requires_validation() != requires_validation {
                    continue;
                }
                if !hook.listen_ops().contains_op(entry.pre_save_op) {
                    continue;
                }

                let mut metadata =
                    HookMetadata::with_context(entry.pre_save_op, self.context.clone());
                entry
                    .entity
                    .with_mut(|entity| hook.apply_if_applicable(entity, &mut metadata))?;

                if metadata.op_changed() {
                    tracing::debug!(
                        hook = hook.name(),
                        from = ?entry.pre_save_op,
                        to = ?metadata.op(),
                        "pre-save hook redirected pending operation"
                    );
                    entry.pre_save_op = metadata.op();
                    backend.set_pending_op(&entry.entity, metadata.op());
                }
            }
        }
        Ok(())
    }

    /// Whether any tracked, non-`Unchanged` entity currently fails
    /// validation.
    ///
    /// Asks the backend fresh rather than using the snapshot, so operations
    /// redirected during the first pre-save pass are validated in their
    /// redirected form. Always `false` when validation is disabled.
    pub(crate) fn has_validation_errors<S: Backend>(backend: &S) -> bool {
        if !backend.validation_enabled() {
            return false;
        }
        backend
            .pending_entries()
            .iter()
            .filter(|entry| entry.op != EntityOp::Unchanged)
            .any(|entry| backend.validate(&entry.entity).is_err())
    }

    /// Run the post-save pass over the snapshot.
    ///
    /// Each hook sees the operation captured before the commit. Operation
    /// changes made on post-save metadata are deliberately ignored.
    pub(crate) fn run_post_pass(&self, hooks: &[Arc<dyn PostSaveHook>]) -> Result<(), HookError> {
        for entry in &self.entries {
            for hook in hooks {
                if !hook.listen_ops().contains_op(entry.pre_save_op) {
                    continue;
                }

                let mut metadata =
                    HookMetadata::with_context(entry.pre_save_op, self.context.clone());
                entry
                    .entity
                    .with_mut(|entity| hook.apply_if_applicable(entity, &mut metadata))?;
            }
        }
        Ok(())
    }
}
