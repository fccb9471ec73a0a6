//! Per-invocation metadata handed to hooks.

use std::any::Any;
use std::sync::{Arc, Weak};

use crate::op::EntityOp;

/// A non-owning handle to the context an entity belongs to.
///
/// Holding one never extends the context's lifetime; [`get`](ContextHandle::get)
/// returns `None` once the context has been dropped.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Weak<dyn Any + Send + Sync>,
}

impl ContextHandle {
    /// Build a handle from a live context.
    pub fn for_context<C>(context: &Arc<C>) -> Self
    where
        C: Any + Send + Sync,
    {
        Self::from_weak(Arc::downgrade(context))
    }

    pub(crate) fn from_weak<C>(weak: Weak<C>) -> Self
    where
        C: Any + Send + Sync,
    {
        let inner: Weak<dyn Any + Send + Sync> = weak;
        Self { inner }
    }

    /// Upgrade and downcast to the concrete context type.
    pub fn get<C>(&self) -> Option<Arc<C>>
    where
        C: Any + Send + Sync,
    {
        self.inner.upgrade()?.downcast::<C>().ok()
    }

    /// Whether the context is still alive.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Mutable record of an entity's tentative operation during one hook
/// invocation.
///
/// A fresh instance is built for every (entity, hook) pair; pre-save and
/// post-save phases never share one. A pre-save hook redirects the pending
/// operation by calling [`set_op`](HookMetadata::set_op) — the dispatch
/// engine picks the change up through [`op_changed`](HookMetadata::op_changed).
#[derive(Debug)]
pub struct HookMetadata {
    op: EntityOp,
    op_changed: bool,
    context: Option<ContextHandle>,
}

impl HookMetadata {
    /// Metadata without a context handle.
    pub fn new(op: EntityOp) -> Self {
        Self {
            op,
            op_changed: false,
            context: None,
        }
    }

    /// Metadata carrying a handle to the owning context.
    pub fn with_context(op: EntityOp, context: ContextHandle) -> Self {
        Self {
            op,
            op_changed: false,
            context: Some(context),
        }
    }

    /// The entity's current tentative operation.
    pub fn op(&self) -> EntityOp {
        self.op
    }

    /// Reassign the tentative operation.
    ///
    /// Writing a different value latches [`op_changed`](HookMetadata::op_changed)
    /// to `true`; writing the current value back is a no-op. The latch is
    /// one-way: once set it stays set for the lifetime of this instance.
    pub fn set_op(&mut self, op: EntityOp) {
        if op != self.op {
            self.op = op;
            self.op_changed = true;
        }
    }

    /// Whether [`set_op`](HookMetadata::set_op) ever changed the operation.
    pub fn op_changed(&self) -> bool {
        self.op_changed
    }

    /// Handle to the owning context, when dispatched from one.
    pub fn context(&self) -> Option<&ContextHandle> {
        self.context.as_ref()
    }
}
