//! The hooked persistence context.
//!
//! [`HookedContext`] wraps a [`Backend`] and runs registered hooks around
//! its save and load lifecycle. One save cycle is strictly sequential:
//!
//! 1. snapshot the pending entities and their tentative operations,
//! 2. run validation-exempt pre-save hooks (they may fix validation
//!    problems, so they run unconditionally),
//! 3. ask the backend whether anything fails validation,
//! 4. run validation-required pre-save hooks only on a clean result,
//! 5. commit — unconditionally; a validation failure surfaces from the
//!    commit itself,
//! 6. run post-save hooks against the pre-commit operation snapshot.
//!
//! Post-load hooks ride the backend's materialization event and are
//! independent of any save cycle.

mod runner;

use std::sync::{Arc, Weak};

use crate::backend::{Backend, MaterializedCallback, SubscriptionId};
use crate::entity::EntityRef;
use crate::error::Result;
use crate::hooks::hook::{PostLoadHook, PostSaveHook, PreSaveHook};
use crate::hooks::registry::HookRegistry;
use crate::metadata::{ContextHandle, HookMetadata};
use crate::op::EntityOp;

use runner::SaveCycle;

/// A persistence context with lifecycle hooks attached.
///
/// Construction yields an `Arc` because the context hands out weak
/// self-references: to hook metadata (so hooks can do contextual lookups
/// without extending the context's lifetime) and to the backend's
/// materialization listener.
///
/// A single context instance must not run concurrent save cycles; the hook
/// layer introduces no locking of its own beyond the registry and the
/// per-entity cells.
pub struct HookedContext<S: Backend> {
    backend: Arc<S>,
    hooks: HookRegistry,
    self_ref: Weak<HookedContext<S>>,
    load_subscription: Option<SubscriptionId>,
}

impl<S: Backend> HookedContext<S> {
    /// Wrap a backend with an empty hook registry.
    pub fn new(backend: Arc<S>) -> Arc<Self> {
        Self::build(backend, HookRegistry::new())
    }

    /// Start building a context with hooks wired at construction.
    pub fn builder(backend: Arc<S>) -> HookedContextBuilder<S> {
        HookedContextBuilder {
            backend,
            hooks: HookRegistry::new(),
        }
    }

    fn build(backend: Arc<S>, hooks: HookRegistry) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let listener: MaterializedCallback = {
                let weak = weak.clone();
                Arc::new(move |entity: &EntityRef| {
                    if let Some(context) = weak.upgrade() {
                        context.dispatch_post_load(entity);
                    }
                })
            };
            // Backends without an event source return None; post-load
            // dispatch is then skipped silently.
            let load_subscription = backend.subscribe_materialized(listener);
            Self {
                backend: Arc::clone(&backend),
                hooks,
                self_ref: weak.clone(),
                load_subscription,
            }
        })
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<S> {
        &self.backend
    }

    /// The hook registry, for registration at any point in the context's
    /// lifetime.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Register a pre-save hook.
    pub fn register_pre(&self, hook: Arc<dyn PreSaveHook>) {
        self.hooks.register_pre(hook);
    }

    /// Register a post-save hook.
    pub fn register_post(&self, hook: Arc<dyn PostSaveHook>) {
        self.hooks.register_post(hook);
    }

    /// Register a post-load hook.
    pub fn register_post_load(&self, hook: Arc<dyn PostLoadHook>) {
        self.hooks.register_post_load(hook);
    }

    /// Whether this context is listening for materialization events.
    pub fn has_load_listener(&self) -> bool {
        self.load_subscription.is_some()
    }

    /// Run one save cycle with a synchronous commit.
    ///
    /// Returns the number of entities the backend reports written. Any
    /// hook, validation, or commit failure propagates verbatim; a failed
    /// commit means no post-save hook runs.
    pub fn save(&self) -> Result<usize> {
        let (cycle, post_hooks) = self.begin_cycle()?;
        let written = self.backend.commit()?;
        if !post_hooks.is_empty() {
            cycle.run_post_pass(&post_hooks)?;
        }
        Ok(written)
    }

    /// Run one save cycle, awaiting the backend's commit.
    ///
    /// Identical phase sequence to [`save`](HookedContext::save); the only
    /// suspension point is the commit itself. Cancellation is whatever
    /// dropping the future mid-commit means to the backend — the cycle is
    /// abandoned and its post-save hooks never run.
    pub async fn save_async(&self) -> Result<usize> {
        let (cycle, post_hooks) = self.begin_cycle()?;
        let written = self.backend.commit_async().await?;
        if !post_hooks.is_empty() {
            cycle.run_post_pass(&post_hooks)?;
        }
        Ok(written)
    }

    /// Snapshot and run both pre-save passes.
    ///
    /// The post-save hook list is sampled here, before the commit, so hooks
    /// registered mid-cycle wait for the next one.
    fn begin_cycle(&self) -> Result<(SaveCycle, Vec<Arc<dyn PostSaveHook>>)> {
        let mut cycle = SaveCycle::snapshot(self.backend.as_ref(), self.handle());
        let pre_hooks = self.hooks.pre_hooks();

        cycle.run_pre_pass(self.backend.as_ref(), &pre_hooks, false)?;

        if SaveCycle::has_validation_errors(self.backend.as_ref()) {
            tracing::debug!("validation errors present, skipping validation-gated pre-save hooks");
        } else {
            cycle.run_pre_pass(self.backend.as_ref(), &pre_hooks, true)?;
        }

        let post_hooks = self.hooks.post_hooks();
        Ok((cycle, post_hooks))
    }

    fn handle(&self) -> ContextHandle {
        ContextHandle::from_weak(self.self_ref.clone())
    }

    /// Post-load dispatch for one materialized entity.
    ///
    /// The materialization event has no error channel back to the loader,
    /// so a failing hook is logged and aborts the remaining post-load hooks
    /// for this entity; the load itself is unaffected.
    fn dispatch_post_load(&self, entity: &EntityRef) {
        let hooks = self.hooks.post_load_hooks();
        if hooks.is_empty() {
            return;
        }

        let handle = self.handle();
        for hook in hooks {
            let mut metadata = HookMetadata::with_context(EntityOp::Unchanged, handle.clone());
            let result = entity.with_mut(|entity| hook.apply_if_applicable(entity, &mut metadata));
            if let Err(err) = result {
                tracing::warn!(hook = hook.name(), "post-load hook failed: {}", err);
                break;
            }
        }
    }
}

impl<S: Backend> Drop for HookedContext<S> {
    fn drop(&mut self) {
        if let Some(id) = self.load_subscription {
            self.backend.unsubscribe_materialized(id);
        }
    }
}

/// Builder that wires hooks at construction time.
///
/// Equivalent to registering against [`HookedContext::hooks`] afterwards;
/// exists so a context can come up with its hook set already in place.
pub struct HookedContextBuilder<S: Backend> {
    backend: Arc<S>,
    hooks: HookRegistry,
}

impl<S: Backend> HookedContextBuilder<S> {
    /// Add a pre-save hook.
    pub fn pre_save(self, hook: Arc<dyn PreSaveHook>) -> Self {
        self.hooks.register_pre(hook);
        self
    }

    /// Add a post-save hook.
    pub fn post_save(self, hook: Arc<dyn PostSaveHook>) -> Self {
        self.hooks.register_post(hook);
        self
    }

    /// Add a post-load hook.
    pub fn post_load(self, hook: Arc<dyn PostLoadHook>) -> Self {
        self.hooks.register_post_load(hook);
        self
    }

    /// Build the context and subscribe its load listener.
    pub fn build(self) -> Arc<HookedContext<S>> {
        HookedContext::build(self.backend, self.hooks)
    }
}
