//! Per-context collections of registered hooks.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::hooks::hook::{PostLoadHook, PostSaveHook, PreSaveHook};

/// Ordered collections of pre-save, post-save, and post-load hooks.
///
/// Insertion order is execution order. Registration goes through `&self`,
/// so hooks can be added for the context's whole lifetime — including after
/// construction but before a save cycle, which then picks them up. There is
/// no duplicate detection and no removal.
pub struct HookRegistry {
    pre: RwLock<Vec<Arc<dyn PreSaveHook>>>,
    post: RwLock<Vec<Arc<dyn PostSaveHook>>>,
    post_load: RwLock<Vec<Arc<dyn PostLoadHook>>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
            post_load: RwLock::new(Vec::new()),
        }
    }

    /// Append a hook to run before the backing store commits.
    pub fn register_pre(&self, hook: Arc<dyn PreSaveHook>) {
        self.pre.write().push(hook);
    }

    /// Append a hook to run after a successful commit.
    pub fn register_post(&self, hook: Arc<dyn PostSaveHook>) {
        self.post.write().push(hook);
    }

    /// Append a hook to run per entity materialized from storage.
    pub fn register_post_load(&self, hook: Arc<dyn PostLoadHook>) {
        self.post_load.write().push(hook);
    }

    /// Whether any post-save hooks are registered.
    pub fn has_post_hooks(&self) -> bool {
        !self.post.read().is_empty()
    }

    /// Number of registered pre-save hooks.
    pub fn pre_count(&self) -> usize {
        self.pre.read().len()
    }

    /// Number of registered post-save hooks.
    pub fn post_count(&self) -> usize {
        self.post.read().len()
    }

    /// Number of registered post-load hooks.
    pub fn post_load_count(&self) -> usize {
        self.post_load.read().len()
    }

    // Dispatch clones the collections out of the lock so hooks never run
    // with the registry locked; a hook is then free to register more hooks,
    // which join the next cycle.

    pub(crate) fn pre_hooks(&self) -> Vec<Arc<dyn PreSaveHook>> {
        self.pre.read().clone()
    }

    pub(crate) fn post_hooks(&self) -> Vec<Arc<dyn PostSaveHook>> {
        self.post.read().clone()
    }

    pub(crate) fn post_load_hooks(&self) -> Vec<Arc<dyn PostLoadHook>> {
        self.post_load.read().clone()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
