//! Lifecycle hooks for the persistence save/load cycle.
//!
//! Three hook roles exist:
//!
//! - **Pre-save** — runs before the backing store commits; may mutate the
//!   entity and redirect its pending operation. Split into two passes
//!   around the validation check (see [`crate::context::HookedContext`]).
//! - **Post-save** — runs after a successful commit, against the operation
//!   captured before it.
//! - **Post-load** — runs once per entity materialized from storage.
//!
//! Hooks are executed in registration order and filtered by the entity's
//! concrete type and (for save hooks) by operation-set membership.

pub mod hook;
pub mod registry;

pub use hook::{
    FnPostLoad, FnPostSave, FnPreSave, PostLoadHook, PostSaveHook, PreSaveHook, TypedPostLoadHook,
    TypedPostSaveHook, TypedPreSaveHook,
};
pub use registry::HookRegistry;
