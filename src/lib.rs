//! Lifecycle hooks for persistence contexts.
//!
//! Grapnel lets client code run callbacks before and after entities are
//! inserted, updated, deleted, or loaded, without modifying the
//! persistence context itself. The wrapped context stays a black box
//! behind the [`Backend`](backend::Backend) trait; this crate owns only
//! the dispatch rules: which hooks fire, in what order, relative to
//! validation and the commit, and how a pre-save hook can redirect an
//! entity's pending operation (turning a delete into a soft-delete update)
//! before anything is written.
//!
//! # Architecture
//!
//! ```text
//!  client code ──registers──▶ HookRegistry (pre / post / post-load)
//!       │                          │
//!       ▼                          ▼
//!  HookedContext::save ───▶ snapshot pending ops
//!                            ├─ pre-save hooks (validation-exempt)
//!                            ├─ validation check
//!                            ├─ pre-save hooks (validation-required)
//!                            ├─ Backend::commit
//!                            └─ post-save hooks (pre-commit snapshot)
//!
//!  Backend materialization event ──▶ post-load hooks
//! ```
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(MemoryBackend::new());
//! let context = HookedContext::builder(Arc::clone(&backend))
//!     .pre_save(Arc::new(FnPreSave::new(OpSet::ADDED, |note: &mut Note, _meta| {
//!         note.created_at = Some(Utc::now());
//!         Ok(())
//!     })))
//!     .build();
//!
//! let note = EntityRef::new(Note::default());
//! backend.add(&note);
//! context.save()?;
//! ```

pub mod backend;
pub mod context;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod metadata;
pub mod op;
pub mod testing;

pub use error::{Error, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::backend::{Backend, PendingEntry};
    pub use crate::context::{HookedContext, HookedContextBuilder};
    pub use crate::entity::{Entity, EntityRef};
    pub use crate::error::{CommitError, Error, HookError, Result, ValidationError};
    pub use crate::hooks::{
        FnPostLoad, FnPostSave, FnPreSave, HookRegistry, PostLoadHook, PostSaveHook, PreSaveHook,
        TypedPostLoadHook, TypedPostSaveHook, TypedPreSaveHook,
    };
    pub use crate::metadata::{ContextHandle, HookMetadata};
    pub use crate::op::{EntityOp, OpSet};
}
