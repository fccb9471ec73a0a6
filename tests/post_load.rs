//! Post-load dispatch riding the backend's materialization event.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use grapnel::backend::{Backend, PendingEntry};
use grapnel::context::HookedContext;
use grapnel::entity::EntityRef;
use grapnel::error::{CommitError, HookError, ValidationError};
use grapnel::hooks::{FnPostLoad, TypedPostLoadHook};
use grapnel::metadata::HookMetadata;
use grapnel::op::EntityOp;
use grapnel::testing::MemoryBackend;

#[derive(Default)]
struct Document {
    opened: u32,
}

#[derive(Default)]
struct Thumbnail;

/// Post-load hook recording what it observed.
#[derive(Default)]
struct RecordLoad {
    runs: AtomicU32,
    op: Mutex<Option<EntityOp>>,
    had_context: AtomicBool,
}

impl TypedPostLoadHook for RecordLoad {
    type Entity = Document;

    fn hook(&self, document: &mut Document, metadata: &mut HookMetadata) -> Result<(), HookError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        *self.op.lock() = Some(metadata.op());
        self.had_context.store(
            metadata.context().is_some_and(|handle| handle.is_alive()),
            Ordering::SeqCst,
        );
        document.opened += 1;
        Ok(())
    }
}

/// A backend with no materialization event source.
struct NullBackend;

#[async_trait]
impl Backend for NullBackend {
    fn pending_entries(&self) -> Vec<PendingEntry> {
        Vec::new()
    }

    fn set_pending_op(&self, _entity: &EntityRef, _op: EntityOp) {}

    fn validation_enabled(&self) -> bool {
        false
    }

    fn validate(&self, _entity: &EntityRef) -> Result<(), ValidationError> {
        Ok(())
    }

    fn commit(&self) -> Result<usize, CommitError> {
        Ok(0)
    }

    async fn commit_async(&self) -> Result<usize, CommitError> {
        Ok(0)
    }
}

#[test]
fn materialized_entities_dispatch_post_load_hooks() {
    let backend = Arc::new(MemoryBackend::new());
    let context = HookedContext::new(Arc::clone(&backend));

    let record = Arc::new(RecordLoad::default());
    context.register_post_load(record.clone());

    let document = EntityRef::new(Document::default());
    backend.materialize(&document);

    assert_eq!(record.runs.load(Ordering::SeqCst), 1);
    assert_eq!(*record.op.lock(), Some(EntityOp::Unchanged));
    assert!(record.had_context.load(Ordering::SeqCst));
    assert_eq!(document.read(|d: &Document| d.opened), Some(1));
    // Loading is not saving.
    assert_eq!(backend.commit_count(), 0);
}

#[test]
fn post_load_hooks_are_filtered_by_entity_type() {
    let backend = Arc::new(MemoryBackend::new());
    let context = HookedContext::new(Arc::clone(&backend));

    let record = Arc::new(RecordLoad::default());
    context.register_post_load(record.clone());

    backend.materialize(&EntityRef::new(Thumbnail));

    assert_eq!(record.runs.load(Ordering::SeqCst), 0);
}

#[test]
fn each_materialized_entity_dispatches_once() {
    let backend = Arc::new(MemoryBackend::new());
    let context = HookedContext::new(Arc::clone(&backend));

    let record = Arc::new(RecordLoad::default());
    context.register_post_load(record.clone());

    backend.materialize(&EntityRef::new(Document::default()));
    backend.materialize(&EntityRef::new(Document::default()));

    assert_eq!(record.runs.load(Ordering::SeqCst), 2);
}

#[test]
fn a_failing_post_load_hook_stops_later_hooks_for_that_entity() {
    let backend = Arc::new(MemoryBackend::new());
    let context = HookedContext::new(Arc::clone(&backend));

    let failing = FnPostLoad::new(|_: &mut Document, _meta: &mut HookMetadata| {
        Err(HookError::failed("cache poisoned"))
    });
    let record = Arc::new(RecordLoad::default());
    context.register_post_load(Arc::new(failing));
    context.register_post_load(record.clone());

    let document = EntityRef::new(Document::default());
    backend.materialize(&document);

    // The failure is contained to hook dispatch; the load itself stands.
    assert_eq!(record.runs.load(Ordering::SeqCst), 0);
    assert!(backend.is_stored(&document));
}

#[test]
fn post_load_hooks_registered_late_still_fire() {
    let backend = Arc::new(MemoryBackend::new());
    let context = HookedContext::new(Arc::clone(&backend));

    backend.materialize(&EntityRef::new(Document::default()));

    let record = Arc::new(RecordLoad::default());
    context.register_post_load(record.clone());

    backend.materialize(&EntityRef::new(Document::default()));
    assert_eq!(record.runs.load(Ordering::SeqCst), 1);
}

#[test]
fn context_construction_subscribes_and_drop_unsubscribes() {
    let backend = Arc::new(MemoryBackend::new());
    let context = HookedContext::new(Arc::clone(&backend));

    assert!(context.has_load_listener());
    assert_eq!(backend.listener_count(), 1);

    drop(context);
    assert_eq!(backend.listener_count(), 0);
}

#[test]
fn backends_without_an_event_source_are_skipped_silently() {
    let backend = Arc::new(NullBackend);
    let context = HookedContext::new(Arc::clone(&backend));

    assert!(!context.has_load_listener());

    // Post-load registration still works; there is simply nothing to fire.
    let record = Arc::new(RecordLoad::default());
    context.register_post_load(record.clone());
    context.save().expect("empty save should succeed");
    assert_eq!(record.runs.load(Ordering::SeqCst), 0);
}
