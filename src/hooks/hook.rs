//! Hook capability traits.
//!
//! The registry stores type-erased hooks ([`PreSaveHook`], [`PostSaveHook`],
//! [`PostLoadHook`]). Hook authors normally implement the typed flavor
//! ([`TypedPreSaveHook`] and friends), which declares the entity type the
//! hook cares about; a blanket impl erases it by downcasting, so entities of
//! any other concrete type are silently skipped. A hook that wants to match
//! a whole family of types implements the erased trait directly.

use std::marker::PhantomData;

use crate::entity::Entity;
use crate::error::HookError;
use crate::metadata::HookMetadata;
use crate::op::OpSet;

/// A hook that runs before the backing store commits.
///
/// Pre-save hooks may mutate the entity and may redirect its pending
/// operation through [`HookMetadata::set_op`] (a soft-delete hook turns a
/// `Deleted` into a `Modified`). Hooks with
/// [`requires_validation`](PreSaveHook::requires_validation) `== false` run
/// unconditionally, before the validation check — they may exist precisely
/// to fix validation problems. Hooks requiring validation run only once the
/// pending set validates cleanly.
pub trait PreSaveHook: Send + Sync {
    /// Name used in dispatch logging.
    fn name(&self) -> &str;

    /// The operations this hook listens to.
    fn listen_ops(&self) -> OpSet;

    /// Whether this hook runs only after the change set passes validation.
    fn requires_validation(&self) -> bool {
        false
    }

    /// Run the hook if the entity's concrete type matches; no-op otherwise.
    fn apply_if_applicable(
        &self,
        entity: &mut dyn Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError>;
}

/// A hook that runs after a successful commit.
///
/// Post-save hooks match against the operation captured *before* the commit,
/// so a post-insert hook still sees the entity as inserted even though the
/// tracker has moved it to `Unchanged`. Operation redirects made on the
/// metadata here have no effect.
pub trait PostSaveHook: Send + Sync {
    /// Name used in dispatch logging.
    fn name(&self) -> &str;

    /// The operations this hook listens to.
    fn listen_ops(&self) -> OpSet;

    /// Run the hook if the entity's concrete type matches; no-op otherwise.
    fn apply_if_applicable(
        &self,
        entity: &mut dyn Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError>;
}

/// A hook that runs once per entity materialized from storage.
///
/// Post-load dispatch is independent of any save cycle and is filtered by
/// entity type only.
pub trait PostLoadHook: Send + Sync {
    /// Name used in dispatch logging.
    fn name(&self) -> &str;

    /// Run the hook if the entity's concrete type matches; no-op otherwise.
    fn apply_if_applicable(
        &self,
        entity: &mut dyn Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError>;
}

/// Strongly typed pre-save hook. Implement this instead of [`PreSaveHook`].
pub trait TypedPreSaveHook: Send + Sync + 'static {
    /// The entity type this hook applies to.
    type Entity: Entity;

    /// The operations this hook listens to.
    fn listen_ops(&self) -> OpSet;

    /// Whether this hook runs only after the change set passes validation.
    fn requires_validation(&self) -> bool {
        false
    }

    /// The typed hook logic.
    fn hook(
        &self,
        entity: &mut Self::Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError>;
}

impl<H: TypedPreSaveHook> PreSaveHook for H {
    fn name(&self) -> &str {
        std::any::type_name::<H>()
    }

    fn listen_ops(&self) -> OpSet {
        TypedPreSaveHook::listen_ops(self)
    }

    fn requires_validation(&self) -> bool {
        TypedPreSaveHook::requires_validation(self)
    }

    fn apply_if_applicable(
        &self,
        entity: &mut dyn Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError> {
        match entity.as_any_mut().downcast_mut::<H::Entity>() {
            Some(entity) => self.hook(entity, metadata),
            None => Ok(()),
        }
    }
}

/// Strongly typed post-save hook. Implement this instead of [`PostSaveHook`].
pub trait TypedPostSaveHook: Send + Sync + 'static {
    /// The entity type this hook applies to.
    type Entity: Entity;

    /// The operations this hook listens to.
    fn listen_ops(&self) -> OpSet;

    /// The typed hook logic.
    fn hook(
        &self,
        entity: &mut Self::Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError>;
}

impl<H: TypedPostSaveHook> PostSaveHook for H {
    fn name(&self) -> &str {
        std::any::type_name::<H>()
    }

    fn listen_ops(&self) -> OpSet {
        TypedPostSaveHook::listen_ops(self)
    }

    fn apply_if_applicable(
        &self,
        entity: &mut dyn Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError> {
        match entity.as_any_mut().downcast_mut::<H::Entity>() {
            Some(entity) => self.hook(entity, metadata),
            None => Ok(()),
        }
    }
}

/// Strongly typed post-load hook. Implement this instead of [`PostLoadHook`].
pub trait TypedPostLoadHook: Send + Sync + 'static {
    /// The entity type this hook applies to.
    type Entity: Entity;

    /// The typed hook logic.
    fn hook(
        &self,
        entity: &mut Self::Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError>;
}

impl<H: TypedPostLoadHook> PostLoadHook for H {
    fn name(&self) -> &str {
        std::any::type_name::<H>()
    }

    fn apply_if_applicable(
        &self,
        entity: &mut dyn Entity,
        metadata: &mut HookMetadata,
    ) -> Result<(), HookError> {
        match entity.as_any_mut().downcast_mut::<H::Entity>() {
            Some(entity) => self.hook(entity, metadata),
            None => Ok(()),
        }
    }
}

/// A pre-save hook built from a closure.
///
/// Covers the common one-operation cases without a dedicated type:
///
/// ```ignore
/// let stamp = FnPreSave::new(OpSet::ADDED, |note: &mut Note, _meta| {
///     note.created_at = Some(Utc::now());
///     Ok(())
/// });
/// context.register_pre(Arc::new(stamp));
/// ```
pub struct FnPreSave<E, F> {
    ops: OpSet,
    requires_validation: bool,
    f: F,
    _entity: PhantomData<fn(E)>,
}

impl<E, F> FnPreSave<E, F>
where
    E: Entity,
    F: Fn(&mut E, &mut HookMetadata) -> Result<(), HookError> + Send + Sync + 'static,
{
    /// A validation-exempt pre-save hook over `ops`.
    pub fn new(ops: OpSet, f: F) -> Self {
        Self {
            ops,
            requires_validation: false,
            f,
            _entity: PhantomData,
        }
    }

    /// Run this hook only after the change set passes validation.
    pub fn require_validation(mut self) -> Self {
        self.requires_validation = true;
        self
    }
}

impl<E, F> TypedPreSaveHook for FnPreSave<E, F>
where
    E: Entity,
    F: Fn(&mut E, &mut HookMetadata) -> Result<(), HookError> + Send + Sync + 'static,
{
    type Entity = E;

    fn listen_ops(&self) -> OpSet {
        self.ops
    }

    fn requires_validation(&self) -> bool {
        self.requires_validation
    }

    fn hook(&self, entity: &mut E, metadata: &mut HookMetadata) -> Result<(), HookError> {
        (self.f)(entity, metadata)
    }
}

/// A post-save hook built from a closure.
pub struct FnPostSave<E, F> {
    ops: OpSet,
    f: F,
    _entity: PhantomData<fn(E)>,
}

impl<E, F> FnPostSave<E, F>
where
    E: Entity,
    F: Fn(&mut E, &mut HookMetadata) -> Result<(), HookError> + Send + Sync + 'static,
{
    /// A post-save hook over `ops`.
    pub fn new(ops: OpSet, f: F) -> Self {
        Self {
            ops,
            f,
            _entity: PhantomData,
        }
    }
}

impl<E, F> TypedPostSaveHook for FnPostSave<E, F>
where
    E: Entity,
    F: Fn(&mut E, &mut HookMetadata) -> Result<(), HookError> + Send + Sync + 'static,
{
    type Entity = E;

    fn listen_ops(&self) -> OpSet {
        self.ops
    }

    fn hook(&self, entity: &mut E, metadata: &mut HookMetadata) -> Result<(), HookError> {
        (self.f)(entity, metadata)
    }
}

/// A post-load hook built from a closure.
pub struct FnPostLoad<E, F> {
    f: F,
    _entity: PhantomData<fn(E)>,
}

impl<E, F> FnPostLoad<E, F>
where
    E: Entity,
    F: Fn(&mut E, &mut HookMetadata) -> Result<(), HookError> + Send + Sync + 'static,
{
    /// A post-load hook for entities of type `E`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _entity: PhantomData,
        }
    }
}

impl<E, F> TypedPostLoadHook for FnPostLoad<E, F>
where
    E: Entity,
    F: Fn(&mut E, &mut HookMetadata) -> Result<(), HookError> + Send + Sync + 'static,
{
    type Entity = E;

    fn hook(&self, entity: &mut E, metadata: &mut HookMetadata) -> Result<(), HookError> {
        (self.f)(entity, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::op::EntityOp;

    #[derive(Default)]
    struct Invoice {
        total: u32,
    }

    #[derive(Default)]
    struct Receipt;

    struct DoubleTotal;

    impl TypedPreSaveHook for DoubleTotal {
        type Entity = Invoice;

        fn listen_ops(&self) -> OpSet {
            OpSet::ADDED
        }

        fn hook(
            &self,
            entity: &mut Invoice,
            _metadata: &mut HookMetadata,
        ) -> Result<(), HookError> {
            entity.total *= 2;
            Ok(())
        }
    }

    #[test]
    fn erased_dispatch_calls_into_typed_hook() {
        let hook: &dyn PreSaveHook = &DoubleTotal;
        let entity = EntityRef::new(Invoice { total: 21 });
        let mut metadata = HookMetadata::new(EntityOp::Added);

        entity
            .with_mut(|e| hook.apply_if_applicable(e, &mut metadata))
            .expect("hook should run");

        assert_eq!(entity.read(|i: &Invoice| i.total), Some(42));
    }

    #[test]
    fn mismatched_entity_type_is_silently_skipped() {
        let hook: &dyn PreSaveHook = &DoubleTotal;
        let entity = EntityRef::new(Receipt);
        let mut metadata = HookMetadata::new(EntityOp::Added);

        entity
            .with_mut(|e| hook.apply_if_applicable(e, &mut metadata))
            .expect("mismatch is not an error");
    }

    #[test]
    fn closure_pre_save_hook_defaults_to_validation_exempt() {
        let hook = FnPreSave::new(OpSet::ADDED, |invoice: &mut Invoice, _meta| {
            invoice.total += 1;
            Ok(())
        });
        let erased: &dyn PreSaveHook = &hook;
        assert!(!erased.requires_validation());
        assert_eq!(erased.listen_ops(), OpSet::ADDED);
    }

    #[test]
    fn closure_pre_save_hook_can_opt_into_validation() {
        let hook = FnPreSave::new(OpSet::MODIFIED, |_: &mut Invoice, _meta| Ok(()))
            .require_validation();
        let erased: &dyn PreSaveHook = &hook;
        assert!(erased.requires_validation());
    }

    #[test]
    fn closure_hook_can_redirect_the_operation() {
        let hook = FnPreSave::new(OpSet::DELETED, |_: &mut Invoice, meta: &mut HookMetadata| {
            meta.set_op(EntityOp::Modified);
            Ok(())
        });
        let erased: &dyn PreSaveHook = &hook;
        let entity = EntityRef::new(Invoice::default());
        let mut metadata = HookMetadata::new(EntityOp::Deleted);

        entity
            .with_mut(|e| erased.apply_if_applicable(e, &mut metadata))
            .expect("hook should run");

        assert!(metadata.op_changed());
        assert_eq!(metadata.op(), EntityOp::Modified);
    }

    #[test]
    fn hook_errors_propagate_verbatim() {
        let hook = FnPreSave::new(OpSet::ADDED, |_: &mut Invoice, _meta| {
            Err(HookError::failed("broken"))
        });
        let erased: &dyn PreSaveHook = &hook;
        let entity = EntityRef::new(Invoice::default());
        let mut metadata = HookMetadata::new(EntityOp::Added);

        let err = entity
            .with_mut(|e| erased.apply_if_applicable(e, &mut metadata))
            .expect_err("hook should fail");
        assert!(matches!(err, HookError::Failed { .. }));
    }
}
