//! Entity handles shared between the change tracker and hooks.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Object-safe access to an entity's concrete type.
///
/// Blanket-implemented for every `'static + Send` type, so any plain struct
/// can be tracked without ceremony. Hooks recover the concrete type through
/// [`as_any_mut`](Entity::as_any_mut) and a downcast.
pub trait Entity: Any + Send {
    /// The entity as a borrowed [`Any`].
    fn as_any(&self) -> &dyn Any;

    /// The entity as a mutably borrowed [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send> Entity for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A shared, lockable handle to a tracked entity.
///
/// The change tracker owns the entry; hooks and calling code hold clones of
/// the same handle, so mutations made inside a hook are visible to the
/// caller afterwards. Identity is the allocation: two handles refer to the
/// same entity iff [`ptr_eq`](EntityRef::ptr_eq) holds.
#[derive(Clone)]
pub struct EntityRef {
    inner: Arc<Mutex<dyn Entity>>,
}

impl EntityRef {
    /// Wrap an entity in a fresh shared handle.
    pub fn new<E: Entity>(entity: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(entity)),
        }
    }

    /// Run `f` with shared access to the type-erased entity.
    pub fn with<R>(&self, f: impl FnOnce(&dyn Entity) -> R) -> R {
        let guard = self.inner.lock();
        f(&*guard)
    }

    /// Run `f` with exclusive access to the type-erased entity.
    ///
    /// The lock is held only for the duration of `f`.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut dyn Entity) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }

    /// Whether the underlying entity is an `E`.
    pub fn is<E: Entity>(&self) -> bool {
        self.with(|entity| entity.as_any().is::<E>())
    }

    /// Run `f` against the entity downcast to `E`, if the types match.
    pub fn read<E: Entity, R>(&self, f: impl FnOnce(&E) -> R) -> Option<R> {
        let guard = self.inner.lock();
        guard.as_any().downcast_ref::<E>().map(f)
    }

    /// Run `f` against the entity mutably downcast to `E`, if the types match.
    pub fn write<E: Entity, R>(&self, f: impl FnOnce(&mut E) -> R) -> Option<R> {
        let mut guard = self.inner.lock();
        guard.as_any_mut().downcast_mut::<E>().map(f)
    }

    /// Whether two handles refer to the same tracked entity.
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef").finish_non_exhaustive()
    }
}
