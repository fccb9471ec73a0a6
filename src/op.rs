//! Entity operations and composable listen sets.

use bitflags::bitflags;

/// The tentative operation a tracked entity is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityOp {
    /// Tracked, but nothing to write.
    Unchanged,
    /// Pending insert.
    Added,
    /// Pending update.
    Modified,
    /// Pending delete.
    Deleted,
    /// No longer tracked by the context.
    Detached,
}

impl EntityOp {
    /// Whether this operation participates in a save cycle.
    pub fn is_pending(self) -> bool {
        !matches!(self, EntityOp::Unchanged | EntityOp::Detached)
    }

    /// The single-member [`OpSet`] for this operation.
    pub fn as_set(self) -> OpSet {
        match self {
            EntityOp::Unchanged => OpSet::UNCHANGED,
            EntityOp::Added => OpSet::ADDED,
            EntityOp::Modified => OpSet::MODIFIED,
            EntityOp::Deleted => OpSet::DELETED,
            EntityOp::Detached => OpSet::DETACHED,
        }
    }
}

bitflags! {
    /// A set of [`EntityOp`] values a hook listens to.
    ///
    /// Hooks match by set membership: a hook listening to
    /// `ADDED | MODIFIED` fires for an entity pending either operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpSet: u8 {
        const UNCHANGED = 1;
        const ADDED = 1 << 1;
        const MODIFIED = 1 << 2;
        const DELETED = 1 << 3;
        const DETACHED = 1 << 4;
    }
}

impl OpSet {
    /// Explicit set-membership test for a single pending operation.
    pub fn contains_op(self, op: EntityOp) -> bool {
        self.contains(op.as_set())
    }
}

impl From<EntityOp> for OpSet {
    fn from(op: EntityOp) -> Self {
        op.as_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_and_detached_are_not_pending() {
        assert!(!EntityOp::Unchanged.is_pending());
        assert!(!EntityOp::Detached.is_pending());
        assert!(EntityOp::Added.is_pending());
        assert!(EntityOp::Modified.is_pending());
        assert!(EntityOp::Deleted.is_pending());
    }

    #[test]
    fn single_member_set_matches_only_its_op() {
        assert!(OpSet::ADDED.contains_op(EntityOp::Added));
        assert!(!OpSet::ADDED.contains_op(EntityOp::Modified));
        assert!(!OpSet::ADDED.contains_op(EntityOp::Deleted));
    }

    #[test]
    fn composite_set_matches_every_member() {
        let set = OpSet::ADDED | OpSet::MODIFIED;
        assert!(set.contains_op(EntityOp::Added));
        assert!(set.contains_op(EntityOp::Modified));
        assert!(!set.contains_op(EntityOp::Deleted));
        assert!(!set.contains_op(EntityOp::Unchanged));
    }

    #[test]
    fn from_op_builds_single_member_set() {
        assert_eq!(OpSet::from(EntityOp::Deleted), OpSet::DELETED);
    }
}
