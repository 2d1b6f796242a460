use std::fmt;

/// An opaque handle identifying a logical object in a [`Registry`](crate::registry::Registry).
///
/// An entity is a pair of a small reusable `id` and a `version` counter that
/// is bumped every time the slot for `id` is recycled. Two handles compare
/// equal only if both fields match, so a handle obtained before a slot was
/// recycled never compares equal to the handle that now owns that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    id: u32,
    version: u32,
}

/// Sentinel handle that never compares equal to any entity returned by
/// `Registry::create`.
pub const NULL_ENTITY: Entity = Entity {
    id: u32::MAX,
    version: u32::MAX,
};

impl Entity {
    pub(crate) fn new(id: u32, version: u32) -> Self {
        Self { id, version }
    }

    /// Returns the entity's slot id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the entity's version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns `true` if this handle is the reserved null entity.
    pub fn is_null(&self) -> bool {
        *self == NULL_ENTITY
    }
}

impl Default for Entity {
    fn default() -> Self {
        NULL_ENTITY
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, v{})", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_entity_is_distinct() {
        let e = Entity::new(0, 0);
        assert_ne!(e, NULL_ENTITY);
        assert!(NULL_ENTITY.is_null());
        assert!(!e.is_null());
    }

    #[test]
    fn equality_compares_both_fields() {
        assert_eq!(Entity::new(3, 1), Entity::new(3, 1));
        assert_ne!(Entity::new(3, 1), Entity::new(3, 2));
        assert_ne!(Entity::new(3, 1), Entity::new(4, 1));
    }
}
