use std::any::Any;

use crate::entity::Entity;
use crate::erased::ErasedPool;
use crate::error::SecsError;
use crate::pool::Pool;
use crate::sparse_set::EntitySparseSet;
use crate::util::DenseVec;

/// Owns every component of one concrete type `T`: a dense [`Pool`] of the
/// values themselves, an [`EntitySparseSet`] archetype recording which
/// entities currently have `T`, and a dense index from raw entity id to
/// that entity's pool id.
///
/// References returned by `create`/`get`/`try_get` stay valid until the
/// next mutation of *this* pool (`create`, `destroy`, `clear`); mutating a
/// different component pool never invalidates them.
#[derive(Debug)]
pub struct ComponentPool<T> {
    pool: Pool<T>,
    archetype: EntitySparseSet,
    entity_to_component: DenseVec<usize>,
}

impl<T: 'static> ComponentPool<T> {
    pub fn new() -> Self {
        Self {
            pool: Pool::new(),
            archetype: EntitySparseSet::new(),
            entity_to_component: DenseVec::new(),
        }
    }

    pub fn has(&self, entity: Entity) -> bool {
        self.archetype.has(entity)
    }

    /// Constructs `value` for `entity`. Fails with `DuplicateComponent` if
    /// `entity` already has a `T`.
    pub fn create(&mut self, entity: Entity, value: T) -> Result<&mut T, SecsError> {
        if self.has(entity) {
            return Err(SecsError::DuplicateComponent { entity });
        }
        let id = self.pool.create(value);
        self.archetype
            .insert(entity)
            .expect("entity already validated against the registry's own capacity");
        *self.entity_to_component.force_get(entity.id() as usize) = id;
        Ok(self.pool.get_mut(id))
    }

    /// Returns the existing component if `entity` has one, otherwise
    /// constructs it with `make`.
    pub fn get_or_create(&mut self, entity: Entity, make: impl FnOnce() -> T) -> &mut T {
        if !self.has(entity) {
            let _ = self.create(entity, make());
        }
        self.get_mut(entity)
    }

    /// Precondition: `has(entity)`.
    pub fn get(&self, entity: Entity) -> &T {
        debug_assert!(self.has(entity), "ComponentPool::get on entity without T");
        let id = self.entity_to_component[entity.id() as usize];
        self.pool.get(id)
    }

    pub fn get_mut(&mut self, entity: Entity) -> &mut T {
        debug_assert!(
            self.has(entity),
            "ComponentPool::get_mut on entity without T"
        );
        let id = self.entity_to_component[entity.id() as usize];
        self.pool.get_mut(id)
    }

    pub fn try_get(&self, entity: Entity) -> Option<&T> {
        if !self.has(entity) {
            return None;
        }
        let id = self.entity_to_component[entity.id() as usize];
        Some(self.pool.get(id))
    }

    pub fn try_get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.has(entity) {
            return None;
        }
        let id = self.entity_to_component[entity.id() as usize];
        Some(self.pool.get_mut(id))
    }

    /// Entities currently carrying `T`, in the archetype's dense order.
    pub fn view(&self) -> &[Entity] {
        self.archetype.as_slice()
    }
}

impl<T: 'static> ErasedPool for ComponentPool<T> {
    fn destroy(&mut self, entity: Entity) -> bool {
        if !self.has(entity) {
            return false;
        }
        let id = self.entity_to_component[entity.id() as usize];
        self.archetype.erase(entity);
        self.pool.destroy(id);
        true
    }

    fn has(&self, entity: Entity) -> bool {
        ComponentPool::has(self, entity)
    }

    fn clear(&mut self) {
        self.pool.clear();
        self.archetype.clear();
        self.entity_to_component.clear_all();
    }

    fn count(&self) -> usize {
        self.pool.count()
    }

    fn max_count(&self) -> usize {
        self.pool.max_count()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: 'static> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicate() {
        let mut pool: ComponentPool<u32> = ComponentPool::new();
        let e = Entity::new(0, 0);
        pool.create(e, 1).unwrap();
        let err = pool.create(e, 2).unwrap_err();
        assert_eq!(err, SecsError::DuplicateComponent { entity: e });
    }

    #[test]
    fn destroy_of_absent_entity_is_noop() {
        let mut pool: ComponentPool<u32> = ComponentPool::new();
        let e = Entity::new(0, 0);
        assert!(!ErasedPool::destroy(&mut pool, e));
    }

    #[test]
    fn view_reflects_swap_back_erase() {
        let mut pool: ComponentPool<u32> = ComponentPool::new();
        let e1 = Entity::new(1, 0);
        let e2 = Entity::new(2, 0);
        let e3 = Entity::new(3, 0);
        pool.create(e1, 10).unwrap();
        pool.create(e2, 20).unwrap();
        pool.create(e3, 30).unwrap();

        ErasedPool::destroy(&mut pool, e2);

        assert_eq!(pool.view(), &[e1, e3]);
        assert!(!pool.has(e2));
    }

    #[test]
    fn clear_drops_everything() {
        let mut pool: ComponentPool<u32> = ComponentPool::new();
        let e = Entity::new(0, 0);
        pool.create(e, 1).unwrap();
        ErasedPool::clear(&mut pool);
        assert_eq!(pool.count(), 0);
        assert!(pool.view().is_empty());
    }
}
