use std::any::TypeId;

use log::{debug, trace, warn};

use crate::component::ComponentPool;
use crate::dense_map::DenseMap;
use crate::entity::Entity;
use crate::erased::ErasedPool;
use crate::error::{Result, SecsError};
use crate::id_gen::EntityIdGen;
use crate::sparse_set::IndexSparseSet;
use crate::util::DenseVec;

/// Warn once a pool's component count crosses this fraction of the entity
/// capacity; purely observational, does not affect behavior.
const CAPACITY_WARN_THRESHOLD: f64 = 0.9;

fn downcast<T: 'static>(pool: &dyn ErasedPool) -> &ComponentPool<T> {
    pool.as_any()
        .downcast_ref::<ComponentPool<T>>()
        .expect("pool registered under T's TypeId must be a ComponentPool<T>")
}

fn downcast_mut<T: 'static>(pool: &mut dyn ErasedPool) -> &mut ComponentPool<T> {
    pool.as_any_mut()
        .downcast_mut::<ComponentPool<T>>()
        .expect("pool registered under T's TypeId must be a ComponentPool<T>")
}

/// Top-level entity/component registry.
///
/// Owns entity allocation, a heterogeneous collection of per-type component
/// pools addressed by a dense pool id, and the reverse index from entity to
/// the set of component-type ids it currently owns (used only to know
/// which pools to notify when an entity is destroyed).
pub struct Registry {
    entities: EntityIdGen,
    pools: Vec<Box<dyn ErasedPool>>,
    type_ids: DenseMap<TypeId, usize>,
    entity_components: DenseVec<IndexSparseSet>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entities: EntityIdGen::new(),
            pools: Vec::new(),
            type_ids: DenseMap::new(),
            entity_components: DenseVec::new(),
        }
    }

    fn ensure_pool<T: 'static>(&mut self) -> usize {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.type_ids.get(&type_id) {
            return id;
        }
        let id = self.pools.len();
        trace!(
            "registering component pool #{id} for {}",
            std::any::type_name::<T>()
        );
        self.pools.push(Box::new(ComponentPool::<T>::new()));
        self.type_ids.insert(type_id, id);
        id
    }

    fn pool_id<T: 'static>(&self) -> Option<usize> {
        self.type_ids.get(&TypeId::of::<T>()).copied()
    }

    fn warn_if_near_capacity(&self, pool_id: usize) {
        let count = self.pools[pool_id].count() as f64;
        if count / crate::sparse_set::MAX_ENTITY_SET_SIZE as f64 > CAPACITY_WARN_THRESHOLD {
            warn!("component pool #{pool_id} is above {CAPACITY_WARN_THRESHOLD:.0%} of capacity");
        }
    }

    /// Allocates a new entity. Never fails — the entity id generator has no
    /// capacity of its own; `emplace` is where an entity id that has grown
    /// past a component sparse set's fixed capacity surfaces as
    /// `CapacityExceeded`.
    pub fn create(&mut self) -> Entity {
        let entity = self.entities.create();
        debug!("created {entity}");
        entity
    }

    /// Destroys `entity`, cascading to every component it owns. A no-op if
    /// `entity` is already invalid, so callers can destroy idempotently.
    pub fn destroy(&mut self, entity: Entity) {
        if !self.valid(entity) {
            return;
        }
        let id = entity.id() as usize;
        if let Some(owned) = self.entity_components.get(id) {
            let type_ids: Vec<usize> = owned.iter().copied().collect();
            for pool_id in type_ids {
                self.pools[pool_id].destroy(entity);
            }
        }
        if let Some(owned) = self.entity_components.get_mut(id) {
            owned.clear();
        }
        self.entities.destroy(entity);
        debug!("destroyed {entity}");
    }

    pub fn valid(&self, entity: Entity) -> bool {
        self.entities.active(entity)
    }

    /// Constructs a `T` for `entity`. Fails with `InvalidEntity` if the
    /// entity is not valid, or `DuplicateComponent` if it already has a
    /// `T`.
    pub fn emplace<T: 'static>(&mut self, entity: Entity, value: T) -> Result<&mut T> {
        if !self.valid(entity) {
            return Err(SecsError::InvalidEntity(entity));
        }
        let pool_id = self.ensure_pool::<T>();
        {
            let pool = downcast_mut::<T>(self.pools[pool_id].as_mut());
            if pool.has(entity) {
                return Err(SecsError::DuplicateComponent { entity });
            }
            pool.create(entity, value)?;
        }
        self.entity_components
            .force_get(entity.id() as usize)
            .insert(pool_id)?;
        self.warn_if_near_capacity(pool_id);
        Ok(downcast_mut::<T>(self.pools[pool_id].as_mut()).get_mut(entity))
    }

    /// Returns the existing `T` for `entity` if present, otherwise
    /// constructs one with `make`.
    pub fn get_or_emplace<T: 'static>(
        &mut self,
        entity: Entity,
        make: impl FnOnce() -> T,
    ) -> Result<&mut T> {
        if !self.valid(entity) {
            return Err(SecsError::InvalidEntity(entity));
        }
        let pool_id = self.ensure_pool::<T>();
        let needs_insert = !downcast::<T>(self.pools[pool_id].as_ref()).has(entity);
        if needs_insert {
            downcast_mut::<T>(self.pools[pool_id].as_mut())
                .create(entity, make())
                .expect("presence just checked false");
            self.entity_components
                .force_get(entity.id() as usize)
                .insert(pool_id)?;
            self.warn_if_near_capacity(pool_id);
        }
        Ok(downcast_mut::<T>(self.pools[pool_id].as_mut()).get_mut(entity))
    }

    /// Precondition: `entity` is valid and has a `T`. Violating it is a
    /// contract error, checked only in debug builds.
    pub fn get<T: 'static>(&self, entity: Entity) -> &T {
        let pool_id = self
            .pool_id::<T>()
            .expect("Registry::get: no component of this type was ever emplaced");
        downcast::<T>(self.pools[pool_id].as_ref()).get(entity)
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> &mut T {
        let pool_id = self
            .pool_id::<T>()
            .expect("Registry::get_mut: no component of this type was ever emplaced");
        downcast_mut::<T>(self.pools[pool_id].as_mut()).get_mut(entity)
    }

    pub fn try_get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        let pool_id = self.pool_id::<T>()?;
        downcast::<T>(self.pools[pool_id].as_ref()).try_get(entity)
    }

    pub fn try_get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        let pool_id = self.pool_id::<T>()?;
        downcast_mut::<T>(self.pools[pool_id].as_mut()).try_get_mut(entity)
    }

    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        match self.pool_id::<T>() {
            Some(pool_id) => downcast::<T>(self.pools[pool_id].as_ref()).has(entity),
            None => false,
        }
    }

    /// Removes `entity`'s `T` if present. A no-op otherwise.
    pub fn destroy_component<T: 'static>(&mut self, entity: Entity) {
        let Some(pool_id) = self.pool_id::<T>() else {
            return;
        };
        if downcast_mut::<T>(self.pools[pool_id].as_mut()).destroy(entity) {
            if let Some(owned) = self.entity_components.get_mut(entity.id() as usize) {
                owned.erase(pool_id);
            }
        }
    }

    /// Entities currently carrying `T`, in the pool's dense order. An empty
    /// slice if `T` was never emplaced.
    pub fn view<T: 'static>(&self) -> &[Entity] {
        match self.pool_id::<T>() {
            Some(pool_id) => downcast::<T>(self.pools[pool_id].as_ref()).view(),
            None => &[],
        }
    }

    /// Multi-component fold over `has<T>` for every type in `Q`.
    pub fn has_all<Q: ComponentQuery>(&self, entity: Entity) -> bool {
        Q::has_all(self, entity)
    }

    /// Multi-component fold over `destroy_component<T>` for every type in
    /// `Q`.
    pub fn destroy_all<Q: ComponentQuery>(&mut self, entity: Entity) {
        Q::destroy_all(self, entity);
    }

    /// Entities having every component type in `Q`, computed by filtering
    /// the smallest archetype against the others. Ties on minimum size are
    /// broken in favor of the first type parameter.
    pub fn view_all<Q: ComponentQuery>(&self) -> Vec<Entity> {
        Q::view_all(self)
    }

    /// Clears every entity, every component, and the entity→component-types
    /// index. Pool slots themselves (and the type→pool-id mapping) are
    /// retained, so previously-used component types don't need to be
    /// re-registered.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.entity_components.clear_all();
        for pool in &mut self.pools {
            pool.clear();
        }
        debug!("registry reset");
    }

    pub fn entity_count(&self) -> usize {
        self.entities.count()
    }

    pub fn max_entity_count(&self) -> usize {
        self.entities.max_id()
    }

    pub fn component_count(&self) -> usize {
        self.pools.iter().map(|p| p.count()).sum()
    }

    pub fn max_component_count(&self) -> usize {
        self.pools.iter().map(|p| p.max_count()).sum()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Implemented for tuples of 2-8 `'static` types so `Registry::has_all`,
/// `destroy_all`, and `view_all` can fold over an arbitrary (bounded)
/// number of component types.
pub trait ComponentQuery {
    fn has_all(registry: &Registry, entity: Entity) -> bool;
    fn destroy_all(registry: &mut Registry, entity: Entity);
    fn view_all(registry: &Registry) -> Vec<Entity>;
}

macro_rules! impl_component_query {
    ($($t:ident),+) => {
        impl<$($t: 'static),+> ComponentQuery for ($($t,)+) {
            fn has_all(registry: &Registry, entity: Entity) -> bool {
                $(registry.has::<$t>(entity))&&+
            }

            fn destroy_all(registry: &mut Registry, entity: Entity) {
                $(registry.destroy_component::<$t>(entity);)+
            }

            fn view_all(registry: &Registry) -> Vec<Entity> {
                let views: Vec<&[Entity]> = vec![$(registry.view::<$t>()),+];
                let mut min_idx = 0;
                for i in 1..views.len() {
                    if views[i].len() < views[min_idx].len() {
                        min_idx = i;
                    }
                }
                views[min_idx]
                    .iter()
                    .copied()
                    .filter(|&e| $(registry.has::<$t>(e))&&+)
                    .collect()
            }
        }
    };
}

impl_component_query!(T0, T1);
impl_component_query!(T0, T1, T2);
impl_component_query!(T0, T1, T2, T3);
impl_component_query!(T0, T1, T2, T3, T4);
impl_component_query!(T0, T1, T2, T3, T4, T5);
impl_component_query!(T0, T1, T2, T3, T4, T5, T6);
impl_component_query!(T0, T1, T2, T3, T4, T5, T6, T7);

#[cfg(test)]
mod tests {
    use super::*;

    struct Position {
        x: f32,
        y: f32,
    }

    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[test]
    fn create_emplace_get() {
        let mut r = Registry::new();
        let e = r.create();
        r.emplace(e, Position { x: 1.0, y: 2.0 }).unwrap();

        let p = r.get::<Position>(e);
        assert_eq!((p.x, p.y), (1.0, 2.0));
        assert!(r.has::<Position>(e));
    }

    #[test]
    fn handle_invalidation_on_recreate() {
        let mut r = Registry::new();
        let e1 = r.create();
        r.destroy(e1);
        let e2 = r.create();

        assert_eq!(e1.id(), e2.id());
        assert_ne!(e1.version(), e2.version());
        assert!(!r.valid(e1));
        assert!(r.valid(e2));
    }

    #[test]
    fn multi_component_view_intersection() {
        let mut r = Registry::new();
        let a = r.create();
        let b = r.create();
        let c = r.create();
        let d = r.create();

        for e in [a, b, c] {
            r.emplace(e, Position { x: 0.0, y: 0.0 }).unwrap();
        }
        for e in [b, c, d] {
            r.emplace(e, Velocity { dx: 0.0, dy: 0.0 }).unwrap();
        }

        let matched = r.view_all::<(Position, Velocity)>();
        assert_eq!(matched, vec![b, c]);
    }

    #[test]
    fn cascading_destroy_clears_all_pools() {
        let mut r = Registry::new();
        let e = r.create();
        r.emplace(e, Position { x: 0.0, y: 0.0 }).unwrap();
        r.emplace(e, Velocity { dx: 0.0, dy: 0.0 }).unwrap();

        r.destroy(e);

        assert_eq!(r.component_count(), 0);
        assert!(r.view::<Position>().is_empty());
        assert!(r.view::<Velocity>().is_empty());
    }

    #[test]
    fn swap_back_erase_keeps_view_order() {
        let mut r = Registry::new();
        let e1 = r.create();
        let e2 = r.create();
        let e3 = r.create();
        for e in [e1, e2, e3] {
            r.emplace(e, Position { x: 0.0, y: 0.0 }).unwrap();
        }

        r.destroy_component::<Position>(e2);

        assert_eq!(r.view::<Position>(), &[e1, e3]);
    }

    #[test]
    fn reset_clears_counters_and_recreates_from_zero() {
        let mut r = Registry::new();
        let e = r.create();
        r.emplace(e, Position { x: 1.0, y: 1.0 }).unwrap();

        r.reset();

        assert_eq!(r.entity_count(), 0);
        assert_eq!(r.component_count(), 0);
        assert!(r.view::<Position>().is_empty());
        assert!(!r.valid(e));

        let fresh = r.create();
        assert_eq!(fresh.id(), 0);
        assert_eq!(fresh.version(), 0);
    }

    #[test]
    fn emplace_on_invalid_entity_fails() {
        let mut r = Registry::new();
        let e = Entity::new(0, 0);
        let err = r.emplace(e, Position { x: 0.0, y: 0.0 }).unwrap_err();
        assert_eq!(err, SecsError::InvalidEntity(e));
    }

    #[test]
    fn get_or_emplace_returns_existing_without_overwrite() {
        let mut r = Registry::new();
        let e = r.create();
        r.emplace(e, Position { x: 5.0, y: 5.0 }).unwrap();

        let p = r
            .get_or_emplace(e, || Position { x: 0.0, y: 0.0 })
            .unwrap();
        assert_eq!((p.x, p.y), (5.0, 5.0));
    }
}
