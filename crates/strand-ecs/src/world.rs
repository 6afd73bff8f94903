use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::builtins::EntityId;
use crate::commands::Command;
use crate::component::{Component, ComponentPool, ErasedPool};
use crate::entity::{Entity, EntityAllocator};
use crate::error::{EcsError, EcsResult};
use crate::events::{Event, EventChannel};
use crate::query::{intersect, ComponentSet, Members, Query, QueryId, QueryRegistration};
use crate::registry::{ComponentId, ComponentRegistry};
use crate::resource::{Res, Resources};
use crate::slots::{Slot, SlotView};
use crate::system::{ParamBinding, SystemBuilder, SystemParam};

/// Default number of entity ids a world can hold at once.
pub const DEFAULT_NUM_ENTITIES: usize = 1024;

struct PoolEntry {
    erased: Arc<dyn ErasedPool>,
    typed: Arc<dyn Any + Send + Sync>,
}

struct WorldState {
    registry: ComponentRegistry,
    pools: HashMap<ComponentId, PoolEntry>,
    members: HashMap<ComponentId, Members>,
    entities: EntityAllocator,
    queries: Vec<QueryRegistration>,
    pending: Vec<Command>,
}

struct WorldInner {
    state: RwLock<WorldState>,
    resources: RwLock<Resources>,
    events: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

/// The central ECS container: component pools, entity ids, which entities
/// hold which components, registered queries, resources and pending
/// commands.
///
/// `World` is a cheap handle; clones refer to the same world. Every
/// [`EntityId`] pool is created with the world and sized to its entity
/// capacity.
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl World {
    pub fn new(registry: ComponentRegistry, num_entities: usize) -> Self {
        let world = Self {
            inner: Arc::new(WorldInner {
                state: RwLock::new(WorldState {
                    registry,
                    pools: HashMap::new(),
                    members: HashMap::new(),
                    entities: EntityAllocator::with_capacity(num_entities),
                    queries: Vec::new(),
                    pending: Vec::new(),
                }),
                resources: RwLock::new(Resources::new()),
                events: Mutex::new(HashMap::new()),
            }),
        };
        world.add_pool(EntityId::create_pool(num_entities));
        world
    }

    /// A world with a fresh registry and room for `num_entities` entities.
    pub fn with_capacity(num_entities: usize) -> Self {
        Self::new(ComponentRegistry::new(), num_entities)
    }

    // ---- Pools ----

    /// Add the pool for `C`, replacing any previous pool of that type along
    /// with its membership.
    pub fn add_pool<C: Component>(&self, pool: ComponentPool<C>) -> ComponentId {
        let pool = Arc::new(pool);
        let mut state = self.inner.state.write();
        let id = state.registry.register::<C>();
        let capacity = state.entities.capacity();
        let entry = PoolEntry {
            erased: pool.clone(),
            typed: pool,
        };
        if state.pools.insert(id, entry).is_some() {
            warn!(component = type_name::<C>(), "Replaced existing component pool");
        }
        state.members.insert(id, Members::with_capacity(capacity));
        debug!(component = type_name::<C>(), id, "Added component pool");
        id
    }

    pub fn has_pool<C: Component>(&self) -> bool {
        let state = self.inner.state.read();
        state
            .registry
            .id_of::<C>()
            .is_some_and(|id| state.pools.contains_key(&id))
    }

    /// The pool for `C`.
    pub fn pool<C: Component>(&self) -> EcsResult<Arc<ComponentPool<C>>> {
        let state = self.inner.state.read();
        state
            .registry
            .id_of::<C>()
            .and_then(|id| state.pools.get(&id))
            .and_then(|entry| entry.typed.clone().downcast::<ComponentPool<C>>().ok())
            .ok_or(EcsError::MissingPool(type_name::<C>()))
    }

    /// A view of `C`'s pool through `slots`.
    pub fn get_view<C: Component>(&self, slots: &SlotView) -> EcsResult<C> {
        Ok(self.pool::<C>()?.view_of(slots))
    }

    /// Views over every entity currently holding all of `Q`, resolved now.
    pub fn view<Q: ComponentSet>(&self) -> EcsResult<Q> {
        let id = self.add_query(&Q::components());
        Ok(Query::<Q>::resolve(self, id)?.result())
    }

    pub fn component_id<C: Component>(&self) -> Option<ComponentId> {
        self.inner.state.read().registry.id_of::<C>()
    }

    // ---- Entities ----

    /// Number of live entities, including those not yet visible to queries.
    pub fn entity_count(&self) -> usize {
        self.inner.state.read().entities.len()
    }

    pub fn entity_capacity(&self) -> usize {
        self.inner.state.read().entities.capacity()
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.inner.state.read().entities.is_alive(entity)
    }

    /// Allocate ids and rows for `num` entities holding `components`, write
    /// the ids into [`EntityId`] and queue their membership. Returns one slot
    /// view per requested component, in request order.
    pub(crate) fn spawn_rows(
        &self,
        components: &[(TypeId, &'static str)],
        num: usize,
    ) -> EcsResult<Vec<SlotView>> {
        let mut state = self.inner.state.write();
        let entity_id = state
            .registry
            .id_of::<EntityId>()
            .ok_or(EcsError::MissingPool(type_name::<EntityId>()))?;

        let mut requested = Vec::with_capacity(components.len());
        for &(type_id, name) in components {
            let id = state
                .registry
                .id_of_raw(type_id)
                .filter(|id| state.pools.contains_key(id))
                .ok_or(EcsError::MissingPool(name))?;
            requested.push(id);
        }
        let mut touched = requested.clone();
        touched.push(entity_id);
        touched.sort_unstable();
        touched.dedup();

        for id in &touched {
            let pool = &state.pools[id].erased;
            if pool.remaining() < num {
                return Err(EcsError::CapacityExceeded {
                    component: pool.type_name(),
                    requested: num,
                    live: pool.len(),
                    capacity: pool.capacity(),
                });
            }
        }
        let entities = state.entities.allocate(num)?;

        let mut spawned = HashMap::with_capacity(touched.len());
        for id in touched {
            let slots = state.pools[&id].erased.spawn_slots(num)?;
            state.pending.push(Command::Insert {
                component: id,
                entities: entities.clone(),
                slots: slots.clone(),
            });
            spawned.insert(id, slots);
        }

        let ids = state.pools[&entity_id]
            .typed
            .clone()
            .downcast::<ComponentPool<EntityId>>()
            .map_err(|_| EcsError::MissingPool(type_name::<EntityId>()))?
            .view_of(&spawned[&entity_id]);
        ids.value.fill(&entities)?;

        debug!(num, components = components.len(), "Spawned entities");
        Ok(requested.iter().map(|id| spawned[id].clone()).collect())
    }

    pub(crate) fn queue(&self, command: Command) {
        self.inner.state.write().pending.push(command);
    }

    /// Apply every queued spawn and despawn. Returns how many commands were
    /// applied.
    pub fn flush_commands(&self) -> usize {
        let mut state = self.inner.state.write();
        let pending = std::mem::take(&mut state.pending);
        let applied = pending.len();
        for command in pending {
            match command {
                Command::Insert {
                    component,
                    entities,
                    slots,
                } => {
                    if let Some(members) = state.members.get_mut(&component) {
                        for (&entity, &slot) in entities.iter().zip(slots.as_slice()) {
                            members.insert(entity, slot);
                        }
                    }
                }
                Command::Despawn(entities) => despawn(&mut state, &entities),
            }
        }
        if applied > 0 {
            debug!(applied, "Flushed commands");
        }
        applied
    }

    // ---- Queries ----

    /// Register a query over `components`, returning the id of an existing
    /// registration for the same components if there is one.
    pub(crate) fn add_query(&self, components: &[(TypeId, &'static str)]) -> QueryId {
        let mut state = self.inner.state.write();
        let ids: Vec<ComponentId> = components
            .iter()
            .map(|&(type_id, name)| state.registry.register_raw(type_id, name))
            .collect();
        if let Some(existing) = state.queries.iter().position(|query| query.components == ids) {
            return existing;
        }
        state.queries.push(QueryRegistration { components: ids });
        state.queries.len() - 1
    }

    /// One slot view per component of the query, row-aligned, over every
    /// entity in the intersection, ascending by entity id.
    pub(crate) fn run_query(&self, id: QueryId) -> EcsResult<Vec<SlotView>> {
        let state = self.inner.state.read();
        let query = state
            .queries
            .get(id)
            .ok_or_else(|| EcsError::SystemNotInitialized(format!("query {id}")))?;
        let mut members = Vec::with_capacity(query.components.len());
        for component in &query.components {
            let set = state
                .members
                .get(component)
                .ok_or(EcsError::MissingPool(
                    state.registry.name(*component).unwrap_or("<unknown>"),
                ))?;
            members.push(set);
        }
        Ok(intersect(&members))
    }

    // ---- Resources ----

    /// Insert a resource, replacing any previous value of the same type.
    pub fn add_resource<R: 'static + Send + Sync>(&self, resource: R) {
        self.inner.resources.write().insert(resource);
        debug!(resource = type_name::<R>(), "Added resource");
    }

    pub fn has_resource<R: 'static + Send + Sync>(&self) -> bool {
        self.inner.resources.read().contains::<R>()
    }

    pub(crate) fn has_resource_raw(&self, type_id: TypeId) -> bool {
        self.inner.resources.read().contains_raw(type_id)
    }

    /// Exclusive access to a resource. Fails if it is missing or already
    /// held elsewhere.
    pub fn resource<R: 'static + Send + Sync>(&self) -> EcsResult<Res<R>> {
        self.inner.resources.read().borrow_mut::<R>()
    }

    pub fn remove_resource<R: 'static + Send + Sync>(&self) -> Option<R> {
        self.inner.resources.write().remove::<R>()
    }

    // ---- Events ----

    pub(crate) fn event_channel<E: Event>(&self) -> Arc<EventChannel<E>> {
        let mut channels = self.inner.events.lock();
        let channel = channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                let channel: Arc<dyn Any + Send + Sync> = Arc::new(EventChannel::<E>::new());
                channel
            })
            .clone();
        match channel.downcast::<EventChannel<E>>() {
            Ok(channel) => channel,
            // Keyed by `TypeId`, so the entry always holds this type.
            Err(_) => Arc::new(EventChannel::new()),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_NUM_ENTITIES)
    }
}

fn despawn(state: &mut WorldState, entities: &[Entity]) {
    let mut freed: HashMap<ComponentId, Vec<Slot>> = HashMap::new();
    for &entity in entities {
        if !state.entities.deallocate(entity) {
            warn!(entity, "Ignoring despawn of an entity that is not alive");
            continue;
        }
        for (&component, members) in state.members.iter_mut() {
            if let Some(slot) = members.remove(entity) {
                freed.entry(component).or_default().push(slot);
            }
        }
    }
    for (component, slots) in freed {
        if let Some(pool) = state.pools.get(&component) {
            pool.erased.despawn_slots(&slots);
        }
    }
}

impl SystemParam for World {
    fn bind(_builder: &mut SystemBuilder<'_>) -> EcsResult<ParamBinding> {
        Ok(ParamBinding::World)
    }

    fn fetch(world: &World, _binding: &ParamBinding) -> EcsResult<Self> {
        Ok(world.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Commands;
    use crate::field::Field;

    crate::component! {
        struct Health {
            value: Field<f32> = 100.0,
        }
    }

    #[test]
    fn entity_id_pool_is_builtin() {
        let world = World::with_capacity(8);
        assert!(world.has_pool::<EntityId>());
        assert_eq!(world.pool::<EntityId>().unwrap().capacity(), 8);
        assert!(!world.has_pool::<Health>());
        assert!(matches!(
            world.pool::<Health>(),
            Err(EcsError::MissingPool(name)) if name.ends_with("Health")
        ));
    }

    #[test]
    fn spawn_writes_entity_ids() {
        let world = World::with_capacity(8);
        world.add_pool(Health::create_pool(8));
        let commands = Commands::new(world.clone());
        let (ids, health) = commands.spawn::<(EntityId, Health)>(3).unwrap();
        assert_eq!(ids.ids(), vec![0, 1, 2]);
        assert_eq!(health.value.to_vec(), vec![100.0; 3]);
        assert_eq!(world.entity_count(), 3);
        assert!(world.is_alive(2));
        assert_eq!(world.flush_commands(), 2);
        assert_eq!(world.flush_commands(), 0);
    }

    #[test]
    fn spawn_into_missing_pool_fails() {
        let world = World::with_capacity(8);
        let commands = Commands::new(world.clone());
        assert!(matches!(
            commands.spawn::<Health>(1),
            Err(EcsError::MissingPool(_))
        ));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn entity_capacity_bounds_spawns() {
        let world = World::with_capacity(2);
        world.add_pool(Health::create_pool(8));
        let commands = Commands::new(world.clone());
        assert!(matches!(
            commands.spawn::<Health>(3),
            Err(EcsError::CapacityExceeded { .. })
        ));
        assert!(world.pool::<Health>().unwrap().is_empty());
    }

    #[test]
    fn queries_are_deduplicated() {
        let world = World::with_capacity(4);
        world.add_pool(Health::create_pool(4));
        let components = <(EntityId, Health)>::components();
        assert_eq!(world.add_query(&components), world.add_query(&components));
        assert_ne!(world.add_query(&components), world.add_query(&Health::components()));
    }

    #[test]
    fn resources_are_shared_between_handles() {
        let world = World::default();
        let other = world.clone();
        world.add_resource(3u32);
        *other.resource::<u32>().unwrap() += 1;
        assert_eq!(*world.resource::<u32>().unwrap(), 4);
        assert_eq!(world.remove_resource::<u32>(), Some(4));
        assert!(!other.has_resource::<u32>());
    }
}
