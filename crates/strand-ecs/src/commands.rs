use std::any::type_name;

use crate::builtins::EntityId;
use crate::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::query::ComponentSet;
use crate::registry::ComponentId;
use crate::slots::SlotView;
use crate::system::{ParamBinding, SystemBuilder, SystemParam};
use crate::world::World;

/// Structural changes waiting for the next flush.
pub(crate) enum Command {
    /// Newly spawned rows become visible to queries.
    Insert {
        component: ComponentId,
        entities: Vec<Entity>,
        slots: SlotView,
    },
    /// Entities leave every pool and their ids are freed.
    Despawn(Vec<Entity>),
}

/// System parameter for spawning and despawning entities.
///
/// Spawned rows are allocated and writable immediately, but queries only see
/// them (and despawned entities only disappear) once the commands are
/// flushed, which the app does after every system invocation.
#[derive(Clone)]
pub struct Commands {
    world: World,
}

impl Commands {
    pub fn new(world: World) -> Self {
        Self { world }
    }

    /// Spawn `num` entities holding every component of `S` and return views
    /// over exactly the new rows, for initialization.
    ///
    /// Fails without allocating anything if any pool, or the entity id
    /// space, lacks room for `num` more rows.
    pub fn spawn<S: ComponentSet>(&self, num: usize) -> EcsResult<S> {
        let slots = self.world.spawn_rows(&S::components(), num)?;
        S::from_slots(&self.world, &slots)
    }

    /// Despawn the entities viewed by `entities`.
    pub fn despawn(&self, entities: &EntityId) {
        self.despawn_ids(entities.ids());
    }

    /// Despawn entities by raw id.
    pub fn despawn_ids(&self, entities: impl IntoIterator<Item = Entity>) {
        self.world.queue(Command::Despawn(entities.into_iter().collect()));
    }
}

impl SystemParam for Commands {
    fn bind(_builder: &mut SystemBuilder<'_>) -> EcsResult<ParamBinding> {
        Ok(ParamBinding::Commands)
    }

    fn fetch(world: &World, binding: &ParamBinding) -> EcsResult<Self> {
        match binding {
            ParamBinding::Commands => Ok(Commands::new(world.clone())),
            _ => Err(EcsError::SystemNotInitialized(type_name::<Self>().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::field::Field;
    use crate::slots::Key;

    crate::component! {
        struct Position {
            x: Field<f32>,
        }
    }

    crate::component! {
        struct Tag {
            value: Field<u8> = 1,
        }
    }

    fn world() -> World {
        let world = World::with_capacity(5);
        world.add_pool(Position::create_pool(5));
        world.add_pool(Tag::create_pool(3));
        world
    }

    fn live_ids(world: &World) -> Vec<u32> {
        let mut ids = world.view::<EntityId>().unwrap().ids();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn despawned_ids_are_reused() {
        let world = world();
        let commands = Commands::new(world.clone());
        let position = commands.spawn::<Position>(5).unwrap();
        position.x.fill(&[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        world.flush_commands();

        let (entity, position) = world.view::<(EntityId, Position)>().unwrap();
        let doomed = entity
            .index(&Key::Mask(position.x.mask(|&x| x < 3.0)))
            .unwrap();
        commands.despawn(&doomed);
        world.flush_commands();
        assert_eq!(live_ids(&world), vec![3, 4]);
        assert_eq!(world.entity_count(), 2);

        commands.spawn::<Position>(3).unwrap();
        world.flush_commands();
        assert_eq!(live_ids(&world), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn spawn_is_all_or_nothing() {
        let world = world();
        let commands = Commands::new(world.clone());
        let result = commands.spawn::<(Position, Tag)>(4);
        assert!(matches!(
            result,
            Err(EcsError::CapacityExceeded { requested: 4, capacity: 3, .. })
        ));
        assert_eq!(world.entity_count(), 0);
        assert!(world.pool::<Position>().unwrap().is_empty());

        let (_, tag) = commands.spawn::<(Position, Tag)>(3).unwrap();
        assert_eq!(tag.value.to_vec(), vec![1, 1, 1]);
    }

    #[test]
    fn despawn_of_dead_entity_is_ignored() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<Position>(2).unwrap();
        world.flush_commands();
        commands.despawn_ids([1, 1, 4]);
        world.flush_commands();
        assert_eq!(live_ids(&world), vec![0]);
        assert_eq!(world.pool::<Position>().unwrap().len(), 1);
    }

    #[test]
    fn spawn_then_despawn_before_flush() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<Tag>(1).unwrap();
        commands.despawn_ids([0]);
        world.flush_commands();
        assert_eq!(world.entity_count(), 0);
        assert!(world.pool::<Tag>().unwrap().is_empty());
    }
}
