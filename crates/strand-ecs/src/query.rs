use std::any::{type_name, TypeId};

use fixedbitset::FixedBitSet;
use itertools::{iproduct, Itertools};

use crate::component::Component;
use crate::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::registry::ComponentId;
use crate::slots::{Slot, SlotView};
use crate::system::{ParamBinding, SystemBuilder, SystemParam};
use crate::world::World;

/// Index of a registered query within its world.
pub type QueryId = usize;

/// A component type or tuple of component types that can be queried or
/// spawned together.
///
/// Implemented for every [`Component`] (yielding a single view) and for
/// tuples of components (yielding a tuple of views in the same order).
pub trait ComponentSet: Clone + Send + Sync + 'static {
    /// The component types in declaration order.
    fn components() -> Vec<(TypeId, &'static str)>;

    /// Build views from one slot view per component.
    fn from_slots(world: &World, slots: &[SlotView]) -> EcsResult<Self>;

    /// The same pools viewed through one new slot view per component.
    fn reindex_all(&self, slots: &[SlotView]) -> Self;
}

impl<C: Component> ComponentSet for C {
    fn components() -> Vec<(TypeId, &'static str)> {
        vec![(TypeId::of::<C>(), type_name::<C>())]
    }

    fn from_slots(world: &World, slots: &[SlotView]) -> EcsResult<Self> {
        world.get_view::<C>(&slots[0])
    }

    fn reindex_all(&self, slots: &[SlotView]) -> Self {
        self.reindex(&slots[0])
    }
}

macro_rules! impl_component_set_tuple {
    ($(($name:ident, $index:tt)),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn components() -> Vec<(TypeId, &'static str)> {
                vec![$((TypeId::of::<$name>(), type_name::<$name>()),)+]
            }

            fn from_slots(world: &World, slots: &[SlotView]) -> EcsResult<Self> {
                Ok(($(world.get_view::<$name>(&slots[$index])?,)+))
            }

            fn reindex_all(&self, slots: &[SlotView]) -> Self {
                ($(self.$index.reindex(&slots[$index]),)+)
            }
        }
    };
}

impl_component_set_tuple!((A, 0));
impl_component_set_tuple!((A, 0), (B, 1));
impl_component_set_tuple!((A, 0), (B, 1), (C, 2));
impl_component_set_tuple!((A, 0), (B, 1), (C, 2), (D, 3));
impl_component_set_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_component_set_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_component_set_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_component_set_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

/// Which entities hold one component type, and the row each one occupies.
#[derive(Default)]
pub(crate) struct Members {
    entities: FixedBitSet,
    /// Indexed by entity.
    slots: Vec<Slot>,
}

impl Members {
    pub fn with_capacity(num_entities: usize) -> Self {
        Self {
            entities: FixedBitSet::with_capacity(num_entities),
            slots: vec![Slot::MAX; num_entities],
        }
    }

    pub fn insert(&mut self, entity: Entity, slot: Slot) {
        let index = entity as usize;
        if index >= self.slots.len() {
            self.entities.grow(index + 1);
            self.slots.resize(index + 1, Slot::MAX);
        }
        self.entities.insert(index);
        self.slots[index] = slot;
    }

    pub fn remove(&mut self, entity: Entity) -> Option<Slot> {
        if !self.contains(entity) {
            return None;
        }
        self.entities.set(entity as usize, false);
        Some(std::mem::replace(&mut self.slots[entity as usize], Slot::MAX))
    }

    pub fn contains(&self, entity: Entity) -> bool {
        (entity as usize) < self.entities.len() && self.entities.contains(entity as usize)
    }

    pub fn len(&self) -> usize {
        self.entities.count_ones(..)
    }
}

/// Entities present in every member set, ascending, mapped to each
/// component's rows. Position `i` of every returned view is the same entity.
pub(crate) fn intersect(members: &[&Members]) -> Vec<SlotView> {
    let Some(smallest) = members.iter().min_by_key(|members| members.len()) else {
        return Vec::new();
    };
    let mut common = smallest.entities.clone();
    for other in members {
        common.intersect_with(&other.entities);
    }
    let entities: Vec<usize> = common.ones().collect();
    members
        .iter()
        .map(|members| {
            SlotView::from_vec(entities.iter().map(|&entity| members.slots[entity]).collect())
        })
        .collect()
}

/// A registered query: the component types whose intersection it selects.
pub(crate) struct QueryRegistration {
    pub components: Vec<ComponentId>,
}

/// System parameter giving views over every entity that holds all of `Q`.
///
/// The intersection is computed just before each invocation of the system;
/// entities spawned or despawned while it runs are not reflected until the
/// next invocation.
pub struct Query<Q: ComponentSet> {
    result: Q,
    slots: Vec<SlotView>,
}

impl<Q: ComponentSet> Query<Q> {
    pub(crate) fn resolve(world: &World, id: QueryId) -> EcsResult<Self> {
        let slots = world.run_query(id)?;
        let result = Q::from_slots(world, &slots)?;
        Ok(Self { result, slots })
    }

    /// Views over the matched entities, row-aligned across components.
    pub fn result(&self) -> Q {
        self.result.clone()
    }

    /// Number of matched entities.
    pub fn len(&self) -> usize {
        self.slots.first().map_or(0, SlotView::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every ordered pair of distinct matched entities: both `(i, j)` and
    /// `(j, i)` for each `i != j`, `n * (n - 1)` rows in total.
    ///
    /// Suited to updates that only write the first side of each pair, since
    /// the mirrored pair applies the opposite update.
    pub fn product_2(&self) -> (Q, Q) {
        let n = self.len();
        let (first, second): (Vec<usize>, Vec<usize>) =
            iproduct!(0..n, 0..n).filter(|(i, j)| i != j).unzip();
        self.pairs(first, second)
    }

    /// Every unordered pair of distinct matched entities, once each as
    /// `(i, j)` with `i < j`: `n * (n - 1) / 2` rows in total.
    ///
    /// Suited to updates that write both sides of each pair explicitly.
    pub fn combinations_2(&self) -> (Q, Q) {
        let (first, second): (Vec<usize>, Vec<usize>) =
            (0..self.len()).tuple_combinations::<(usize, usize)>().unzip();
        self.pairs(first, second)
    }

    fn pairs(&self, first: Vec<usize>, second: Vec<usize>) -> (Q, Q) {
        let pick = |positions: &[usize]| -> Vec<SlotView> {
            self.slots
                .iter()
                .map(|slots| slots.pick(positions.iter().copied()))
                .collect()
        };
        (
            self.result.reindex_all(&pick(&first)),
            self.result.reindex_all(&pick(&second)),
        )
    }
}

impl<Q: ComponentSet> SystemParam for Query<Q> {
    fn bind(builder: &mut SystemBuilder<'_>) -> EcsResult<ParamBinding> {
        let components = Q::components();
        if components.is_empty() {
            return Err(builder.signature_error("queries need at least one component"));
        }
        Ok(ParamBinding::Query(builder.world().add_query(&components)))
    }

    fn fetch(world: &World, binding: &ParamBinding) -> EcsResult<Self> {
        match binding {
            ParamBinding::Query(id) => Query::resolve(world, *id),
            _ => Err(EcsError::SystemNotInitialized(type_name::<Self>().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::EntityId;
    use crate::commands::Commands;
    use crate::field::Field;

    crate::component! {
        struct One {
            x: Field<f32>,
        }
    }

    crate::component! {
        struct Two {
            y: Field<f32>,
        }
    }

    crate::component! {
        struct Three {
            z: Field<f32>,
        }
    }

    fn world() -> World {
        let world = World::with_capacity(32);
        world.add_pool(One::create_pool(10));
        world.add_pool(Two::create_pool(10));
        world.add_pool(Three::create_pool(10));
        world
    }

    fn query<Q: ComponentSet>(world: &World) -> Query<Q> {
        let id = world.add_query(&Q::components());
        Query::resolve(world, id).unwrap()
    }

    fn sorted(mut values: Vec<f32>) -> Vec<f32> {
        values.sort_by(f32::total_cmp);
        values
    }

    #[test]
    fn members_track_entities() {
        let mut members = Members::with_capacity(2);
        members.insert(1, 7);
        members.insert(5, 3);
        assert!(members.contains(5));
        assert_eq!(members.len(), 2);
        assert_eq!(members.remove(1), Some(7));
        assert_eq!(members.remove(1), None);
        assert!(!members.contains(9));
    }

    #[test]
    fn intersection_preserves_alignment() {
        let world = world();
        let commands = Commands::new(world.clone());
        let one = commands.spawn::<One>(2).unwrap();
        one.x.fill(&[1.0, 2.0]).unwrap();
        let two = commands.spawn::<Two>(2).unwrap();
        two.y.fill(&[10.0, 20.0]).unwrap();
        let (one, two) = commands.spawn::<(One, Two)>(3).unwrap();
        one.x.fill(&[3.0, 4.0, 5.0]).unwrap();
        two.y.fill(&[30.0, 40.0, 50.0]).unwrap();
        world.flush_commands();

        let (entity, one, two) = query::<(EntityId, One, Two)>(&world).result();
        assert_eq!(entity.ids(), vec![4, 5, 6]);
        assert_eq!(one.x.to_vec(), vec![3.0, 4.0, 5.0]);
        assert_eq!(two.y.to_vec(), vec![30.0, 40.0, 50.0]);

        let only_one = query::<One>(&world).result();
        assert_eq!(only_one.x.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn spawned_rows_are_invisible_until_flushed() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<One>(3).unwrap();
        assert!(query::<One>(&world).is_empty());
        world.flush_commands();
        assert_eq!(query::<One>(&world).len(), 3);
    }

    #[test]
    fn product_2_one_component() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<One>(4).unwrap().x.fill(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        world.flush_commands();

        let (first, second) = query::<One>(&world).product_2();
        assert_eq!(first.len(), 12);
        let sums = first.x.zip_map(&second.x, |a, b| a + b).unwrap();
        assert_eq!(
            sorted(sums),
            vec![3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 5.0, 5.0, 6.0, 6.0, 7.0, 7.0]
        );
    }

    #[test]
    fn combinations_2_one_component() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<One>(4).unwrap().x.fill(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        world.flush_commands();

        let (first, second) = query::<One>(&world).combinations_2();
        assert_eq!(first.len(), 6);
        let sums = first.x.zip_map(&second.x, |a, b| a + b).unwrap();
        assert_eq!(sorted(sums), vec![3.0, 4.0, 5.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn combinations_2_two_components() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<One>(4).unwrap().x.fill(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let (two, three) = commands.spawn::<(Two, Three)>(4).unwrap();
        two.y.fill(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        three.z.fill(&[10.0, 20.0, 30.0, 40.0]).unwrap();
        world.flush_commands();

        let ((two1, three1), (two2, three2)) = query::<(Two, Three)>(&world).combinations_2();
        let sums = two1.y.zip_map(&two2.y, |a, b| a + b).unwrap();
        assert_eq!(sorted(sums), vec![3.0, 4.0, 5.0, 5.0, 6.0, 7.0]);
        let sums = three1.z.zip_map(&three2.z, |a, b| a + b).unwrap();
        assert_eq!(sorted(sums), vec![30.0, 40.0, 50.0, 50.0, 60.0, 70.0]);
    }

    #[test]
    fn pair_views_write_through_to_pools() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<One>(3).unwrap();
        world.flush_commands();

        let query = query::<One>(&world);
        let (first, _) = query.product_2();
        first.x.add_assign(1.0_f32).unwrap();
        // Every entity is the first side of n - 1 pairs.
        assert_eq!(query.result().x.to_vec(), vec![2.0, 2.0, 2.0]);

        let (first, second) = query.combinations_2();
        first.x.add_assign(1.0_f32).unwrap();
        second.x.sub_assign(1.0_f32).unwrap();
        assert_eq!(query.result().x.to_vec(), vec![4.0, 2.0, 0.0]);
    }

    #[test]
    fn pairs_of_fewer_than_two_entities_are_empty() {
        let world = world();
        let commands = Commands::new(world.clone());
        commands.spawn::<One>(1).unwrap();
        world.flush_commands();

        let query = query::<One>(&world);
        assert!(query.product_2().0.is_empty());
        assert!(query.combinations_2().1.is_empty());
    }

    #[test]
    fn missing_pool_is_reported_when_run() {
        crate::component! {
            struct Unpooled {
                w: Field<f32>,
            }
        }
        let world = world();
        let id = world.add_query(&<(One, Unpooled)>::components());
        assert!(matches!(
            Query::<(One, Unpooled)>::resolve(&world, id),
            Err(EcsError::MissingPool(name)) if name.ends_with("Unpooled")
        ));
    }
}
