use parking_lot::RwLock;

use crate::error::EcsResult;
use crate::slots::{Key, Slot, SlotStore, SlotView};

/// Types that can re-derive themselves over a new slot view.
///
/// Implemented by [`Field`](crate::Field) and by every type declared with
/// [`component!`](crate::component) or [`structure!`](crate::structure), so a
/// component re-derives all of its fields (and nested structures) from one
/// slot view and they stay row-aligned.
pub trait Reindex: Sized {
    /// Allocate fresh backing columns of `capacity` slots, viewed through `slots`.
    fn allocate(capacity: usize, slots: &SlotView) -> Self;

    /// The same columns viewed through `slots`.
    fn reindex(&self, slots: &SlotView) -> Self;
}

/// Marker trait for types that can be stored in a component pool.
///
/// Declare components with [`component!`](crate::component) rather than
/// implementing this by hand.
pub trait Component: Reindex + Clone + Send + Sync + 'static {
    /// The slots this view covers.
    fn slots(&self) -> &SlotView;

    /// Number of rows in this view.
    fn len(&self) -> usize {
        self.slots().len()
    }

    fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// A view of the rows selected by `key`. Every field is re-derived from
    /// the same composed slot view.
    fn index(&self, key: &Key) -> EcsResult<Self> {
        Ok(self.reindex(&self.slots().index(key)?))
    }

    /// Allocate a pool with room for `capacity` rows.
    fn create_pool(capacity: usize) -> ComponentPool<Self> {
        ComponentPool::new(capacity)
    }
}

/// Fixed-capacity storage for one component type: a slot store plus one
/// backing column per field.
pub struct ComponentPool<C: Component> {
    store: RwLock<SlotStore>,
    root: C,
}

impl<C: Component> ComponentPool<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: RwLock::new(SlotStore::with_capacity(
                std::any::type_name::<C>(),
                capacity,
            )),
            root: C::allocate(capacity, &SlotView::empty()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.store.read().capacity()
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Make `num` more rows live and return a view over exactly those rows.
    pub fn spawn(&self, num: usize) -> EcsResult<C> {
        let slots = self.store.write().spawn(num)?;
        Ok(self.view_of(&slots))
    }

    /// A view over every live row.
    pub fn view(&self) -> C {
        self.view_of(&self.store.read().view())
    }

    /// A view over the given slots.
    pub fn view_of(&self, slots: &SlotView) -> C {
        self.root.reindex(slots)
    }
}

/// Type-erased pool interface used by the world.
pub(crate) trait ErasedPool: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
    fn remaining(&self) -> usize;
    fn spawn_slots(&self, num: usize) -> EcsResult<SlotView>;
    fn despawn_slots(&self, slots: &[Slot]) -> usize;
}

impl<C: Component> ErasedPool for ComponentPool<C> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    fn len(&self) -> usize {
        self.store.read().len()
    }

    fn capacity(&self) -> usize {
        self.store.read().capacity()
    }

    fn remaining(&self) -> usize {
        self.store.read().remaining()
    }

    fn spawn_slots(&self, num: usize) -> EcsResult<SlotView> {
        self.store.write().spawn(num)
    }

    fn despawn_slots(&self, slots: &[Slot]) -> usize {
        self.store.write().despawn(slots)
    }
}

/// Declares a component: a named bundle of [`Field`](crate::Field)s and
/// nested structures that share one slot view.
///
/// A field may give a default with `= expr`; otherwise its element type's
/// `Default` is used.
///
/// ```ignore
/// component! {
///     pub struct Health {
///         pub current: Field<f32> = 100.0,
///         pub regen: Field<f32>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! component {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty $(= $default:expr)?),* $(,)?
        }
    ) => {
        $crate::__reindexable! {
            $(#[$meta])*
            $vis struct $name {
                $($(#[$field_meta])* $field_vis $field : $ty $(= $default)?),*
            }
        }

        impl $crate::Component for $name {
            fn slots(&self) -> &$crate::SlotView {
                &self.slots
            }
        }
    };
}

/// Declares a reusable group of fields that can be nested inside components
/// and other structures.
#[macro_export]
macro_rules! structure {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty $(= $default:expr)?),* $(,)?
        }
    ) => {
        $crate::__reindexable! {
            $(#[$meta])*
            $vis struct $name {
                $($(#[$field_meta])* $field_vis $field : $ty $(= $default)?),*
            }
        }

        impl $name {
            pub fn len(&self) -> usize {
                self.slots.len()
            }

            pub fn is_empty(&self) -> bool {
                self.slots.is_empty()
            }

            /// A view of the rows selected by `key`.
            pub fn index(&self, key: &$crate::Key) -> $crate::EcsResult<Self> {
                Ok($crate::Reindex::reindex(self, &self.slots.index(key)?))
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __reindexable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $ty:ty $(= $default:expr)?),*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        $vis struct $name {
            slots: $crate::SlotView,
            $($(#[$field_meta])* $field_vis $field: $ty,)*
        }

        impl $crate::Reindex for $name {
            fn allocate(capacity: usize, slots: &$crate::SlotView) -> Self {
                Self {
                    slots: slots.clone(),
                    $($field: $crate::__allocate_field!(capacity, slots, $ty $(, $default)?),)*
                }
            }

            fn reindex(&self, slots: &$crate::SlotView) -> Self {
                Self {
                    slots: slots.clone(),
                    $($field: $crate::Reindex::reindex(&self.$field, slots),)*
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __allocate_field {
    ($capacity:expr, $slots:expr, $ty:ty) => {
        <$ty as $crate::Reindex>::allocate($capacity, $slots)
    };
    ($capacity:expr, $slots:expr, $ty:ty, $default:expr) => {
        <$ty>::allocate_filled($capacity, $slots, $default)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::slots::Key;
    use glam::Vec2;

    crate::structure! {
        struct Bounds {
            min: Field<Vec2>,
            max: Field<Vec2> = Vec2::ONE,
        }
    }

    crate::component! {
        struct Body {
            mass: Field<f32> = 1.0,
            charge: Field<i32>,
            bounds: Bounds,
        }
    }

    #[test]
    fn spawned_rows_hold_declared_defaults() {
        let pool = Body::create_pool(4);
        let body = pool.spawn(4).unwrap();
        assert_eq!(body.len(), 4);
        assert_eq!(body.mass.len(), 4);
        assert_eq!(body.bounds.len(), 4);
        assert_eq!(body.mass.to_vec(), vec![1.0; 4]);
        assert_eq!(body.charge.to_vec(), vec![0; 4]);
        assert_eq!(body.bounds.min.to_vec(), vec![Vec2::ZERO; 4]);
        assert_eq!(body.bounds.max.to_vec(), vec![Vec2::ONE; 4]);
    }

    #[test]
    fn every_field_follows_the_same_mapping() {
        let pool = Body::create_pool(6);
        let body = pool.spawn(6).unwrap();
        body.charge.fill(&[0, 1, 2, 3, 4, 5]).unwrap();
        body.mass.fill(&[0.0, 10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();

        let odd = body.index(&Key::Mask(body.charge.mask(|c| c % 2 == 1))).unwrap();
        assert_eq!(odd.len(), 3);
        assert_eq!(odd.charge.to_vec(), vec![1, 3, 5]);
        assert_eq!(odd.mass.to_vec(), vec![10.0, 30.0, 50.0]);
        assert_eq!(odd.bounds.len(), 3);

        odd.bounds.min.fill(Vec2::splat(2.0)).unwrap();
        let min = pool.view().bounds.min.to_vec();
        assert_eq!(min[0], Vec2::ZERO);
        assert_eq!(min[1], Vec2::splat(2.0));
        assert_eq!(min[5], Vec2::splat(2.0));
    }

    #[test]
    fn pool_view_tracks_spawns() {
        let pool = Body::create_pool(3);
        assert!(pool.is_empty());
        let first = pool.spawn(2).unwrap();
        first.mass.fill(5.0_f32).unwrap();
        pool.spawn(1).unwrap();

        let all = pool.view();
        assert_eq!(all.len(), 3);
        assert_eq!(all.mass.to_vec(), vec![5.0, 5.0, 1.0]);
        assert!(pool.spawn(1).is_err());
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn structure_indexing() {
        let pool = Body::create_pool(3);
        let body = pool.spawn(3).unwrap();
        let last = body.bounds.index(&Key::from(2..3)).unwrap();
        last.max.fill(Vec2::splat(9.0)).unwrap();
        assert_eq!(
            body.bounds.max.to_vec(),
            vec![Vec2::ONE, Vec2::ONE, Vec2::splat(9.0)]
        );
    }
}
