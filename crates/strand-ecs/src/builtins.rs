//! Components provided by the runtime.

use glam::Vec2;

use crate::component;
use crate::field::Field;

component! {
    /// The id of every spawned entity. Filled in by the runtime at spawn time
    /// and present on every entity, so it can be queried alongside any other
    /// component.
    pub struct EntityId {
        pub value: Field<u32>,
    }
}

component! {
    /// Position, orientation and size in the plane.
    pub struct Transform2 {
        pub translation: Field<Vec2>,
        /// Counter-clockwise, in radians.
        pub rotation: Field<f32>,
        pub scale: Field<Vec2> = Vec2::ONE,
    }
}

impl EntityId {
    /// The viewed ids, in view order.
    pub fn ids(&self) -> Vec<u32> {
        self.value.to_vec()
    }
}
