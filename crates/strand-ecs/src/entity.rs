use fixedbitset::FixedBitSet;

use crate::error::{EcsError, EcsResult};

/// Raw entity id as stored in the [`EntityId`](crate::EntityId) component.
pub type Entity = u32;

/// Allocates and recycles entity ids below a fixed capacity.
///
/// Freed ids are handed out again, lowest first, before fresh ones. A
/// recycled id names a new entity; it carries no link to the old one.
pub struct EntityAllocator {
    capacity: usize,
    alive: FixedBitSet,
    free_list: Vec<Entity>,
    next_fresh: Entity,
    len: usize,
}

impl EntityAllocator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            alive: FixedBitSet::with_capacity(capacity),
            free_list: Vec::new(),
            next_fresh: 0,
            len: 0,
        }
    }

    /// Allocate `num` ids, all or nothing.
    pub fn allocate(&mut self, num: usize) -> EcsResult<Vec<Entity>> {
        if num > self.capacity - self.len {
            return Err(EcsError::CapacityExceeded {
                component: "entity",
                requested: num,
                live: self.len,
                capacity: self.capacity,
            });
        }
        let mut entities = Vec::with_capacity(num);
        for _ in 0..num {
            let entity = match self.free_list.pop() {
                Some(entity) => entity,
                None => {
                    let entity = self.next_fresh;
                    self.next_fresh += 1;
                    entity
                }
            };
            self.alive.insert(entity as usize);
            entities.push(entity);
        }
        self.len += num;
        Ok(entities)
    }

    /// Free an id. Returns `true` if it was alive.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.alive.set(entity as usize, false);
        // Keep the list sorted highest first so `pop` yields the lowest id.
        let position = self
            .free_list
            .partition_point(|&free| free > entity);
        self.free_list.insert(position, entity);
        self.len -= 1;
        true
    }

    /// Check if an entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        (entity as usize) < self.capacity && self.alive.contains(entity as usize)
    }

    /// Number of currently alive entities.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no alive entities.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Room for more entities.
    pub fn remaining(&self) -> usize {
        self.capacity - self.len
    }
}
