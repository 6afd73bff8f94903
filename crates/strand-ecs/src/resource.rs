use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::lock_api::ArcRwLockWriteGuard;
use parking_lot::{RawRwLock, RwLock};

use crate::error::{EcsError, EcsResult};
use crate::system::{ParamBinding, SystemBuilder, SystemParam};
use crate::world::World;

/// Type-map storage for singleton resources.
///
/// Each resource sits behind its own lock, so a system can hold one
/// resource while another system (or the app) holds a different one.
pub struct Resources {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Resources {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a resource, replacing any previous value of the same type.
    pub fn insert<T: 'static + Send + Sync>(&mut self, value: T) {
        self.map
            .insert(TypeId::of::<T>(), Arc::new(RwLock::new(value)));
    }

    /// Check whether a resource of this type exists.
    pub fn contains<T: 'static + Send + Sync>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub(crate) fn contains_raw(&self, type_id: TypeId) -> bool {
        self.map.contains_key(&type_id)
    }

    /// Remove a resource, returning it if it existed and nothing still
    /// borrows it.
    pub fn remove<T: 'static + Send + Sync>(&mut self) -> Option<T> {
        let cell = self.map.remove(&TypeId::of::<T>())?;
        let cell = cell.downcast::<RwLock<T>>().ok()?;
        Arc::try_unwrap(cell).ok().map(RwLock::into_inner)
    }

    /// Exclusive access to a resource.
    pub fn borrow_mut<T: 'static + Send + Sync>(&self) -> EcsResult<Res<T>> {
        let cell = self
            .map
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|cell| cell.downcast::<RwLock<T>>().ok())
            .ok_or(EcsError::MissingResource(type_name::<T>()))?;
        let guard = cell
            .try_write_arc()
            .ok_or(EcsError::ResourceBorrowed(type_name::<T>()))?;
        Ok(Res { guard })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive handle to a resource of type `T`.
///
/// Usable as a system parameter; the resource must be added before the
/// system is scheduled and may be requested at most once per system.
pub struct Res<T: 'static> {
    guard: ArcRwLockWriteGuard<RawRwLock, T>,
}

impl<T: 'static> Deref for Res<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: 'static> DerefMut for Res<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: 'static + Send + Sync> SystemParam for Res<T> {
    fn bind(builder: &mut SystemBuilder<'_>) -> EcsResult<ParamBinding> {
        let type_id = TypeId::of::<T>();
        let name = type_name::<T>();
        if !builder.world().has_resource_raw(type_id) {
            return Err(builder.signature_error(format!("resource `{name}` has not been added")));
        }
        builder.claim_resource(type_id, name)?;
        Ok(ParamBinding::Resource(type_id))
    }

    fn fetch(world: &World, binding: &ParamBinding) -> EcsResult<Self> {
        match binding {
            ParamBinding::Resource(_) => world.resource::<T>(),
            _ => Err(EcsError::SystemNotInitialized(type_name::<Self>().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_borrow() {
        let mut res = Resources::new();
        res.insert(42u32);
        res.insert("hello".to_string());
        assert_eq!(*res.borrow_mut::<u32>().unwrap(), 42);
        assert_eq!(res.borrow_mut::<String>().unwrap().as_str(), "hello");
        assert_eq!(res.len(), 2);
    }

    #[test]
    fn replace() {
        let mut res = Resources::new();
        res.insert(1u32);
        res.insert(2u32);
        assert_eq!(*res.borrow_mut::<u32>().unwrap(), 2);
    }

    #[test]
    fn mutate() {
        let mut res = Resources::new();
        res.insert(vec![1, 2, 3]);
        res.borrow_mut::<Vec<i32>>().unwrap().push(4);
        assert_eq!(res.borrow_mut::<Vec<i32>>().unwrap().len(), 4);
    }

    #[test]
    fn second_borrow_is_refused() {
        let mut res = Resources::new();
        res.insert(0u8);
        let held = res.borrow_mut::<u8>().unwrap();
        assert!(matches!(
            res.borrow_mut::<u8>(),
            Err(EcsError::ResourceBorrowed("u8"))
        ));
        drop(held);
        assert!(res.borrow_mut::<u8>().is_ok());
    }

    #[test]
    fn missing_resource() {
        let res = Resources::new();
        assert!(matches!(
            res.borrow_mut::<u64>(),
            Err(EcsError::MissingResource("u64"))
        ));
    }

    #[test]
    fn remove_resource() {
        let mut res = Resources::new();
        res.insert(99u32);
        assert_eq!(res.remove::<u32>(), Some(99));
        assert!(!res.contains::<u32>());
    }
}
