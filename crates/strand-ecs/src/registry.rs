use std::any::TypeId;
use std::collections::HashMap;

use crate::component::Component;

/// Dense integer id of a component type within one world.
pub type ComponentId = usize;

/// Assigns stable ids to component types.
///
/// Each world owns its own registry, so independent worlds never share
/// component ids.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    ids: HashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `C`, returning its id. Registering twice returns the same id.
    pub fn register<C: Component>(&mut self) -> ComponentId {
        self.register_raw(TypeId::of::<C>(), std::any::type_name::<C>())
    }

    pub(crate) fn register_raw(&mut self, type_id: TypeId, name: &'static str) -> ComponentId {
        *self.ids.entry(type_id).or_insert_with(|| {
            self.names.push(name);
            self.names.len() - 1
        })
    }

    pub fn id_of<C: Component>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<C>()).copied()
    }

    pub(crate) fn id_of_raw(&self, type_id: TypeId) -> Option<ComponentId> {
        self.ids.get(&type_id).copied()
    }

    /// Type name of a registered component.
    pub fn name(&self, id: ComponentId) -> Option<&'static str> {
        self.names.get(id).copied()
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    crate::component! {
        struct Mass {
            value: Field<f32>,
        }
    }

    crate::component! {
        struct Charge {
            value: Field<i32>,
        }
    }

    #[test]
    fn ids_are_dense_and_stable() {
        let mut registry = ComponentRegistry::new();
        let mass = registry.register::<Mass>();
        let charge = registry.register::<Charge>();
        assert_eq!((mass, charge), (0, 1));
        assert_eq!(registry.register::<Mass>(), mass);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.id_of::<Charge>(), Some(charge));
        assert!(registry.name(mass).unwrap().ends_with("Mass"));
    }

    #[test]
    fn registries_are_independent() {
        let mut first = ComponentRegistry::new();
        let mut second = ComponentRegistry::new();
        first.register::<Mass>();
        assert_eq!(second.register::<Charge>(), 0);
        assert_eq!(second.id_of::<Mass>(), None);
    }
}
