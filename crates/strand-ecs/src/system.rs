use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{EcsError, EcsResult};
use crate::query::QueryId;
use crate::world::World;

/// What a system parameter resolved to when its system was scheduled.
pub enum ParamBinding {
    Query(QueryId),
    Commands,
    Resource(TypeId),
    World,
    /// The reader's own event queue.
    EventReader(Arc<dyn Any + Send + Sync>),
    EventWriter,
}

/// Collects the bindings of one system's parameters and validates its
/// signature as a whole.
pub struct SystemBuilder<'w> {
    world: &'w World,
    system: &'w str,
    resources: Vec<TypeId>,
}

impl<'w> SystemBuilder<'w> {
    pub fn new(world: &'w World, system: &'w str) -> Self {
        Self {
            world,
            system,
            resources: Vec::new(),
        }
    }

    pub fn world(&self) -> &'w World {
        self.world
    }

    pub fn system_name(&self) -> &str {
        self.system
    }

    /// Record that the system holds the resource exclusively. A second claim
    /// on the same resource would deadlock the system against itself.
    pub fn claim_resource(&mut self, type_id: TypeId, name: &str) -> EcsResult<()> {
        if self.resources.contains(&type_id) {
            return Err(self.signature_error(format!("resource `{name}` is requested twice")));
        }
        self.resources.push(type_id);
        Ok(())
    }

    pub fn signature_error(&self, reason: impl Into<String>) -> EcsError {
        EcsError::SystemSignature {
            system: self.system.to_string(),
            reason: reason.into(),
        }
    }
}

/// A value a system can declare as a parameter.
///
/// `bind` runs once when the system is scheduled; `fetch` runs before every
/// invocation.
pub trait SystemParam: Sized {
    fn bind(builder: &mut SystemBuilder<'_>) -> EcsResult<ParamBinding>;
    fn fetch(world: &World, binding: &ParamBinding) -> EcsResult<Self>;
}

/// Return types accepted from system functions.
pub trait SystemOutput {
    fn into_result(self) -> EcsResult<()>;
}

impl SystemOutput for () {
    fn into_result(self) -> EcsResult<()> {
        Ok(())
    }
}

impl SystemOutput for EcsResult<()> {
    fn into_result(self) -> EcsResult<()> {
        self
    }
}

/// A unit of work run by the app.
pub trait System: Send {
    fn name(&self) -> &str;

    /// Bind parameters against the world. Called once before the first run.
    fn initialize(&mut self, world: &World) -> EcsResult<()>;

    fn run(&mut self, world: &World) -> EcsResult<()>;
}

/// Conversion into a [`System`]. Implemented for every [`System`] and for
/// functions and closures whose parameters all implement [`SystemParam`].
pub trait IntoSystem<Marker> {
    type System: System + 'static;

    fn into_system(self) -> Self::System;
}

#[doc(hidden)]
pub struct IsSystem;

impl<S: System + 'static> IntoSystem<IsSystem> for S {
    type System = S;

    fn into_system(self) -> S {
        self
    }
}

/// A function or closure adapted into a [`System`].
pub struct FunctionSystem<F, Marker> {
    func: F,
    name: &'static str,
    bindings: Option<Vec<ParamBinding>>,
    _marker: PhantomData<fn() -> Marker>,
}

impl<F, Marker> FunctionSystem<F, Marker> {
    fn new(func: F) -> Self {
        Self {
            func,
            name: type_name::<F>(),
            bindings: None,
            _marker: PhantomData,
        }
    }
}

fn next_binding<'b>(
    bindings: &mut impl Iterator<Item = &'b ParamBinding>,
    system: &str,
) -> EcsResult<&'b ParamBinding> {
    bindings
        .next()
        .ok_or_else(|| EcsError::SystemNotInitialized(system.to_string()))
}

macro_rules! impl_function_system {
    ($($param:ident),*) => {
        impl<F, Out, $($param),*> IntoSystem<fn($($param,)*) -> Out> for F
        where
            F: FnMut($($param),*) -> Out + Send + 'static,
            Out: SystemOutput + 'static,
            $($param: SystemParam + 'static,)*
        {
            type System = FunctionSystem<F, fn($($param,)*) -> Out>;

            fn into_system(self) -> Self::System {
                FunctionSystem::new(self)
            }
        }

        impl<F, Out, $($param),*> System for FunctionSystem<F, fn($($param,)*) -> Out>
        where
            F: FnMut($($param),*) -> Out + Send + 'static,
            Out: SystemOutput + 'static,
            $($param: SystemParam + 'static,)*
        {
            fn name(&self) -> &str {
                self.name
            }

            #[allow(unused_variables, unused_mut)]
            fn initialize(&mut self, world: &World) -> EcsResult<()> {
                let mut builder = SystemBuilder::new(world, self.name);
                self.bindings = Some(vec![$($param::bind(&mut builder)?),*]);
                Ok(())
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn run(&mut self, world: &World) -> EcsResult<()> {
                let name = self.name;
                let mut bindings = self
                    .bindings
                    .as_ref()
                    .ok_or_else(|| EcsError::SystemNotInitialized(name.to_string()))?
                    .iter();
                $(let $param = $param::fetch(world, next_binding(&mut bindings, name)?)?;)*
                (self.func)($($param),*).into_result()
            }
        }
    };
}

impl_function_system!();
impl_function_system!(P0);
impl_function_system!(P0, P1);
impl_function_system!(P0, P1, P2);
impl_function_system!(P0, P1, P2, P3);
impl_function_system!(P0, P1, P2, P3, P4);
impl_function_system!(P0, P1, P2, P3, P4, P5);
impl_function_system!(P0, P1, P2, P3, P4, P5, P6);
impl_function_system!(P0, P1, P2, P3, P4, P5, P6, P7);
