//! Strand ECS - Columnar Entity Component System
//!
//! Components are bundles of fields stored column-wise in fixed-capacity
//! pools. Every query result and every index expression is a view: an
//! ordered list of physical slots through which the pool's columns are read
//! and written in bulk, so systems operate on whole columns at once instead
//! of visiting entities one by one.

pub mod app;
pub mod builtins;
pub mod commands;
pub mod component;
pub mod entity;
pub mod error;
pub mod events;
pub mod field;
pub mod query;
pub mod registry;
pub mod resource;
pub mod schedule;
pub mod slots;
pub mod system;
pub mod world;

pub use app::{App, Plugin};
pub use builtins::{EntityId, Transform2};
pub use commands::Commands;
pub use component::{Component, ComponentPool, Reindex};
pub use entity::Entity;
pub use error::{EcsError, EcsResult};
pub use events::{Event, EventReader, EventWriter};
pub use field::{ArithOp, Element, Field, FieldValue, Operand};
pub use query::{ComponentSet, Query};
pub use registry::{ComponentId, ComponentRegistry};
pub use resource::Res;
pub use schedule::Schedule;
pub use slots::{Key, Slice, Slot, SlotStore, SlotView};
pub use system::{IntoSystem, System, SystemParam};
pub use world::World;

pub use strand_core::{AppConfig, Time};
