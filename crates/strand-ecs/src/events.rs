//! Events passed between systems.
//!
//! Every [`EventReader`] parameter owns a queue registered when its system is
//! scheduled. [`EventWriter::send`] pushes a copy onto every registered
//! queue, and a reader drains its queue each time its system runs, so each
//! reader sees each event exactly once.

use std::any::type_name;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{EcsError, EcsResult};
use crate::system::{ParamBinding, SystemBuilder, SystemParam};
use crate::world::World;

/// Types that can be sent as events.
pub trait Event: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Event for T {}

type Queue<E> = Arc<Mutex<Vec<E>>>;

/// All reader queues for one event type.
pub(crate) struct EventChannel<E> {
    readers: Mutex<Vec<Queue<E>>>,
}

impl<E: Event> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            readers: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> Queue<E> {
        let queue = Arc::new(Mutex::new(Vec::new()));
        self.readers.lock().push(Arc::clone(&queue));
        queue
    }

    fn send(&self, event: E) {
        for queue in self.readers.lock().iter() {
            queue.lock().push(event.clone());
        }
    }
}

/// System parameter that sends events of type `E`.
pub struct EventWriter<E: Event> {
    channel: Arc<EventChannel<E>>,
}

impl<E: Event> EventWriter<E> {
    /// Deliver `event` to every reader of `E`. Readers see it the next time
    /// their system runs.
    pub fn send(&self, event: E) {
        self.channel.send(event);
    }

    pub fn send_batch(&self, events: impl IntoIterator<Item = E>) {
        for event in events {
            self.send(event);
        }
    }
}

/// System parameter holding the events of type `E` sent since this reader
/// last ran.
pub struct EventReader<E: Event> {
    events: Vec<E>,
}

impl<E: Event> EventReader<E> {
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<E: Event> IntoIterator for EventReader<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<E: Event> SystemParam for EventWriter<E> {
    fn bind(_builder: &mut SystemBuilder<'_>) -> EcsResult<ParamBinding> {
        Ok(ParamBinding::EventWriter)
    }

    fn fetch(world: &World, binding: &ParamBinding) -> EcsResult<Self> {
        match binding {
            ParamBinding::EventWriter => Ok(EventWriter {
                channel: world.event_channel::<E>(),
            }),
            _ => Err(EcsError::SystemNotInitialized(type_name::<Self>().to_string())),
        }
    }
}

impl<E: Event> SystemParam for EventReader<E> {
    fn bind(builder: &mut SystemBuilder<'_>) -> EcsResult<ParamBinding> {
        let queue = builder.world().event_channel::<E>().subscribe();
        Ok(ParamBinding::EventReader(queue))
    }

    fn fetch(_world: &World, binding: &ParamBinding) -> EcsResult<Self> {
        let queue = match binding {
            ParamBinding::EventReader(queue) => queue.clone().downcast::<Mutex<Vec<E>>>().ok(),
            _ => None,
        }
        .ok_or_else(|| EcsError::SystemNotInitialized(type_name::<Self>().to_string()))?;
        let events = std::mem::take(&mut *queue.lock());
        Ok(EventReader { events })
    }
}
