//! FIFO buffer of events waiting to be processed.

use std::any::Any;
use std::collections::VecDeque;

use space_component::TypeKey;

/// A type-erased event with the type it was posted as.
#[derive(Debug)]
pub struct QueuedEvent {
    event_type: TypeKey,
    payload: Box<dyn Any>,
}

impl QueuedEvent {
    #[must_use]
    pub fn new<E: Any>(event: E) -> Self {
        Self {
            event_type: TypeKey::of::<E>(),
            payload: Box::new(event),
        }
    }

    #[must_use]
    pub fn event_type(&self) -> TypeKey {
        self.event_type
    }

    #[must_use]
    pub fn payload(&self) -> &dyn Any {
        self.payload.as_ref()
    }

    /// Returns the event as an `E`, if that is its type.
    #[must_use]
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Unwraps the event as an `E`, or gives it back unchanged.
    ///
    /// # Errors
    ///
    /// Returns `self` if the event is not an `E`.
    pub fn downcast<E: Any>(self) -> Result<E, Self> {
        let event_type = self.event_type;
        self.payload
            .downcast::<E>()
            .map(|event| *event)
            .map_err(|payload| Self {
                event_type,
                payload,
            })
    }
}

/// Pending events, consumed from the front.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<QueuedEvent>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends an event to the back of the queue.
    pub fn push<E: Any>(&mut self, event: E) {
        self.events.push_back(QueuedEvent::new(event));
    }

    /// Takes the oldest event.
    pub fn pop_front(&mut self) -> Option<QueuedEvent> {
        self.events.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Iterates over the types of the pending events, oldest first.
    pub fn event_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.events.iter().map(QueuedEvent::event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Spawn(u32);
    #[derive(Debug, PartialEq)]
    struct Quit;

    #[test]
    fn test_fifo_order() {
        let mut queue = EventQueue::new();
        queue.push(Spawn(1));
        queue.push(Quit);
        queue.push(Spawn(2));
        assert_eq!(queue.len(), 3);
        assert_eq!(
            queue.event_types().collect::<Vec<_>>(),
            vec![
                TypeKey::of::<Spawn>(),
                TypeKey::of::<Quit>(),
                TypeKey::of::<Spawn>()
            ]
        );

        assert_eq!(queue.pop_front().unwrap().downcast::<Spawn>().unwrap(), Spawn(1));
        assert_eq!(queue.pop_front().unwrap().downcast::<Quit>().unwrap(), Quit);
        assert_eq!(queue.pop_front().unwrap().downcast::<Spawn>().unwrap(), Spawn(2));
        assert!(queue.pop_front().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_downcast_wrong_type_returns_event() {
        let event = QueuedEvent::new(Spawn(7));
        let event = event.downcast::<Quit>().unwrap_err();
        assert_eq!(event.event_type(), TypeKey::of::<Spawn>());
        assert_eq!(event.downcast_ref::<Spawn>(), Some(&Spawn(7)));
    }

    #[test]
    fn test_clear() {
        let mut queue = EventQueue::with_capacity(4);
        queue.push(Quit);
        queue.push(Spawn(3));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop_front().is_none());
    }
}
