//! Event stores.
//!
//! `Events<E>` is an ordinary resource. There are two ways to consume it:
//!
//! - `Events::drain` removes events. Drained events are gone for every other
//!   reader, so a store which is drained should have a single consumer.
//! - `EventCursor::read` leaves events in place. Any number of cursors can
//!   read the same store, each seeing every event once. Events are only
//!   dropped by `drain` or `clear`.

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;

/// A queue of events of type `E`.
pub struct Events<E> {
    events: Vec<E>,
    /// The sequence number of `events[0]`.
    start: u64,
}

impl<E> Events<E> {
    pub fn new() -> Events<E> {
        Events {
            events: Vec::new(),
            start: 0,
        }
    }

    /// Queue an event, returning its sequence number.
    pub fn send(&mut self, event: E) -> u64 {
        let seq = self.start + self.events.len() as u64;
        self.events.push(event);
        seq
    }

    /// Returns the number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return every held event, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        self.start += self.events.len() as u64;
        self.events.drain(..)
    }

    /// Drop every held event.
    pub fn clear(&mut self) {
        self.start += self.events.len() as u64;
        self.events.clear();
    }

    /// Create a cursor which will read events sent from now on.
    pub fn cursor(&self) -> EventCursor<E> {
        EventCursor {
            next: self.start + self.events.len() as u64,
            _marker: PhantomData,
        }
    }
}

impl<E> Default for Events<E> {
    fn default() -> Self {
        Events::new()
    }
}

impl<E: Debug> Debug for Events<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("start", &self.start)
            .field("events", &self.events)
            .finish()
    }
}

/// A non-destructive reader of an `Events<E>` store.
pub struct EventCursor<E> {
    next: u64,
    _marker: PhantomData<fn() -> E>,
}

impl<E> EventCursor<E> {
    /// Create a cursor which will read every event still held by a store.
    pub fn new() -> EventCursor<E> {
        EventCursor {
            next: 0,
            _marker: PhantomData,
        }
    }

    /// Returns the number of events this cursor has not read yet and which
    /// have already been drained or cleared.
    pub fn missed(&self, events: &Events<E>) -> u64 {
        events.start.saturating_sub(self.next)
    }

    /// Iterate over the events this cursor has not seen yet.
    pub fn read<'a>(&mut self, events: &'a Events<E>) -> impl Iterator<Item = &'a E> + 'a {
        let skip = self.next.saturating_sub(events.start) as usize;
        let unread = events.events.get(skip..).unwrap_or(&[]);
        self.next = events.start + events.events.len() as u64;
        unread.iter()
    }
}

impl<E> Default for EventCursor<E> {
    fn default() -> Self {
        EventCursor::new()
    }
}

impl<E> Clone for EventCursor<E> {
    fn clone(&self) -> Self {
        EventCursor {
            next: self.next,
            _marker: PhantomData,
        }
    }
}

impl<E> Debug for EventCursor<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "EventCursor({})", self.next)
    }
}
