//! Aggregate roots: event application and rebuilding from history.

use chrono::Utc;
use common::{AggregateId, SequenceNumber};
use model::{Attributes, Event, EventType};

use crate::error::AggregateError;

/// One entry of an aggregate's variant → handler table.
pub struct Handler<A> {
    /// The wire name of the event variant this entry handles.
    pub event_type: &'static str,
    /// Updates internal state from the event. Must be pure: events are
    /// facts, so application cannot fail.
    pub apply: fn(&mut A, &Event),
}

/// Contract for aggregate state types.
///
/// An aggregate's state is mutated only through its handler table, both
/// when a command applies a fresh event and when history is replayed. The
/// blank state returned by [`initial`](Aggregate::initial) is what
/// rehydration starts from — any command-level construction logic lives
/// outside it, so loading history never re-runs creation side effects.
pub trait Aggregate: Send + 'static {
    /// The aggregate type name, used for identity-map type checks.
    fn aggregate_type() -> &'static str;

    /// The blank state a fresh or rehydrating root starts from.
    fn initial() -> Self;

    /// The variant → handler table. Dispatch is exact on the event type
    /// name; there is no fallback lookup.
    fn handlers() -> &'static [Handler<Self>]
    where
        Self: Sized;
}

/// The root of one aggregate: identity, stream position, uncommitted
/// events, and the domain state they fold into.
pub struct AggregateRoot<A: Aggregate> {
    id: AggregateId,
    sequence_number: SequenceNumber,
    uncommitted_events: Vec<Event>,
    state: A,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates a fresh aggregate: next sequence number 1, no uncommitted
    /// events. Creation events are emitted by the command through
    /// [`apply`](AggregateRoot::apply), not here.
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            sequence_number: SequenceNumber::first(),
            uncommitted_events: Vec::new(),
            state: A::initial(),
        }
    }

    /// Rebuilds an aggregate by folding its persisted history.
    ///
    /// The identity comes from the first event; after loading `N` events the
    /// next sequence number is `N + 1` and there are no uncommitted events.
    /// Fails with [`AggregateError::EmptyHistory`] on an empty stream and
    /// with [`AggregateError::MissingHandler`] when a variant has no table
    /// entry.
    pub fn load_from_history(events: Vec<Event>) -> Result<Self, AggregateError> {
        let first = events.first().ok_or(AggregateError::EmptyHistory)?;
        let mut root = Self {
            id: first.aggregate_id(),
            sequence_number: SequenceNumber::new(events.len() as i64 + 1),
            uncommitted_events: Vec::new(),
            state: A::initial(),
        };
        for event in &events {
            root.dispatch(event)?;
        }
        Ok(root)
    }

    /// Builds an event of the given variant at the current position,
    /// dispatches it through the handler table, records it as uncommitted
    /// and advances the sequence number.
    pub fn apply(
        &mut self,
        event_type: &'static EventType,
        attributes: Attributes,
    ) -> Result<(), AggregateError> {
        let event = Event::new(
            event_type,
            self.id,
            self.sequence_number,
            Utc::now(),
            attributes,
        );
        self.apply_event(event)
    }

    /// Applies an already-built event. Its `aggregate_id` must be this
    /// aggregate's id.
    pub fn apply_event(&mut self, event: Event) -> Result<(), AggregateError> {
        if event.aggregate_id() != self.id {
            return Err(AggregateError::ForeignEvent {
                aggregate_id: self.id,
                event_aggregate_id: event.aggregate_id(),
            });
        }
        self.dispatch(&event)?;
        self.uncommitted_events.push(event);
        self.sequence_number = self.sequence_number.next();
        Ok(())
    }

    /// Empties the uncommitted event list.
    pub fn clear_events(&mut self) {
        self.uncommitted_events.clear();
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    /// The next sequence number this aggregate will assign.
    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    /// Events produced since the last commit, in emission order.
    pub fn uncommitted_events(&self) -> &[Event] {
        &self.uncommitted_events
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    fn dispatch(&mut self, event: &Event) -> Result<(), AggregateError> {
        let name = event.type_name();
        let handler = A::handlers()
            .iter()
            .find(|handler| handler.event_type == name)
            .ok_or(AggregateError::MissingHandler {
                aggregate_type: A::aggregate_type(),
                event_type: name,
            })?;
        (handler.apply)(&mut self.state, event);
        Ok(())
    }
}
