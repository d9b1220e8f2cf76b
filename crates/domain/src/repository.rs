//! The per-command aggregate repository.

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use common::AggregateId;
use event_store::{Command, EventStore};
use model::Event;

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::error::RepositoryError;

/// Type-erased view of an aggregate root, so roots of different aggregate
/// types can share one identity map.
trait AnyAggregateRoot: Send {
    fn aggregate_type(&self) -> &'static str;
    fn uncommitted_events(&self) -> &[Event];
    fn clear_events(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<A: Aggregate> AnyAggregateRoot for AggregateRoot<A> {
    fn aggregate_type(&self) -> &'static str {
        A::aggregate_type()
    }

    fn uncommitted_events(&self) -> &[Event] {
        AggregateRoot::uncommitted_events(self)
    }

    fn clear_events(&mut self) {
        AggregateRoot::clear_events(self);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-command unit of work over aggregates.
///
/// The repository owns the live set of aggregates for the duration of one
/// command. Within that scope, repeated loads of the same id return the
/// same in-memory object, so mutations are observable across loads.
pub struct AggregateRepository<S: EventStore> {
    store: S,
    aggregates: HashMap<AggregateId, Box<dyn AnyAggregateRoot>>,
    insertion_order: Vec<AggregateId>,
}

impl<S: EventStore> AggregateRepository<S> {
    /// Creates an empty repository over the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            aggregates: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    /// Registers a freshly created aggregate in the identity map.
    ///
    /// Fails with [`RepositoryError::NonUniqueAggregateId`] when another
    /// object with the same id is already tracked.
    pub fn add_aggregate<A: Aggregate>(
        &mut self,
        root: AggregateRoot<A>,
    ) -> Result<(), RepositoryError> {
        let id = root.id();
        if self.aggregates.contains_key(&id) {
            return Err(RepositoryError::NonUniqueAggregateId(id));
        }
        self.insertion_order.push(id);
        self.aggregates.insert(id, Box::new(root));
        Ok(())
    }

    /// Returns the tracked aggregate for `id`, loading it from the event
    /// store on first access.
    ///
    /// Whatever the store returns goes straight into `load_from_history`,
    /// so an id with no events fails with
    /// [`AggregateError::EmptyHistory`](crate::AggregateError::EmptyHistory)
    /// — callers treat that as not-found. Fails with
    /// [`RepositoryError::TypeMismatch`] when the identity map holds the id
    /// under a different aggregate type.
    pub async fn load_aggregate<A: Aggregate>(
        &mut self,
        id: AggregateId,
    ) -> Result<&mut AggregateRoot<A>, RepositoryError> {
        let history = if self.aggregates.contains_key(&id) {
            None
        } else {
            Some(self.store.load_events(id).await?)
        };

        let entry = match self.aggregates.entry(id) {
            Entry::Occupied(tracked) => tracked.into_mut(),
            Entry::Vacant(slot) => {
                let root = AggregateRoot::<A>::load_from_history(history.unwrap_or_default())?;
                self.insertion_order.push(id);
                slot.insert(Box::new(root))
            }
        };

        let actual = entry.aggregate_type();
        entry
            .as_any_mut()
            .downcast_mut::<AggregateRoot<A>>()
            .ok_or(RepositoryError::TypeMismatch {
                aggregate_id: id,
                expected: A::aggregate_type(),
                actual,
            })
    }

    /// Verifies that the aggregate exists and has the expected type.
    pub async fn ensure_exists<A: Aggregate>(
        &mut self,
        id: AggregateId,
    ) -> Result<(), RepositoryError> {
        self.load_aggregate::<A>(id).await.map(|_| ())
    }

    /// Collects uncommitted events across all tracked aggregates in
    /// insertion order, submits `(command, events)` to the event store
    /// once, and clears the events on every aggregate.
    pub async fn commit(&mut self, command: Command) -> Result<(), RepositoryError> {
        let mut events = Vec::new();
        for id in &self.insertion_order {
            if let Some(root) = self.aggregates.get(id) {
                events.extend_from_slice(root.uncommitted_events());
            }
        }

        self.store.commit_events(&command, &events).await?;

        for root in self.aggregates.values_mut() {
            root.clear_events();
        }
        Ok(())
    }

    /// Number of aggregates in the identity map.
    pub fn tracked(&self) -> usize {
        self.aggregates.len()
    }
}
