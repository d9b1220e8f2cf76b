//! Bridging the event store's handler interface onto a replay session.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::{EventHandler, HandlerResult};
use model::Event;
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::session::ReplaySession;

/// A replay session shared between a projection handler and the code that
/// commits it after replay.
pub type SharedSession = Arc<RwLock<ReplaySession>>;

/// An [`EventHandler`] that applies a projection function against a shared
/// [`ReplaySession`].
///
/// The projection function is the read model: it receives every event the
/// store delivers and stages record changes in the session.
pub struct SessionProjection<F>
where
    F: Fn(&mut ReplaySession, &Event) -> Result<(), SessionError> + Send + Sync,
{
    session: SharedSession,
    project: F,
}

impl<F> SessionProjection<F>
where
    F: Fn(&mut ReplaySession, &Event) -> Result<(), SessionError> + Send + Sync,
{
    pub fn new(session: SharedSession, project: F) -> Self {
        Self { session, project }
    }

    /// The session this projection writes into.
    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }
}

#[async_trait]
impl<F> EventHandler for SessionProjection<F>
where
    F: Fn(&mut ReplaySession, &Event) -> Result<(), SessionError> + Send + Sync,
{
    async fn handle_message(&self, event: &Event) -> HandlerResult {
        let mut session = self.session.write().await;
        (self.project)(&mut session, event).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Column, RecordClass};
    use chrono::Utc;
    use common::{AggregateId, SequenceNumber};
    use model::{Attributes, EventType, Field, FieldKind, Value};

    static TALLY_RECORDS: RecordClass = RecordClass {
        table: "tally_records",
        columns: &[
            Column::new("id", FieldKind::Integer),
            Column::new("aggregate_id", FieldKind::Text),
            Column::new("count", FieldKind::Integer),
        ],
    };

    static TICKED: EventType = EventType {
        name: "Ticked",
        fields: &[],
    };

    fn ticked(aggregate_id: AggregateId, sequence: i64) -> Event {
        Event::new(
            &TICKED,
            aggregate_id,
            SequenceNumber::new(sequence),
            Utc::now(),
            Attributes::new(),
        )
    }

    #[tokio::test]
    async fn handler_stages_records_in_the_shared_session() {
        let session: SharedSession = Arc::new(RwLock::new(ReplaySession::new()));
        let projection = SessionProjection::new(Arc::clone(&session), |session, event| {
            let mut values = Attributes::new();
            values.insert("aggregate_id".to_string(), Value::from(event.aggregate_id()));
            values.insert("count".to_string(), Value::Integer(1));
            session.create_record(&TALLY_RECORDS, values);
            Ok(())
        });

        let id = AggregateId::new();
        projection.handle_message(&ticked(id, 1)).await.unwrap();
        projection.handle_message(&ticked(id, 2)).await.unwrap();

        assert_eq!(session.read().await.record_count(&TALLY_RECORDS), 2);
    }

    #[tokio::test]
    async fn projection_errors_surface_to_the_store() {
        let session: SharedSession = Arc::new(RwLock::new(ReplaySession::new()));
        let projection = SessionProjection::new(Arc::clone(&session), |session, event| {
            session
                .update_record(
                    &TALLY_RECORDS,
                    event,
                    &[("aggregate_id", Value::from(event.aggregate_id()))],
                    crate::session::UpdateOptions::default(),
                    |_| {},
                )
                .map(|_| ())
        });

        let result = projection.handle_message(&ticked(AggregateId::new(), 1)).await;
        assert!(result.is_err());
    }
}
