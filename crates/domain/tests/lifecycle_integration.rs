//! End-to-end lifecycle tests: command scope → event store → rehydration.

use std::sync::Arc;

use common::AggregateId;
use domain::{Aggregate, AggregateRepository, AggregateRoot, Handler};
use event_store::{Command, EventStore, InMemoryEventStore};
use model::{Attributes, Event, EventType, EventTypeRegistry, Field, FieldKind, Value};

static ACCOUNT_OPENED: EventType = EventType {
    name: "AccountOpened",
    fields: &[Field::new("holder", FieldKind::Text)],
};
static MONEY_DEPOSITED: EventType = EventType {
    name: "MoneyDeposited",
    fields: &[Field::new("amount_cents", FieldKind::Integer)],
};
static MONEY_WITHDRAWN: EventType = EventType {
    name: "MoneyWithdrawn",
    fields: &[Field::new("amount_cents", FieldKind::Integer)],
};

#[derive(Debug, Default, PartialEq)]
struct Account {
    holder: Option<String>,
    balance_cents: i64,
}

impl Account {
    fn opened(&mut self, event: &Event) {
        self.holder = event.get("holder").as_text().map(String::from);
    }

    fn deposited(&mut self, event: &Event) {
        self.balance_cents += event.get("amount_cents").as_integer().unwrap_or(0);
    }

    fn withdrawn(&mut self, event: &Event) {
        self.balance_cents -= event.get("amount_cents").as_integer().unwrap_or(0);
    }
}

impl Aggregate for Account {
    fn aggregate_type() -> &'static str {
        "Account"
    }

    fn initial() -> Self {
        Self::default()
    }

    fn handlers() -> &'static [Handler<Self>] {
        &[
            Handler {
                event_type: "AccountOpened",
                apply: Account::opened,
            },
            Handler {
                event_type: "MoneyDeposited",
                apply: Account::deposited,
            },
            Handler {
                event_type: "MoneyWithdrawn",
                apply: Account::withdrawn,
            },
        ]
    }
}

fn store() -> InMemoryEventStore {
    InMemoryEventStore::new(Arc::new(EventTypeRegistry::with(&[
        &ACCOUNT_OPENED,
        &MONEY_DEPOSITED,
        &MONEY_WITHDRAWN,
    ])))
}

fn amount(cents: i64) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("amount_cents".to_string(), Value::Integer(cents));
    attributes
}

#[tokio::test]
async fn command_scope_persists_and_rehydrates() {
    let store = store();
    let id = AggregateId::new();

    // First command: open the account and deposit.
    let mut repository = AggregateRepository::new(store.clone());
    let mut account = AggregateRoot::<Account>::new(id);
    let mut opened = Attributes::new();
    opened.insert("holder".to_string(), Value::from("Robin"));
    account.apply(&ACCOUNT_OPENED, opened).unwrap();
    account.apply(&MONEY_DEPOSITED, amount(10_00)).unwrap();
    repository.add_aggregate(account).unwrap();
    repository
        .commit(Command::new("OpenAccount", serde_json::json!({"holder": "Robin"})))
        .await
        .unwrap();

    // Second command, fresh repository: history is replayed through the
    // serialized form, so state and position must match exactly.
    let mut repository = AggregateRepository::new(store.clone());
    let account = repository.load_aggregate::<Account>(id).await.unwrap();
    assert_eq!(account.sequence_number().as_i64(), 3);
    assert!(account.uncommitted_events().is_empty());
    assert_eq!(account.state().holder.as_deref(), Some("Robin"));
    assert_eq!(account.state().balance_cents, 10_00);

    account.apply(&MONEY_WITHDRAWN, amount(2_50)).unwrap();
    repository
        .commit(Command::new("Withdraw", serde_json::json!({"amount": 250})))
        .await
        .unwrap();

    // The stream is contiguous across both commands.
    let events = store.load_events(id).await.unwrap();
    let sequences: Vec<_> = events
        .iter()
        .map(|e| e.sequence_number().as_i64())
        .collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(store.command_count().await, 2);
}

#[tokio::test]
async fn rehydrated_state_equals_directly_built_state() {
    let store = store();
    let id = AggregateId::new();

    let mut repository = AggregateRepository::new(store.clone());
    let mut account = AggregateRoot::<Account>::new(id);
    let mut opened = Attributes::new();
    opened.insert("holder".to_string(), Value::from("Robin"));
    account.apply(&ACCOUNT_OPENED, opened.clone()).unwrap();
    account.apply(&MONEY_DEPOSITED, amount(5_00)).unwrap();
    account.apply(&MONEY_WITHDRAWN, amount(1_00)).unwrap();
    repository.add_aggregate(account).unwrap();
    repository
        .commit(Command::new("Setup", serde_json::json!({})))
        .await
        .unwrap();

    // Build the same state directly, without the store in between.
    let mut direct = AggregateRoot::<Account>::new(id);
    direct.apply(&ACCOUNT_OPENED, opened).unwrap();
    direct.apply(&MONEY_DEPOSITED, amount(5_00)).unwrap();
    direct.apply(&MONEY_WITHDRAWN, amount(1_00)).unwrap();

    let history = store.load_events(id).await.unwrap();
    let rehydrated = AggregateRoot::<Account>::load_from_history(history).unwrap();

    assert_eq!(rehydrated.state(), direct.state());
    assert_eq!(rehydrated.sequence_number(), direct.sequence_number());
}

#[tokio::test]
async fn stale_repository_conflicts_on_overlapping_commits() {
    let store = store();
    let id = AggregateId::new();

    let mut setup = AggregateRepository::new(store.clone());
    let mut account = AggregateRoot::<Account>::new(id);
    account.apply(&MONEY_DEPOSITED, amount(1_00)).unwrap();
    setup.add_aggregate(account).unwrap();
    setup
        .commit(Command::new("Setup", serde_json::json!({})))
        .await
        .unwrap();

    // Two repositories load the same aggregate; both try to claim sequence 2.
    let mut first = AggregateRepository::new(store.clone());
    let mut second = AggregateRepository::new(store.clone());
    first
        .load_aggregate::<Account>(id)
        .await
        .unwrap()
        .apply(&MONEY_DEPOSITED, amount(2_00))
        .unwrap();
    second
        .load_aggregate::<Account>(id)
        .await
        .unwrap()
        .apply(&MONEY_DEPOSITED, amount(3_00))
        .unwrap();

    first
        .commit(Command::new("Deposit", serde_json::json!({})))
        .await
        .unwrap();
    let conflict = second
        .commit(Command::new("Deposit", serde_json::json!({})))
        .await;

    assert!(matches!(
        conflict,
        Err(domain::RepositoryError::EventStore(
            event_store::EventStoreError::SequenceConflict { .. }
        ))
    ));
}
