//! The in-memory staged record set used during replay.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use model::{Attributes, Event, Value};

use crate::error::{Result, SessionError};
use crate::record::{Record, RecordClass};

/// Records per class above which `commit` switches from per-row inserts to
/// a CSV `COPY` stream.
pub const DEFAULT_CSV_THRESHOLD: usize = 50;

/// Options for [`ReplaySession::update_record`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    /// When true, the matched record's `sequence_number` is set to the
    /// event's sequence number.
    pub update_sequence_number: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            update_sequence_number: true,
        }
    }
}

type IndexKey = (&'static str, &'static [&'static str], Vec<String>);

/// The staged working set a read-model handler writes into during replay.
///
/// Records live in per-class identity sets and are reachable through two
/// kinds of index: the single-record `aggregate_id` shortcut and declared
/// composite indexes. `find_records` prefers an index hit and falls back to
/// a linear scan. `commit` flushes everything to Postgres and always clears
/// the session, even when the flush fails.
pub struct ReplaySession {
    pub(crate) record_store: HashMap<&'static str, HashSet<Record>>,
    aggregate_index: HashMap<(&'static str, String), Record>,
    record_index: HashMap<IndexKey, Vec<Record>>,
    indices: HashMap<&'static str, Vec<&'static [&'static str]>>,
    pub(crate) insert_with_csv_size: usize,
    next_stamp: u64,
}

impl ReplaySession {
    /// Creates an empty session with the default CSV threshold.
    pub fn new() -> Self {
        Self {
            record_store: HashMap::new(),
            aggregate_index: HashMap::new(),
            record_index: HashMap::new(),
            indices: HashMap::new(),
            insert_with_csv_size: DEFAULT_CSV_THRESHOLD,
            next_stamp: 0,
        }
    }

    /// Sets the per-class record count above which `commit` uses `COPY`.
    pub fn with_csv_threshold(mut self, threshold: usize) -> Self {
        self.insert_with_csv_size = threshold;
        self
    }

    /// Declares a composite index on `class`. Queries whose where-clause
    /// keys exactly match `columns` hit this index instead of scanning.
    /// Declarations survive `clear`.
    pub fn declare_index(&mut self, class: &'static RecordClass, columns: &'static [&'static str]) {
        self.indices.entry(class.table).or_default().push(columns);
    }

    /// Builds a record, stages it and indexes it. When the class has an
    /// `updated_at` column it defaults to the record's `created_at`.
    pub fn create_record(&mut self, class: &'static RecordClass, values: Attributes) -> Record {
        self.create_record_with(class, values, |_| {})
    }

    /// As [`create_record`](ReplaySession::create_record), yielding the
    /// record for customization before it is staged.
    pub fn create_record_with(
        &mut self,
        class: &'static RecordClass,
        mut values: Attributes,
        customize: impl FnOnce(&Record),
    ) -> Record {
        if class.has_column("updated_at")
            && !values.contains_key("updated_at")
            && let Some(created_at) = values.get("created_at").cloned()
        {
            values.insert("updated_at".to_string(), created_at);
        }

        let record = Record::new(class, self.next_stamp, values);
        self.next_stamp += 1;
        customize(&record);

        self.record_store
            .entry(class.table)
            .or_default()
            .insert(record.clone());
        self.index_record(&record);
        record
    }

    /// Locates exactly one record, applies `update`, then stamps
    /// `sequence_number` (unless disabled) and `updated_at` from the event.
    /// Fails with [`SessionError::RecordNotFound`] when nothing matches.
    pub fn update_record(
        &mut self,
        class: &'static RecordClass,
        event: &Event,
        where_clause: &[(&str, Value)],
        options: UpdateOptions,
        update: impl FnOnce(&Record),
    ) -> Result<Record> {
        let record = self
            .last_record(class, where_clause)
            .ok_or_else(|| SessionError::RecordNotFound {
                table: class.table,
                criteria: format_criteria(where_clause),
            })?;

        update(&record);

        if options.update_sequence_number && class.has_column("sequence_number") {
            record.set(
                "sequence_number",
                Value::Integer(event.sequence_number().as_i64()),
            );
        }
        if class.has_column("updated_at") {
            record.set("updated_at", Value::Timestamp(event.created_at()));
        }
        Ok(record)
    }

    /// Upserts by the where-clause drawn from `values`: customizes the
    /// existing record when one matches, creates one otherwise.
    pub fn create_or_update_record(
        &mut self,
        class: &'static RecordClass,
        values: Attributes,
        created_at: DateTime<Utc>,
        customize: impl FnOnce(&Record),
    ) -> Record {
        let criteria: Vec<(&str, Value)> = values
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();

        match self.last_record(class, &criteria) {
            Some(record) => {
                customize(&record);
                record
            }
            None => {
                let mut values = values;
                values
                    .entry("created_at".to_string())
                    .or_insert(Value::Timestamp(created_at));
                self.create_record_with(class, values, customize)
            }
        }
    }

    /// Removes a record from the store and from every index entry.
    pub fn delete_record(&mut self, record: &Record) {
        if let Some(records) = self.record_store.get_mut(record.class().table) {
            records.remove(record);
        }
        self.unindex_record(record);
    }

    /// Deletes every record matching the where-clause.
    pub fn delete_all_records(
        &mut self,
        class: &'static RecordClass,
        where_clause: &[(&str, Value)],
    ) {
        for record in self.find_records(class, where_clause) {
            self.delete_record(&record);
        }
    }

    /// Mutates every matching record in place with the given updates.
    pub fn update_all_records(
        &mut self,
        class: &'static RecordClass,
        where_clause: &[(&str, Value)],
        updates: &[(&str, Value)],
    ) {
        for record in self.find_records(class, where_clause) {
            for (column, value) in updates {
                record.set(column, value.clone());
            }
        }
    }

    /// Queries staged records. Three branches, in order: the single-key
    /// `aggregate_id` shortcut, an exact declared-index hit (where-clause
    /// keys set-equal to the index columns), then a linear scan. Always
    /// returns a fresh list; the records themselves are shared.
    pub fn find_records(
        &self,
        class: &'static RecordClass,
        where_clause: &[(&str, Value)],
    ) -> Vec<Record> {
        if let [(key, value)] = where_clause
            && *key == "aggregate_id"
        {
            return self
                .aggregate_index
                .get(&(class.table, value.key_form()))
                .cloned()
                .into_iter()
                .collect();
        }

        if let Some(columns) = self.matching_index(class, where_clause) {
            let values: Vec<String> = columns
                .iter()
                .map(|column| {
                    where_clause
                        .iter()
                        .find(|(key, _)| key == column)
                        .map(|(_, value)| value.key_form())
                        .unwrap_or_default()
                })
                .collect();
            return self
                .record_index
                .get(&(class.table, columns, values))
                .cloned()
                .unwrap_or_default();
        }

        let Some(records) = self.record_store.get(class.table) else {
            return Vec::new();
        };
        let mut matches: Vec<Record> = records
            .iter()
            .filter(|record| matches_where(record, where_clause))
            .cloned()
            .collect();
        matches.sort_by_key(Record::stamp);
        matches
    }

    /// The most recently created record matching the where-clause.
    pub fn last_record(
        &self,
        class: &'static RecordClass,
        where_clause: &[(&str, Value)],
    ) -> Option<Record> {
        self.find_records(class, where_clause).pop()
    }

    /// Yields exactly one matching record; fails when nothing matches.
    pub fn do_with_record(
        &self,
        class: &'static RecordClass,
        where_clause: &[(&str, Value)],
        f: impl FnOnce(&Record),
    ) -> Result<()> {
        let record = self
            .last_record(class, where_clause)
            .ok_or_else(|| SessionError::RecordNotFound {
                table: class.table,
                criteria: format_criteria(where_clause),
            })?;
        f(&record);
        Ok(())
    }

    /// Yields every matching record.
    pub fn do_with_records(
        &self,
        class: &'static RecordClass,
        where_clause: &[(&str, Value)],
        mut f: impl FnMut(&Record),
    ) {
        for record in self.find_records(class, where_clause) {
            f(&record);
        }
    }

    /// Number of staged records for a class.
    pub fn record_count(&self, class: &'static RecordClass) -> usize {
        self.record_store
            .get(class.table)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Drops the store and all index entries. Index declarations stay.
    pub fn clear(&mut self) {
        self.record_store.clear();
        self.aggregate_index.clear();
        self.record_index.clear();
    }

    fn index_record(&mut self, record: &Record) {
        let table = record.class().table;

        if record.class().has_column("aggregate_id") {
            let value = record.get("aggregate_id");
            if !value.is_null() {
                self.aggregate_index
                    .insert((table, value.key_form()), record.clone());
            }
        }

        if let Some(indexes) = self.indices.get(table) {
            for columns in indexes {
                let key = (table, *columns, index_values(record, columns));
                self.record_index.entry(key).or_default().push(record.clone());
            }
        }
    }

    // Index keys are derived from current cell values; mutating an indexed
    // column leaves the record filed under its original key.
    fn unindex_record(&mut self, record: &Record) {
        let table = record.class().table;

        let aggregate_key = (table, record.get("aggregate_id").key_form());
        if self.aggregate_index.get(&aggregate_key) == Some(record) {
            self.aggregate_index.remove(&aggregate_key);
        }

        if let Some(indexes) = self.indices.get(table) {
            for columns in indexes {
                let key = (table, *columns, index_values(record, columns));
                if let Some(bucket) = self.record_index.get_mut(&key) {
                    bucket.retain(|entry| entry != record);
                    if bucket.is_empty() {
                        self.record_index.remove(&key);
                    }
                }
            }
        }
    }

    fn matching_index(
        &self,
        class: &'static RecordClass,
        where_clause: &[(&str, Value)],
    ) -> Option<&'static [&'static str]> {
        let keys: HashSet<&str> = where_clause.iter().map(|(key, _)| *key).collect();
        self.indices.get(class.table)?.iter().find(|columns| {
            columns.len() == where_clause.len()
                && columns.iter().all(|column| keys.contains(column))
        }).copied()
    }
}

impl Default for ReplaySession {
    fn default() -> Self {
        Self::new()
    }
}

fn index_values(record: &Record, columns: &[&'static str]) -> Vec<String> {
    columns
        .iter()
        .map(|column| record.get(column).key_form())
        .collect()
}

fn matches_where(record: &Record, where_clause: &[(&str, Value)]) -> bool {
    where_clause
        .iter()
        .all(|(column, condition)| value_matches(&record.get(column), condition))
}

/// Array conditions are "in" sets; strings and symbols compare by their
/// string form.
fn value_matches(cell: &Value, condition: &Value) -> bool {
    match condition {
        Value::List(options) => options.iter().any(|option| scalar_matches(cell, option)),
        scalar => scalar_matches(cell, scalar),
    }
}

fn scalar_matches(cell: &Value, condition: &Value) -> bool {
    match (cell, condition) {
        (Value::Text(a) | Value::Symbol(a), Value::Text(b) | Value::Symbol(b)) => a == b,
        (a, b) => a == b,
    }
}

pub(crate) fn format_criteria(where_clause: &[(&str, Value)]) -> String {
    where_clause
        .iter()
        .map(|(column, value)| format!("{column}={}", value.key_form()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Column;
    use chrono::TimeZone;
    use common::{AggregateId, SequenceNumber};
    use model::{EventType, FieldKind};

    static INVOICE_RECORDS: RecordClass = RecordClass {
        table: "invoice_records",
        columns: &[
            Column::new("id", FieldKind::Integer),
            Column::new("aggregate_id", FieldKind::Text),
            Column::new("recipient_id", FieldKind::Text),
            Column::new("amount_cents", FieldKind::Integer),
            Column::new("status", FieldKind::Symbol),
            Column::new("sequence_number", FieldKind::Integer),
            Column::new("created_at", FieldKind::Timestamp),
            Column::new("updated_at", FieldKind::Timestamp),
        ],
    };

    static INVOICE_PAID: EventType = EventType {
        name: "InvoicePaid",
        fields: &[],
    };

    fn session_with_recipient_index() -> ReplaySession {
        let mut session = ReplaySession::new();
        session.declare_index(&INVOICE_RECORDS, &["recipient_id"]);
        session
    }

    fn invoice(aggregate_id: &str, recipient_id: &str, amount: i64) -> Attributes {
        let mut values = Attributes::new();
        values.insert("aggregate_id".to_string(), Value::from(aggregate_id));
        values.insert("recipient_id".to_string(), Value::from(recipient_id));
        values.insert("amount_cents".to_string(), Value::Integer(amount));
        values
    }

    fn paid_event(sequence: i64) -> Event {
        Event::new(
            &INVOICE_PAID,
            AggregateId::new(),
            SequenceNumber::new(sequence),
            Utc.with_ymd_and_hms(2015, 6, 1, 12, 0, 0).unwrap(),
            Attributes::new(),
        )
    }

    #[test]
    fn declared_index_serves_matching_queries() {
        let mut session = session_with_recipient_index();
        for i in 0..10 {
            let recipient = if i % 2 == 0 { "r-even" } else { "r-odd" };
            session.create_record(&INVOICE_RECORDS, invoice(&format!("a-{i}"), recipient, i));
        }

        let found = session.find_records(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-even"))]);
        assert_eq!(found.len(), 5);
        assert!(found.iter().all(|r| r.get("recipient_id") == Value::from("r-even")));

        // Deleting removes the record from the store and the index.
        let victim = found[0].clone();
        session.delete_record(&victim);
        assert_eq!(session.record_count(&INVOICE_RECORDS), 9);
        let found = session.find_records(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-even"))]);
        assert_eq!(found.len(), 4);
        assert!(!found.contains(&victim));
    }

    #[test]
    fn index_path_equals_linear_scan() {
        let mut indexed = session_with_recipient_index();
        let mut scanned = ReplaySession::new();
        for session in [&mut indexed, &mut scanned] {
            for i in 0..20 {
                let recipient = format!("r-{}", i % 3);
                session.create_record(&INVOICE_RECORDS, invoice(&format!("a-{i}"), &recipient, i));
            }
        }

        let criteria = [("recipient_id", Value::from("r-1"))];
        let via_index: HashSet<String> = indexed
            .find_records(&INVOICE_RECORDS, &criteria)
            .iter()
            .map(|r| r.get("aggregate_id").key_form())
            .collect();
        let via_scan: HashSet<String> = scanned
            .find_records(&INVOICE_RECORDS, &criteria)
            .iter()
            .map(|r| r.get("aggregate_id").key_form())
            .collect();

        assert_eq!(via_index, via_scan);
        assert_eq!(via_index.len(), 7);
    }

    #[test]
    fn aggregate_id_shortcut_returns_the_single_record() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));
        session.create_record(&INVOICE_RECORDS, invoice("a-2", "r-2", 200));

        let found = session.find_records(&INVOICE_RECORDS, &[("aggregate_id", Value::from("a-2"))]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("amount_cents"), Value::Integer(200));

        let missing = session.find_records(&INVOICE_RECORDS, &[("aggregate_id", Value::from("a-9"))]);
        assert!(missing.is_empty());
    }

    #[test]
    fn linear_scan_compares_symbols_by_string_form() {
        let mut session = ReplaySession::new();
        let record = session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));
        record.set("status", Value::Symbol("open".to_string()));

        let found = session.find_records(&INVOICE_RECORDS, &[("status", Value::from("open"))]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn linear_scan_treats_arrays_as_in_sets() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));
        session.create_record(&INVOICE_RECORDS, invoice("a-2", "r-2", 200));
        session.create_record(&INVOICE_RECORDS, invoice("a-3", "r-3", 300));

        let found = session.find_records(
            &INVOICE_RECORDS,
            &[(
                "recipient_id",
                Value::List(vec![Value::from("r-1"), Value::from("r-3")]),
            )],
        );
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn create_defaults_updated_at_to_created_at() {
        let mut session = ReplaySession::new();
        let created = Utc.with_ymd_and_hms(2015, 1, 1, 9, 0, 0).unwrap();
        let mut values = invoice("a-1", "r-1", 100);
        values.insert("created_at".to_string(), Value::Timestamp(created));

        let record = session.create_record(&INVOICE_RECORDS, values);
        assert_eq!(record.get("updated_at"), Value::Timestamp(created));
    }

    #[test]
    fn update_record_stamps_sequence_and_updated_at() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));

        let event = paid_event(7);
        let record = session
            .update_record(
                &INVOICE_RECORDS,
                &event,
                &[("aggregate_id", Value::from("a-1"))],
                UpdateOptions::default(),
                |record| record.set("amount_cents", Value::Integer(0)),
            )
            .unwrap();

        assert_eq!(record.get("amount_cents"), Value::Integer(0));
        assert_eq!(record.get("sequence_number"), Value::Integer(7));
        assert_eq!(record.get("updated_at"), Value::Timestamp(event.created_at()));
    }

    #[test]
    fn update_record_can_skip_sequence_number() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));

        let event = paid_event(7);
        let record = session
            .update_record(
                &INVOICE_RECORDS,
                &event,
                &[("aggregate_id", Value::from("a-1"))],
                UpdateOptions {
                    update_sequence_number: false,
                },
                |_| {},
            )
            .unwrap();

        assert!(record.get("sequence_number").is_null());
    }

    #[test]
    fn update_record_fails_when_absent() {
        let mut session = ReplaySession::new();
        let result = session.update_record(
            &INVOICE_RECORDS,
            &paid_event(1),
            &[("aggregate_id", Value::from("missing"))],
            UpdateOptions::default(),
            |_| {},
        );
        assert!(matches!(result, Err(SessionError::RecordNotFound { .. })));
    }

    #[test]
    fn create_or_update_upserts_by_values() {
        let mut session = ReplaySession::new();
        let created = Utc.with_ymd_and_hms(2015, 1, 1, 9, 0, 0).unwrap();

        let mut key = Attributes::new();
        key.insert("aggregate_id".to_string(), Value::from("a-1"));

        let first = session.create_or_update_record(&INVOICE_RECORDS, key.clone(), created, |r| {
            r.set("amount_cents", Value::Integer(100));
        });
        let second = session.create_or_update_record(&INVOICE_RECORDS, key, created, |r| {
            r.set("amount_cents", Value::Integer(250));
        });

        assert_eq!(first, second);
        assert_eq!(session.record_count(&INVOICE_RECORDS), 1);
        assert_eq!(second.get("amount_cents"), Value::Integer(250));
        assert_eq!(first.get("created_at"), Value::Timestamp(created));
    }

    #[test]
    fn update_all_records_mutates_matches_in_place() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));
        session.create_record(&INVOICE_RECORDS, invoice("a-2", "r-1", 200));
        session.create_record(&INVOICE_RECORDS, invoice("a-3", "r-2", 300));

        session.update_all_records(
            &INVOICE_RECORDS,
            &[("recipient_id", Value::from("r-1"))],
            &[("status", Value::Symbol("overdue".to_string()))],
        );

        let overdue = session.find_records(&INVOICE_RECORDS, &[("status", Value::from("overdue"))]);
        assert_eq!(overdue.len(), 2);
    }

    #[test]
    fn delete_all_records_empties_store_and_indexes() {
        let mut session = session_with_recipient_index();
        for i in 0..4 {
            session.create_record(&INVOICE_RECORDS, invoice(&format!("a-{i}"), "r-1", i));
        }

        session.delete_all_records(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-1"))]);

        assert_eq!(session.record_count(&INVOICE_RECORDS), 0);
        assert!(
            session
                .find_records(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-1"))])
                .is_empty()
        );
        assert!(
            session
                .find_records(&INVOICE_RECORDS, &[("aggregate_id", Value::from("a-0"))])
                .is_empty()
        );
    }

    #[test]
    fn last_record_is_the_most_recently_created() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));
        session.create_record(&INVOICE_RECORDS, invoice("a-2", "r-1", 200));

        let last = session
            .last_record(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-1"))])
            .unwrap();
        assert_eq!(last.get("aggregate_id"), Value::from("a-2"));
    }

    #[test]
    fn do_with_record_requires_a_match() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));

        let mut seen = 0;
        session
            .do_with_record(&INVOICE_RECORDS, &[("aggregate_id", Value::from("a-1"))], |_| {
                seen += 1;
            })
            .unwrap();
        assert_eq!(seen, 1);

        let missing = session.do_with_record(
            &INVOICE_RECORDS,
            &[("aggregate_id", Value::from("a-9"))],
            |_| {},
        );
        assert!(missing.is_err());
    }

    #[test]
    fn clear_keeps_index_declarations() {
        let mut session = session_with_recipient_index();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));
        session.clear();
        assert_eq!(session.record_count(&INVOICE_RECORDS), 0);

        // A record created after clear is still served by the index.
        session.create_record(&INVOICE_RECORDS, invoice("a-2", "r-1", 200));
        let found = session.find_records(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-1"))]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("aggregate_id"), Value::from("a-2"));
    }

    #[test]
    fn find_returns_a_fresh_list() {
        let mut session = ReplaySession::new();
        session.create_record(&INVOICE_RECORDS, invoice("a-1", "r-1", 100));

        let mut first = session.find_records(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-1"))]);
        first.clear();

        let second = session.find_records(&INVOICE_RECORDS, &[("recipient_id", Value::from("r-1"))]);
        assert_eq!(second.len(), 1);
    }
}
