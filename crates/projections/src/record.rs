//! Staged read-model records.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use model::{Attributes, FieldKind, Value};

/// One column of a read-model table. The kind maps 1:1 onto the DB column
/// type: `Text`/`Symbol` → `text`, `Integer` → `bigint`, `Bool` →
/// `boolean`, `Date` → `date`, `Timestamp` → `timestamptz`, `List`/`Object`
/// → `jsonb`.
#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Static descriptor of a read-model table a session stages records for.
#[derive(Debug)]
pub struct RecordClass {
    pub table: &'static str,
    pub columns: &'static [Column],
}

impl RecordClass {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

struct RecordInner {
    class: &'static RecordClass,
    stamp: u64,
    cells: Mutex<Attributes>,
}

/// A staged row, shared between the session's store and its indexes.
///
/// Equality and hash are by object identity, not content: a record mutated
/// in place keeps its hash bucket, which the identity sets and index lists
/// rely on.
#[derive(Clone)]
pub struct Record(Arc<RecordInner>);

impl Record {
    pub(crate) fn new(class: &'static RecordClass, stamp: u64, cells: Attributes) -> Self {
        Self(Arc::new(RecordInner {
            class,
            stamp,
            cells: Mutex::new(cells),
        }))
    }

    pub fn class(&self) -> &'static RecordClass {
        self.0.class
    }

    /// Creation order within the session; later records sort after earlier
    /// ones.
    pub(crate) fn stamp(&self) -> u64 {
        self.0.stamp
    }

    /// Reads one cell, returning null when the column is unset.
    pub fn get(&self, column: &str) -> Value {
        self.lock().get(column).cloned().unwrap_or(Value::Null)
    }

    /// Writes one cell in place.
    pub fn set(&self, column: &str, value: Value) {
        self.lock().insert(column.to_string(), value);
    }

    /// A copy of all cells.
    pub fn snapshot(&self) -> Attributes {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Attributes> {
        self.0.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.0.class.table)
            .field("cells", &self.snapshot())
            .finish()
    }
}
