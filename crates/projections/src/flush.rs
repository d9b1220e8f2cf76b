//! Flushing staged records to Postgres.
//!
//! Above the session's CSV threshold a class is streamed through a native
//! `COPY ... FROM STDIN (FORMAT csv)`; at or below it, records go through a
//! prepared single-row INSERT. The `id` column is omitted on both paths so
//! the database assigns it.

use model::{FieldKind, Value};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{Result, SessionError};
use crate::record::{Column, Record, RecordClass};
use crate::session::ReplaySession;

impl ReplaySession {
    /// Flushes every staged record to the database inside one transaction,
    /// then clears the session. `clear` runs on every exit path, success or
    /// failure.
    #[tracing::instrument(skip(self, pool))]
    pub async fn commit(&mut self, pool: &PgPool) -> Result<()> {
        let outcome = self.flush(pool).await;
        self.clear();
        outcome
    }

    async fn flush(&self, pool: &PgPool) -> Result<()> {
        let mut tx = pool.begin().await?;

        let mut tables: Vec<_> = self.record_store.keys().copied().collect();
        tables.sort_unstable();

        for table in tables {
            let Some(records) = self.record_store.get(table) else {
                continue;
            };
            if records.is_empty() {
                continue;
            }

            let mut records: Vec<_> = records.iter().cloned().collect();
            records.sort_by_key(Record::stamp);
            let class = records[0].class();

            if records.len() > self.insert_with_csv_size {
                tracing::debug!(table, records = records.len(), "bulk copy");
                copy_records(&mut tx, class, &records).await?;
            } else {
                tracing::debug!(table, records = records.len(), "row inserts");
                insert_records(&mut tx, class, &records).await?;
            }
            metrics::counter!("replay_records_flushed").increment(records.len() as u64);
        }

        tx.commit().await?;
        Ok(())
    }
}

fn persisted_columns(class: &'static RecordClass) -> Vec<&'static Column> {
    class.columns.iter().filter(|c| c.name != "id").collect()
}

async fn copy_records(
    tx: &mut Transaction<'_, Postgres>,
    class: &'static RecordClass,
    records: &[Record],
) -> Result<()> {
    let columns = persisted_columns(class);
    let names: Vec<_> = columns.iter().map(|c| c.name).collect();
    let statement = format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        class.table,
        names.join(", ")
    );

    let mut copy = tx.copy_in_raw(&statement).await?;
    for record in records {
        let row = csv_row(&columns, record);
        if let Err(err) = copy.send(row.into_bytes()).await {
            // Abort the partial COPY before surfacing the failure.
            let message = err.to_string();
            let _ = copy.abort(message.clone()).await;
            return Err(SessionError::BulkCopy {
                table: class.table,
                message,
            });
        }
    }

    copy.finish().await.map_err(|err| SessionError::BulkCopy {
        table: class.table,
        message: err.to_string(),
    })?;
    Ok(())
}

async fn insert_records(
    tx: &mut Transaction<'_, Postgres>,
    class: &'static RecordClass,
    records: &[Record],
) -> Result<()> {
    let columns = persisted_columns(class);
    let names: Vec<_> = columns.iter().map(|c| c.name).collect();
    let placeholders: Vec<_> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    let statement = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        class.table,
        names.join(", "),
        placeholders.join(", ")
    );

    for record in records {
        let cells = record.snapshot();
        let mut query = sqlx::query(&statement);
        for column in &columns {
            let value = cells.get(column.name).cloned().unwrap_or(Value::Null);
            query = bind_column(query, &column.kind, value);
        }
        query.execute(&mut **tx).await?;
    }
    Ok(())
}

fn bind_column<'q>(
    query: Query<'q, Postgres, PgArguments>,
    kind: &FieldKind,
    value: Value,
) -> Query<'q, Postgres, PgArguments> {
    match kind {
        FieldKind::Integer => query.bind(value.as_integer()),
        FieldKind::Bool => query.bind(value.as_bool()),
        FieldKind::Date => query.bind(value.as_date()),
        FieldKind::Timestamp => query.bind(value.as_timestamp()),
        FieldKind::List(_) | FieldKind::Object(_) => {
            let json = match &value {
                Value::Null => None,
                other => Some(sqlx::types::Json(other.to_json())),
            };
            query.bind(json)
        }
        FieldKind::Text | FieldKind::Symbol => {
            let text = match value {
                Value::Null => None,
                Value::Text(s) | Value::Symbol(s) => Some(s),
                other => Some(other.key_form()),
            };
            query.bind(text)
        }
    }
}

fn csv_row(columns: &[&'static Column], record: &Record) -> String {
    let cells = record.snapshot();
    let fields: Vec<_> = columns
        .iter()
        .map(|column| csv_field(cells.get(column.name).unwrap_or(&Value::Null)))
        .collect();
    let mut row = fields.join(",");
    row.push('\n');
    row
}

/// Postgres CSV conventions: an unquoted empty field is NULL; an empty
/// string must be quoted to survive.
fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) | Value::Symbol(s) => csv_quote(s),
        Value::Integer(i) => i.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Timestamp(t) => t.to_rfc3339(),
        Value::List(_) | Value::Record(_) => csv_quote(&value.to_json().to_string()),
    }
}

fn csv_quote(s: &str) -> String {
    if s.is_empty() || s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
