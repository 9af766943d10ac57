use super::schema::init_record_schema;
use crate::backend::{Filter, Order, RecordStore};
use crate::error::MediaFeedError;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Record store over a single SQLite file
///
/// Records are stored as JSON documents per collection. Filters and sort
/// columns are evaluated with `json_extract`.
pub struct LocalRecordStore {
    conn: Mutex<Connection>,
}

impl LocalRecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MediaFeedError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MediaFeedError::Config(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            MediaFeedError::Config(format!("Cannot open database {}: {}", path.display(), e))
        })?;
        log::info!("Opened local record store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, MediaFeedError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MediaFeedError::Config(format!("Cannot open database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, MediaFeedError> {
        init_record_schema(&conn)
            .map_err(|e| MediaFeedError::Config(format!("Schema initialization failed: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select(
        &self,
        collection: &str,
        filter: &Filter,
        order: &Order,
    ) -> Result<Vec<Value>, MediaFeedError> {
        let direction = if order.ascending { "ASC" } else { "DESC" };
        let order_path = json_path(&order.column)?;

        let (condition, value) = match filter {
            Filter::All => (String::new(), None),
            Filter::Eq(column, value) => (
                format!(" AND json_extract(body, '{}') = ?2", json_path(column)?),
                Some(to_sql_value(value)),
            ),
        };
        let sql = format!(
            "SELECT body FROM records WHERE collection = ?1{} \
             ORDER BY json_extract(body, '{}') {}, seq {}",
            condition, order_path, direction, direction
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql).map_err(retrieval)?;
        let bodies = match value {
            Some(value) => stmt
                .query_map(params![collection, value], |row| row.get::<_, String>(0))
                .map_err(retrieval)?
                .collect::<Result<Vec<_>, _>>(),
            None => stmt
                .query_map(params![collection], |row| row.get::<_, String>(0))
                .map_err(retrieval)?
                .collect::<Result<Vec<_>, _>>(),
        }
        .map_err(retrieval)?;

        bodies
            .iter()
            .map(|body| {
                serde_json::from_str(body)
                    .map_err(|e| MediaFeedError::Retrieval(format!("Corrupt record: {}", e)))
            })
            .collect()
    }

    fn insert_locked(
        conn: &Connection,
        collection: &str,
        mut record: Map<String, Value>,
    ) -> Result<(), MediaFeedError> {
        if !record.contains_key("id") {
            let next_id: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(CAST(json_extract(body, '$.id') AS INTEGER)), 0) + 1
                     FROM records WHERE collection = ?1",
                    params![collection],
                    |row| row.get(0),
                )
                .map_err(persist)?;
            record.insert("id".to_string(), Value::from(next_id));
        }
        if !record.contains_key("created_at") {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            record.insert("created_at".to_string(), Value::from(now));
        }

        conn.execute(
            "INSERT INTO records (collection, body) VALUES (?1, ?2)",
            params![collection, Value::Object(record).to_string()],
        )
        .map_err(persist)?;
        Ok(())
    }
}

impl RecordStore for LocalRecordStore {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order: &Order,
    ) -> Result<Vec<Value>, MediaFeedError> {
        self.select(collection, filter, order)
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<(), MediaFeedError> {
        let record = into_object(record)?;
        let conn = self.lock();
        Self::insert_locked(&conn, collection, record)
    }

    async fn upsert(
        &self,
        collection: &str,
        record: Value,
        conflict_key: &str,
    ) -> Result<(), MediaFeedError> {
        let record = into_object(record)?;
        let key = record.get(conflict_key).cloned().ok_or_else(|| {
            MediaFeedError::Persist(format!("Record is missing conflict key {}", conflict_key))
        })?;
        let key_path = json_path(conflict_key)
            .map_err(|e| MediaFeedError::Persist(e.detail().to_string()))?;

        let conn = self.lock();
        let existing: Option<(i64, String)> = conn
            .query_row(
                &format!(
                    "SELECT seq, body FROM records
                     WHERE collection = ?1 AND json_extract(body, '{}') = ?2
                     ORDER BY seq LIMIT 1",
                    key_path
                ),
                params![collection, to_sql_value(&key)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(persist)?;

        match existing {
            Some((seq, body)) => {
                let mut merged: Map<String, Value> = serde_json::from_str(&body)
                    .map_err(|e| MediaFeedError::Persist(format!("Corrupt record: {}", e)))?;
                merged.extend(record);
                conn.execute(
                    "UPDATE records SET body = ?1 WHERE seq = ?2",
                    params![Value::Object(merged).to_string(), seq],
                )
                .map_err(persist)?;
                Ok(())
            }
            None => Self::insert_locked(&conn, collection, record),
        }
    }
}

fn into_object(record: Value) -> Result<Map<String, Value>, MediaFeedError> {
    match record {
        Value::Object(map) => Ok(map),
        other => Err(MediaFeedError::Persist(format!(
            "Records must be JSON objects, got {}",
            other
        ))),
    }
}

/// `$.column` for a plain identifier; anything else is rejected
fn json_path(column: &str) -> Result<String, MediaFeedError> {
    if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MediaFeedError::Retrieval(format!("Invalid column name: {}", column)));
    }
    Ok(format!("$.{}", column))
}

/// Mirrors what `json_extract` yields for a JSON value
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn retrieval(e: rusqlite::Error) -> MediaFeedError {
    MediaFeedError::Retrieval(e.to_string())
}

fn persist(e: rusqlite::Error) -> MediaFeedError {
    MediaFeedError::Persist(e.to_string())
}
