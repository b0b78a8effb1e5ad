

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{DataStore, Predicate, Row, StoreError, StoreOp};


#[derive(Debug, Clone, Copy)]
enum Failure {
    Permanent,
    Transient(u32),
}


/// Table-per-`Vec` store. Rows keep insertion order, which is the order
/// every select returns them in.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failures: Mutex<HashMap<(String, StoreOp), Failure>>,
}

impl InMemoryStore {

    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"table": [row, ...], ...}`.
    pub fn from_snapshot(snapshot: Value) -> Result<Self, StoreError> {
        let Value::Object(tables) = snapshot else {
            return Err(StoreError::query("<snapshot>", "snapshot must be a JSON object of tables"));
        };

        let mut loaded = HashMap::new();
        for (table, rows) in tables {
            let Value::Array(rows) = rows else {
                return Err(StoreError::query(&table, "table must be an array of rows"));
            };
            let rows = rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(map) => Ok(map),
                    _ => Err(StoreError::query(&table, "row must be a JSON object")),
                })
                .collect::<Result<Vec<Row>, _>>()?;
            loaded.insert(table, rows);
        }

        Ok(Self {
            tables: RwLock::new(loaded),
            failures: Mutex::new(HashMap::new()),
        })
    }


    pub async fn snapshot(&self) -> Value {
        let tables = self.tables.read().await;
        let mut out = Map::new();
        let mut names: Vec<&String> = tables.keys().collect();
        names.sort();
        for name in names {
            let rows = tables[name].iter().cloned().map(Value::Object).collect();
            out.insert(name.clone(), Value::Array(rows));
        }
        Value::Object(out)
    }

    /// Test and fixture helper; non-object values are ignored.
    pub async fn insert(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.tables
                .write()
                .await
                .entry(table.to_string())
                .or_default()
                .push(row);
        }
    }


    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }


    pub fn fail_on(&self, table: &str, op: StoreOp) {
        self.failures
            .lock()
            .insert((table.to_string(), op), Failure::Permanent);
    }


    pub fn fail_transiently(&self, table: &str, op: StoreOp, times: u32) {
        self.failures
            .lock()
            .insert((table.to_string(), op), Failure::Transient(times));
    }


    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    fn check(&self, table: &str, op: StoreOp) -> Result<(), StoreError> {
        let mut failures = self.failures.lock();
        let key = (table.to_string(), op);
        let op_name: &'static str = op.into();

        match failures.get(&key).copied() {
            None => Ok(()),
            Some(Failure::Permanent) => Err(StoreError::query(table, format!("injected {} failure", op_name))),
            Some(Failure::Transient(0)) => {
                failures.remove(&key);
                Ok(())
            }
            Some(Failure::Transient(remaining)) => {
                failures.insert(key, Failure::Transient(remaining - 1));
                Err(StoreError::Connection(format!("injected {} drop on {}", op_name, table)))
            }
        }
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn select_where(&self, table: &str, predicate: &Predicate) -> Result<Vec<Row>, StoreError> {
        self.check(table, StoreOp::Select)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| predicate.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, table: &str, predicate: &Predicate) -> Result<usize, StoreError> {
        self.check(table, StoreOp::Count)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| predicate.matches(r)).count())
            .unwrap_or(0))
    }

    async fn delete_where(&self, table: &str, predicate: &Predicate) -> Result<usize, StoreError> {
        self.check(table, StoreOp::Delete)?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !predicate.matches(r));
        let deleted = before - rows.len();
        debug!("Deleted {} rows from {}", deleted, table);
        Ok(deleted)
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Row>) -> Result<usize, StoreError> {
        self.check(table, StoreOp::Insert)?;
        let inserted = rows.len();
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        Ok(inserted)
    }
}
