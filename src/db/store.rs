

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoStaticStr;
use thiserror::Error;


pub type Row = Map<String, Value>;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoreOp {
    Select,
    Count,
    Delete,
    Insert,
}


#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query on {table} failed: {message}")]
    Query { table: String, message: String },
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}

impl StoreError {
    pub fn query(table: &str, message: impl Into<String>) -> Self {
        Self::Query {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// Connection drops and timeouts are worth another attempt; a rejected
    /// query will be rejected again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::Eq(column.to_string(), value.into())
    }

    pub fn ne(column: &str, value: impl Into<Value>) -> Self {
        Self::Ne(column.to_string(), value.into())
    }

    pub fn any_of<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut clauses) => {
                clauses.push(other);
                Self::And(clauses)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// A missing column never equals anything, and never differs either.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Eq(column, value) => row.get(column) == Some(value),
            Self::Ne(column, value) => row.get(column).is_some_and(|v| v != value),
            Self::In(column, values) => row.get(column).is_some_and(|v| values.contains(v)),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(row)),
        }
    }
}


#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select_where(&self, table: &str, predicate: &Predicate) -> Result<Vec<Row>, StoreError>;

    async fn count(&self, table: &str, predicate: &Predicate) -> Result<usize, StoreError>;

    async fn delete_where(&self, table: &str, predicate: &Predicate) -> Result<usize, StoreError>;

    /// Used by the executor's compensation journal to put rows back.
    async fn insert_rows(&self, table: &str, rows: Vec<Row>) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_predicate_matching() {
        let edge = row(json!({"equipment_id": "E1", "group_id": "G1"}));

        assert!(Predicate::eq("group_id", "G1").matches(&edge));
        assert!(!Predicate::eq("group_id", "G2").matches(&edge));
        assert!(Predicate::ne("equipment_id", "E2").matches(&edge));
        assert!(Predicate::any_of("equipment_id", ["E3", "E1"]).matches(&edge));
        assert!(
            !Predicate::eq("group_id", "G1")
                .and(Predicate::ne("equipment_id", "E1"))
                .matches(&edge)
        );
    }

    #[test]
    fn test_missing_column_never_matches() {
        let edge = row(json!({"group_id": "G1"}));
        assert!(!Predicate::eq("equipment_id", "E1").matches(&edge));
        assert!(!Predicate::ne("equipment_id", "E1").matches(&edge));
    }

    #[test]
    fn test_and_flattens() {
        let p = Predicate::eq("a", 1).and(Predicate::eq("b", 2)).and(Predicate::eq("c", 3));
        match p {
            Predicate::And(clauses) => assert_eq!(clauses.len(), 3),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout("slow".into()).is_transient());
        assert!(!StoreError::query("parts", "bad column").is_transient());
    }
}
