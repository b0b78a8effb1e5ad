use tracing::{debug, error, info};

use crate::db::{DataStore, Row, StoreError};


#[derive(Debug, Clone)]
struct JournalEntry {
    table: String,
    rows: Vec<Row>,
}


/// Rows removed so far, in deletion order.
#[derive(Debug, Default)]
pub struct CompensationLog {
    entries: Vec<JournalEntry>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table: &str, rows: Vec<Row>) {
        if rows.is_empty() {
            return;
        }
        debug!("Journaled {} row(s) from {}", rows.len(), table);
        self.entries.push(JournalEntry {
            table: table.to_string(),
            rows,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-inserts journaled rows newest first, so parents come back before
    /// the edges that point at them. Stops at the first failed insert and
    /// reports how many rows were restored before it.
    pub async fn rollback(self, store: &dyn DataStore) -> Result<usize, (usize, String, StoreError)> {
        let mut restored = 0;
        for entry in self.entries.into_iter().rev() {
            let table = entry.table;
            match store.insert_rows(&table, entry.rows).await {
                Ok(count) => restored += count,
                Err(e) => {
                    error!("Rollback stopped at {} after restoring {} row(s): {}", table, restored, e);
                    return Err((restored, table, e));
                }
            }
        }
        info!("Rollback restored {} row(s)", restored);
        Ok(restored)
    }
}
