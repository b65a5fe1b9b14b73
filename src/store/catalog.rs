use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::store::frame::Frame;
use crate::store::segment::{load_root, SegmentError};
use crate::store::table::{Table, TableError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// The embedded database: a registry of named tables. Cloning yields a
/// cheap handle onto the same registry.
#[derive(Debug, Clone, Default)]
pub struct Database {
    tables: Arc<RwLock<HashMap<String, Arc<Table>>>>,
}

impl Database {
    /// Creates an empty in-memory database
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a database root, loading and verifying every table
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let tables = load_root(root.as_ref())?;
        info!(
            "Opened database root {:?} ({} tables)",
            root.as_ref(),
            tables.len()
        );
        let db = Self::new();
        for table in tables {
            db.register(table).await;
        }
        Ok(db)
    }

    /// Returns true if both handles share one table registry
    pub fn same_registry(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tables, &other.tables)
    }

    /// Registers a table, replacing any previous table of the same name
    pub async fn register(&self, table: Table) {
        debug!(
            "Registered table '{}' ({} rows, {} partitions)",
            table.name(),
            table.row_count(),
            table.partitions().len()
        );
        let mut tables = self.tables.write().await;
        tables.insert(table.name().to_string(), Arc::new(table));
    }

    /// Looks up a table by name
    pub async fn table(&self, name: &str) -> Result<Arc<Table>, StoreError> {
        let tables = self.tables.read().await;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    /// Returns table names in sorted order
    pub async fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns true if the named table is stored partitioned
    pub async fn is_partitioned(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.table(name).await?.is_partitioned())
    }

    /// Total rows in a table, answered from metadata
    pub async fn row_count(&self, name: &str) -> Result<usize, StoreError> {
        Ok(self.table(name).await?.row_count())
    }

    /// Native index-based row selection in the table's global row order
    pub async fn take(&self, name: &str, indices: &[usize]) -> Result<Frame, StoreError> {
        Ok(self.table(name).await?.take(indices)?)
    }

    /// The whole table as one frame
    pub async fn materialize(&self, name: &str) -> Result<Frame, StoreError> {
        Ok(self.table(name).await?.materialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::column::Column;
    use crate::store::segment::DatabaseWriter;
    use tokio::test;

    fn quotes(bids: &[f64]) -> Frame {
        Frame::from_columns(vec![("bid".to_string(), Column::Float(bids.to_vec()))]).unwrap()
    }

    #[test]
    async fn test_register_and_lookup() {
        let db = Database::new();
        db.register(Table::basic("quote", quotes(&[1.0, 2.0]))).await;

        let table = db.table("quote").await.unwrap();
        assert_eq!(table.name(), "quote");
        assert_eq!(db.row_count("quote").await.unwrap(), 2);
        assert_eq!(db.table_names().await, vec!["quote".to_string()]);
        assert!(!db.is_partitioned("quote").await.unwrap());

        assert!(matches!(
            db.table("trade").await,
            Err(StoreError::UnknownTable(_))
        ));
    }

    #[test]
    async fn test_register_replaces_previous_table() {
        let db = Database::new();
        db.register(Table::basic("quote", quotes(&[1.0]))).await;
        db.register(Table::basic("quote", quotes(&[1.0, 2.0, 3.0])))
            .await;
        assert_eq!(db.row_count("quote").await.unwrap(), 3);
    }

    #[test]
    async fn test_open_loads_a_written_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DatabaseWriter::create(dir.path()).unwrap();
        writer
            .write_partition("trade", "2024-01-02".parse().unwrap(), &quotes(&[1.0, 2.0]))
            .unwrap();
        writer
            .write_partition("trade", "2024-01-03".parse().unwrap(), &quotes(&[3.0]))
            .unwrap();
        writer.finish().unwrap();

        let db = Database::open(dir.path()).await.unwrap();
        assert!(db.is_partitioned("trade").await.unwrap());
        assert_eq!(db.row_count("trade").await.unwrap(), 3);

        // Global row indices cross the partition boundary in date order
        let taken = db.take("trade", &[1, 2]).await.unwrap();
        assert_eq!(
            taken.column("bid").unwrap(),
            &Column::Float(vec![2.0, 3.0])
        );
    }
}
