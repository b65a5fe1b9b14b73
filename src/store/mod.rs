//! Storage module for tickdb
//! Columnar containers, partitioned tables, on-disk segments and the
//! table catalog.

pub mod catalog;
pub mod column;
pub mod frame;
pub mod segment;
pub mod table;

pub use catalog::{Database, StoreError};
pub use column::{Column, ColumnError, DataType, Value};
pub use frame::{Frame, FrameError, Series};
pub use table::{Table, TableData, TableError, TableSchema, DATE_COLUMN};
