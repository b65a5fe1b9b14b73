use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::store::column::{Column, ColumnError, DataType, Value};
use crate::store::frame::{Frame, FrameError};

/// Name of the virtual column partitioned tables present for the partition key
pub const DATE_COLUMN: &str = "date";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Column '{0}' is reserved for the partition key")]
    ReservedColumn(String),
    #[error("Segment {date} does not match the table schema: {detail}")]
    SegmentSchema { date: NaiveDate, detail: String },
    #[error("Row index {index} out of bounds for table with {rows} rows")]
    RowOutOfBounds { index: usize, rows: usize },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Ordered (name, type) pairs describing a table's columns
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    fields: Vec<(String, DataType)>,
}

impl TableSchema {
    pub fn new(fields: Vec<(String, DataType)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, DataType)] {
        &self.fields
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Builds a zero-row frame with this schema
    pub fn empty_frame(&self) -> Frame {
        let columns = self
            .fields
            .iter()
            .map(|(n, t)| (n.clone(), Column::empty(*t)))
            .collect();
        // Empty columns cannot collide or disagree on length
        Frame::from_columns(columns).unwrap()
    }
}

/// Physical layout of a table's rows
#[derive(Debug)]
pub enum TableData {
    /// All rows in one frame
    Basic(Frame),
    /// One stored frame per partition date, without the date column
    Partitioned(BTreeMap<NaiveDate, Arc<Frame>>),
}

/// A named table: schema plus basic or date-partitioned storage
#[derive(Debug)]
pub struct Table {
    name: String,
    schema: TableSchema,
    data: TableData,
}

impl Table {
    /// Creates a non-partitioned table holding the given frame
    pub fn basic(name: impl Into<String>, frame: Frame) -> Self {
        let schema = TableSchema::new(frame.schema());
        Self {
            name: name.into(),
            schema,
            data: TableData::Basic(frame),
        }
    }

    /// Creates a date-partitioned table from per-partition segment frames.
    ///
    /// Stored segments do not carry the date column; the presented schema
    /// lists `date` first, materialized from the partition key on read.
    pub fn partitioned(
        name: impl Into<String>,
        stored: TableSchema,
        segments: BTreeMap<NaiveDate, Arc<Frame>>,
    ) -> Result<Self, TableError> {
        if stored.contains(DATE_COLUMN) {
            return Err(TableError::ReservedColumn(DATE_COLUMN.to_string()));
        }
        for (date, frame) in &segments {
            if frame.schema() != stored.fields() {
                return Err(TableError::SegmentSchema {
                    date: *date,
                    detail: format!("{:?} vs {:?}", frame.names(), stored.names()),
                });
            }
        }
        let mut fields = vec![(DATE_COLUMN.to_string(), DataType::Date)];
        fields.extend(stored.fields().iter().cloned());
        Ok(Self {
            name: name.into(),
            schema: TableSchema::new(fields),
            data: TableData::Partitioned(segments),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The presented schema; partitioned tables list the date column first
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn data(&self) -> &TableData {
        &self.data
    }

    pub fn is_partitioned(&self) -> bool {
        matches!(self.data, TableData::Partitioned(_))
    }

    /// Partition dates in ascending order; empty for basic tables
    pub fn partitions(&self) -> Vec<NaiveDate> {
        match &self.data {
            TableData::Basic(_) => Vec::new(),
            TableData::Partitioned(segments) => segments.keys().copied().collect(),
        }
    }

    /// Total rows, from segment metadata rather than a column scan
    pub fn row_count(&self) -> usize {
        match &self.data {
            TableData::Basic(frame) => frame.len(),
            TableData::Partitioned(segments) => segments.values().map(|f| f.len()).sum(),
        }
    }

    /// Rows in one partition, None for basic tables or unknown dates
    pub fn partition_row_count(&self, date: NaiveDate) -> Option<usize> {
        match &self.data {
            TableData::Basic(_) => None,
            TableData::Partitioned(segments) => segments.get(&date).map(|f| f.len()),
        }
    }

    /// One partition's rows with the date column materialized first
    pub fn partition_frame(&self, date: NaiveDate, frame: &Frame) -> Result<Frame, TableError> {
        let mut columns = Vec::with_capacity(frame.width() + 1);
        columns.push((
            DATE_COLUMN.to_string(),
            Column::Date(vec![date; frame.len()]),
        ));
        for name in frame.names() {
            columns.push((name.to_string(), frame.column(name).unwrap().clone()));
        }
        Ok(Frame::from_columns(columns)?)
    }

    /// The whole table as one frame, partitions concatenated in date order
    pub fn materialize(&self) -> Result<Frame, TableError> {
        match &self.data {
            TableData::Basic(frame) => Ok(frame.clone()),
            TableData::Partitioned(segments) => {
                let mut out = self.schema.empty_frame();
                for (date, frame) in segments {
                    out.concat(&self.partition_frame(*date, frame)?)?;
                }
                Ok(out)
            }
        }
    }

    /// Gathers rows by global index, partitions addressed in date order
    pub fn take(&self, indices: &[usize]) -> Result<Frame, TableError> {
        match &self.data {
            TableData::Basic(frame) => {
                let rows = frame.len();
                if let Some(&bad) = indices.iter().find(|&&i| i >= rows) {
                    return Err(TableError::RowOutOfBounds { index: bad, rows });
                }
                Ok(frame.take(indices)?)
            }
            TableData::Partitioned(segments) => {
                let rows = self.row_count();
                let mut columns: Vec<(String, Column)> = self
                    .schema
                    .fields()
                    .iter()
                    .map(|(n, t)| (n.clone(), Column::empty(*t)))
                    .collect();
                for &index in indices {
                    let (date, frame, local) = locate(segments, index)
                        .ok_or(TableError::RowOutOfBounds { index, rows })?;
                    columns[0].1.push(Value::Date(date))?;
                    for (slot, name) in columns[1..].iter_mut().zip(frame.names()) {
                        // Local row is in bounds by construction
                        slot.1.push(frame.column(name).unwrap().value(local).unwrap())?;
                    }
                }
                Ok(Frame::from_columns(columns)?)
            }
        }
    }
}

/// Resolves a global row index to (partition date, segment, local row)
fn locate(
    segments: &BTreeMap<NaiveDate, Arc<Frame>>,
    index: usize,
) -> Option<(NaiveDate, &Arc<Frame>, usize)> {
    let mut remaining = index;
    for (date, frame) in segments {
        if remaining < frame.len() {
            return Some((*date, frame, remaining));
        }
        remaining -= frame.len();
    }
    None
}
