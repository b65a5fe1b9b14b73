use std::fmt;

use thiserror::Error;

use crate::store::column::{Column, ColumnError, DataType, Value};

/// Rows shown before Display elides the remainder
const DISPLAY_ROW_CAP: usize = 20;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("Column {column} has {got} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        got: usize,
    },
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Expected a single column, found {0}")]
    NotSingleColumn(usize),
    #[error("Expected a 1x1 result, found {rows} rows x {cols} columns")]
    NotScalar { rows: usize, cols: usize },
    #[error("Frame schemas differ: {0}")]
    SchemaMismatch(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// An ordered collection of equal-length named columns; the tabular result container
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<(String, Column)>,
}

impl Frame {
    /// Creates an empty frame with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a frame from (name, column) pairs
    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let mut frame = Self::new();
        for (name, column) in columns {
            frame.push_column(name, column)?;
        }
        Ok(frame)
    }

    /// Appends a named column, enforcing unique names and equal lengths
    pub fn push_column(&mut self, name: String, column: Column) -> Result<(), FrameError> {
        if self.columns.iter().any(|(n, _)| n == &name) {
            return Err(FrameError::DuplicateColumn(name));
        }
        if let Some((_, first)) = self.columns.first() {
            if column.len() != first.len() {
                return Err(FrameError::ColumnLength {
                    column: name,
                    expected: first.len(),
                    got: column.len(),
                });
            }
        }
        self.columns.push((name, column));
        Ok(())
    }

    /// Returns the number of rows
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    /// Returns true if the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column names in order
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns the (name, type) pairs in column order
    pub fn schema(&self) -> Vec<(String, DataType)> {
        self.columns
            .iter()
            .map(|(n, c)| (n.clone(), c.data_type()))
            .collect()
    }

    /// Looks up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    /// Returns a new frame holding only the named columns, in the given order
    pub fn project(&self, names: &[&str]) -> Result<Self, FrameError> {
        let mut columns = Vec::with_capacity(names.len());
        for &name in names {
            let column = self
                .column(name)
                .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))?;
            columns.push((name.to_string(), column.clone()));
        }
        Self::from_columns(columns)
    }

    /// Gathers the rows at the given indices, in order
    pub fn take(&self, indices: &[usize]) -> Result<Self, FrameError> {
        let columns = self
            .columns
            .iter()
            .map(|(n, c)| Ok((n.clone(), c.take(indices)?)))
            .collect::<Result<Vec<_>, ColumnError>>()?;
        Self::from_columns(columns)
    }

    /// Keeps the rows whose mask entry is true
    pub fn filter(&self, mask: &[bool]) -> Result<Self, FrameError> {
        let columns = self
            .columns
            .iter()
            .map(|(n, c)| Ok((n.clone(), c.filter(mask)?)))
            .collect::<Result<Vec<_>, ColumnError>>()?;
        Self::from_columns(columns)
    }

    /// Returns the first n rows
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|(name, c)| (name.clone(), c.head(n)))
                .collect(),
        }
    }

    /// Appends another frame's rows; schemas must match exactly
    pub fn concat(&mut self, other: &Self) -> Result<(), FrameError> {
        if self.columns.is_empty() {
            *self = other.clone();
            return Ok(());
        }
        if self.schema() != other.schema() {
            return Err(FrameError::SchemaMismatch(format!(
                "{:?} vs {:?}",
                self.names(),
                other.names()
            )));
        }
        for ((_, a), (_, b)) in self.columns.iter_mut().zip(other.columns.iter()) {
            a.concat(b)?;
        }
        Ok(())
    }

    /// Returns the values of row i in column order
    pub fn row(&self, i: usize) -> Option<Vec<Value>> {
        if i >= self.len() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|(_, c)| c.value(i).unwrap())
                .collect(),
        )
    }

    /// Converts a single-column frame into a series
    pub fn squeeze(self) -> Result<Series, FrameError> {
        if self.columns.len() != 1 {
            return Err(FrameError::NotSingleColumn(self.columns.len()));
        }
        let (name, data) = self.columns.into_iter().next().unwrap();
        Ok(Series { name, data })
    }

    /// Extracts the single value of a 1x1 frame
    pub fn scalar(&self) -> Result<Value, FrameError> {
        if self.width() == 1 && self.len() == 1 {
            Ok(self.columns[0].1.value(0).unwrap())
        } else {
            Err(FrameError::NotScalar {
                rows: self.len(),
                cols: self.width(),
            })
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return write!(f, "(empty frame)");
        }

        let shown = self.len().min(DISPLAY_ROW_CAP);
        let mut widths: Vec<usize> = self.columns.iter().map(|(n, _)| n.len()).collect();
        let mut cells: Vec<Vec<String>> = Vec::with_capacity(shown);
        for row in 0..shown {
            let rendered: Vec<String> = self
                .columns
                .iter()
                .map(|(_, c)| c.value(row).unwrap().to_string())
                .collect();
            for (w, cell) in widths.iter_mut().zip(&rendered) {
                *w = (*w).max(cell.len());
            }
            cells.push(rendered);
        }

        for (i, ((name, _), width)) in self.columns.iter().zip(&widths).enumerate() {
            if i > 0 {
                write!(f, "  ")?;
            }
            write!(f, "{:<width$}", name, width = width)?;
        }
        writeln!(f)?;
        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                write!(f, "  ")?;
            }
            write!(f, "{}", "-".repeat(*width))?;
        }
        for row in cells {
            writeln!(f)?;
            for (i, (cell, width)) in row.iter().zip(&widths).enumerate() {
                if i > 0 {
                    write!(f, "  ")?;
                }
                write!(f, "{:<width$}", cell, width = width)?;
            }
        }
        if self.len() > shown {
            writeln!(f)?;
            write!(f, "… {} more rows", self.len() - shown)?;
        }
        Ok(())
    }
}

/// A single named column; the scalar-sequence result container
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    data: Column,
}

impl Series {
    /// Creates a series from a name and a column
    pub fn new(name: impl Into<String>, data: Column) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Returns the series name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying column
    pub fn data(&self) -> &Column {
        &self.data
    }

    /// Returns the number of rows
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the series has no rows
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for (i, value) in self.data.values().enumerate() {
            if i >= DISPLAY_ROW_CAP {
                write!(f, " …")?;
                break;
            }
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::from_columns(vec![
            (
                "sym".to_string(),
                Column::Sym(vec![
                    "AAPL".to_string(),
                    "MSFT".to_string(),
                    "AAPL".to_string(),
                ]),
            ),
            ("price".to_string(), Column::Float(vec![101.5, 310.0, 99.0])),
        ])
        .unwrap()
    }

    #[test]
    fn test_construction_rules() {
        let frame = sample_frame();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.names(), vec!["sym", "price"]);

        // Duplicate names rejected
        let mut dup = sample_frame();
        assert!(matches!(
            dup.push_column("sym".to_string(), Column::Int(vec![1, 2, 3])),
            Err(FrameError::DuplicateColumn(_))
        ));

        // Length mismatch rejected
        let mut ragged = sample_frame();
        assert!(matches!(
            ragged.push_column("size".to_string(), Column::Int(vec![1])),
            Err(FrameError::ColumnLength { .. })
        ));
    }

    #[test]
    fn test_project_take_filter() {
        let frame = sample_frame();

        let projected = frame.project(&["price", "sym"]).unwrap();
        assert_eq!(projected.names(), vec!["price", "sym"]);

        let taken = frame.take(&[2, 0]).unwrap();
        assert_eq!(
            taken.column("price").unwrap(),
            &Column::Float(vec![99.0, 101.5])
        );

        let filtered = frame.filter(&[true, false, true]).unwrap();
        assert_eq!(filtered.len(), 2);

        assert!(matches!(
            frame.project(&["missing"]),
            Err(FrameError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_concat_requires_matching_schema() {
        let mut frame = sample_frame();
        frame.concat(&sample_frame()).unwrap();
        assert_eq!(frame.len(), 6);

        let other = Frame::from_columns(vec![(
            "sym".to_string(),
            Column::Sym(vec!["IBM".to_string()]),
        )])
        .unwrap();
        assert!(matches!(
            frame.concat(&other),
            Err(FrameError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_squeeze_and_scalar() {
        let frame = sample_frame();
        assert!(matches!(
            frame.clone().squeeze(),
            Err(FrameError::NotSingleColumn(2))
        ));

        let series = frame.project(&["price"]).unwrap().squeeze().unwrap();
        assert_eq!(series.name(), "price");
        assert_eq!(series.len(), 3);

        let one = Frame::from_columns(vec![("n".to_string(), Column::Int(vec![42]))]).unwrap();
        assert_eq!(one.scalar().unwrap(), Value::Int(42));
        assert!(matches!(
            sample_frame().scalar(),
            Err(FrameError::NotScalar { .. })
        ));
    }

    #[test]
    fn test_display_renders_header_and_rows() {
        let text = sample_frame().to_string();
        assert!(text.contains("sym"));
        assert!(text.contains("price"));
        assert!(text.contains("AAPL"));
    }
}
