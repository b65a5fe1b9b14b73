use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColumnError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: DataType, got: DataType },
    #[error("Row index {0} out of bounds")]
    IndexOutOfBounds(usize),
    #[error("Filter mask has {mask} entries for {rows} rows")]
    MaskLength { rows: usize, mask: usize },
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),
}

/// The scalar types a column can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int,
    Float,
    Sym,
    Date,
    Time,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Sym => "sym",
            Self::Date => "date",
            Self::Time => "time",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DataType {
    type Err = ColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "sym" => Ok(Self::Sym),
            "date" => Ok(Self::Date),
            "time" => Ok(Self::Time),
            other => Err(ColumnError::UnknownDataType(other.to_string())),
        }
    }
}

/// A single scalar value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Sym(String),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Value {
    /// Returns the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Sym(_) => DataType::Sym,
            Self::Date(_) => DataType::Date,
            Self::Time(_) => DataType::Time,
        }
    }

    /// Total ordering across values of the same type; floats use IEEE total order
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Sym(a), Self::Sym(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            // Mixed types never occur within a column; fall back to the type tag
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::Sym(_) => 3,
            Self::Date(_) => 4,
            Self::Time(_) => 5,
        }
    }

    /// Numeric view used by arithmetic and aggregation
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Sym(v) => write!(f, "{}", v),
            Self::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Self::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.3f")),
        }
    }
}

/// A typed vector of values; the unit of columnar storage
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Sym(Vec<String>),
    Date(Vec<NaiveDate>),
    Time(Vec<NaiveTime>),
}

impl Column {
    /// Creates an empty column of the given type
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Bool => Self::Bool(Vec::new()),
            DataType::Int => Self::Int(Vec::new()),
            DataType::Float => Self::Float(Vec::new()),
            DataType::Sym => Self::Sym(Vec::new()),
            DataType::Date => Self::Date(Vec::new()),
            DataType::Time => Self::Time(Vec::new()),
        }
    }

    /// Builds a column of the given type from scalar values
    pub fn from_values(data_type: DataType, values: Vec<Value>) -> Result<Self, ColumnError> {
        let mut column = Self::empty(data_type);
        for value in values {
            column.push(value)?;
        }
        Ok(column)
    }

    /// Returns the data type of this column
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Sym(_) => DataType::Sym,
            Self::Date(_) => DataType::Date,
            Self::Time(_) => DataType::Time,
        }
    }

    /// Returns the number of rows
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Sym(v) => v.len(),
            Self::Date(v) => v.len(),
            Self::Time(v) => v.len(),
        }
    }

    /// Returns true if the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value at the given row, if in bounds
    pub fn value(&self, row: usize) -> Option<Value> {
        match self {
            Self::Bool(v) => v.get(row).copied().map(Value::Bool),
            Self::Int(v) => v.get(row).copied().map(Value::Int),
            Self::Float(v) => v.get(row).copied().map(Value::Float),
            Self::Sym(v) => v.get(row).cloned().map(Value::Sym),
            Self::Date(v) => v.get(row).copied().map(Value::Date),
            Self::Time(v) => v.get(row).copied().map(Value::Time),
        }
    }

    /// Appends a value, rejecting type mismatches
    pub fn push(&mut self, value: Value) -> Result<(), ColumnError> {
        match (self, value) {
            (Self::Bool(v), Value::Bool(x)) => v.push(x),
            (Self::Int(v), Value::Int(x)) => v.push(x),
            (Self::Float(v), Value::Float(x)) => v.push(x),
            (Self::Sym(v), Value::Sym(x)) => v.push(x),
            (Self::Date(v), Value::Date(x)) => v.push(x),
            (Self::Time(v), Value::Time(x)) => v.push(x),
            (column, value) => {
                return Err(ColumnError::TypeMismatch {
                    expected: column.data_type(),
                    got: value.data_type(),
                })
            }
        }
        Ok(())
    }

    /// Gathers the rows at the given indices, in order
    pub fn take(&self, indices: &[usize]) -> Result<Self, ColumnError> {
        fn gather<T: Clone>(values: &[T], indices: &[usize]) -> Result<Vec<T>, ColumnError> {
            indices
                .iter()
                .map(|&i| {
                    values
                        .get(i)
                        .cloned()
                        .ok_or(ColumnError::IndexOutOfBounds(i))
                })
                .collect()
        }

        Ok(match self {
            Self::Bool(v) => Self::Bool(gather(v, indices)?),
            Self::Int(v) => Self::Int(gather(v, indices)?),
            Self::Float(v) => Self::Float(gather(v, indices)?),
            Self::Sym(v) => Self::Sym(gather(v, indices)?),
            Self::Date(v) => Self::Date(gather(v, indices)?),
            Self::Time(v) => Self::Time(gather(v, indices)?),
        })
    }

    /// Keeps the rows whose mask entry is true
    pub fn filter(&self, mask: &[bool]) -> Result<Self, ColumnError> {
        if mask.len() != self.len() {
            return Err(ColumnError::MaskLength {
                rows: self.len(),
                mask: mask.len(),
            });
        }

        fn sieve<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, &keep)| keep)
                .map(|(v, _)| v.clone())
                .collect()
        }

        Ok(match self {
            Self::Bool(v) => Self::Bool(sieve(v, mask)),
            Self::Int(v) => Self::Int(sieve(v, mask)),
            Self::Float(v) => Self::Float(sieve(v, mask)),
            Self::Sym(v) => Self::Sym(sieve(v, mask)),
            Self::Date(v) => Self::Date(sieve(v, mask)),
            Self::Time(v) => Self::Time(sieve(v, mask)),
        })
    }

    /// Returns the first n rows (fewer if the column is shorter)
    pub fn head(&self, n: usize) -> Self {
        fn front<T: Clone>(values: &[T], n: usize) -> Vec<T> {
            values[..n.min(values.len())].to_vec()
        }

        match self {
            Self::Bool(v) => Self::Bool(front(v, n)),
            Self::Int(v) => Self::Int(front(v, n)),
            Self::Float(v) => Self::Float(front(v, n)),
            Self::Sym(v) => Self::Sym(front(v, n)),
            Self::Date(v) => Self::Date(front(v, n)),
            Self::Time(v) => Self::Time(front(v, n)),
        }
    }

    /// Appends another column of the same type
    pub fn concat(&mut self, other: &Self) -> Result<(), ColumnError> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.extend_from_slice(b),
            (Self::Int(a), Self::Int(b)) => a.extend_from_slice(b),
            (Self::Float(a), Self::Float(b)) => a.extend_from_slice(b),
            (Self::Sym(a), Self::Sym(b)) => a.extend_from_slice(b),
            (Self::Date(a), Self::Date(b)) => a.extend_from_slice(b),
            (Self::Time(a), Self::Time(b)) => a.extend_from_slice(b),
            (column, other) => {
                return Err(ColumnError::TypeMismatch {
                    expected: column.data_type(),
                    got: other.data_type(),
                })
            }
        }
        Ok(())
    }

    /// Iterates the column as scalar values
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        // Indices are in bounds by construction
        (0..self.len()).map(move |i| self.value(i).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_type_check() {
        let mut column = Column::empty(DataType::Float);
        column.push(Value::Float(101.5)).unwrap();
        column.push(Value::Float(102.0)).unwrap();

        assert_eq!(column.len(), 2);
        assert_eq!(column.value(1), Some(Value::Float(102.0)));

        // Pushing an int into a float column is a type error
        assert!(matches!(
            column.push(Value::Int(5)),
            Err(ColumnError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_take_and_filter() {
        let column = Column::Sym(vec![
            "AAPL".to_string(),
            "MSFT".to_string(),
            "GOOG".to_string(),
        ]);

        let taken = column.take(&[2, 0]).unwrap();
        assert_eq!(
            taken,
            Column::Sym(vec!["GOOG".to_string(), "AAPL".to_string()])
        );

        let filtered = column.filter(&[true, false, true]).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.value(1), Some(Value::Sym("GOOG".to_string())));

        // Out of bounds take
        assert!(matches!(
            column.take(&[7]),
            Err(ColumnError::IndexOutOfBounds(7))
        ));

        // Mask length mismatch
        assert!(matches!(
            column.filter(&[true]),
            Err(ColumnError::MaskLength { .. })
        ));
    }

    #[test]
    fn test_head_and_concat() {
        let mut column = Column::Int(vec![1, 2, 3]);
        column.concat(&Column::Int(vec![4, 5])).unwrap();
        assert_eq!(column.len(), 5);

        let head = column.head(2);
        assert_eq!(head, Column::Int(vec![1, 2]));

        // Head past the end returns everything
        assert_eq!(column.head(100).len(), 5);

        // Concat across types is rejected
        assert!(matches!(
            column.concat(&Column::Float(vec![1.0])),
            Err(ColumnError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_value_ordering() {
        let a = Value::Float(1.0);
        let b = Value::Float(2.0);
        assert_eq!(a.total_cmp(&b), Ordering::Less);

        let x = Value::Sym("AAPL".to_string());
        let y = Value::Sym("MSFT".to_string());
        assert_eq!(y.total_cmp(&x), Ordering::Greater);
    }

    #[test]
    fn test_data_type_round_trip() {
        for name in ["bool", "int", "float", "sym", "date", "time"] {
            let parsed: DataType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!(matches!(
            "decimal".parse::<DataType>(),
            Err(ColumnError::UnknownDataType(_))
        ));
    }
}
