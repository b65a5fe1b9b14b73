use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::store::column::{ColumnError, DataType, Value};
use crate::store::table::TableSchema;

/// Errors that can occur while parsing record files
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Invalid input format: {0}")]
    InvalidFormat(String),
    #[error("Header does not match schema: {0}")]
    HeaderMismatch(String),
    #[error("Row {row}: missing field '{field}'")]
    MissingField { row: usize, field: String },
    #[error("Row {row}: expected {expected} fields, got {got}")]
    WrongArity {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("Row {row}, column '{column}': cannot parse {raw:?} as {expected}")]
    InvalidScalar {
        row: usize,
        column: String,
        raw: String,
        expected: DataType,
    },
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Result type for parser operations
pub type ParserResult<T> = Result<T, ParserError>;

/// Trait for parsing raw record bytes into rows under a table schema
pub trait RecordParser {
    /// Parses an entire record file into rows, one `Vec<Value>` per row,
    /// in schema column order
    fn parse(&self, input: &[u8], schema: &TableSchema) -> ParserResult<Vec<Vec<Value>>>;

    /// Returns the supported input formats
    fn supported_formats(&self) -> Vec<&'static str>;
}

/// Parses one textual scalar according to the column's data type
pub fn parse_scalar(
    raw: &str,
    expected: DataType,
    row: usize,
    column: &str,
) -> ParserResult<Value> {
    let invalid = || ParserError::InvalidScalar {
        row,
        column: column.to_string(),
        raw: raw.to_string(),
        expected,
    };

    match expected {
        DataType::Bool => raw.parse::<bool>().map(Value::Bool).map_err(|_| invalid()),
        DataType::Int => raw.parse::<i64>().map(Value::Int).map_err(|_| invalid()),
        DataType::Float => raw.parse::<f64>().map(Value::Float).map_err(|_| invalid()),
        DataType::Sym => Ok(Value::Sym(raw.to_string())),
        DataType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| invalid()),
        DataType::Time => NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
            .map(Value::Time)
            .map_err(|_| invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_per_type() {
        assert_eq!(
            parse_scalar("42", DataType::Int, 0, "size").unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            parse_scalar("101.5", DataType::Float, 0, "price").unwrap(),
            Value::Float(101.5)
        );
        assert_eq!(
            parse_scalar("AAPL", DataType::Sym, 0, "sym").unwrap(),
            Value::Sym("AAPL".to_string())
        );
        assert_eq!(
            parse_scalar("2024-01-02", DataType::Date, 0, "date").unwrap(),
            Value::Date("2024-01-02".parse().unwrap())
        );
        assert_eq!(
            parse_scalar("09:30:00.125", DataType::Time, 0, "time").unwrap(),
            Value::Time("09:30:00.125".parse().unwrap())
        );
    }

    #[test]
    fn test_parse_scalar_carries_row_context() {
        let err = parse_scalar("not-a-number", DataType::Int, 7, "size").unwrap_err();
        match err {
            ParserError::InvalidScalar { row, column, .. } => {
                assert_eq!(row, 7);
                assert_eq!(column, "size");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
