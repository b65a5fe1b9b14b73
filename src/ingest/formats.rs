use serde_json::{Map, Number, Value as JsonValue};

use super::parser::{parse_scalar, ParserError, ParserResult, RecordParser};
use crate::store::column::{DataType, Value};
use crate::store::frame::Frame;
use crate::store::table::TableSchema;

/// CSV record files: a header row naming the schema columns in order,
/// then one record per row
pub struct CsvRecords;

impl CsvRecords {
    pub fn new() -> Self {
        Self
    }

    /// Renders a frame as CSV text with a header row
    pub fn render(frame: &Frame) -> ParserResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(frame.names())
            .map_err(|e| ParserError::InvalidFormat(e.to_string()))?;
        for row in 0..frame.len() {
            // Row is in bounds by construction
            let values = frame.row(row).unwrap();
            let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            writer
                .write_record(&cells)
                .map_err(|e| ParserError::InvalidFormat(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ParserError::InvalidFormat(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ParserError::InvalidFormat(e.to_string()))
    }
}

impl Default for CsvRecords {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for CsvRecords {
    fn parse(&self, input: &[u8], schema: &TableSchema) -> ParserResult<Vec<Vec<Value>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(input);

        let headers = reader
            .headers()
            .map_err(|e| ParserError::InvalidFormat(e.to_string()))?;
        let header_names: Vec<&str> = headers.iter().collect();
        if header_names != schema.names() {
            return Err(ParserError::HeaderMismatch(format!(
                "{:?} vs {:?}",
                header_names,
                schema.names()
            )));
        }

        let fields = schema.fields();
        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ParserError::InvalidFormat(e.to_string()))?;
            if record.len() != fields.len() {
                return Err(ParserError::WrongArity {
                    row,
                    expected: fields.len(),
                    got: record.len(),
                });
            }
            let values = fields
                .iter()
                .zip(record.iter())
                .map(|((name, dtype), raw)| parse_scalar(raw, *dtype, row, name))
                .collect::<ParserResult<Vec<Value>>>()?;
            rows.push(values);
        }
        Ok(rows)
    }

    fn supported_formats(&self) -> Vec<&'static str> {
        vec!["text/csv", "csv"]
    }
}

/// JSON record files: an array of objects keyed by column name
pub struct JsonRecords;

impl JsonRecords {
    pub fn new() -> Self {
        Self
    }

    /// Renders a frame as a JSON array of objects
    pub fn render(frame: &Frame) -> ParserResult<String> {
        let mut records = Vec::with_capacity(frame.len());
        for row in 0..frame.len() {
            let mut object = Map::new();
            for name in frame.names() {
                // Name and row are in bounds by construction
                let value = frame.column(name).unwrap().value(row).unwrap();
                object.insert(name.to_string(), value_to_json(&value)?);
            }
            records.push(JsonValue::Object(object));
        }
        serde_json::to_string_pretty(&JsonValue::Array(records))
            .map_err(|e| ParserError::InvalidFormat(e.to_string()))
    }
}

impl Default for JsonRecords {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for JsonRecords {
    fn parse(&self, input: &[u8], schema: &TableSchema) -> ParserResult<Vec<Vec<Value>>> {
        let parsed: JsonValue = serde_json::from_slice(input)
            .map_err(|e| ParserError::InvalidFormat(e.to_string()))?;
        let records = parsed.as_array().ok_or_else(|| {
            ParserError::InvalidFormat("Input must be a JSON array of objects".to_string())
        })?;

        let mut rows = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                ParserError::InvalidFormat(format!("Record {} is not an object", row))
            })?;
            let mut values = Vec::with_capacity(schema.fields().len());
            for (name, dtype) in schema.fields() {
                let field = object.get(name).ok_or_else(|| ParserError::MissingField {
                    row,
                    field: name.clone(),
                })?;
                values.push(value_from_json(field, *dtype, row, name)?);
            }
            rows.push(values);
        }
        Ok(rows)
    }

    fn supported_formats(&self) -> Vec<&'static str> {
        vec!["application/json", "json"]
    }
}

fn value_to_json(value: &Value) -> ParserResult<JsonValue> {
    Ok(match value {
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::Int(v) => JsonValue::Number((*v).into()),
        Value::Float(v) => JsonValue::Number(Number::from_f64(*v).ok_or_else(|| {
            ParserError::InvalidFormat(format!("{} is not representable in JSON", v))
        })?),
        Value::Sym(v) => JsonValue::String(v.clone()),
        Value::Date(_) | Value::Time(_) => JsonValue::String(value.to_string()),
    })
}

fn value_from_json(
    field: &JsonValue,
    expected: DataType,
    row: usize,
    column: &str,
) -> ParserResult<Value> {
    let invalid = || ParserError::InvalidScalar {
        row,
        column: column.to_string(),
        raw: field.to_string(),
        expected,
    };

    match expected {
        DataType::Bool => field.as_bool().map(Value::Bool).ok_or_else(invalid),
        DataType::Int => field.as_i64().map(Value::Int).ok_or_else(invalid),
        DataType::Float => field.as_f64().map(Value::Float).ok_or_else(invalid),
        DataType::Sym => field
            .as_str()
            .map(|s| Value::Sym(s.to_string()))
            .ok_or_else(invalid),
        DataType::Date | DataType::Time => {
            let raw = field.as_str().ok_or_else(invalid)?;
            parse_scalar(raw, expected, row, column)
        }
    }
}
