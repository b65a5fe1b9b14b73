//! Ingestion module for tickdb
//! Parses segment record files (CSV, JSON) into typed rows.

pub mod formats;
pub mod parser;

use formats::{CsvRecords, JsonRecords};
use parser::RecordParser;

/// Returns the record parser for a segment file extension, if supported
pub fn parser_for_extension(extension: &str) -> Option<Box<dyn RecordParser + Send + Sync>> {
    match extension {
        "csv" => Some(Box::new(CsvRecords::new())),
        "json" => Some(Box::new(JsonRecords::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_dispatch_by_extension() {
        assert!(parser_for_extension("csv").is_some());
        assert!(parser_for_extension("json").is_some());
        assert!(parser_for_extension("parquet").is_none());
    }
}
