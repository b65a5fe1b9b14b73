use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use crc::{Crc, CRC_32_ISCSI};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ingest;
use crate::ingest::formats::CsvRecords;
use crate::ingest::parser::{ParserError, RecordParser};
use crate::metrics;
use crate::store::column::{Column, ColumnError, DataType, Value};
use crate::store::frame::{Frame, FrameError};
use crate::store::table::{Table, TableError, TableSchema, DATE_COLUMN};

const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(u32),
    #[error("Unsupported segment format: {0}")]
    UnsupportedFormat(String),
    #[error("Corrupted segment {file}: CRC mismatch")]
    CorruptedSegment { file: String },
    #[error("Segment {file} holds {got} rows, manifest says {expected}")]
    RowCountMismatch {
        file: String,
        expected: usize,
        got: usize,
    },
    #[error("Parse error in {file}: {source}")]
    Parse { file: String, source: ParserError },
    #[error("Invalid segment write: {0}")]
    InvalidWrite(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    tables: Vec<TableEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableEntry {
    name: String,
    partitioned: bool,
    columns: Vec<ColumnEntry>,
    segments: Vec<SegmentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColumnEntry {
    name: String,
    data_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SegmentEntry {
    /// Partition date as YYYY-MM-DD; None for basic tables
    date: Option<String>,
    /// Record file path relative to the database root
    file: String,
    rows: usize,
    crc: u32,
}

/// Writes a database root: record files per table and partition, plus a
/// manifest carrying row counts and CRC32 integrity codes
pub struct DatabaseWriter {
    root: PathBuf,
    tables: Vec<TableEntry>,
    crc: Crc<u32>,
}

impl DatabaseWriter {
    /// Creates the root directory and an empty manifest in memory
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self, SegmentError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            tables: Vec::new(),
            crc: Crc::<u32>::new(&CRC_32_ISCSI),
        })
    }

    /// Writes a non-partitioned table as a single record file at the root
    pub fn write_basic(&mut self, name: &str, frame: &Frame) -> Result<(), SegmentError> {
        if self.tables.iter().any(|t| t.name == name) {
            return Err(SegmentError::InvalidWrite(format!(
                "table '{}' already written",
                name
            )));
        }
        let file = format!("{}.csv", name);
        let text = CsvRecords::render(frame).map_err(|source| SegmentError::Parse {
            file: file.clone(),
            source,
        })?;
        let crc = self.write_file(&file, &text)?;
        debug!("Wrote segment {} ({} rows)", file, frame.len());
        self.tables.push(TableEntry {
            name: name.to_string(),
            partitioned: false,
            columns: column_entries(frame),
            segments: vec![SegmentEntry {
                date: None,
                file,
                rows: frame.len(),
                crc,
            }],
        });
        Ok(())
    }

    /// Writes one partition segment of a partitioned table. The first
    /// segment fixes the stored schema; segments never store the date
    /// column, the loader materializes it from the partition key.
    pub fn write_partition(
        &mut self,
        table: &str,
        date: NaiveDate,
        frame: &Frame,
    ) -> Result<(), SegmentError> {
        if frame.column(DATE_COLUMN).is_some() {
            return Err(SegmentError::InvalidWrite(format!(
                "segments must not store the '{}' column",
                DATE_COLUMN
            )));
        }
        let columns = column_entries(frame);
        let date_str = date.format(DATE_FORMAT).to_string();
        match self.tables.iter().find(|t| t.name == table) {
            Some(entry) if !entry.partitioned => {
                return Err(SegmentError::InvalidWrite(format!(
                    "table '{}' already written as basic",
                    table
                )));
            }
            Some(entry) if entry.columns != columns => {
                return Err(SegmentError::InvalidWrite(format!(
                    "segment schema for '{}' does not match earlier partitions",
                    table
                )));
            }
            Some(entry)
                if entry
                    .segments
                    .iter()
                    .any(|s| s.date.as_deref() == Some(date_str.as_str())) =>
            {
                return Err(SegmentError::InvalidWrite(format!(
                    "partition {} of '{}' already written",
                    date_str, table
                )));
            }
            Some(_) => {}
            None => self.tables.push(TableEntry {
                name: table.to_string(),
                partitioned: true,
                columns,
                segments: Vec::new(),
            }),
        }

        let file = format!("{}/{}.csv", date_str, table);
        let text = CsvRecords::render(frame).map_err(|source| SegmentError::Parse {
            file: file.clone(),
            source,
        })?;
        let crc = self.write_file(&file, &text)?;
        debug!("Wrote segment {} ({} rows)", file, frame.len());

        // The entry exists after the match above
        let entry = self.tables.iter_mut().find(|t| t.name == table).unwrap();
        entry.segments.push(SegmentEntry {
            date: Some(date_str),
            file,
            rows: frame.len(),
            crc,
        });
        Ok(())
    }

    /// Writes the manifest; call once after all tables are written
    pub fn finish(mut self) -> Result<(), SegmentError> {
        // Loaders expect partition segments in ascending date order
        for table in &mut self.tables {
            table.segments.sort_by(|a, b| a.date.cmp(&b.date));
        }
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            tables: std::mem::take(&mut self.tables),
        };
        let text = serde_json::to_string_pretty(&manifest)?;
        self.write_file(MANIFEST_FILE, &text)?;
        info!(
            "Wrote manifest for {} tables to {:?}",
            manifest.tables.len(),
            self.root
        );
        Ok(())
    }

    /// Writes contents through a uuid-named temp file then renames into
    /// place, returning the CRC32 of the bytes
    fn write_file(&self, relative: &str, contents: &str) -> Result<u32, SegmentError> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        fs::rename(&temp, &path)?;

        let mut digest = self.crc.digest();
        digest.update(contents.as_bytes());
        Ok(digest.finalize())
    }
}

/// Reads a database root, verifying every segment against the manifest
pub fn load_root<P: AsRef<Path>>(root: P) -> Result<Vec<Table>, SegmentError> {
    let root = root.as_ref();
    let manifest: Manifest = serde_json::from_str(&fs::read_to_string(root.join(MANIFEST_FILE))?)?;
    if manifest.version != MANIFEST_VERSION {
        return Err(SegmentError::UnsupportedVersion(manifest.version));
    }

    let crc = Crc::<u32>::new(&CRC_32_ISCSI);
    let mut tables = Vec::with_capacity(manifest.tables.len());
    for entry in manifest.tables {
        let schema = schema_from_entries(&entry.columns)?;
        if entry.partitioned {
            let mut segments = BTreeMap::new();
            for segment in &entry.segments {
                let date_str = segment.date.as_deref().ok_or_else(|| {
                    SegmentError::InvalidManifest(format!(
                        "partition segment {} has no date",
                        segment.file
                    ))
                })?;
                let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
                    SegmentError::InvalidManifest(format!(
                        "bad partition date {:?}: {}",
                        date_str, e
                    ))
                })?;
                let frame = read_segment(root, segment, &schema, &crc)?;
                segments.insert(date, Arc::new(frame));
            }
            info!(
                "Loaded table '{}' with {} partitions",
                entry.name,
                segments.len()
            );
            metrics::record_partitions_loaded(segments.len() as u64);
            tables.push(Table::partitioned(entry.name, schema, segments)?);
        } else {
            let segment = entry.segments.first().ok_or_else(|| {
                SegmentError::InvalidManifest(format!("table '{}' has no segments", entry.name))
            })?;
            let frame = read_segment(root, segment, &schema, &crc)?;
            info!("Loaded table '{}' with {} rows", entry.name, frame.len());
            tables.push(Table::basic(entry.name, frame));
        }
    }
    Ok(tables)
}

/// Reads one record file, checking CRC and row count against the manifest
fn read_segment(
    root: &Path,
    segment: &SegmentEntry,
    schema: &TableSchema,
    crc: &Crc<u32>,
) -> Result<Frame, SegmentError> {
    let path = root.join(&segment.file);
    let bytes = fs::read(&path)?;

    let mut digest = crc.digest();
    digest.update(&bytes);
    if digest.finalize() != segment.crc {
        return Err(SegmentError::CorruptedSegment {
            file: segment.file.clone(),
        });
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parser = ingest::parser_for_extension(extension)
        .ok_or_else(|| SegmentError::UnsupportedFormat(extension.to_string()))?;
    let rows = parser
        .parse(&bytes, schema)
        .map_err(|source| SegmentError::Parse {
            file: segment.file.clone(),
            source,
        })?;
    if rows.len() != segment.rows {
        return Err(SegmentError::RowCountMismatch {
            file: segment.file.clone(),
            expected: segment.rows,
            got: rows.len(),
        });
    }

    let frame = frame_from_rows(schema, rows)?;
    debug!("Read segment {} ({} rows)", segment.file, frame.len());
    metrics::record_segment_load(bytes.len() as u64);
    Ok(frame)
}

/// Builds a frame from parsed rows in schema column order
fn frame_from_rows(schema: &TableSchema, rows: Vec<Vec<Value>>) -> Result<Frame, SegmentError> {
    let mut columns: Vec<(String, Column)> = schema
        .fields()
        .iter()
        .map(|(n, t)| (n.clone(), Column::empty(*t)))
        .collect();
    for row in rows {
        for ((_, column), value) in columns.iter_mut().zip(row) {
            column.push(value)?;
        }
    }
    Ok(Frame::from_columns(columns)?)
}

fn column_entries(frame: &Frame) -> Vec<ColumnEntry> {
    frame
        .schema()
        .into_iter()
        .map(|(name, data_type)| ColumnEntry {
            name,
            data_type: data_type.to_string(),
        })
        .collect()
}

fn schema_from_entries(columns: &[ColumnEntry]) -> Result<TableSchema, SegmentError> {
    let fields = columns
        .iter()
        .map(|c| Ok((c.name.clone(), c.data_type.parse::<DataType>()?)))
        .collect::<Result<Vec<_>, ColumnError>>()?;
    Ok(TableSchema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn trade_segment(syms: &[&str], prices: &[f64]) -> Frame {
        Frame::from_columns(vec![
            (
                "sym".to_string(),
                Column::Sym(syms.iter().map(|s| s.to_string()).collect()),
            ),
            ("price".to_string(), Column::Float(prices.to_vec())),
        ])
        .unwrap()
    }

    fn write_sample_root(root: &Path) {
        let mut writer = DatabaseWriter::create(root).unwrap();
        writer
            .write_partition("trade", date("2024-01-03"), &trade_segment(&["IBM"], &[3.0]))
            .unwrap();
        writer
            .write_partition(
                "trade",
                date("2024-01-02"),
                &trade_segment(&["AAPL", "MSFT"], &[1.0, 2.0]),
            )
            .unwrap();
        writer
            .write_basic(
                "venues",
                &Frame::from_columns(vec![(
                    "venue".to_string(),
                    Column::Sym(vec!["NYSE".to_string(), "NASDAQ".to_string()]),
                )])
                .unwrap(),
            )
            .unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_write_and_load_round_trip() {
        let dir = tempdir().unwrap();
        write_sample_root(dir.path());

        let tables = load_root(dir.path()).unwrap();
        assert_eq!(tables.len(), 2);

        let trade = tables.iter().find(|t| t.name() == "trade").unwrap();
        assert!(trade.is_partitioned());
        assert_eq!(trade.row_count(), 3);
        assert_eq!(trade.schema().names(), vec!["date", "sym", "price"]);
        // Partitions load in date order regardless of write order
        assert_eq!(
            trade.partitions(),
            vec![date("2024-01-02"), date("2024-01-03")]
        );
        let frame = trade.materialize().unwrap();
        assert_eq!(
            frame.column("price").unwrap(),
            &Column::Float(vec![1.0, 2.0, 3.0])
        );

        let venues = tables.iter().find(|t| t.name() == "venues").unwrap();
        assert!(!venues.is_partitioned());
        assert_eq!(venues.row_count(), 2);
    }

    #[test]
    fn test_corrupted_segment_detected() {
        let dir = tempdir().unwrap();
        write_sample_root(dir.path());

        let file = dir.path().join("2024-01-02").join("trade.csv");
        fs::write(&file, "sym,price\nEVIL,0.0\nEVIL,0.0\n").unwrap();

        let err = load_root(dir.path()).unwrap_err();
        assert!(matches!(err, SegmentError::CorruptedSegment { .. }));
    }

    #[test]
    fn test_row_count_mismatch_detected() {
        let dir = tempdir().unwrap();
        write_sample_root(dir.path());

        // Tamper with the manifest row counts, leaving the data intact
        let manifest_path = dir.path().join(MANIFEST_FILE);
        let mut manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
        manifest["tables"][0]["segments"][0]["rows"] = serde_json::json!(99);
        fs::write(&manifest_path, manifest.to_string()).unwrap();

        let err = load_root(dir.path()).unwrap_err();
        assert!(matches!(err, SegmentError::RowCountMismatch { .. }));
    }

    #[test]
    fn test_unknown_manifest_version_rejected() {
        let dir = tempdir().unwrap();
        write_sample_root(dir.path());

        let manifest_path = dir.path().join(MANIFEST_FILE);
        let mut manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
        manifest["version"] = serde_json::json!(99);
        fs::write(&manifest_path, manifest.to_string()).unwrap();

        let err = load_root(dir.path()).unwrap_err();
        assert!(matches!(err, SegmentError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_segments_must_not_store_the_date_column() {
        let dir = tempdir().unwrap();
        let mut writer = DatabaseWriter::create(dir.path()).unwrap();
        let frame = Frame::from_columns(vec![(
            "date".to_string(),
            Column::Date(vec![date("2024-01-02")]),
        )])
        .unwrap();
        let err = writer
            .write_partition("trade", date("2024-01-02"), &frame)
            .unwrap_err();
        assert!(matches!(err, SegmentError::InvalidWrite(_)));
    }

    #[test]
    fn test_partition_schema_must_stay_consistent() {
        let dir = tempdir().unwrap();
        let mut writer = DatabaseWriter::create(dir.path()).unwrap();
        writer
            .write_partition("trade", date("2024-01-02"), &trade_segment(&["AAPL"], &[1.0]))
            .unwrap();

        let other = Frame::from_columns(vec![("sym".to_string(), Column::Sym(vec![]))]).unwrap();
        let err = writer
            .write_partition("trade", date("2024-01-03"), &other)
            .unwrap_err();
        assert!(matches!(err, SegmentError::InvalidWrite(_)));

        // Same date twice is rejected too
        let err = writer
            .write_partition("trade", date("2024-01-02"), &trade_segment(&["IBM"], &[2.0]))
            .unwrap_err();
        assert!(matches!(err, SegmentError::InvalidWrite(_)));
    }
}
