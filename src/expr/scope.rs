//! Binding table expressions to data sources.
//!
//! A table leaf becomes computable once it carries a [`TableSource`]:
//! either a table inside an on-disk database, addressed by a
//! `tickdb://<root>::<table>` URI, or an in-memory frame. [`separate`]
//! splits a bound expression back into its symbolic form and a
//! [`Scope`] of named sources.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::expr::{Expr, TableRef};
use crate::store::{Database, Frame, StoreError, TableSchema};

pub const URI_SCHEME: &str = "tickdb://";

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Invalid table URI '{0}', expected tickdb://<root>::<table>")]
    InvalidUri(String),
    #[error("Expression is not bound to a source: {0}")]
    Unbound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The data a table leaf draws from
#[derive(Debug, Clone)]
pub enum TableSource {
    /// A table inside an opened database
    Db { db: Database, table: String },
    /// An in-memory frame
    Frame(Arc<Frame>),
}

/// Open databases keyed by canonical root, reused across binds
static OPEN_ROOTS: LazyLock<Mutex<HashMap<PathBuf, Database>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Resolves a `tickdb://<root>::<table>` URI to a bound table expression
pub async fn bind(uri: &str) -> Result<Expr, ScopeError> {
    let rest = uri
        .strip_prefix(URI_SCHEME)
        .ok_or_else(|| ScopeError::InvalidUri(uri.to_string()))?;
    let (root, table) = rest
        .split_once("::")
        .ok_or_else(|| ScopeError::InvalidUri(uri.to_string()))?;
    if root.is_empty() || table.is_empty() {
        return Err(ScopeError::InvalidUri(uri.to_string()));
    }

    let db = open_root(Path::new(root)).await?;
    bind_in(&db, table).await
}

/// Binds a table of an already opened database
pub async fn bind_in(db: &Database, table: &str) -> Result<Expr, ScopeError> {
    let resolved = db.table(table).await?;
    Ok(Expr::Table(TableRef {
        name: table.to_string(),
        schema: resolved.schema().clone(),
        source: Some(TableSource::Db {
            db: db.clone(),
            table: table.to_string(),
        }),
    }))
}

/// Binds an in-memory frame under a table name
pub fn bind_frame(name: impl Into<String>, frame: Frame) -> Expr {
    let name = name.into();
    let schema = TableSchema::new(frame.schema());
    Expr::Table(TableRef {
        name,
        schema,
        source: Some(TableSource::Frame(Arc::new(frame))),
    })
}

async fn open_root(root: &Path) -> Result<Database, ScopeError> {
    let canonical = root.canonicalize()?;
    let mut roots = OPEN_ROOTS.lock().await;
    if let Some(db) = roots.get(&canonical) {
        debug!("Reusing open database at {:?}", canonical);
        return Ok(db.clone());
    }
    let db = Database::open(&canonical).await?;
    roots.insert(canonical, db.clone());
    Ok(db)
}

/// Whether the table an expression descends from is date partitioned
pub async fn is_partitioned(expr: &Expr) -> Result<bool, ScopeError> {
    let root = expr
        .root()
        .ok_or_else(|| ScopeError::Unbound(expr.to_string()))?;
    match &root.source {
        Some(TableSource::Db { db, table }) => Ok(db.is_partitioned(table).await?),
        Some(TableSource::Frame(_)) => Ok(false),
        None => Err(ScopeError::Unbound(root.name.clone())),
    }
}

/// Named sources supplied at compute time
#[derive(Debug, Clone, Default)]
pub struct Scope {
    sources: HashMap<String, TableSource>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: TableSource) {
        self.sources.insert(name.into(), source);
    }

    /// Registers an in-memory frame under a table name
    pub fn insert_frame(&mut self, name: impl Into<String>, frame: Frame) {
        self.insert(name, TableSource::Frame(Arc::new(frame)));
    }

    pub fn get(&self, name: &str) -> Option<&TableSource> {
        self.sources.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Splits a bound expression into its symbolic form and its sources
pub fn separate(expr: Expr) -> (Expr, Scope) {
    let mut scope = Scope::new();
    let stripped = strip(expr, &mut scope);
    (stripped, scope)
}

fn strip(expr: Expr, scope: &mut Scope) -> Expr {
    match expr {
        Expr::Table(mut table) => {
            if let Some(source) = table.source.take() {
                scope.insert(table.name.clone(), source);
            }
            Expr::Table(table)
        }
        Expr::Projection { input, columns } => Expr::Projection {
            input: Box::new(strip(*input, scope)),
            columns,
        },
        Expr::Selection { input, predicate } => Expr::Selection {
            input: Box::new(strip(*input, scope)),
            predicate: Box::new(strip(*predicate, scope)),
        },
        Expr::Field { input, name } => Expr::Field {
            input: Box::new(strip(*input, scope)),
            name,
        },
        Expr::Head { input, n } => Expr::Head {
            input: Box::new(strip(*input, scope)),
            n,
        },
        Expr::By {
            input,
            keys,
            aggregates,
        } => Expr::By {
            input: Box::new(strip(*input, scope)),
            keys,
            aggregates: aggregates
                .into_iter()
                .map(|(name, aggregate)| (name, strip(aggregate, scope)))
                .collect(),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(strip(*left, scope)),
            right: Box::new(strip(*right, scope)),
        },
        Expr::Reduce { kind, input } => Expr::Reduce {
            kind,
            input: Box::new(strip(*input, scope)),
        },
        Expr::Literal(value) => Expr::Literal(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::segment::DatabaseWriter;
    use crate::store::{Column, DataType};
    use tempfile::tempdir;

    fn quotes() -> Frame {
        Frame::from_columns(vec![
            (
                "sym".to_string(),
                Column::Sym(vec!["AAPL".to_string(), "MSFT".to_string()]),
            ),
            ("bid".to_string(), Column::Float(vec![101.4, 310.1])),
        ])
        .unwrap()
    }

    #[test]
    fn test_bind_frame() {
        let expr = bind_frame("quote", quotes());
        let root = expr.root().unwrap();
        assert_eq!(root.name, "quote");
        assert_eq!(root.schema.names(), vec!["sym".to_string(), "bid".to_string()]);
        assert!(matches!(root.source, Some(TableSource::Frame(_))));
        // A bound leaf advertises its columns
        assert_eq!(format!("{}", expr), "quote{sym, bid}");
    }

    #[test]
    fn test_separate_strips_sources() {
        let quote = bind_frame("quote", quotes());
        let expr = quote
            .filter(quote.field("sym").unwrap().eq("AAPL").unwrap())
            .unwrap();

        let (stripped, scope) = separate(expr);
        assert!(stripped.root().unwrap().source.is_none());
        assert!(scope.get("quote").is_some());
        assert!(!scope.is_empty());
    }

    #[tokio::test]
    async fn test_bind_uri_and_partition_flag() {
        let dir = tempdir().unwrap();
        let mut writer = DatabaseWriter::create(dir.path()).unwrap();
        writer
            .write_partition("trade", "2024-01-02".parse().unwrap(), &quotes())
            .unwrap();
        writer.write_basic("ref", &quotes()).unwrap();
        writer.finish().unwrap();

        let uri = format!("{}{}::trade", URI_SCHEME, dir.path().display());
        let trade = bind(&uri).await.unwrap();
        assert_eq!(trade.root().unwrap().name, "trade");
        // Partitioned tables present the virtual date column first
        assert_eq!(
            trade.schema().unwrap().data_type("date"),
            Some(DataType::Date)
        );
        assert!(is_partitioned(&trade).await.unwrap());

        let uri = format!("{}{}::ref", URI_SCHEME, dir.path().display());
        let basic = bind(&uri).await.unwrap();
        assert!(!is_partitioned(&basic).await.unwrap());

        assert!(matches!(
            bind("tickdb://missing-table-part").await,
            Err(ScopeError::InvalidUri(_))
        ));
        assert!(matches!(
            bind("file:///tmp::trade").await,
            Err(ScopeError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_unbound_expression() {
        let expr = Expr::table(
            "trade",
            TableSchema::new(vec![("price".to_string(), DataType::Float)]),
        );
        let (_, scope) = separate(expr);
        assert!(scope.is_empty());
    }
}
