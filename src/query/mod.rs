//! The query surface: text in, frames out.
//!
//! A [`Session`] lexes, parses and validates query text against the
//! schema of the table it names, then hands the query to the executor.

pub mod exec;
pub mod parser;

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use crate::metrics;
use crate::query::exec::{ExecutionConfig, ExecutionError, QueryExecutor};
use crate::query::parser::{AstError, Lexer, LexerError, Parser, QueryValidator, ValidationError};
use crate::store::{Database, Frame, StoreError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Lex error: {0}")]
    Lexer(#[from] LexerError),
    #[error("Parse error: {0}")]
    Parser(#[from] AstError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Execution error: {0}")]
    Execution(ExecutionError),
    #[error("Unsupported on partitioned table: {0}")]
    UnsupportedOnPartitioned(String),
}

impl From<ExecutionError> for QueryError {
    fn from(error: ExecutionError) -> Self {
        match error {
            ExecutionError::UnsupportedOnPartitioned(what) => Self::UnsupportedOnPartitioned(what),
            other => Self::Execution(other),
        }
    }
}

/// Evaluates query text against the tables of one database
#[derive(Clone)]
pub struct Session {
    db: Database,
    executor: QueryExecutor,
}

impl Session {
    pub fn new(db: Database) -> Self {
        Self::with_config(db, ExecutionConfig::default())
    }

    pub fn with_config(db: Database, config: ExecutionConfig) -> Self {
        Self {
            db,
            executor: QueryExecutor::new(config),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn eval(&self, text: &str) -> Result<Frame, QueryError> {
        let started = Instant::now();
        debug!("Evaluating query: {}", text);

        let tokens = Lexer::new(text).tokenize()?;
        let query = Parser::new(&tokens).parse()?;
        let table = self.db.table(&query.from).await?;
        QueryValidator::new().validate(&query, table.schema())?;
        let frame = self.executor.execute(&query, table).await?;

        let elapsed = started.elapsed();
        metrics::record_query(elapsed.as_secs_f64() * 1000.0);
        info!(
            "Query over '{}' returned {} rows in {:?}",
            query.from,
            frame.len(),
            elapsed
        );
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Column, DataType, Frame, Table, TableSchema, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    async fn session() -> Session {
        let db = Database::new();

        let basic = Frame::from_columns(vec![
            (
                "sym".to_string(),
                Column::Sym(vec!["AAPL".to_string(), "MSFT".to_string()]),
            ),
            ("price".to_string(), Column::Float(vec![101.5, 310.25])),
        ])
        .unwrap();
        db.register(Table::basic("quote", basic)).await;

        let stored = TableSchema::new(vec![
            ("sym".to_string(), DataType::Sym),
            ("price".to_string(), DataType::Float),
        ]);
        let mut segments = BTreeMap::new();
        for (day, price) in [(1, 101.5), (2, 102.0)] {
            let frame = Frame::from_columns(vec![
                ("sym".to_string(), Column::Sym(vec!["AAPL".to_string()])),
                ("price".to_string(), Column::Float(vec![price])),
            ])
            .unwrap();
            segments.insert(
                chrono::NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                Arc::new(frame),
            );
        }
        db.register(Table::partitioned("trade", stored, segments).unwrap())
            .await;

        Session::new(db)
    }

    #[tokio::test]
    async fn test_eval_end_to_end() {
        let session = session().await;

        let frame = session.eval("select * from quote").await.unwrap();
        assert_eq!(frame.names(), vec!["sym", "price"]);
        assert_eq!(frame.len(), 2);

        let frame = session
            .eval("select price from quote where sym = 'AAPL'")
            .await
            .unwrap();
        assert_eq!(frame.column("price").unwrap(), &Column::Float(vec![101.5]));

        let frame = session.eval("select * from trade").await.unwrap();
        assert_eq!(frame.names(), vec!["date", "sym", "price"]);
        assert_eq!(
            frame.column("date").unwrap().value(1),
            Some(Value::Date("2024-01-02".parse().unwrap()))
        );
    }

    #[tokio::test]
    async fn test_eval_surfaces_partitioned_restrictions() {
        let session = session().await;

        let result = session.eval("select price from trade limit 1").await;
        assert!(matches!(
            result,
            Err(QueryError::UnsupportedOnPartitioned(_))
        ));

        // The same window is fine on a basic table
        let frame = session.eval("select price from quote limit 1").await.unwrap();
        assert_eq!(frame.len(), 1);
    }

    #[tokio::test]
    async fn test_eval_rejects_bad_queries() {
        let session = session().await;

        assert!(matches!(
            session.eval("select * from positions").await,
            Err(QueryError::Store(StoreError::UnknownTable(_)))
        ));
        assert!(matches!(
            session.eval("select notional from quote").await,
            Err(QueryError::Validation(_))
        ));
        assert!(matches!(
            session.eval("select * from").await,
            Err(QueryError::Parser(_))
        ));
        assert!(matches!(
            session.eval("select * from quote @").await,
            Err(QueryError::Lexer(_))
        ));
    }
}
