//! Evaluation of expression graphs against their bound data.
//!
//! An expression reaches data one of two ways. Engine-bound expressions
//! are lowered to query text by [`translate`] and evaluated through a
//! [`Session`] on the owning database; frame-bound expressions are
//! interpreted directly by [`frame_eval`]. Both routes end in an
//! [`Output`] shaped by the expression itself: tabular expressions
//! produce frames, column expressions series, reductions scalars.

pub mod frame_eval;
pub mod translate;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::expr::scope::{Scope, TableSource};
use crate::expr::{Expr, Shape, TableRef};
use crate::metrics;
use crate::query::exec::ExecutionError;
use crate::query::{QueryError, Session};
use crate::store::{ColumnError, Frame, FrameError, Series, Value};

pub use translate::translate;

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("No query form for {0}")]
    Untranslatable(String),
    #[error("Expression is not bound to a source: {0}")]
    Unbound(String),
    #[error("Expression draws on more than one source: {0}")]
    MixedSources(String),
    #[error("Cannot evaluate {0}")]
    Evaluation(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// What an expression computes to, per its shape
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Frame(Frame),
    Series(Series),
    Scalar(Value),
}

impl Output {
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_series(self) -> Option<Series> {
        match self {
            Self::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn into_scalar(self) -> Option<Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// Evaluates an expression through the sources bound into it
pub async fn compute(expr: &Expr) -> Result<Output, ComputeError> {
    compute_with(expr, &Scope::new()).await
}

/// Evaluates an expression, resolving free table symbols from `scope`.
/// Leaves that already carry a source keep it; every leaf must end up
/// on the same source.
pub async fn compute_with(expr: &Expr, scope: &Scope) -> Result<Output, ComputeError> {
    match resolve_source(expr, scope)? {
        TableSource::Db { db, .. } => {
            let text = translate::translate(expr)?;
            debug!("Computing '{}' as query: {}", expr, text);
            metrics::record_compute("engine");
            let frame = Session::new(db).eval(&text).await?;
            shape_output(expr, frame)
        }
        TableSource::Frame(frame) => {
            debug!("Computing '{}' over an in-memory frame", expr);
            metrics::record_compute("frame");
            frame_eval::evaluate(expr, &frame)
        }
    }
}

/// The single source every table leaf of the expression resolves to
fn resolve_source(expr: &Expr, scope: &Scope) -> Result<TableSource, ComputeError> {
    let mut leaves = Vec::new();
    collect_tables(expr, &mut leaves);

    let mut resolved: Option<TableSource> = None;
    for leaf in leaves {
        let source = match (&leaf.source, scope.get(&leaf.name)) {
            (Some(source), _) => source.clone(),
            (None, Some(source)) => source.clone(),
            (None, None) => return Err(ComputeError::Unbound(leaf.name.clone())),
        };
        match &resolved {
            Some(existing) if !same_source(existing, &source) => {
                return Err(ComputeError::MixedSources(expr.to_string()))
            }
            Some(_) => {}
            None => resolved = Some(source),
        }
    }
    resolved.ok_or_else(|| ComputeError::Unbound(expr.to_string()))
}

fn collect_tables<'a>(expr: &'a Expr, leaves: &mut Vec<&'a TableRef>) {
    match expr {
        Expr::Table(table) => leaves.push(table),
        Expr::Projection { input, .. }
        | Expr::Field { input, .. }
        | Expr::Head { input, .. }
        | Expr::Reduce { input, .. } => collect_tables(input, leaves),
        Expr::Selection { input, predicate } => {
            collect_tables(input, leaves);
            collect_tables(predicate, leaves);
        }
        Expr::By {
            input, aggregates, ..
        } => {
            collect_tables(input, leaves);
            for (_, aggregate) in aggregates {
                collect_tables(aggregate, leaves);
            }
        }
        Expr::Binary { left, right, .. } => {
            collect_tables(left, leaves);
            collect_tables(right, leaves);
        }
        Expr::Literal(_) => {}
    }
}

fn same_source(a: &TableSource, b: &TableSource) -> bool {
    match (a, b) {
        (
            TableSource::Db {
                db: left_db,
                table: left,
            },
            TableSource::Db {
                db: right_db,
                table: right,
            },
        ) => left_db.same_registry(right_db) && left == right,
        (TableSource::Frame(left), TableSource::Frame(right)) => Arc::ptr_eq(left, right),
        _ => false,
    }
}

/// Shapes an engine result frame per the expression that produced it
fn shape_output(expr: &Expr, frame: Frame) -> Result<Output, ComputeError> {
    match expr.shape() {
        Shape::Tabular => Ok(Output::Frame(frame)),
        Shape::Column => Ok(Output::Series(frame.squeeze()?)),
        Shape::Scalar => Ok(Output::Scalar(frame.scalar()?)),
    }
}
