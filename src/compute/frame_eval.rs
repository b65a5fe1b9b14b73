//! Direct interpretation of expressions over in-memory frames.
//!
//! This path mirrors the engine operator by operator: predicates reuse
//! the executor's value comparison, grouping reuses its accumulators and
//! key ordering. A grouped or reduced result therefore comes out
//! identical whichever route evaluated it.

use std::cmp::Ordering;

use crate::compute::{ComputeError, Output};
use crate::expr::{BinaryOp, Expr, Reducer, Shape};
use crate::query::exec::{cmp_keys, compare_values, Accumulator};
use crate::query::parser::CompareOp;
use crate::store::{Column, ColumnError, DataType, Frame, FrameError, Series, Value};

/// Evaluates an expression against the frame its table leaf is bound to
pub fn evaluate(expr: &Expr, frame: &Frame) -> Result<Output, ComputeError> {
    match eval(expr, frame)? {
        Evaluated::Frame(frame) => Ok(Output::Frame(frame)),
        Evaluated::Column { name, data } => Ok(Output::Series(Series::new(name, data))),
        Evaluated::Scalar(value) => Ok(Output::Scalar(value)),
    }
}

/// Intermediate result of one graph node
enum Evaluated {
    Frame(Frame),
    Column { name: String, data: Column },
    Scalar(Value),
}

fn eval(expr: &Expr, frame: &Frame) -> Result<Evaluated, ComputeError> {
    match expr {
        Expr::Table(_) => Ok(Evaluated::Frame(frame.clone())),
        Expr::Projection { input, columns } => {
            let base = eval_frame(input, frame)?;
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            Ok(Evaluated::Frame(base.project(&names)?))
        }
        Expr::Selection { input, predicate } => {
            let base = eval_frame(input, frame)?;
            let mask = predicate_mask(predicate, &base)?;
            Ok(Evaluated::Frame(base.filter(&mask)?))
        }
        Expr::Field { input, name } => {
            let base = eval_frame(input, frame)?;
            let data = base
                .column(name)
                .ok_or_else(|| FrameError::UnknownColumn(name.clone()))?
                .clone();
            Ok(Evaluated::Column {
                name: name.clone(),
                data,
            })
        }
        Expr::Head { input, n } => match eval(input, frame)? {
            Evaluated::Frame(base) => Ok(Evaluated::Frame(base.head(*n))),
            Evaluated::Column { name, data } => Ok(Evaluated::Column {
                name,
                data: data.head(*n),
            }),
            Evaluated::Scalar(_) => Err(evaluation("a head of a scalar")),
        },
        Expr::By {
            input,
            keys,
            aggregates,
        } => {
            let base = eval_frame(input, frame)?;
            Ok(Evaluated::Frame(eval_by(&base, keys, aggregates)?))
        }
        Expr::Reduce { kind, input } => {
            if *kind == Reducer::Nrows {
                return match eval(input, frame)? {
                    Evaluated::Frame(base) => Ok(Evaluated::Scalar(Value::Int(base.len() as i64))),
                    Evaluated::Column { data, .. } => {
                        Ok(Evaluated::Scalar(Value::Int(data.len() as i64)))
                    }
                    Evaluated::Scalar(_) => Err(evaluation("a row count of a scalar")),
                };
            }
            let data = match eval(input, frame)? {
                Evaluated::Column { data, .. } => data,
                _ => return Err(evaluation(format!("'{}' over a non-column", expr))),
            };
            let mut accumulator = accumulator_for(*kind, data.data_type());
            for value in data.values() {
                accumulator.update(&value);
            }
            Ok(Evaluated::Scalar(accumulator.finish()?))
        }
        Expr::Binary { .. } => {
            if expr.shape() == Shape::Scalar {
                return Ok(Evaluated::Scalar(eval_operand(expr, frame, 0)?));
            }
            // Rows come from the first field's tabular context, the same
            // context the query translation picks
            let context = binary_context(expr)
                .ok_or_else(|| evaluation(format!("'{}' detached from a table", expr)))?;
            let base = eval_frame(context, frame)?;

            let data_type = match expr.data_type() {
                Some(DataType::Bool) => DataType::Bool,
                _ => DataType::Float,
            };
            let mut data = Column::empty(data_type);
            for row in 0..base.len() {
                data.push(eval_operand(expr, &base, row)?)?;
            }
            Ok(Evaluated::Column {
                name: "expr".to_string(),
                data,
            })
        }
        Expr::Literal(value) => Ok(Evaluated::Scalar(value.clone())),
    }
}

fn eval_frame(expr: &Expr, frame: &Frame) -> Result<Frame, ComputeError> {
    match eval(expr, frame)? {
        Evaluated::Frame(frame) => Ok(frame),
        _ => Err(evaluation(format!("'{}' as a table", expr))),
    }
}

/// Groups base rows by key values and folds each run through the
/// aggregate accumulators; groups come out in ascending key order
fn eval_by(
    base: &Frame,
    keys: &[String],
    aggregates: &[(String, Expr)],
) -> Result<Frame, ComputeError> {
    let mut parts = Vec::with_capacity(aggregates.len());
    for (name, aggregate) in aggregates {
        let (kind, field) = aggregate_parts(aggregate)?;
        let data_type = column_of(base, field)?.data_type();
        parts.push((name.as_str(), kind, field, data_type));
    }

    let mut rows: Vec<(Vec<Value>, Vec<Value>)> = Vec::with_capacity(base.len());
    for row in 0..base.len() {
        let mut key_values = Vec::with_capacity(keys.len());
        for key in keys {
            key_values.push(column_value(base, key, row)?);
        }
        let mut args = Vec::with_capacity(parts.len());
        for (_, _, field, _) in &parts {
            args.push(column_value(base, field, row)?);
        }
        rows.push((key_values, args));
    }
    // Stable sort keeps rows within a group in source order
    rows.sort_by(|a, b| cmp_keys(&a.0, &b.0));

    let mut output_rows: Vec<Vec<Value>> = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let mut end = start + 1;
        while end < rows.len() && cmp_keys(&rows[end].0, &rows[start].0) == Ordering::Equal {
            end += 1;
        }

        let mut accumulators: Vec<Accumulator> = parts
            .iter()
            .map(|(_, kind, _, data_type)| accumulator_for(*kind, *data_type))
            .collect();
        for (_, args) in &rows[start..end] {
            for (accumulator, value) in accumulators.iter_mut().zip(args.iter()) {
                accumulator.update(value);
            }
        }

        let mut out = rows[start].0.clone();
        for accumulator in accumulators {
            out.push(accumulator.finish()?);
        }
        output_rows.push(out);
        start = end;
    }

    let mut result = Frame::new();
    for (index, key) in keys.iter().enumerate() {
        let mut column = Column::empty(column_of(base, key)?.data_type());
        for row in &output_rows {
            column.push(row[index].clone())?;
        }
        result.push_column(key.clone(), column)?;
    }
    for (offset, (name, kind, _, data_type)) in parts.iter().enumerate() {
        let mut column = Column::empty(reduced_data_type(*kind, *data_type));
        for row in &output_rows {
            column.push(row[keys.len() + offset].clone())?;
        }
        result.push_column(name.to_string(), column)?;
    }
    Ok(result)
}

/// The reducer and field name behind a named aggregate
fn aggregate_parts(aggregate: &Expr) -> Result<(Reducer, &str), ComputeError> {
    if let Expr::Reduce { kind, input } = aggregate {
        if let Expr::Field { name, .. } = input.as_ref() {
            return Ok((*kind, name));
        }
    }
    Err(evaluation(format!(
        "aggregate '{}' over a derived column",
        aggregate
    )))
}

fn accumulator_for(kind: Reducer, data_type: DataType) -> Accumulator {
    match kind {
        Reducer::Mean => Accumulator::Avg {
            total: 0.0,
            count: 0,
        },
        Reducer::Sum => Accumulator::Sum {
            total: 0.0,
            int: data_type == DataType::Int,
        },
        Reducer::Min => Accumulator::Min(None),
        Reducer::Max => Accumulator::Max(None),
        Reducer::Count | Reducer::Nrows => Accumulator::Count(0),
        Reducer::CountDistinct => Accumulator::Distinct(Vec::new()),
    }
}

fn reduced_data_type(kind: Reducer, data_type: DataType) -> DataType {
    match kind {
        Reducer::Mean => DataType::Float,
        Reducer::Sum => match data_type {
            DataType::Int => DataType::Int,
            _ => DataType::Float,
        },
        Reducer::Min | Reducer::Max => data_type,
        Reducer::Count | Reducer::CountDistinct | Reducer::Nrows => DataType::Int,
    }
}

/// One mask entry per base row
fn predicate_mask(predicate: &Expr, base: &Frame) -> Result<Vec<bool>, ComputeError> {
    let mut mask = Vec::with_capacity(base.len());
    for row in 0..base.len() {
        match eval_operand(predicate, base, row)? {
            Value::Bool(keep) => mask.push(keep),
            _ => return Err(evaluation(format!("non-boolean predicate '{}'", predicate))),
        }
    }
    Ok(mask)
}

/// Evaluates a column or scalar expression at one row of `base`; field
/// names resolve against the frame being scanned, as in the engine
fn eval_operand(expr: &Expr, base: &Frame, row: usize) -> Result<Value, ComputeError> {
    match expr {
        Expr::Field { name, .. } => column_value(base, name, row),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Binary { op, left, right } => {
            let left = eval_operand(left, base, row)?;
            let right = eval_operand(right, base, row)?;
            apply_binary(*op, &left, &right, expr)
        }
        Expr::Reduce { .. } => match eval(expr, base)? {
            Evaluated::Scalar(value) => Ok(value),
            _ => Err(evaluation(format!("'{}' inside a row expression", expr))),
        },
        other => Err(evaluation(format!("'{}' inside a row expression", other))),
    }
}

fn apply_binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    expr: &Expr,
) -> Result<Value, ComputeError> {
    if let Some(op) = compare_op(op) {
        return Ok(Value::Bool(compare_values(left, op, right)));
    }
    if op.is_logic() {
        return match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
                BinaryOp::And => *a && *b,
                _ => *a || *b,
            })),
            _ => Err(evaluation(format!("'{}' over non-boolean values", expr))),
        };
    }
    // Arithmetic runs in double precision, matching the engine
    let (a, b) = match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(evaluation(format!(
                "'{}' over non-numeric values",
                expr
            )))
        }
    };
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => return Err(evaluation(format!("'{}' has no value form", expr))),
    };
    Ok(Value::Float(value))
}

fn compare_op(op: BinaryOp) -> Option<CompareOp> {
    match op {
        BinaryOp::Eq => Some(CompareOp::Eq),
        BinaryOp::Neq => Some(CompareOp::Neq),
        BinaryOp::Gt => Some(CompareOp::Gt),
        BinaryOp::Lt => Some(CompareOp::Lt),
        BinaryOp::Gte => Some(CompareOp::Gte),
        BinaryOp::Lte => Some(CompareOp::Lte),
        _ => None,
    }
}

/// The tabular context of a computed column: the first field's input
fn binary_context(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Field { input, .. } => Some(input),
        Expr::Binary { left, right, .. } => {
            binary_context(left).or_else(|| binary_context(right))
        }
        _ => None,
    }
}

fn column_of<'a>(frame: &'a Frame, name: &str) -> Result<&'a Column, ComputeError> {
    frame
        .column(name)
        .ok_or_else(|| ComputeError::Frame(FrameError::UnknownColumn(name.to_string())))
}

fn column_value(frame: &Frame, name: &str, row: usize) -> Result<Value, ComputeError> {
    column_of(frame, name)?
        .value(row)
        .ok_or(ComputeError::Column(ColumnError::IndexOutOfBounds(row)))
}

fn evaluation(what: impl Into<String>) -> ComputeError {
    ComputeError::Evaluation(what.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::scope::bind_frame;

    fn trades() -> Frame {
        Frame::from_columns(vec![
            (
                "sym".to_string(),
                Column::Sym(vec![
                    "AAPL".to_string(),
                    "MSFT".to_string(),
                    "AAPL".to_string(),
                    "IBM".to_string(),
                    "MSFT".to_string(),
                ]),
            ),
            (
                "price".to_string(),
                Column::Float(vec![10.0, 20.0, 30.0, 40.0, 60.0]),
            ),
            ("size".to_string(), Column::Int(vec![1, 2, 3, 4, 5])),
        ])
        .unwrap()
    }

    fn trade() -> Expr {
        bind_frame("trade", trades())
    }

    fn run(expr: &Expr) -> Output {
        evaluate(expr, &trades()).unwrap()
    }

    #[test]
    fn test_projection_and_field() {
        let trade = trade();

        let projected = run(&trade.project(&["price", "sym"]).unwrap());
        let frame = projected.into_frame().unwrap();
        assert_eq!(frame.names(), vec!["price", "sym"]);
        assert_eq!(frame.len(), 5);

        let series = run(&trade.field("price").unwrap()).into_series().unwrap();
        assert_eq!(series.name(), "price");
        assert_eq!(series.len(), 5);
    }

    #[test]
    fn test_selection_masks_rows() {
        let trade = trade();
        let sym = trade.field("sym").unwrap();
        let price = trade.field("price").unwrap();

        let picked = run(&trade.filter(sym.eq("AAPL").unwrap()).unwrap());
        let frame = picked.into_frame().unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.column("price").unwrap(),
            &Column::Float(vec![10.0, 30.0])
        );

        // Compound predicates and field-to-field comparison
        let both = sym
            .eq("MSFT")
            .unwrap()
            .and(price.gt(30i64).unwrap())
            .unwrap();
        let frame = run(&trade.filter(both).unwrap()).into_frame().unwrap();
        assert_eq!(frame.column("size").unwrap(), &Column::Int(vec![5]));
    }

    #[test]
    fn test_head_of_tables_and_columns() {
        let trade = trade();

        let frame = run(&trade.head(2).unwrap()).into_frame().unwrap();
        assert_eq!(frame.len(), 2);

        let series = run(&trade.field("price").unwrap().head(3).unwrap())
            .into_series()
            .unwrap();
        assert_eq!(series.data(), &Column::Float(vec![10.0, 20.0, 30.0]));
    }

    #[test]
    fn test_arithmetic_columns() {
        let trade = trade();
        let scaled = trade
            .field("price")
            .unwrap()
            .add(1i64)
            .unwrap()
            .mul(2i64)
            .unwrap();

        let series = run(&scaled).into_series().unwrap();
        assert_eq!(series.name(), "expr");
        assert_eq!(
            series.data(),
            &Column::Float(vec![22.0, 42.0, 62.0, 82.0, 122.0])
        );
    }

    #[test]
    fn test_reductions() {
        let trade = trade();
        let price = trade.field("price").unwrap();

        assert_eq!(run(&price.mean().unwrap()), Output::Scalar(Value::Float(32.0)));
        assert_eq!(
            run(&trade.field("size").unwrap().sum().unwrap()),
            Output::Scalar(Value::Int(15))
        );
        assert_eq!(
            run(&trade.field("sym").unwrap().nunique().unwrap()),
            Output::Scalar(Value::Int(3))
        );
        assert_eq!(run(&trade.nrows().unwrap()), Output::Scalar(Value::Int(5)));
        assert_eq!(
            run(&trade.field("sym").unwrap().nrows().unwrap()),
            Output::Scalar(Value::Int(5))
        );

        // Reductions follow row narrowing
        assert_eq!(
            run(&price.head(2).unwrap().mean().unwrap()),
            Output::Scalar(Value::Float(15.0))
        );
    }

    #[test]
    fn test_by_groups_in_key_order() {
        let trade = trade();
        let grouped = trade
            .by(
                &["sym"],
                vec![
                    ("w", trade.field("price").unwrap().mean().unwrap()),
                    ("n", trade.field("size").unwrap().count().unwrap()),
                ],
            )
            .unwrap();

        let frame = run(&grouped).into_frame().unwrap();
        assert_eq!(frame.names(), vec!["sym", "w", "n"]);
        assert_eq!(
            frame.column("sym").unwrap(),
            &Column::Sym(vec![
                "AAPL".to_string(),
                "IBM".to_string(),
                "MSFT".to_string()
            ])
        );
        assert_eq!(
            frame.column("w").unwrap(),
            &Column::Float(vec![20.0, 40.0, 40.0])
        );
        assert_eq!(frame.column("n").unwrap(), &Column::Int(vec![2, 1, 2]));
    }

    #[test]
    fn test_mean_of_no_rows_fails() {
        let trade = trade();
        let none = trade
            .filter(trade.field("sym").unwrap().eq("TSLA").unwrap())
            .unwrap();
        // The selection leaves zero rows, so the average has no value
        let empty_mean = none.field("price").unwrap().mean().unwrap();
        assert!(matches!(
            evaluate(&empty_mean, &trades()),
            Err(ComputeError::Execution(_))
        ));
    }
}
