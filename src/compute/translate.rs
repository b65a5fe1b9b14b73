//! Lowering of expression graphs into query text.
//!
//! Each tabular operator folds into one clause of a single query, so an
//! expression translates iff its operators compose the way the query
//! language reads: filters before limits, one level of grouping, field
//! comparisons against literals. Anything else is reported as
//! [`ComputeError::Untranslatable`] rather than lowered to text the
//! engine would misread.

use crate::compute::ComputeError;
use crate::expr::{BinaryOp, Expr, Reducer};
use crate::store::Value;

/// Renders an expression as query text for [`crate::query::Session`]
pub fn translate(expr: &Expr) -> Result<String, ComputeError> {
    Ok(clauses(expr)?.render())
}

/// The clauses of the query under construction
#[derive(Debug, Default)]
struct Clauses {
    from: String,
    select: Option<String>,
    filter: Option<String>,
    group: Option<String>,
    limit: Option<usize>,
}

impl Clauses {
    fn render(self) -> String {
        let mut text = format!(
            "select {} from {}",
            self.select.as_deref().unwrap_or("*"),
            self.from
        );
        if let Some(filter) = &self.filter {
            text.push_str(&format!(" where {}", filter));
        }
        if let Some(group) = &self.group {
            text.push_str(&format!(" group by {}", group));
        }
        if let Some(limit) = self.limit {
            text.push_str(&format!(" limit {}", limit));
        }
        text
    }
}

fn clauses(expr: &Expr) -> Result<Clauses, ComputeError> {
    match expr {
        Expr::Table(table) => Ok(Clauses {
            from: table.name.clone(),
            ..Clauses::default()
        }),
        Expr::Projection { input, columns } => {
            let mut inner = clauses(input)?;
            if inner.group.is_some() {
                return Err(untranslatable("a projection of grouped results"));
            }
            inner.select = Some(columns.join(", "));
            Ok(inner)
        }
        Expr::Selection { input, predicate } => {
            let mut inner = clauses(input)?;
            // A filter after head would run before the limit once lowered
            if inner.limit.is_some() {
                return Err(untranslatable("a filter applied after head"));
            }
            if inner.group.is_some() {
                return Err(untranslatable("a filter of grouped results"));
            }
            let rendered = predicate_text(predicate)?;
            inner.filter = Some(match inner.filter {
                Some(existing) => format!("({}) and ({})", existing, rendered),
                None => rendered,
            });
            Ok(inner)
        }
        Expr::Field { input, name } => {
            let mut inner = clauses(input)?;
            if inner.group.is_some() {
                return Err(untranslatable("a field of grouped results"));
            }
            inner.select = Some(name.clone());
            Ok(inner)
        }
        Expr::Head { input, n } => {
            let mut inner = clauses(input)?;
            inner.limit = Some(inner.limit.map_or(*n, |limit| limit.min(*n)));
            Ok(inner)
        }
        Expr::By {
            input,
            keys,
            aggregates,
        } => {
            let mut inner = clauses(input)?;
            if inner.limit.is_some() {
                return Err(untranslatable("grouping applied after head"));
            }
            if inner.group.is_some() {
                return Err(untranslatable("nested grouping"));
            }
            let mut select = keys.clone();
            for (name, aggregate) in aggregates {
                select.push(format!("{} as {}", reduce_text(aggregate)?, name));
            }
            inner.select = Some(select.join(", "));
            inner.group = Some(keys.join(", "));
            Ok(inner)
        }
        Expr::Reduce { kind, input } => {
            if let Expr::Field { input: table, name } = input.as_ref() {
                let mut inner = clauses(table)?;
                if inner.group.is_some() {
                    return Err(untranslatable("a reduction of grouped results"));
                }
                // Aggregates run before the window once lowered
                if inner.limit.is_some() {
                    return Err(untranslatable("a reduction of a limited table"));
                }
                inner.select = Some(reduce_call(*kind, name));
                return Ok(inner);
            }
            if *kind == Reducer::Nrows {
                let mut inner = clauses(input)?;
                if inner.group.is_some() {
                    return Err(untranslatable("a row count of grouped results"));
                }
                if inner.limit.is_some() {
                    return Err(untranslatable("a row count of a limited table"));
                }
                inner.select = Some("count(*)".to_string());
                return Ok(inner);
            }
            Err(untranslatable("a reduction of a computed expression"))
        }
        Expr::Binary { op, .. } => {
            if op.is_comparison() || op.is_logic() {
                return Err(untranslatable("a boolean column on its own"));
            }
            let mut inner = column_clauses(expr)?;
            if inner.group.is_some() {
                return Err(untranslatable("arithmetic over grouped results"));
            }
            inner.select = Some(scalar_text(expr)?);
            Ok(inner)
        }
        Expr::Literal(_) => Err(untranslatable("a bare literal")),
    }
}

/// The tabular context an arithmetic column reads from; the first field
/// reached decides
fn column_clauses(expr: &Expr) -> Result<Clauses, ComputeError> {
    match expr {
        Expr::Field { input, .. } => clauses(input),
        Expr::Binary { left, right, .. } => {
            if contains_field(left) {
                column_clauses(left)
            } else {
                column_clauses(right)
            }
        }
        other => Err(untranslatable(&format!("'{}' detached from a table", other))),
    }
}

fn contains_field(expr: &Expr) -> bool {
    match expr {
        Expr::Field { .. } => true,
        Expr::Binary { left, right, .. } => contains_field(left) || contains_field(right),
        _ => false,
    }
}

fn predicate_text(expr: &Expr) -> Result<String, ComputeError> {
    if let Expr::Binary { op, left, right } = expr {
        let rendered = match op {
            BinaryOp::And => format!(
                "({}) and ({})",
                predicate_text(left)?,
                predicate_text(right)?
            ),
            BinaryOp::Or => format!(
                "({}) or ({})",
                predicate_text(left)?,
                predicate_text(right)?
            ),
            BinaryOp::Eq => comparison_text(left, "=", right)?,
            BinaryOp::Neq => comparison_text(left, "!=", right)?,
            BinaryOp::Gt => comparison_text(left, ">", right)?,
            BinaryOp::Lt => comparison_text(left, "<", right)?,
            BinaryOp::Gte => comparison_text(left, ">=", right)?,
            BinaryOp::Lte => comparison_text(left, "<=", right)?,
            _ => return Err(untranslatable(&format!("predicate '{}'", expr))),
        };
        return Ok(rendered);
    }
    Err(untranslatable(&format!("predicate '{}'", expr)))
}

/// Filters compare a bare field against a literal; anything richer has
/// no query form
fn comparison_text(left: &Expr, op: &str, right: &Expr) -> Result<String, ComputeError> {
    let field = match left {
        Expr::Field { name, .. } => name.clone(),
        other => return Err(untranslatable(&format!("comparing '{}'", other))),
    };
    let literal = match right {
        Expr::Literal(value) => literal_text(value)?,
        other => return Err(untranslatable(&format!("comparing against '{}'", other))),
    };
    Ok(format!("{} {} {}", field, op, literal))
}

fn scalar_text(expr: &Expr) -> Result<String, ComputeError> {
    match expr {
        Expr::Field { name, .. } => Ok(name.clone()),
        Expr::Literal(value) => literal_text(value),
        Expr::Binary { op, left, right } if !op.is_comparison() && !op.is_logic() => Ok(format!(
            "({} {} {})",
            scalar_text(left)?,
            op,
            scalar_text(right)?
        )),
        other => Err(untranslatable(&format!("'{}' in arithmetic", other))),
    }
}

fn literal_text(value: &Value) -> Result<String, ComputeError> {
    match value {
        Value::Sym(s) => Ok(format!("'{}'", s)),
        Value::Time(_) => Err(untranslatable("a time literal")),
        other => Ok(other.to_string()),
    }
}

fn reduce_call(kind: Reducer, operand: &str) -> String {
    match kind {
        Reducer::Mean => format!("avg({})", operand),
        Reducer::Sum => format!("sum({})", operand),
        Reducer::Min => format!("min({})", operand),
        Reducer::Max => format!("max({})", operand),
        Reducer::Count | Reducer::Nrows => format!("count({})", operand),
        Reducer::CountDistinct => format!("count(distinct({}))", operand),
    }
}

/// One aggregate inside a grouping: a reduction of a bare field
fn reduce_text(aggregate: &Expr) -> Result<String, ComputeError> {
    if let Expr::Reduce { kind, input } = aggregate {
        if let Expr::Field { name, .. } = input.as_ref() {
            return Ok(reduce_call(*kind, name));
        }
    }
    Err(untranslatable(&format!("aggregate '{}'", aggregate)))
}

fn untranslatable(what: &str) -> ComputeError {
    ComputeError::Untranslatable(what.to_string())
}
