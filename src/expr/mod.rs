//! Symbolic expressions over tables.
//!
//! An [`Expr`] describes a projection, selection, grouping or reduction
//! without evaluating it. Construction checks names and types against
//! the table schema, so a well-formed expression is known to refer to
//! real columns before anything touches data. Evaluation lives in
//! [`crate::compute`].

pub mod scope;

use std::fmt;

use thiserror::Error;

use crate::expr::scope::TableSource;
use crate::store::{DataType, TableSchema, Value};

#[derive(Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Expected a table expression, got a {0} expression")]
    NotTabular(Shape),
    #[error("Expected a column expression, got a {0} expression")]
    NotColumn(Shape),
    #[error("Filter predicates must be boolean: {0}")]
    NotBoolean(String),
    #[error("'{expr}' has type {data_type}, a numeric operand is required")]
    NotNumeric { expr: String, data_type: DataType },
    #[error("Cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },
    #[error("Expressions are rooted at different tables: {0} and {1}")]
    MixedRoots(String, String),
    #[error("Aggregate '{0}' must be a reduction such as mean or sum")]
    NotReduction(String),
    #[error("Duplicate output column: {0}")]
    DuplicateName(String),
}

/// What an expression evaluates to: a whole table, one column, or one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Tabular,
    Column,
    Scalar,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tabular => write!(f, "tabular"),
            Self::Column => write!(f, "column"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::Gt | Self::Lt | Self::Gte | Self::Lte
        )
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::And => "&",
            Self::Or => "|",
        };
        write!(f, "{}", symbol)
    }
}

/// A column reduction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reducer {
    Mean,
    Sum,
    Min,
    Max,
    Count,
    CountDistinct,
    Nrows,
}

impl Reducer {
    fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
            Self::CountDistinct => "nunique",
            Self::Nrows => "nrows",
        }
    }
}

/// A named table leaf, optionally bound to a data source
#[derive(Debug, Clone)]
pub struct TableRef {
    pub name: String,
    pub schema: TableSchema,
    pub source: Option<TableSource>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Table(TableRef),
    Projection {
        input: Box<Expr>,
        columns: Vec<String>,
    },
    Selection {
        input: Box<Expr>,
        predicate: Box<Expr>,
    },
    Field {
        input: Box<Expr>,
        name: String,
    },
    Head {
        input: Box<Expr>,
        n: usize,
    },
    By {
        input: Box<Expr>,
        keys: Vec<String>,
        aggregates: Vec<(String, Expr)>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Reduce {
        kind: Reducer,
        input: Box<Expr>,
    },
    Literal(Value),
}

impl Expr {
    /// An unbound table leaf; sources attach through [`scope`]
    pub fn table(name: impl Into<String>, schema: TableSchema) -> Self {
        Self::Table(TableRef {
            name: name.into(),
            schema,
            source: None,
        })
    }

    pub fn literal(value: Value) -> Self {
        Self::Literal(value)
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Table(_)
            | Self::Projection { .. }
            | Self::Selection { .. }
            | Self::By { .. } => Shape::Tabular,
            Self::Head { input, .. } => input.shape(),
            Self::Field { .. } => Shape::Column,
            Self::Reduce { .. } | Self::Literal(_) => Shape::Scalar,
            Self::Binary { left, right, .. } => {
                if left.shape() == Shape::Scalar && right.shape() == Shape::Scalar {
                    Shape::Scalar
                } else {
                    Shape::Column
                }
            }
        }
    }

    /// The schema a tabular expression evaluates to
    pub fn schema(&self) -> Option<TableSchema> {
        match self {
            Self::Table(table) => Some(table.schema.clone()),
            Self::Projection { input, columns } => {
                let schema = input.schema()?;
                let fields = columns
                    .iter()
                    .map(|name| Some((name.clone(), schema.data_type(name)?)))
                    .collect::<Option<Vec<_>>>()?;
                Some(TableSchema::new(fields))
            }
            Self::Selection { input, .. } | Self::Head { input, .. } => input.schema(),
            Self::By {
                input,
                keys,
                aggregates,
            } => {
                let schema = input.schema()?;
                let mut fields = Vec::with_capacity(keys.len() + aggregates.len());
                for key in keys {
                    fields.push((key.clone(), schema.data_type(key)?));
                }
                for (name, aggregate) in aggregates {
                    fields.push((name.clone(), aggregate.data_type()?));
                }
                Some(TableSchema::new(fields))
            }
            _ => None,
        }
    }

    /// The type a column or scalar expression evaluates to
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Field { input, name } => input.schema()?.data_type(name),
            Self::Head { input, .. } => input.data_type(),
            Self::Literal(value) => Some(value.data_type()),
            Self::Binary { op, .. } => {
                if op.is_comparison() || op.is_logic() {
                    Some(DataType::Bool)
                } else {
                    Some(DataType::Float)
                }
            }
            Self::Reduce { kind, input } => Some(match kind {
                Reducer::Mean => DataType::Float,
                Reducer::Sum => match input.data_type() {
                    Some(DataType::Int) => DataType::Int,
                    _ => DataType::Float,
                },
                Reducer::Min | Reducer::Max => input.data_type()?,
                Reducer::Count | Reducer::CountDistinct | Reducer::Nrows => DataType::Int,
            }),
            _ => None,
        }
    }

    /// The table leaf this expression descends from
    pub fn root(&self) -> Option<&TableRef> {
        match self {
            Self::Table(table) => Some(table),
            Self::Projection { input, .. }
            | Self::Selection { input, .. }
            | Self::Field { input, .. }
            | Self::Head { input, .. }
            | Self::By { input, .. }
            | Self::Reduce { input, .. } => input.root(),
            Self::Binary { left, right, .. } => left.root().or_else(|| right.root()),
            Self::Literal(_) => None,
        }
    }

    pub fn project(&self, columns: &[&str]) -> Result<Self, ExprError> {
        let schema = self.tabular_schema()?;
        for &name in columns {
            if !schema.contains(name) {
                return Err(ExprError::UnknownField(name.to_string()));
            }
        }
        Ok(Self::Projection {
            input: Box::new(self.clone()),
            columns: columns.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn field(&self, name: &str) -> Result<Self, ExprError> {
        let schema = self.tabular_schema()?;
        if !schema.contains(name) {
            return Err(ExprError::UnknownField(name.to_string()));
        }
        Ok(Self::Field {
            input: Box::new(self.clone()),
            name: name.to_string(),
        })
    }

    pub fn filter(&self, predicate: Expr) -> Result<Self, ExprError> {
        self.tabular_schema()?;
        same_root(self, &predicate)?;
        if predicate.shape() != Shape::Column || predicate.data_type() != Some(DataType::Bool) {
            return Err(ExprError::NotBoolean(predicate.to_string()));
        }
        Ok(Self::Selection {
            input: Box::new(self.clone()),
            predicate: Box::new(predicate),
        })
    }

    /// The first `n` rows of a table or column
    pub fn head(&self, n: usize) -> Result<Self, ExprError> {
        if self.shape() == Shape::Scalar {
            return Err(ExprError::NotTabular(Shape::Scalar));
        }
        Ok(Self::Head {
            input: Box::new(self.clone()),
            n,
        })
    }

    /// The number of rows in a tabular or column expression
    pub fn nrows(&self) -> Result<Self, ExprError> {
        if self.shape() == Shape::Scalar {
            return Err(ExprError::NotTabular(Shape::Scalar));
        }
        Ok(Self::Reduce {
            kind: Reducer::Nrows,
            input: Box::new(self.clone()),
        })
    }

    /// Groups by key columns, reducing each named aggregate per group
    pub fn by(&self, keys: &[&str], aggregates: Vec<(&str, Expr)>) -> Result<Self, ExprError> {
        let schema = self.tabular_schema()?;
        for &key in keys {
            if !schema.contains(key) {
                return Err(ExprError::UnknownField(key.to_string()));
            }
        }

        let mut named = Vec::with_capacity(aggregates.len());
        for (name, aggregate) in aggregates {
            same_root(self, &aggregate)?;
            match &aggregate {
                Expr::Reduce { kind, .. } if *kind != Reducer::Nrows => {}
                _ => return Err(ExprError::NotReduction(aggregate.to_string())),
            }
            if keys.contains(&name) || named.iter().any(|(n, _)| n == name) {
                return Err(ExprError::DuplicateName(name.to_string()));
            }
            named.push((name.to_string(), aggregate));
        }

        Ok(Self::By {
            input: Box::new(self.clone()),
            keys: keys.iter().map(|s| s.to_string()).collect(),
            aggregates: named,
        })
    }

    pub fn mean(&self) -> Result<Self, ExprError> {
        numeric_operand(self)?;
        self.reduce(Reducer::Mean)
    }

    pub fn sum(&self) -> Result<Self, ExprError> {
        numeric_operand(self)?;
        self.reduce(Reducer::Sum)
    }

    pub fn min(&self) -> Result<Self, ExprError> {
        self.reduce(Reducer::Min)
    }

    pub fn max(&self) -> Result<Self, ExprError> {
        self.reduce(Reducer::Max)
    }

    pub fn count(&self) -> Result<Self, ExprError> {
        self.reduce(Reducer::Count)
    }

    /// The number of distinct values in a column
    pub fn nunique(&self) -> Result<Self, ExprError> {
        self.reduce(Reducer::CountDistinct)
    }

    fn reduce(&self, kind: Reducer) -> Result<Self, ExprError> {
        if self.shape() != Shape::Column {
            return Err(ExprError::NotColumn(self.shape()));
        }
        Ok(Self::Reduce {
            kind,
            input: Box::new(self.clone()),
        })
    }

    pub fn add(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_arith(BinaryOp::Add, other.into())
    }

    pub fn sub(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_arith(BinaryOp::Sub, other.into())
    }

    pub fn mul(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_arith(BinaryOp::Mul, other.into())
    }

    pub fn div(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_arith(BinaryOp::Div, other.into())
    }

    pub fn eq(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_compare(BinaryOp::Eq, other.into())
    }

    pub fn neq(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_compare(BinaryOp::Neq, other.into())
    }

    pub fn gt(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_compare(BinaryOp::Gt, other.into())
    }

    pub fn lt(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_compare(BinaryOp::Lt, other.into())
    }

    pub fn gte(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_compare(BinaryOp::Gte, other.into())
    }

    pub fn lte(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_compare(BinaryOp::Lte, other.into())
    }

    pub fn and(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_logic(BinaryOp::And, other.into())
    }

    pub fn or(&self, other: impl Into<Expr>) -> Result<Self, ExprError> {
        self.binary_logic(BinaryOp::Or, other.into())
    }

    fn binary_arith(&self, op: BinaryOp, other: Expr) -> Result<Self, ExprError> {
        numeric_operand(self)?;
        numeric_operand(&other)?;
        same_root(self, &other)?;
        Ok(Self::Binary {
            op,
            left: Box::new(self.clone()),
            right: Box::new(other),
        })
    }

    fn binary_compare(&self, op: BinaryOp, other: Expr) -> Result<Self, ExprError> {
        if self.shape() != Shape::Column {
            return Err(ExprError::NotColumn(self.shape()));
        }
        same_root(self, &other)?;
        let left = self.data_type().ok_or(ExprError::NotColumn(self.shape()))?;
        let right = other
            .data_type()
            .ok_or(ExprError::NotColumn(other.shape()))?;
        if !comparable(left, right) {
            return Err(ExprError::Incomparable {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        Ok(Self::Binary {
            op,
            left: Box::new(self.clone()),
            right: Box::new(other),
        })
    }

    fn binary_logic(&self, op: BinaryOp, other: Expr) -> Result<Self, ExprError> {
        for operand in [self, &other] {
            if operand.data_type() != Some(DataType::Bool) {
                return Err(ExprError::NotBoolean(operand.to_string()));
            }
        }
        same_root(self, &other)?;
        Ok(Self::Binary {
            op,
            left: Box::new(self.clone()),
            right: Box::new(other),
        })
    }

    fn tabular_schema(&self) -> Result<TableSchema, ExprError> {
        self.schema().ok_or(ExprError::NotTabular(self.shape()))
    }
}

fn numeric_operand(expr: &Expr) -> Result<(), ExprError> {
    if expr.shape() == Shape::Tabular {
        return Err(ExprError::NotColumn(Shape::Tabular));
    }
    match expr.data_type() {
        Some(DataType::Int) | Some(DataType::Float) => Ok(()),
        Some(data_type) => Err(ExprError::NotNumeric {
            expr: expr.to_string(),
            data_type,
        }),
        None => Err(ExprError::NotColumn(expr.shape())),
    }
}

fn same_root(a: &Expr, b: &Expr) -> Result<(), ExprError> {
    if let (Some(left), Some(right)) = (a.root(), b.root()) {
        if left.name != right.name {
            return Err(ExprError::MixedRoots(
                left.name.clone(),
                right.name.clone(),
            ));
        }
    }
    Ok(())
}

fn comparable(left: DataType, right: DataType) -> bool {
    use DataType::*;
    matches!(
        (left, right),
        (Sym, Sym)
            | (Date, Date)
            | (Bool, Bool)
            | (Int, Int)
            | (Int, Float)
            | (Float, Int)
            | (Float, Float)
    )
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::Literal(Value::Int(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Literal(Value::Float(value))
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::Literal(Value::Sym(value.to_string()))
    }
}

impl From<chrono::NaiveDate> for Expr {
    fn from(value: chrono::NaiveDate) -> Self {
        Self::Literal(Value::Date(value))
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Self::Literal(Value::Bool(value))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(table) => {
                if table.source.is_some() {
                    write!(f, "{}{{{}}}", table.name, table.schema.names().join(", "))
                } else {
                    write!(f, "{}", table.name)
                }
            }
            Self::Projection { input, columns } => {
                let quoted: Vec<String> = columns.iter().map(|c| format!("'{}'", c)).collect();
                write!(f, "{}[[{}]]", input, quoted.join(", "))
            }
            Self::Selection { input, predicate } => write!(f, "{}[{}]", input, predicate),
            Self::Field { input, name } => write!(f, "{}.{}", input, name),
            Self::Head { input, n } => write!(f, "{}.head({})", input, n),
            Self::By {
                input,
                keys,
                aggregates,
            } => {
                write!(f, "by(")?;
                if keys.len() == 1 {
                    write!(f, "{}.{}", input, keys[0])?;
                } else {
                    let rendered: Vec<String> =
                        keys.iter().map(|k| format!("{}.{}", input, k)).collect();
                    write!(f, "[{}]", rendered.join(", "))?;
                }
                for (name, aggregate) in aggregates {
                    write!(f, ", {}={}", name, aggregate)?;
                }
                write!(f, ")")
            }
            Self::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Self::Reduce { kind, input } => match kind {
                Reducer::Nrows => write!(f, "{}.nrows", input),
                _ => write!(f, "{}.{}()", input, kind.name()),
            },
            Self::Literal(value) => match value {
                Value::Sym(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade() -> Expr {
        Expr::table(
            "trade",
            TableSchema::new(vec![
                ("date".to_string(), DataType::Date),
                ("sym".to_string(), DataType::Sym),
                ("time".to_string(), DataType::Time),
                ("price".to_string(), DataType::Float),
                ("size".to_string(), DataType::Int),
            ]),
        )
    }

    #[test]
    fn test_field_and_projection_checks() {
        let trade = trade();

        let price = trade.field("price").unwrap();
        assert_eq!(price.shape(), Shape::Column);
        assert_eq!(price.data_type(), Some(DataType::Float));

        assert_eq!(
            trade.field("notional").unwrap_err(),
            ExprError::UnknownField("notional".to_string())
        );

        let projected = trade.project(&["price", "sym"]).unwrap();
        assert_eq!(projected.shape(), Shape::Tabular);
        assert_eq!(
            projected.schema().unwrap().names(),
            vec!["price".to_string(), "sym".to_string()]
        );

        // A column cannot be projected further
        assert_eq!(
            price.project(&["price"]).unwrap_err(),
            ExprError::NotTabular(Shape::Column)
        );

        // head narrows a column as well as a table
        let top = price.head(5).unwrap();
        assert_eq!(top.shape(), Shape::Column);
        assert_eq!(top.data_type(), Some(DataType::Float));
        assert_eq!(
            price.mean().unwrap().head(3).unwrap_err(),
            ExprError::NotTabular(Shape::Scalar)
        );
    }

    #[test]
    fn test_comparisons_type_check() {
        let trade = trade();
        let sym = trade.field("sym").unwrap();
        let price = trade.field("price").unwrap();

        let predicate = sym.eq("AAPL").unwrap();
        assert_eq!(predicate.shape(), Shape::Column);
        assert_eq!(predicate.data_type(), Some(DataType::Bool));

        assert!(matches!(
            sym.eq(5i64),
            Err(ExprError::Incomparable { .. })
        ));

        // Ints compare against float columns
        assert!(price.gt(100i64).is_ok());

        let filtered = trade.filter(predicate).unwrap();
        assert_eq!(filtered.shape(), Shape::Tabular);
        assert_eq!(filtered.schema(), trade.schema());

        // A non-boolean expression cannot filter
        assert!(matches!(
            trade.filter(price.add(1i64).unwrap()),
            Err(ExprError::NotBoolean(_))
        ));
    }

    #[test]
    fn test_arithmetic_type_checks() {
        let trade = trade();
        let price = trade.field("price").unwrap();
        let sym = trade.field("sym").unwrap();

        let scaled = price.add(1i64).unwrap().mul(2i64).unwrap();
        assert_eq!(scaled.shape(), Shape::Column);
        assert_eq!(scaled.data_type(), Some(DataType::Float));

        assert_eq!(
            sym.add(1i64).unwrap_err(),
            ExprError::NotNumeric {
                expr: "trade.sym".to_string(),
                data_type: DataType::Sym,
            }
        );
    }

    #[test]
    fn test_reductions() {
        let trade = trade();
        let price = trade.field("price").unwrap();
        let sym = trade.field("sym").unwrap();

        assert_eq!(price.mean().unwrap().shape(), Shape::Scalar);
        assert_eq!(price.mean().unwrap().data_type(), Some(DataType::Float));
        assert_eq!(
            trade.field("size").unwrap().sum().unwrap().data_type(),
            Some(DataType::Int)
        );
        assert_eq!(sym.nunique().unwrap().data_type(), Some(DataType::Int));
        assert_eq!(trade.nrows().unwrap().shape(), Shape::Scalar);

        // Row counts apply to single columns too
        let field_rows = trade.field("date").unwrap().nrows().unwrap();
        assert_eq!(field_rows.shape(), Shape::Scalar);
        assert_eq!(field_rows.data_type(), Some(DataType::Int));

        // mean over symbols is ill-typed
        assert!(matches!(sym.mean(), Err(ExprError::NotNumeric { .. })));
    }

    #[test]
    fn test_by_construction() {
        let trade = trade();
        let mean = trade.field("price").unwrap().mean().unwrap();

        let grouped = trade.by(&["sym"], vec![("w", mean.clone())]).unwrap();
        assert_eq!(grouped.shape(), Shape::Tabular);
        assert_eq!(
            grouped.schema().unwrap().fields(),
            &[
                ("sym".to_string(), DataType::Sym),
                ("w".to_string(), DataType::Float),
            ]
        );

        // The aggregate must be a reduction
        let price = trade.field("price").unwrap();
        assert!(matches!(
            trade.by(&["sym"], vec![("w", price)]),
            Err(ExprError::NotReduction(_))
        ));

        // Output names cannot collide with keys
        assert_eq!(
            trade.by(&["sym"], vec![("sym", mean)]).unwrap_err(),
            ExprError::DuplicateName("sym".to_string())
        );
    }

    #[test]
    fn test_mixed_roots_rejected() {
        let trade = trade();
        let quote = Expr::table(
            "quote",
            TableSchema::new(vec![("bid".to_string(), DataType::Float)]),
        );

        let result = trade
            .field("price")
            .unwrap()
            .add(quote.field("bid").unwrap());
        assert_eq!(
            result.unwrap_err(),
            ExprError::MixedRoots("trade".to_string(), "quote".to_string())
        );
    }

    #[test]
    fn test_display_repr() {
        let trade = trade();

        assert_eq!(format!("{}", trade), "trade");
        assert_eq!(
            format!("{}", trade.project(&["price", "sym"]).unwrap()),
            "trade[['price', 'sym']]"
        );
        assert_eq!(
            format!(
                "{}",
                trade
                    .filter(trade.field("sym").unwrap().eq("AAPL").unwrap())
                    .unwrap()
            ),
            "trade[(trade.sym == 'AAPL')]"
        );
        assert_eq!(format!("{}", trade.head(10).unwrap()), "trade.head(10)");
        assert_eq!(
            format!("{}", trade.field("price").unwrap().head(5).unwrap()),
            "trade.price.head(5)"
        );
        assert_eq!(
            format!(
                "{}",
                trade
                    .by(
                        &["sym"],
                        vec![("w", trade.field("price").unwrap().mean().unwrap())]
                    )
                    .unwrap()
            ),
            "by(trade.sym, w=trade.price.mean())"
        );
        assert_eq!(
            format!(
                "{}",
                trade
                    .field("price")
                    .unwrap()
                    .add(1i64)
                    .unwrap()
                    .mul(2i64)
                    .unwrap()
            ),
            "((trade.price + 1) * 2)"
        );
        assert_eq!(format!("{}", trade.nrows().unwrap()), "trade.nrows");
    }
}
