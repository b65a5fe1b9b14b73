use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AstError {
    #[error("Invalid select list: {0}")]
    InvalidSelect(String),
    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),
    #[error("Invalid clause: {0}")]
    InvalidClause(String),
    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// A literal value appearing in query text
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A scalar expression over columns and literals
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    Column(String),
    Literal(Literal),
    Binary {
        op: ArithOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
}

/// The argument of an aggregate call
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateArg {
    Column(String),
    /// `count(*)`
    Star,
    /// `count(distinct(col))`
    Distinct(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub function: String,
    pub arg: AggregateArg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectKind {
    /// A plain column reference
    Column(String),
    /// An aggregate call
    Aggregate(AggregateCall),
    /// A computed arithmetic expression
    Computed(ScalarExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub kind: SelectKind,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectList {
    /// The whole-row form, `select * from t`
    #[default]
    Star,
    Items(Vec<SelectItem>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

/// A row predicate: comparisons combined with AND / OR / NOT
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub select: SelectList,
    pub from: String,
    pub filter: Option<FilterExpr>,
    pub group_by: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any select item is an aggregate call
    pub fn has_aggregates(&self) -> bool {
        match &self.select {
            SelectList::Star => false,
            SelectList::Items(items) => items
                .iter()
                .any(|item| matches!(item.kind, SelectKind::Aggregate(_))),
        }
    }
}

impl SelectItem {
    /// The output column name: the alias if given, otherwise a name
    /// derived from the expression
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.kind {
            SelectKind::Column(name) => name.clone(),
            SelectKind::Aggregate(call) => match &call.arg {
                AggregateArg::Column(col) => format!("{}_{}", call.function, col),
                AggregateArg::Star => call.function.clone(),
                AggregateArg::Distinct(col) => format!("{}_distinct_{}", call.function, col),
            },
            SelectKind::Computed(_) => "expr".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_query_structure() {
        let query = Query {
            select: SelectList::Items(vec![SelectItem {
                kind: SelectKind::Aggregate(AggregateCall {
                    function: "avg".to_string(),
                    arg: AggregateArg::Column("price".to_string()),
                }),
                alias: Some("w".to_string()),
            }]),
            from: "trade".to_string(),
            filter: Some(FilterExpr::Compare {
                column: "sym".to_string(),
                op: CompareOp::Eq,
                value: Literal::Str("AAPL".to_string()),
            }),
            group_by: vec!["sym".to_string()],
            limit: None,
            offset: None,
        };

        assert_eq!(query.from, "trade");
        assert!(query.has_aggregates());
        assert_eq!(query.group_by.len(), 1);
    }

    #[test]
    fn test_output_names() {
        let aliased = SelectItem {
            kind: SelectKind::Column("price".to_string()),
            alias: Some("px".to_string()),
        };
        assert_eq!(aliased.output_name(), "px");

        let count_star = SelectItem {
            kind: SelectKind::Aggregate(AggregateCall {
                function: "count".to_string(),
                arg: AggregateArg::Star,
            }),
            alias: None,
        };
        assert_eq!(count_star.output_name(), "count");

        let distinct = SelectItem {
            kind: SelectKind::Aggregate(AggregateCall {
                function: "count".to_string(),
                arg: AggregateArg::Distinct("sym".to_string()),
            }),
            alias: None,
        };
        assert_eq!(distinct.output_name(), "count_distinct_sym");
    }
}
