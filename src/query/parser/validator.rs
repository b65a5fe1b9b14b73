use std::collections::HashSet;

use thiserror::Error;

use crate::query::parser::ast::{
    AggregateArg, FilterExpr, Literal, Query, ScalarExpr, SelectItem, SelectKind, SelectList,
};
use crate::store::{DataType, TableSchema};

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Column '{column}' has type {data_type}, a numeric column is required")]
    NotNumeric { column: String, data_type: DataType },
    #[error("Arithmetic requires a numeric literal, got {0}")]
    NonNumericLiteral(String),
    #[error("Only count accepts *, not {0}")]
    StarOutsideCount(String),
    #[error("distinct(...) is only valid inside count, not {0}")]
    DistinctOutsideCount(String),
    #[error("Column '{0}' must appear in GROUP BY")]
    UngroupedColumn(String),
    #[error("GROUP BY requires an explicit select list")]
    StarWithGroupBy,
    #[error("Cannot compare column '{column}' of type {data_type} with {literal}")]
    FilterTypeMismatch {
        column: String,
        data_type: DataType,
        literal: String,
    },
}

/// Registry of aggregate functions the engine can evaluate.
pub struct FunctionRegistry {
    functions: HashSet<String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let functions = ["avg", "sum", "min", "max", "count", "first", "last", "distinct"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        Self { functions }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks a parsed query against a table schema before execution.
pub struct QueryValidator {
    registry: FunctionRegistry,
}

impl QueryValidator {
    pub fn new() -> Self {
        Self {
            registry: FunctionRegistry::new(),
        }
    }

    pub fn validate(&self, query: &Query, schema: &TableSchema) -> Result<(), ValidationError> {
        match &query.select {
            SelectList::Star => {
                if !query.group_by.is_empty() {
                    return Err(ValidationError::StarWithGroupBy);
                }
            }
            SelectList::Items(items) => {
                for item in items {
                    self.validate_select_item(item, query, schema)?;
                }
            }
        }

        for key in &query.group_by {
            if !schema.contains(key) {
                return Err(ValidationError::UnknownColumn(key.clone()));
            }
        }

        if let Some(filter) = &query.filter {
            self.validate_filter(filter, schema)?;
        }

        Ok(())
    }

    fn validate_select_item(
        &self,
        item: &SelectItem,
        query: &Query,
        schema: &TableSchema,
    ) -> Result<(), ValidationError> {
        let grouped = query.has_aggregates() || !query.group_by.is_empty();

        match &item.kind {
            SelectKind::Column(name) => {
                if !schema.contains(name) {
                    return Err(ValidationError::UnknownColumn(name.clone()));
                }
                // Plain columns alongside aggregates must be group keys
                if grouped && !query.group_by.contains(name) {
                    return Err(ValidationError::UngroupedColumn(name.clone()));
                }
            }
            SelectKind::Aggregate(call) => {
                if !self.registry.contains(&call.function) {
                    return Err(ValidationError::UnknownFunction(call.function.clone()));
                }
                if call.function == "distinct" {
                    return Err(ValidationError::DistinctOutsideCount(call.function.clone()));
                }
                match &call.arg {
                    AggregateArg::Star => {
                        if call.function != "count" {
                            return Err(ValidationError::StarOutsideCount(call.function.clone()));
                        }
                    }
                    AggregateArg::Distinct(column) => {
                        if call.function != "count" {
                            return Err(ValidationError::DistinctOutsideCount(
                                call.function.clone(),
                            ));
                        }
                        if !schema.contains(column) {
                            return Err(ValidationError::UnknownColumn(column.clone()));
                        }
                    }
                    AggregateArg::Column(column) => {
                        let data_type = schema
                            .data_type(column)
                            .ok_or_else(|| ValidationError::UnknownColumn(column.clone()))?;
                        if matches!(call.function.as_str(), "avg" | "sum")
                            && !matches!(data_type, DataType::Int | DataType::Float)
                        {
                            return Err(ValidationError::NotNumeric {
                                column: column.clone(),
                                data_type,
                            });
                        }
                    }
                }
            }
            SelectKind::Computed(expr) => {
                if grouped {
                    return Err(ValidationError::UngroupedColumn(item.output_name()));
                }
                self.validate_scalar(expr, schema)?;
            }
        }

        Ok(())
    }

    fn validate_scalar(
        &self,
        expr: &ScalarExpr,
        schema: &TableSchema,
    ) -> Result<(), ValidationError> {
        match expr {
            ScalarExpr::Column(name) => {
                let data_type = schema
                    .data_type(name)
                    .ok_or_else(|| ValidationError::UnknownColumn(name.clone()))?;
                if !matches!(data_type, DataType::Int | DataType::Float) {
                    return Err(ValidationError::NotNumeric {
                        column: name.clone(),
                        data_type,
                    });
                }
                Ok(())
            }
            ScalarExpr::Literal(Literal::Int(_)) | ScalarExpr::Literal(Literal::Float(_)) => {
                Ok(())
            }
            ScalarExpr::Literal(other) => {
                Err(ValidationError::NonNumericLiteral(format!("{:?}", other)))
            }
            ScalarExpr::Binary { left, right, .. } => {
                self.validate_scalar(left, schema)?;
                self.validate_scalar(right, schema)
            }
        }
    }

    fn validate_filter(
        &self,
        filter: &FilterExpr,
        schema: &TableSchema,
    ) -> Result<(), ValidationError> {
        match filter {
            FilterExpr::Compare { column, value, .. } => {
                let data_type = schema
                    .data_type(column)
                    .ok_or_else(|| ValidationError::UnknownColumn(column.clone()))?;
                let compatible = matches!(
                    (data_type, value),
                    (DataType::Sym, Literal::Str(_))
                        | (DataType::Int, Literal::Int(_))
                        | (DataType::Int, Literal::Float(_))
                        | (DataType::Float, Literal::Int(_))
                        | (DataType::Float, Literal::Float(_))
                        | (DataType::Date, Literal::Date(_))
                        | (DataType::Bool, Literal::Bool(_))
                );
                if !compatible {
                    return Err(ValidationError::FilterTypeMismatch {
                        column: column.clone(),
                        data_type,
                        literal: format!("{:?}", value),
                    });
                }
                Ok(())
            }
            FilterExpr::And(left, right) | FilterExpr::Or(left, right) => {
                self.validate_filter(left, schema)?;
                self.validate_filter(right, schema)
            }
            FilterExpr::Not(inner) => self.validate_filter(inner, schema),
        }
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::{Lexer, Parser};

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ("date".to_string(), DataType::Date),
            ("sym".to_string(), DataType::Sym),
            ("time".to_string(), DataType::Time),
            ("price".to_string(), DataType::Float),
            ("size".to_string(), DataType::Int),
        ])
    }

    fn validate(input: &str) -> Result<(), ValidationError> {
        let tokens = Lexer::new(input).tokenize().unwrap();
        let query = Parser::new(&tokens).parse().unwrap();
        QueryValidator::new().validate(&query, &schema())
    }

    #[test]
    fn test_accepts_well_formed_queries() {
        assert!(validate("select * from trade").is_ok());
        assert!(validate("select price, sym from trade where size > 100").is_ok());
        assert!(validate("select sym, avg(price) as w from trade group by sym").is_ok());
        assert!(validate("select count(*) from trade").is_ok());
        assert!(validate("select count(distinct(sym)) from trade").is_ok());
        assert!(validate("select (price + 1) * 2 from trade").is_ok());
        assert!(validate("select * from trade where date >= 2024-01-02").is_ok());
    }

    #[test]
    fn test_rejects_unknown_names() {
        assert_eq!(
            validate("select notional from trade"),
            Err(ValidationError::UnknownColumn("notional".to_string()))
        );
        assert_eq!(
            validate("select median(price) from trade"),
            Err(ValidationError::UnknownFunction("median".to_string()))
        );
        // Group keys must name real columns, not aliases
        assert_eq!(
            validate("select avg(price) as w from trade group by w"),
            Err(ValidationError::UnknownColumn("w".to_string()))
        );
    }

    #[test]
    fn test_rejects_type_errors() {
        assert_eq!(
            validate("select avg(sym) from trade"),
            Err(ValidationError::NotNumeric {
                column: "sym".to_string(),
                data_type: DataType::Sym,
            })
        );
        assert_eq!(
            validate("select sym + 1 from trade"),
            Err(ValidationError::NotNumeric {
                column: "sym".to_string(),
                data_type: DataType::Sym,
            })
        );
        assert!(matches!(
            validate("select price + 'x' from trade"),
            Err(ValidationError::NonNumericLiteral(_))
        ));
        assert!(matches!(
            validate("select * from trade where price = 'AAPL'"),
            Err(ValidationError::FilterTypeMismatch { .. })
        ));
        // Cross-numeric comparisons are fine
        assert!(validate("select * from trade where size > 10.5").is_ok());
    }

    #[test]
    fn test_rejects_malformed_aggregation() {
        assert_eq!(
            validate("select avg(*) from trade"),
            Err(ValidationError::StarOutsideCount("avg".to_string()))
        );
        assert_eq!(
            validate("select sum(distinct(price)) from trade"),
            Err(ValidationError::DistinctOutsideCount("sum".to_string()))
        );
        assert_eq!(
            validate("select distinct(sym) from trade"),
            Err(ValidationError::DistinctOutsideCount("distinct".to_string()))
        );
        assert_eq!(
            validate("select sym, avg(price) from trade"),
            Err(ValidationError::UngroupedColumn("sym".to_string()))
        );
        assert_eq!(
            validate("select * from trade group by sym"),
            Err(ValidationError::StarWithGroupBy)
        );
    }
}
