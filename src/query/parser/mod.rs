pub mod ast;
pub mod lexer;
pub mod validator;

pub use ast::{
    AggregateArg, AggregateCall, ArithOp, AstError, CompareOp, FilterExpr, Literal, Query,
    ScalarExpr, SelectItem, SelectKind, SelectList,
};
pub use lexer::{Lexer, LexerError, Token};
pub use validator::{FunctionRegistry, QueryValidator, ValidationError};

use std::iter::Peekable;
use std::slice::Iter;

pub struct Parser<'a> {
    tokens: Peekable<Iter<'a, Token>>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens: tokens.iter().peekable(),
        }
    }

    pub fn parse(&mut self) -> Result<Query, AstError> {
        let mut query = Query::new();

        // Parse SELECT clause
        self.expect_token(Token::Select)?;
        query.select = self.parse_select_list()?;

        // Parse FROM clause
        self.expect_token(Token::From)?;
        query.from = match self.next_token()?.clone() {
            Token::Identifier(name) => name,
            token => {
                return Err(AstError::InvalidClause(format!(
                    "Expected table name after FROM, got {:?}",
                    token
                )))
            }
        };

        // Parse WHERE clause (optional)
        if self.peek_token() == Some(&&Token::Where) {
            self.next_token()?;
            query.filter = Some(self.parse_filter()?);
        }

        // Parse GROUP BY clause (optional)
        if self.peek_token() == Some(&&Token::GroupBy) {
            self.next_token()?;
            query.group_by = self.parse_identifier_list()?;
        }

        // ORDER BY is reserved
        if self.peek_token() == Some(&&Token::OrderBy) {
            return Err(AstError::InvalidClause(
                "ORDER BY is reserved and not supported".to_string(),
            ));
        }

        // Parse LIMIT clause (optional)
        if self.peek_token() == Some(&&Token::Limit) {
            self.next_token()?;
            query.limit = Some(self.parse_row_count("LIMIT")?);
        }

        // Parse OFFSET clause (optional)
        if self.peek_token() == Some(&&Token::Offset) {
            self.next_token()?;
            query.offset = Some(self.parse_row_count("OFFSET")?);
        }

        if self.peek_token() == Some(&&Token::Semicolon) {
            self.next_token()?;
        }
        self.expect_token(Token::EOF)?;

        Ok(query)
    }

    fn parse_row_count(&mut self, clause: &str) -> Result<usize, AstError> {
        match self.next_token()? {
            Token::IntLiteral(n) => Ok(*n as usize),
            token => Err(AstError::InvalidClause(format!(
                "Expected a row count after {}, got {:?}",
                clause, token
            ))),
        }
    }

    fn parse_select_list(&mut self) -> Result<SelectList, AstError> {
        if self.peek_token() == Some(&&Token::Star) {
            self.next_token()?;
            return Ok(SelectList::Star);
        }

        let mut items = Vec::new();
        loop {
            items.push(self.parse_select_item()?);

            if self.peek_token() == Some(&&Token::Comma) {
                self.next_token()?;
            } else {
                break;
            }
        }

        Ok(SelectList::Items(items))
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, AstError> {
        let kind = match self.peek_token() {
            Some(&&Token::Identifier(_)) => {
                let name = match self.next_token()?.clone() {
                    Token::Identifier(name) => name,
                    _ => unreachable!(),
                };
                if self.peek_token() == Some(&&Token::LParen) {
                    SelectKind::Aggregate(self.parse_aggregate_args(name)?)
                } else {
                    // The identifier seeds a scalar expression; a bare
                    // column stays a plain column reference
                    match self.continue_scalar_expr(ScalarExpr::Column(name))? {
                        ScalarExpr::Column(name) => SelectKind::Column(name),
                        expr => SelectKind::Computed(expr),
                    }
                }
            }
            _ => match self.parse_scalar_expr()? {
                ScalarExpr::Column(name) => SelectKind::Column(name),
                expr => SelectKind::Computed(expr),
            },
        };

        let alias = if self.peek_token() == Some(&&Token::As) {
            self.next_token()?;
            match self.next_token()?.clone() {
                Token::Identifier(name) => Some(name),
                token => {
                    return Err(AstError::InvalidSelect(format!(
                        "Expected identifier after AS, got {:?}",
                        token
                    )))
                }
            }
        } else {
            None
        };

        Ok(SelectItem { kind, alias })
    }

    fn parse_aggregate_args(&mut self, function: String) -> Result<AggregateCall, AstError> {
        self.expect_token(Token::LParen)?;
        let arg = match self.next_token()?.clone() {
            Token::Star => AggregateArg::Star,
            Token::Identifier(inner) => {
                if self.peek_token() == Some(&&Token::LParen) {
                    // One level of nesting: distinct(col) under an aggregate
                    self.next_token()?;
                    let column = match self.next_token()?.clone() {
                        Token::Identifier(column) => column,
                        token => {
                            return Err(AstError::InvalidSelect(format!(
                                "Expected column inside {}(), got {:?}",
                                inner, token
                            )))
                        }
                    };
                    self.expect_token(Token::RParen)?;
                    if inner != "distinct" {
                        return Err(AstError::InvalidSelect(format!(
                            "Only distinct(...) may nest inside {}",
                            function
                        )));
                    }
                    AggregateArg::Distinct(column)
                } else {
                    AggregateArg::Column(inner)
                }
            }
            token => {
                return Err(AstError::InvalidSelect(format!(
                    "Invalid aggregate argument: {:?}",
                    token
                )))
            }
        };
        self.expect_token(Token::RParen)?;
        Ok(AggregateCall { function, arg })
    }

    fn parse_scalar_expr(&mut self) -> Result<ScalarExpr, AstError> {
        let seed = self.parse_scalar_atom()?;
        self.continue_scalar_expr(seed)
    }

    /// Finishes a scalar expression whose first atom is already parsed;
    /// * / % bind tighter than + -
    fn continue_scalar_expr(&mut self, seed: ScalarExpr) -> Result<ScalarExpr, AstError> {
        let mut left = self.continue_scalar_term(seed)?;
        while let Some(op) = self.peek_add_op() {
            self.next_token()?;
            let right_seed = self.parse_scalar_atom()?;
            let right = self.continue_scalar_term(right_seed)?;
            left = ScalarExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn continue_scalar_term(&mut self, seed: ScalarExpr) -> Result<ScalarExpr, AstError> {
        let mut left = seed;
        while let Some(op) = self.peek_mul_op() {
            self.next_token()?;
            let right = self.parse_scalar_atom()?;
            left = ScalarExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_scalar_atom(&mut self) -> Result<ScalarExpr, AstError> {
        match self.next_token()?.clone() {
            Token::LParen => {
                let expr = self.parse_scalar_expr()?;
                self.expect_token(Token::RParen)?;
                Ok(expr)
            }
            Token::Identifier(name) => {
                if self.peek_token() == Some(&&Token::LParen) {
                    return Err(AstError::InvalidSelect(format!(
                        "Aggregate call '{}' cannot appear inside an arithmetic expression",
                        name
                    )));
                }
                Ok(ScalarExpr::Column(name))
            }
            Token::IntLiteral(v) => Ok(ScalarExpr::Literal(Literal::Int(v))),
            Token::FloatLiteral(v) => Ok(ScalarExpr::Literal(Literal::Float(v))),
            Token::DateLiteral(v) => Ok(ScalarExpr::Literal(Literal::Date(v))),
            Token::StringLiteral(v) => Ok(ScalarExpr::Literal(Literal::Str(v))),
            token => Err(AstError::InvalidSelect(format!(
                "Expected a select item, got {:?}",
                token
            ))),
        }
    }

    fn parse_filter(&mut self) -> Result<FilterExpr, AstError> {
        let mut expr = self.parse_and_filter()?;

        while self.peek_token() == Some(&&Token::Or) {
            self.next_token()?;
            let right = self.parse_and_filter()?;
            expr = FilterExpr::Or(Box::new(expr), Box::new(right));
        }

        Ok(expr)
    }

    fn parse_and_filter(&mut self) -> Result<FilterExpr, AstError> {
        let mut expr = self.parse_filter_term()?;

        while self.peek_token() == Some(&&Token::And) {
            self.next_token()?;
            let right = self.parse_filter_term()?;
            expr = FilterExpr::And(Box::new(expr), Box::new(right));
        }

        Ok(expr)
    }

    fn parse_filter_term(&mut self) -> Result<FilterExpr, AstError> {
        if self.peek_token() == Some(&&Token::Not) {
            self.next_token()?;
            let expr = self.parse_filter_term()?;
            return Ok(FilterExpr::Not(Box::new(expr)));
        }

        if self.peek_token() == Some(&&Token::LParen) {
            self.next_token()?;
            let expr = self.parse_filter()?;
            self.expect_token(Token::RParen)?;
            return Ok(expr);
        }

        let column = match self.next_token()?.clone() {
            Token::Identifier(column) => column,
            token => {
                return Err(AstError::InvalidFilter(format!(
                    "Expected column name, got {:?}",
                    token
                )))
            }
        };

        let op = match self.next_token()? {
            Token::Eq => CompareOp::Eq,
            Token::Neq => CompareOp::Neq,
            Token::Gt => CompareOp::Gt,
            Token::Lt => CompareOp::Lt,
            Token::Gte => CompareOp::Gte,
            Token::Lte => CompareOp::Lte,
            token => {
                return Err(AstError::InvalidFilter(format!(
                    "Expected comparison operator, got {:?}",
                    token
                )))
            }
        };

        let value = self.parse_literal()?;

        Ok(FilterExpr::Compare { column, op, value })
    }

    fn parse_literal(&mut self) -> Result<Literal, AstError> {
        match self.next_token()?.clone() {
            Token::IntLiteral(v) => Ok(Literal::Int(v)),
            Token::FloatLiteral(v) => Ok(Literal::Float(v)),
            Token::DateLiteral(v) => Ok(Literal::Date(v)),
            Token::StringLiteral(v) => Ok(Literal::Str(v)),
            // Bare identifiers compare as symbols; true/false as booleans
            Token::Identifier(v) => match v.as_str() {
                "true" => Ok(Literal::Bool(true)),
                "false" => Ok(Literal::Bool(false)),
                _ => Ok(Literal::Str(v)),
            },
            token => Err(AstError::InvalidFilter(format!(
                "Expected literal, got {:?}",
                token
            ))),
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>, AstError> {
        let mut identifiers = Vec::new();

        loop {
            match self.next_token()?.clone() {
                Token::Identifier(name) => identifiers.push(name),
                token => {
                    return Err(AstError::InvalidClause(format!(
                        "Expected identifier, got {:?}",
                        token
                    )))
                }
            }

            if self.peek_token() == Some(&&Token::Comma) {
                self.next_token()?;
            } else {
                break;
            }
        }

        Ok(identifiers)
    }

    fn next_token(&mut self) -> Result<&Token, AstError> {
        self.tokens.next().ok_or(AstError::UnexpectedEof)
    }

    fn peek_token(&mut self) -> Option<&&Token> {
        self.tokens.peek()
    }

    fn peek_add_op(&mut self) -> Option<ArithOp> {
        match self.peek_token() {
            Some(&&Token::Plus) => Some(ArithOp::Add),
            Some(&&Token::Minus) => Some(ArithOp::Sub),
            _ => None,
        }
    }

    fn peek_mul_op(&mut self) -> Option<ArithOp> {
        match self.peek_token() {
            Some(&&Token::Star) => Some(ArithOp::Mul),
            Some(&&Token::Slash) => Some(ArithOp::Div),
            Some(&&Token::Percent) => Some(ArithOp::Rem),
            _ => None,
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), AstError> {
        let token = self.next_token()?;
        if token == &expected {
            Ok(())
        } else {
            Err(AstError::InvalidClause(format!(
                "Expected {:?}, got {:?}",
                expected, token
            )))
        }
    }
}
