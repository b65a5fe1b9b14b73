use std::iter::Peekable;
use std::str::Chars;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("Invalid number format: {0}")]
    InvalidNumber(String),
    #[error("Malformed date literal: {0}")]
    MalformedDate(String),
    #[error("Unterminated string literal")]
    UnterminatedString,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    GroupBy,
    OrderBy,
    Limit,
    Offset,
    And,
    Or,
    Not,
    As,

    // Operators
    Eq,      // =
    Neq,     // !=
    Gt,      // >
    Lt,      // <
    Gte,     // >=
    Lte,     // <=
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %

    // Punctuation
    Comma,     // ,
    LParen,    // (
    RParen,    // )
    Semicolon, // ;

    // Literals
    Identifier(String),
    StringLiteral(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    DateLiteral(NaiveDate),

    // Special
    EOF,
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        tokens.push(Token::EOF);
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        self.skip_whitespace();

        if let Some(&c) = self.input.peek() {
            let token = match c {
                '=' => {
                    self.input.next();
                    Token::Eq
                }
                '!' => {
                    self.input.next();
                    if let Some('=') = self.input.peek() {
                        self.input.next();
                        Token::Neq
                    } else {
                        return Err(LexerError::UnexpectedChar('!'));
                    }
                }
                '>' => {
                    self.input.next();
                    if let Some('=') = self.input.peek() {
                        self.input.next();
                        Token::Gte
                    } else {
                        Token::Gt
                    }
                }
                '<' => {
                    self.input.next();
                    if let Some('=') = self.input.peek() {
                        self.input.next();
                        Token::Lte
                    } else {
                        Token::Lt
                    }
                }
                '+' => {
                    self.input.next();
                    Token::Plus
                }
                '-' => {
                    self.input.next();
                    Token::Minus
                }
                '*' => {
                    self.input.next();
                    Token::Star
                }
                '/' => {
                    self.input.next();
                    Token::Slash
                }
                '%' => {
                    self.input.next();
                    Token::Percent
                }
                ',' => {
                    self.input.next();
                    Token::Comma
                }
                '(' => {
                    self.input.next();
                    Token::LParen
                }
                ')' => {
                    self.input.next();
                    Token::RParen
                }
                ';' => {
                    self.input.next();
                    Token::Semicolon
                }

                // String literals
                '"' | '\'' => self.parse_string()?,

                // Numbers, dates and identifiers
                c if c.is_ascii_digit() => self.parse_number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.parse_identifier()?,

                // Unexpected character
                c => return Err(LexerError::UnexpectedChar(c)),
            };

            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.input.peek() {
            if c.is_whitespace() {
                self.input.next();
            } else {
                break;
            }
        }
    }

    fn parse_string(&mut self) -> Result<Token, LexerError> {
        let quote = self.input.next().unwrap();
        let mut string = String::new();

        while let Some(&c) = self.input.peek() {
            if c == quote {
                self.input.next();
                return Ok(Token::StringLiteral(string));
            }
            string.push(self.input.next().unwrap());
        }

        Err(LexerError::UnterminatedString)
    }

    fn parse_number(&mut self) -> Result<Token, LexerError> {
        let mut number = String::new();

        while let Some(&c) = self.input.peek() {
            if c.is_ascii_digit() {
                number.push(self.input.next().unwrap());
            } else {
                break;
            }
        }

        let next = self.input.peek().copied();
        match next {
            Some('.') => {
                number.push(self.input.next().unwrap());
                while let Some(&c) = self.input.peek() {
                    if c.is_ascii_digit() {
                        number.push(self.input.next().unwrap());
                    } else {
                        break;
                    }
                }
                number
                    .parse::<f64>()
                    .map(Token::FloatLiteral)
                    .map_err(|_| LexerError::InvalidNumber(number))
            }
            // Three dash-joined number groups form a date literal
            Some('-') if self.peek_date_tail() => {
                for _ in 0..2 {
                    number.push(self.input.next().unwrap());
                    while let Some(&c) = self.input.peek() {
                        if c.is_ascii_digit() {
                            number.push(self.input.next().unwrap());
                        } else {
                            break;
                        }
                    }
                }
                NaiveDate::parse_from_str(&number, "%Y-%m-%d")
                    .map(Token::DateLiteral)
                    .map_err(|_| LexerError::MalformedDate(number))
            }
            _ => number
                .parse::<i64>()
                .map(Token::IntLiteral)
                .map_err(|_| LexerError::InvalidNumber(number)),
        }
    }

    /// True if the upcoming characters continue as `-N…-N…`, which makes
    /// the digits read so far the year of a date literal
    fn peek_date_tail(&mut self) -> bool {
        let mut lookahead = self.input.clone();
        for _ in 0..2 {
            if lookahead.next() != Some('-') {
                return false;
            }
            let mut digits = 0;
            while let Some(&c) = lookahead.peek() {
                if c.is_ascii_digit() {
                    lookahead.next();
                    digits += 1;
                } else {
                    break;
                }
            }
            if digits == 0 {
                return false;
            }
        }
        true
    }

    fn peek_word(&mut self) -> String {
        let mut word = String::new();
        let mut chars = self.input.clone();

        while let Some(c) = chars.next() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
            } else {
                break;
            }
        }

        word
    }

    fn consume_chars(&mut self, count: usize) {
        for _ in 0..count {
            self.input.next();
        }
    }

    fn parse_identifier(&mut self) -> Result<Token, LexerError> {
        let mut identifier = String::new();

        while let Some(&c) = self.input.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                identifier.push(self.input.next().unwrap());
            } else {
                break;
            }
        }

        // Check for compound keywords (GROUP BY, ORDER BY)
        let token = match identifier.to_lowercase().as_str() {
            "select" => Token::Select,
            "from" => Token::From,
            "where" => Token::Where,
            "group" => {
                self.skip_whitespace();
                if self.peek_word().to_lowercase() == "by" {
                    self.consume_chars(2); // Consume "by"
                    Token::GroupBy
                } else {
                    Token::Identifier(identifier)
                }
            }
            "order" => {
                self.skip_whitespace();
                if self.peek_word().to_lowercase() == "by" {
                    self.consume_chars(2); // Consume "by"
                    Token::OrderBy
                } else {
                    Token::Identifier(identifier)
                }
            }
            "limit" => Token::Limit,
            "offset" => Token::Offset,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "as" => Token::As,
            _ => Token::Identifier(identifier),
        };

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokens() {
        let input = "SELECT * FROM trade WHERE price > 42.5";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Star,
                Token::From,
                Token::Identifier("trade".to_string()),
                Token::Where,
                Token::Identifier("price".to_string()),
                Token::Gt,
                Token::FloatLiteral(42.5),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_string_literals() {
        let input = r#"SELECT * FROM trade WHERE sym = 'AAPL' AND venue != "NYSE""#;
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Star,
                Token::From,
                Token::Identifier("trade".to_string()),
                Token::Where,
                Token::Identifier("sym".to_string()),
                Token::Eq,
                Token::StringLiteral("AAPL".to_string()),
                Token::And,
                Token::Identifier("venue".to_string()),
                Token::Neq,
                Token::StringLiteral("NYSE".to_string()),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_complex_query() {
        let input = "SELECT avg(price) as w FROM trade WHERE sym = 'AAPL' AND size > 100 GROUP BY sym LIMIT 10";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Identifier("avg".to_string()),
                Token::LParen,
                Token::Identifier("price".to_string()),
                Token::RParen,
                Token::As,
                Token::Identifier("w".to_string()),
                Token::From,
                Token::Identifier("trade".to_string()),
                Token::Where,
                Token::Identifier("sym".to_string()),
                Token::Eq,
                Token::StringLiteral("AAPL".to_string()),
                Token::And,
                Token::Identifier("size".to_string()),
                Token::Gt,
                Token::IntLiteral(100),
                Token::GroupBy,
                Token::Identifier("sym".to_string()),
                Token::Limit,
                Token::IntLiteral(10),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_date_literals() {
        let input = "SELECT * FROM trade WHERE date >= 2024-01-02";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens[tokens.len() - 2],
            Token::DateLiteral("2024-01-02".parse().unwrap())
        );

        // A dash without the full date shape stays arithmetic
        let input = "SELECT price - 1 FROM trade";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();
        assert!(tokens.contains(&Token::Minus));
        assert!(tokens.contains(&Token::IntLiteral(1)));

        // 2-1 is subtraction, not a date
        let mut lexer = Lexer::new("SELECT 2-1 FROM trade");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[1], Token::IntLiteral(2));
        assert_eq!(tokens[2], Token::Minus);
        assert_eq!(tokens[3], Token::IntLiteral(1));
    }

    #[test]
    fn test_error_handling() {
        let mut lexer = Lexer::new("SELECT * FROM trade WHERE price > @");
        assert!(matches!(
            lexer.tokenize(),
            Err(LexerError::UnexpectedChar('@'))
        ));

        let mut lexer = Lexer::new("SELECT * FROM trade WHERE sym = 'AAPL");
        assert!(matches!(
            lexer.tokenize(),
            Err(LexerError::UnterminatedString)
        ));

        let mut lexer = Lexer::new("SELECT * FROM trade WHERE date = 2024-13-40");
        assert!(matches!(lexer.tokenize(), Err(LexerError::MalformedDate(_))));
    }
}
