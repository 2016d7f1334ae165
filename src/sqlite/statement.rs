//! SQL statement parsing.
//!
//! The grammar is deliberately tiny:
//!
//! ```text
//! SELECT count(*) FROM table
//! SELECT col [, col ...] FROM table [WHERE col = literal]
//! ```
//!
//! Keywords are case-insensitive; identifiers may be double-quoted;
//! literals are single-quoted strings or numbers. Anything outside this
//! grammar is an `UnsupportedQuery` error.

use crate::sqlite::core::value::Value;
use crate::sqlite::error::{Result, SqliteError};

/// Lexical tokens of the restricted grammar.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// Keywords (SELECT, FROM, WHERE)
    Keyword(String),
    /// Identifiers like table names, column names
    Identifier(String),
    /// Function names (COUNT)
    Function(String),
    /// A single-quoted string literal
    StringLiteral(String),
    /// An unquoted numeric literal
    NumberLiteral(String),
    /// Special characters and operators
    Symbol(char),
    /// The wildcard operator *
    Asterisk,
}

/// A function call like COUNT(*).
#[derive(Debug)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
}

/// One projected expression.
#[derive(Debug)]
pub enum Expression {
    Function(FunctionCall),
    Asterisk,
    Column(String),
}

/// A `column = literal` filter from the WHERE clause.
#[derive(Debug)]
pub struct Predicate {
    pub column: String,
    pub value: Value,
}

/// A parsed SELECT statement.
#[derive(Debug)]
pub struct Statement {
    pub selections: Vec<Expression>,
    pub from_table: String,
    pub predicate: Option<Predicate>,
}

fn unsupported(what: impl Into<String>) -> SqliteError {
    SqliteError::UnsupportedQuery(what.into())
}

impl Statement {
    /// Parses a SQL string into a Statement.
    pub fn parse(sql: &str) -> Result<Self> {
        let tokens = tokenize(sql)?;
        parse_tokens(tokens)
    }
}

/// Converts a SQL string into tokens.
///
/// "SELECT COUNT(*)" becomes
/// [Keyword("SELECT"), Function("COUNT"), Symbol('('), Asterisk, Symbol(')')].
fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }

            // A trailing semicolon ends the statement.
            ';' => {
                chars.next();
                break;
            }

            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let token = match word.to_uppercase().as_str() {
                    "SELECT" | "FROM" | "WHERE" => Token::Keyword(word),
                    "COUNT" => Token::Function(word),
                    _ => Token::Identifier(word),
                };
                tokens.push(token);
            }

            // Double quotes delimit identifiers.
            '"' => {
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => word.push(c),
                        None => return Err(unsupported("unterminated quoted identifier")),
                    }
                }
                tokens.push(Token::Identifier(word));
            }

            // Single quotes delimit string literals; '' escapes a quote.
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => {
                            if chars.peek() == Some(&'\'') {
                                chars.next();
                                text.push('\'');
                            } else {
                                break;
                            }
                        }
                        Some(c) => text.push(c),
                        None => return Err(unsupported("unterminated string literal")),
                    }
                }
                tokens.push(Token::StringLiteral(text));
            }

            c if c.is_ascii_digit() => {
                let mut number = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::NumberLiteral(number));
            }

            '*' => {
                tokens.push(Token::Asterisk);
                chars.next();
            }
            '(' | ')' | ',' | '=' => {
                tokens.push(Token::Symbol(c));
                chars.next();
            }

            _ => return Err(unsupported(format!("unexpected character: {c}"))),
        }
    }

    Ok(tokens)
}

fn parse_tokens(tokens: Vec<Token>) -> Result<Statement> {
    let mut iter = tokens.into_iter().peekable();

    match iter.next() {
        Some(Token::Keyword(k)) if k.eq_ignore_ascii_case("SELECT") => {}
        _ => return Err(unsupported("expected SELECT")),
    }

    // Projection list, up to FROM.
    let mut selections = Vec::new();
    loop {
        match iter.next() {
            Some(Token::Function(name)) => {
                match iter.next() {
                    Some(Token::Symbol('(')) => {}
                    _ => return Err(unsupported("expected ( after function name")),
                }
                match iter.next() {
                    Some(Token::Asterisk) => {}
                    _ => return Err(unsupported("expected * as the function argument")),
                }
                match iter.next() {
                    Some(Token::Symbol(')')) => {}
                    _ => return Err(unsupported("expected ) after function argument")),
                }
                selections.push(Expression::Function(FunctionCall {
                    name,
                    args: vec![Expression::Asterisk],
                }));
            }
            Some(Token::Identifier(column)) => selections.push(Expression::Column(column)),
            Some(Token::Asterisk) => selections.push(Expression::Asterisk),
            other => return Err(unsupported(format!("unexpected token in projection: {other:?}"))),
        }

        match iter.next() {
            Some(Token::Symbol(',')) => continue,
            Some(Token::Keyword(k)) if k.eq_ignore_ascii_case("FROM") => break,
            other => return Err(unsupported(format!("expected , or FROM, got {other:?}"))),
        }
    }

    if selections.is_empty() {
        return Err(unsupported("empty projection"));
    }

    let from_table = match iter.next() {
        Some(Token::Identifier(table)) => table,
        other => return Err(unsupported(format!("expected table name, got {other:?}"))),
    };

    // Optional WHERE column = literal.
    let predicate = match iter.next() {
        None => None,
        Some(Token::Keyword(k)) if k.eq_ignore_ascii_case("WHERE") => {
            let column = match iter.next() {
                Some(Token::Identifier(column)) => column,
                other => {
                    return Err(unsupported(format!("expected column in WHERE, got {other:?}")))
                }
            };
            match iter.next() {
                Some(Token::Symbol('=')) => {}
                other => return Err(unsupported(format!("expected = in WHERE, got {other:?}"))),
            }
            let value = match iter.next() {
                Some(Token::StringLiteral(s)) => Value::Text(s),
                Some(Token::NumberLiteral(n)) => {
                    if n.contains('.') {
                        Value::Float(n.parse().map_err(|_| {
                            unsupported(format!("malformed number literal: {n}"))
                        })?)
                    } else {
                        Value::Int(n.parse().map_err(|_| {
                            unsupported(format!("malformed number literal: {n}"))
                        })?)
                    }
                }
                other => {
                    return Err(unsupported(format!("expected literal in WHERE, got {other:?}")))
                }
            };
            Some(Predicate { column, value })
        }
        other => return Err(unsupported(format!("unexpected token after table: {other:?}"))),
    };

    if let Some(extra) = iter.next() {
        return Err(unsupported(format!("trailing token: {extra:?}")));
    }

    Ok(Statement {
        selections,
        from_table,
        predicate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_count() -> Result<()> {
        let stmt = Statement::parse("SELECT COUNT(*) FROM apples")?;

        assert_eq!(stmt.from_table, "apples");
        assert_eq!(stmt.selections.len(), 1);
        assert!(stmt.predicate.is_none());

        if let Expression::Function(func) = &stmt.selections[0] {
            assert_eq!(func.name, "COUNT");
            assert_eq!(func.args.len(), 1);
            assert!(matches!(func.args[0], Expression::Asterisk));
        } else {
            panic!("Expected function expression");
        }

        Ok(())
    }

    #[test]
    fn parse_column_list() -> Result<()> {
        let stmt = Statement::parse("select name, color from apples")?;
        assert_eq!(stmt.from_table, "apples");
        let columns: Vec<&str> = stmt
            .selections
            .iter()
            .map(|e| match e {
                Expression::Column(c) => c.as_str(),
                other => panic!("expected column, got {other:?}"),
            })
            .collect();
        assert_eq!(columns, vec!["name", "color"]);
        Ok(())
    }

    #[test]
    fn parse_where_string_literal() -> Result<()> {
        let stmt =
            Statement::parse("SELECT id, name FROM companies WHERE country = 'france'")?;
        let predicate = stmt.predicate.expect("predicate");
        assert_eq!(predicate.column, "country");
        assert_eq!(predicate.value, Value::Text("france".into()));
        Ok(())
    }

    #[test]
    fn parse_where_number_literals() -> Result<()> {
        let stmt = Statement::parse("SELECT name FROM t WHERE id = 42")?;
        assert_eq!(stmt.predicate.unwrap().value, Value::Int(42));

        let stmt = Statement::parse("SELECT name FROM t WHERE score = 1.5")?;
        assert_eq!(stmt.predicate.unwrap().value, Value::Float(1.5));
        Ok(())
    }

    #[test]
    fn parse_escaped_quote_in_literal() -> Result<()> {
        let stmt = Statement::parse("SELECT a FROM t WHERE b = 'it''s'")?;
        assert_eq!(stmt.predicate.unwrap().value, Value::Text("it's".into()));
        Ok(())
    }

    #[test]
    fn keywords_are_case_insensitive() -> Result<()> {
        let stmt = Statement::parse("sElEcT cOuNt(*) FrOm t")?;
        assert!(matches!(stmt.selections[0], Expression::Function(_)));
        Ok(())
    }

    #[test]
    fn trailing_semicolon_is_accepted() -> Result<()> {
        let stmt = Statement::parse("SELECT name FROM apples;")?;
        assert_eq!(stmt.from_table, "apples");
        Ok(())
    }

    #[test]
    fn out_of_grammar_statements_are_unsupported() {
        for sql in [
            "UPDATE t SET a = 1",
            "SELECT a FROM t ORDER BY a",
            "SELECT a FROM t WHERE a > 1",
            "SELECT a FROM t WHERE a = b",
            "SELECT FROM t",
        ] {
            assert!(
                matches!(
                    Statement::parse(sql),
                    Err(SqliteError::UnsupportedQuery(_))
                ),
                "{sql} should be unsupported"
            );
        }
    }
}
