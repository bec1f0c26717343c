//! Parser for the filter expressions the query constructor writes, e.g.
//! `and(eq("instruments", "drums"), in("songs", ["anthropology"]))`.

use serde_json::{Number, Value};
use thiserror::Error;

use super::{Comparator, FilterExpr, Operator};

pub const NO_FILTER: &str = "NO_FILTER";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of filter expression")]
    UnexpectedEnd,
    #[error("unexpected character `{found}` at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{0}` expects an attribute and a value")]
    ComparisonArity(String),
    #[error("`{0}` needs at least one argument")]
    EmptyOperation(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("trailing input after filter expression at offset {0}")]
    Trailing(usize),
}

/// Parses a filter expression. `NO_FILTER` and an empty string yield `None`.
pub fn parse_filter(input: &str) -> Result<Option<FilterExpr>, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == NO_FILTER {
        return Ok(None);
    }

    let mut parser = Parser::new(trimmed);
    let expr = parser.expression()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(ParseError::Trailing(parser.pos));
    }
    Ok(Some(expr))
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

enum Argument {
    Expr(FilterExpr),
    Value(Value),
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(ParseError::Unexpected {
                found,
                offset: self.pos,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return match self.peek() {
                Some(found) => Err(ParseError::Unexpected {
                    found,
                    offset: self.pos,
                }),
                None => Err(ParseError::UnexpectedEnd),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn expression(&mut self) -> Result<FilterExpr, ParseError> {
        let name = self.identifier()?;
        let arguments = self.arguments()?;

        if let Some(comparator) = Comparator::from_name(&name) {
            let mut arguments = arguments.into_iter();
            let attribute = match arguments.next() {
                Some(Argument::Value(Value::String(attribute))) => attribute,
                _ => return Err(ParseError::ComparisonArity(name)),
            };
            let value = match (arguments.next(), arguments.next()) {
                (Some(Argument::Value(value)), None) => value,
                _ => return Err(ParseError::ComparisonArity(name)),
            };
            return Ok(FilterExpr::Comparison {
                comparator,
                attribute,
                value,
            });
        }

        if let Some(operator) = Operator::from_name(&name) {
            let mut expressions = Vec::with_capacity(arguments.len());
            for argument in arguments {
                match argument {
                    Argument::Expr(expr) => expressions.push(expr),
                    Argument::Value(_) => return Err(ParseError::EmptyOperation(name)),
                }
            }
            if expressions.is_empty() {
                return Err(ParseError::EmptyOperation(name));
            }
            return Ok(FilterExpr::Operation {
                operator,
                arguments: expressions,
            });
        }

        Err(ParseError::UnknownFunction(name))
    }

    fn arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        self.expect('(')?;
        let mut arguments = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(arguments);
        }
        loop {
            arguments.push(self.argument()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(arguments);
                }
                Some(found) => {
                    return Err(ParseError::Unexpected {
                        found,
                        offset: self.pos,
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }

    fn argument(&mut self) -> Result<Argument, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {
                // Bare words are either a nested call or a literal such as `true`.
                let checkpoint = self.pos;
                let word = self.identifier()?;
                self.skip_whitespace();
                if self.peek() == Some('(') {
                    self.pos = checkpoint;
                    return self.expression().map(Argument::Expr);
                }
                Ok(Argument::Value(match word.as_str() {
                    "true" | "True" => Value::Bool(true),
                    "false" | "False" => Value::Bool(false),
                    _ => Value::String(word),
                }))
            }
            _ => self.value().map(Argument::Value),
        }
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('"') | Some('\'') => self.string().map(Value::String),
            Some('[') => self.list(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.identifier()?;
                Ok(match word.as_str() {
                    "true" | "True" => Value::Bool(true),
                    "false" | "False" => Value::Bool(false),
                    _ => Value::String(word),
                })
            }
            Some(found) => Err(ParseError::Unexpected {
                found,
                offset: self.pos,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let quote = self.peek().ok_or(ParseError::UnexpectedEnd)?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedString),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or(ParseError::UnterminatedString)?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn list(&mut self) -> Result<Value, ParseError> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(found) => {
                    return Err(ParseError::Unexpected {
                        found,
                        offset: self.pos,
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E')
        {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or(ParseError::InvalidNumber(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_filter_parses_to_none() {
        assert_eq!(parse_filter("NO_FILTER"), Ok(None));
        assert_eq!(parse_filter("  "), Ok(None));
    }

    #[test]
    fn single_comparison() {
        let expr = parse_filter(r#"eq("instruments", "drums")"#).unwrap();
        assert_eq!(
            expr,
            Some(FilterExpr::comparison(Comparator::Eq, "instruments", "drums"))
        );
    }

    #[test]
    fn nested_operations_with_lists_and_numbers() {
        let expr = parse_filter(
            r#"and(in("songs", ['anthropology', "donna lee"]), or(eq("location", "san mateo, ca"), gte("experience", 5)))"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            expr,
            FilterExpr::operation(
                Operator::And,
                vec![
                    FilterExpr::comparison(
                        Comparator::In,
                        "songs",
                        json!(["anthropology", "donna lee"])
                    ),
                    FilterExpr::operation(
                        Operator::Or,
                        vec![
                            FilterExpr::comparison(Comparator::Eq, "location", "san mateo, ca"),
                            FilterExpr::comparison(Comparator::Gte, "experience", 5),
                        ]
                    ),
                ]
            )
        );
    }

    #[test]
    fn escaped_quotes_survive() {
        let expr = parse_filter(r#"eq("songs", "round 'bout midnight \"live\"")"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            expr,
            FilterExpr::comparison(Comparator::Eq, "songs", "round 'bout midnight \"live\"")
        );
    }

    #[test]
    fn unknown_function_is_rejected() {
        assert_eq!(
            parse_filter(r#"like("name", "sam")"#),
            Err(ParseError::UnknownFunction("like".to_string()))
        );
    }

    #[test]
    fn comparison_needs_two_arguments() {
        assert_eq!(
            parse_filter(r#"eq("name")"#),
            Err(ParseError::ComparisonArity("eq".to_string()))
        );
        assert_eq!(
            parse_filter(r#"and()"#),
            Err(ParseError::EmptyOperation("and".to_string()))
        );
    }

    #[test]
    fn malformed_input_reports_position() {
        assert_eq!(
            parse_filter(r#"eq("name", "sam""#),
            Err(ParseError::UnexpectedEnd)
        );
        assert_eq!(
            parse_filter(r#"eq("name", "sam") extra"#),
            Err(ParseError::Trailing(18))
        );
        assert_eq!(
            parse_filter(r#"eq("name, "sam")"#),
            Err(ParseError::Unexpected {
                found: 's',
                offset: 11
            })
        );
    }
}
