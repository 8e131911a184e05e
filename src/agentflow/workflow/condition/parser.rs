//! Condition expression parser
//!
//! Parses expressions like:
//! - `field == 'value'`
//! - `score > 0.8`
//! - `a == 'x' and (b > 5 or not c == true)`
//!
//! `or` binds loosest, then `and`, then `not`. Parentheses group.

use super::ast::{CompareOp, Expression, Literal};
use thiserror::Error;

/// Error produced for a malformed condition
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct ParseError(String);

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::new("empty condition"));
    }
    check_balanced(input)?;
    parse_expr(input)
}

fn parse_expr(input: &str) -> Result<Expression, ParseError> {
    let input = input.trim();

    if let Some(pos) = find_top_level(input, " or ") {
        let left = parse_expr(&input[..pos])?;
        let right = parse_expr(&input[pos + " or ".len()..])?;
        return Ok(Expression::Or(Box::new(left), Box::new(right)));
    }

    if let Some(pos) = find_top_level(input, " and ") {
        let left = parse_expr(&input[..pos])?;
        let right = parse_expr(&input[pos + " and ".len()..])?;
        return Ok(Expression::And(Box::new(left), Box::new(right)));
    }

    parse_unary(input)
}

fn parse_unary(input: &str) -> Result<Expression, ParseError> {
    let input = input.trim();

    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expression::Not(Box::new(parse_unary(rest)?)));
    }

    if let Some(inner) = strip_outer_parens(input) {
        return parse_expr(inner);
    }

    match input {
        "true" => Ok(Expression::True),
        "false" => Ok(Expression::False),
        "" => Err(ParseError::new("missing operand")),
        _ => parse_comparison(input),
    }
}

fn parse_comparison(input: &str) -> Result<Expression, ParseError> {
    // Longest operators first so `>=` is not read as `>`
    let operators = [
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        (" contains ", CompareOp::Contains),
    ];

    for (symbol, op) in operators {
        if let Some(pos) = find_top_level(input, symbol) {
            let path = input[..pos].trim();
            if path.is_empty() {
                return Err(ParseError::new(format!("missing field before '{}'", op)));
            }
            if !path
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
            {
                return Err(ParseError::new(format!("invalid field path '{}'", path)));
            }
            let value = parse_literal(&input[pos + symbol.len()..])?;
            return Ok(Expression::Compare {
                path: path.to_string(),
                op,
                value,
            });
        }
    }

    Err(ParseError::new(format!("could not parse condition: {}", input)))
}

fn parse_literal(input: &str) -> Result<Literal, ParseError> {
    let input = input.trim();

    match input {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Boolean(true)),
        "false" => return Ok(Literal::Boolean(false)),
        _ => {}
    }

    for quote in ['\'', '"'] {
        if input.starts_with(quote) {
            if input.len() >= 2 && input.ends_with(quote) {
                return Ok(Literal::String(input[1..input.len() - 1].to_string()));
            }
            return Err(ParseError::new(format!("unterminated string: {}", input)));
        }
    }

    input
        .parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| ParseError::new(format!("could not parse literal: {}", input)))
}

/// Byte offset of `needle` outside quotes and parentheses
fn find_top_level(input: &str, needle: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ if depth == 0 && input[i..].starts_with(needle) => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// Inner text when the whole input is one parenthesized group
fn strip_outer_parens(input: &str) -> Option<&str> {
    if !input.starts_with('(') || !input.ends_with(')') {
        return None;
    }

    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && i != input.len() - 1 {
                        return None;
                    }
                }
                _ => {}
            },
        }
    }
    Some(&input[1..input.len() - 1])
}

fn check_balanced(input: &str) -> Result<(), ParseError> {
    let mut quote: Option<char> = None;
    let mut depth = 0i32;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(ParseError::new("unbalanced parentheses"));
                    }
                }
                _ => {}
            },
        }
    }

    if quote.is_some() {
        return Err(ParseError::new("unterminated string"));
    }
    if depth != 0 {
        return Err(ParseError::new("unbalanced parentheses"));
    }
    Ok(())
}
