//! Condition expression evaluator

use super::ast::{CompareOp, Expression, Literal};
use crate::agentflow::workflow::state::GraphState;
use serde_json::Value;

/// Evaluate a condition expression against graph state.
///
/// Missing fields compare equal to `null` and fail every ordering comparison.
pub fn evaluate(expr: &Expression, state: &GraphState) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Compare { path, op, value } => evaluate_compare(path, *op, value, state),
        Expression::And(left, right) => evaluate(left, state) && evaluate(right, state),
        Expression::Or(left, right) => evaluate(left, state) || evaluate(right, state),
        Expression::Not(inner) => !evaluate(inner, state),
    }
}

fn evaluate_compare(path: &str, op: CompareOp, right: &Literal, state: &GraphState) -> bool {
    let left = state.get_path(path);

    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::NotEq => !values_equal(left, right),
        CompareOp::Gt => compare_numbers(left, right, |a, b| a > b),
        CompareOp::Gte => compare_numbers(left, right, |a, b| a >= b),
        CompareOp::Lt => compare_numbers(left, right, |a, b| a < b),
        CompareOp::Lte => compare_numbers(left, right, |a, b| a <= b),
        CompareOp::Contains => check_contains(left, right),
    }
}

fn literal_matches(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (Value::Null, Literal::Null) => true,
        (Value::String(s), Literal::String(rs)) => s == rs,
        (Value::Number(n), Literal::Number(rn)) => n
            .as_f64()
            .map(|f| (f - rn).abs() < f64::EPSILON)
            .unwrap_or(false),
        (Value::Bool(b), Literal::Boolean(rb)) => b == rb,
        _ => false,
    }
}

fn values_equal(left: Option<&Value>, right: &Literal) -> bool {
    match left {
        None => *right == Literal::Null,
        Some(value) => literal_matches(value, right),
    }
}

fn compare_numbers<F>(left: Option<&Value>, right: &Literal, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (left.and_then(Value::as_f64), right) {
        (Some(l), Literal::Number(r)) => cmp(l, *r),
        _ => false,
    }
}

fn check_contains(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::String(s)), Literal::String(needle)) => s.contains(needle.as_str()),
        (Some(Value::Array(items)), literal) => items.iter().any(|v| literal_matches(v, literal)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentflow::workflow::condition::parser::parse;
    use serde_json::json;

    fn state_with(pairs: Vec<(&str, Value)>) -> GraphState {
        let mut values = vec![("final_output", json!(""))];
        values.extend(pairs);
        GraphState::new(values).unwrap()
    }

    fn holds(condition: &str, state: &GraphState) -> bool {
        evaluate(&parse(condition).unwrap(), state)
    }

    #[test]
    fn test_string_equality() {
        let state = state_with(vec![("intent", json!("search"))]);

        assert!(holds("intent == 'search'", &state));
        assert!(!holds("intent == 'code'", &state));
        assert!(holds("intent != 'code'", &state));
    }

    #[test]
    fn test_number_comparison() {
        let state = state_with(vec![("score", json!(7.5))]);

        assert!(holds("score > 5", &state));
        assert!(!holds("score > 10", &state));
        assert!(holds("score >= 7.5", &state));
        assert!(holds("score < 10", &state));
        assert!(holds("score <= 7.5", &state));
        assert!(!holds("score <= 7", &state));
    }

    #[test]
    fn test_no_coercion_between_types() {
        let state = state_with(vec![("count", json!("3"))]);

        assert!(!holds("count == 3", &state));
        assert!(!holds("count > 1", &state));
        assert!(holds("count == '3'", &state));
    }

    #[test]
    fn test_missing_field_is_null() {
        let state = state_with(vec![("result", json!(null))]);

        assert!(holds("result == null", &state));
        assert!(holds("nonexistent == null", &state));
        assert!(!holds("nonexistent == 'value'", &state));
        assert!(!holds("nonexistent > 0", &state));
    }

    #[test]
    fn test_contains() {
        let state = state_with(vec![
            ("message", json!("hello world")),
            ("tags", json!(["bug", "urgent"])),
            ("scores", json!([1, 2, 3])),
        ]);

        assert!(holds("message contains 'world'", &state));
        assert!(!holds("message contains 'foo'", &state));
        assert!(holds("tags contains 'urgent'", &state));
        assert!(!holds("tags contains 'frontend'", &state));
        assert!(holds("scores contains 2", &state));
    }

    #[test]
    fn test_logical_operators() {
        let state = state_with(vec![("intent", json!("code")), ("confidence", json!(0.9))]);

        assert!(holds("intent == 'code' and confidence > 0.8", &state));
        assert!(!holds("intent == 'code' and confidence > 0.95", &state));
        assert!(holds("intent == 'search' or confidence > 0.8", &state));
        assert!(holds("not intent == 'search'", &state));
        assert!(!holds("not (intent == 'code' or confidence > 5)", &state));
    }

    #[test]
    fn test_nested_path() {
        let state = state_with(vec![("result", json!({"data": {"intent": "search"}}))]);

        assert!(holds("result.data.intent == 'search'", &state));
        assert!(!holds("result.data.intent == 'code'", &state));
    }
}
