//! Builders for style expressions.
//!
//! Each helper returns the JSON array form of one expression operator,
//! e.g. `get("name")` is `["get", "name"]`.

use serde_json::{Value, json};

/// `["get", property]`
#[must_use]
pub fn get(property: &str) -> Value {
    json!(["get", property])
}

/// `["feature-state", key]`
#[must_use]
pub fn feature_state(key: &str) -> Value {
    json!(["feature-state", key])
}

/// `["to-number", input, fallback]`
#[must_use]
pub fn to_number(input: Value, fallback: f64) -> Value {
    json!(["to-number", input, fallback])
}

/// `["to-string", input]`
#[must_use]
pub fn to_string(input: Value) -> Value {
    json!(["to-string", input])
}

/// `["==", lhs, rhs]`
#[must_use]
pub fn eq(lhs: Value, rhs: impl Into<Value>) -> Value {
    json!(["==", lhs, rhs.into()])
}

/// `["!=", lhs, rhs]`
#[must_use]
pub fn ne(lhs: Value, rhs: impl Into<Value>) -> Value {
    json!(["!=", lhs, rhs.into()])
}

/// `["coalesce", ...]`
#[must_use]
pub fn coalesce(options: Vec<Value>) -> Value {
    let mut out = vec![json!("coalesce")];
    out.extend(options);
    Value::Array(out)
}

/// `["concat", ...]`
#[must_use]
pub fn concat(parts: Vec<Value>) -> Value {
    let mut out = vec![json!("concat")];
    out.extend(parts);
    Value::Array(out)
}

/// `["*", lhs, rhs]`
#[must_use]
pub fn mul(lhs: impl Into<Value>, rhs: impl Into<Value>) -> Value {
    json!(["*", lhs.into(), rhs.into()])
}

/// `["case", cond1, out1, ..., fallback]`
#[must_use]
pub fn case(branches: Vec<(Value, Value)>, fallback: impl Into<Value>) -> Value {
    let mut out = vec![json!("case")];
    for (condition, output) in branches {
        out.push(condition);
        out.push(output);
    }
    out.push(fallback.into());
    Value::Array(out)
}

/// `["step", input, base, stop1, out1, ...]`
///
/// Stop inputs must be strictly increasing; callers are responsible for
/// deduplicating them.
#[must_use]
pub fn step(input: Value, base: impl Into<Value>, stops: Vec<(f64, Value)>) -> Value {
    let mut out = vec![json!("step"), input, base.into()];
    for (value, output) in stops {
        out.push(json!(value));
        out.push(output);
    }
    Value::Array(out)
}
