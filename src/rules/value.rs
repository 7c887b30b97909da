//! Numeric coercion and string rendering of document values
//!
//! Every operator goes through these two functions, so a value that cannot
//! be compared fails the same way at every nesting level.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("cannot convert {0} to a number")]
    NotNumeric(String),
    #[error("cannot compare {0} as a scalar")]
    NotScalar(&'static str),
}

/// Coerce a document value to a number.
///
/// Accepts any JSON/YAML number and strings that parse as a float.
pub fn to_number(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EvalError::NotNumeric(n.to_string())),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| EvalError::NotNumeric(format!("{:?}", s))),
        other => Err(EvalError::NotNumeric(describe(other))),
    }
}

/// Render a scalar document value to the string used for equality checks
pub fn render(value: &Value) -> Result<String, EvalError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) => Err(EvalError::NotScalar("an array")),
        Value::Object(_) => Err(EvalError::NotScalar("a mapping")),
    }
}

/// Describe any value for diagnostics, falling back to its shape
pub fn describe(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("an array of {} item(s)", items.len()),
        Value::Object(_) => "a mapping".to_string(),
        scalar => render(scalar).unwrap_or_default(),
    }
}
