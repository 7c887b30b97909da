//! Operator evaluator for rule trees
//!
//! Evaluates a single decoded [`Operator`] against the document value found
//! at the operator's key.
//!
//! # Supported Operators
//!
//! - `AND(a, b)` / `OR(a, b)` - short-circuit logical operators
//! - `NOT(a)` - negation
//! - `LT(v)` / `GT(v)` - numeric comparison; the value may be a number or a
//!   numeric string
//! - `EQ(v)` - string equality after rendering both sides
//! - `TAG(name)` - cross-document equality on a named tag
//! - `PATH(i)` - equality with the `i`-th path segment counted backward from
//!   the file name (`0` is the file name itself)
//!
//! # Tags
//!
//! The first top-level `TAG(name)` check of a run records the rendered value
//! as canonical and holds. Later top-level checks hold only if they render
//! the same string. Checks nested inside `AND`/`OR`/`NOT` only read the
//! table: an unknown tag holds there without being recorded, so short
//! circuiting never changes which value becomes canonical.
//!
//! # Errors
//!
//! Coercion and rendering failures propagate from any depth to the caller.
//! Operands skipped by short-circuiting are never evaluated.

use super::value::{render, to_number, EvalError};
use super::Operator;
use crate::context::TagTable;
use serde_json::Value;

/// Result of a top-level operator evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operator was evaluated
    Holds(bool),
    /// `PATH(index)` pointed past the available path segments
    PathOutOfRange { index: usize, len: usize },
}

/// Evaluates operators against values from one file
pub struct ExpressionEvaluator<'a> {
    segments: &'a [String],
}

impl<'a> ExpressionEvaluator<'a> {
    /// Create a new evaluator for a file's path segments
    pub fn new(segments: &'a [String]) -> Self {
        Self { segments }
    }

    /// Top-level evaluation, invoked once per operator key by the tree walker.
    ///
    /// This is the only entry point allowed to record tags.
    pub fn evaluate(
        &self,
        op: &Operator,
        value: &Value,
        tags: &mut TagTable,
    ) -> Result<Outcome, EvalError> {
        match op {
            Operator::Tag(name) => {
                let rendered = render(value)?;
                match tags.get(name) {
                    Some(canonical) => Ok(Outcome::Holds(canonical == rendered)),
                    None => {
                        tags.record(name, rendered);
                        Ok(Outcome::Holds(true))
                    }
                }
            }
            Operator::Path(index) if *index >= self.segments.len() => Ok(Outcome::PathOutOfRange {
                index: *index,
                len: self.segments.len(),
            }),
            _ => self.holds(op, value, tags).map(Outcome::Holds),
        }
    }

    /// Nested evaluation. The tag table is read-only here.
    pub fn holds(&self, op: &Operator, value: &Value, tags: &TagTable) -> Result<bool, EvalError> {
        match op {
            Operator::And(a, b) => Ok(self.holds(a, value, tags)? && self.holds(b, value, tags)?),
            Operator::Or(a, b) => Ok(self.holds(a, value, tags)? || self.holds(b, value, tags)?),
            Operator::Not(a) => Ok(!self.holds(a, value, tags)?),
            Operator::Lt(limit) => Ok(to_number(value)? < *limit),
            Operator::Gt(limit) => Ok(to_number(value)? > *limit),
            Operator::Eq(expected) => Ok(render(value)? == *expected),
            Operator::Tag(name) => {
                let rendered = render(value)?;
                Ok(tags.get(name).map_or(true, |canonical| canonical == rendered))
            }
            Operator::Path(index) => match self.segment(*index) {
                Some(segment) => Ok(render(value)? == segment),
                None => Ok(false),
            },
        }
    }

    /// Path segment `index` places back from the file name
    fn segment(&self, index: usize) -> Option<&str> {
        let len = self.segments.len();
        if index < len {
            Some(self.segments[len - 1 - index].as_str())
        } else {
            None
        }
    }
}
