//! Recursive matching of a rule tree against a document

use super::evaluator::{ExpressionEvaluator, Outcome};
use super::value::describe;
use super::{ExpressionNode, FieldGroup, Operator, RuleType, SchemaError};
use crate::context::TagTable;
use crate::diagnostics::{Diagnostic, Template};
use log::debug;
use serde_json::{Map, Value};
use std::path::Path;

/// Walks one rule's tree against one document
pub struct TreeEvaluator<'a> {
    file: &'a Path,
    segments: &'a [String],
    rule_type: RuleType,
    rule_index: usize,
    document_index: usize,
}

impl<'a> TreeEvaluator<'a> {
    pub fn new(
        file: &'a Path,
        segments: &'a [String],
        rule_type: RuleType,
        rule_index: usize,
        document_index: usize,
    ) -> Self {
        Self {
            file,
            segments,
            rule_type,
            rule_index,
            document_index,
        }
    }

    /// Evaluate the tree and return every diagnostic it produces
    pub fn evaluate(
        &self,
        tree: &FieldGroup,
        document: &Map<String, Value>,
        tags: &mut TagTable,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.walk(tree, document, "", tags, &mut diagnostics);
        diagnostics
    }

    fn walk(
        &self,
        group: &FieldGroup,
        fields: &Map<String, Value>,
        prefix: &str,
        tags: &mut TagTable,
        out: &mut Vec<Diagnostic>,
    ) {
        for (key, node) in group {
            let label = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            if let ExpressionNode::Array = node {
                debug!("skipping array rule node at `{}`", label);
                continue;
            }

            let Some(value) = fields.get(key) else {
                out.push(self.diagnostic(Template::MissingKey, &label));
                continue;
            };

            match node {
                ExpressionNode::Group(children) => match value {
                    Value::Object(inner) => self.walk(children, inner, &label, tags, out),
                    other => out.push(
                        self.diagnostic(Template::ExpectedObject, &label)
                            .with_actual(describe(other)),
                    ),
                },
                ExpressionNode::Operator(op) => {
                    if let Some(diagnostic) = self.apply(op, &label, value, tags) {
                        out.push(diagnostic);
                    }
                }
                ExpressionNode::Invalid(err) => out.push(self.schema_error(err, &label)),
                ExpressionNode::Array => {}
            }
        }
    }

    /// Apply one operator and turn polarity into at most one diagnostic
    fn apply(
        &self,
        op: &Operator,
        label: &str,
        value: &Value,
        tags: &mut TagTable,
    ) -> Option<Diagnostic> {
        let evaluator = ExpressionEvaluator::new(self.segments);

        match evaluator.evaluate(op, value, tags) {
            Ok(Outcome::Holds(holds)) => {
                if !self.rule_type.is_broken_by(holds) {
                    return None;
                }
                let expected = match op {
                    Operator::Tag(name) => tags
                        .get(name)
                        .map(|canonical| format!("{} = {:?}", op, canonical))
                        .unwrap_or_else(|| op.to_string()),
                    _ => op.to_string(),
                };
                let expected = match self.rule_type {
                    RuleType::Allow => expected,
                    RuleType::Deny => format!("not {}", expected),
                };
                Some(
                    self.diagnostic(op.template(), label)
                        .with_expected(expected)
                        .with_actual(describe(value)),
                )
            }
            Ok(Outcome::PathOutOfRange { index, len }) => Some(
                self.diagnostic(Template::PathOutOfRange, label)
                    .with_expected(format!("index below {}", len))
                    .with_actual(index.to_string()),
            ),
            Err(err) => Some(self.schema_error(&SchemaError::from(err), label)),
        }
    }

    fn diagnostic(&self, template: Template, label: &str) -> Diagnostic {
        Diagnostic::new(template, self.file)
            .with_key(label)
            .with_rule(self.rule_index, Some(self.rule_type))
            .with_document(self.document_index)
    }

    fn schema_error(&self, err: &SchemaError, label: &str) -> Diagnostic {
        self.diagnostic(err.template(), label)
            .with_detail(err.to_string())
    }
}
