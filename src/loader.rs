//! Rule loader - decodes a ruleset file into a typed [`RuleSet`]
//!
//! Rule trees are decoded exactly once, here. Operator nodes that cannot be
//! decoded become [`ExpressionNode::Invalid`] and are reported against every
//! document the rule is later applied to; only unreadable or syntactically
//! broken ruleset files are fatal.

use crate::rules::value::{describe, render, to_number};
use crate::rules::{ExpressionNode, FieldGroup, IgnoreEntry, Operator, Rule, RuleSet, RuleType, SchemaError};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key whose presence marks a rule tree mapping as an operator node
pub const OPERATOR_MARKER: &str = "gatekeeper";

/// A mapping is an operator node if it carries the marker or a string `operation`
pub fn is_operator_node(map: &Map<String, Value>) -> bool {
    map.contains_key(OPERATOR_MARKER) || map.get("operation").is_some_and(Value::is_string)
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read ruleset {file}: {source}")]
    ReadFile {
        file: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse ruleset {file}: {source}")]
    ParseJson {
        file: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to parse ruleset {file}: {source}")]
    ParseYaml {
        file: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Loads a ruleset from a JSON or YAML file
pub struct RuleLoader {
    path: PathBuf,
}

/// JSON structure for a ruleset file
#[derive(Debug, Deserialize)]
struct RuleSetJson {
    #[serde(default)]
    rules: Vec<RuleJson>,
    #[serde(default)]
    ignore: Vec<String>,
}

/// JSON structure for a single rule
#[derive(Debug, Deserialize)]
struct RuleJson {
    regex: String,
    kind: String,
    #[serde(rename = "type", default)]
    rule_type: Option<String>,
    #[serde(rename = "ruleTree", default)]
    rule_tree: Option<Map<String, Value>>,
}

impl RuleLoader {
    /// Create a new rule loader
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and decode the ruleset file
    pub fn load(&self) -> Result<RuleSet, LoaderError> {
        let content = fs::read_to_string(&self.path).map_err(|source| LoaderError::ReadFile {
            file: self.path.clone(),
            source,
        })?;
        let ruleset = self.parse_str(&content)?;
        debug!(
            "loaded {} rule(s) and {} ignore pattern(s) from {}",
            ruleset.len(),
            ruleset.ignore.len(),
            self.path.display()
        );
        Ok(ruleset)
    }

    /// Decode ruleset source; YAML when the file has a `.yaml`/`.yml` extension
    pub fn parse_str(&self, content: &str) -> Result<RuleSet, LoaderError> {
        let is_yaml = self
            .path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");

        let raw: RuleSetJson = if is_yaml {
            serde_yaml::from_str(content).map_err(|source| LoaderError::ParseYaml {
                file: self.path.clone(),
                source,
            })?
        } else {
            serde_json::from_str(content).map_err(|source| LoaderError::ParseJson {
                file: self.path.clone(),
                source,
            })?
        };

        let rules = raw.rules.into_iter().map(decode_rule).collect();
        let ignore = compile_ignore(&raw.ignore);

        Ok(RuleSet::new(rules, ignore))
    }
}

/// Compile the ignore list; entries that are not valid globs match literally
pub fn compile_ignore(names: &[String]) -> Vec<IgnoreEntry> {
    names
        .iter()
        .map(|name| {
            let entry = IgnoreEntry::new(name.as_str());
            if entry.pattern.is_none() {
                debug!("ignore entry `{}` is not a glob, matching it literally", name);
            }
            entry
        })
        .collect()
}

fn decode_rule(raw: RuleJson) -> Rule {
    let rule_type = match raw.rule_type.as_deref() {
        Some(t) => t.parse::<RuleType>(),
        None => Err(SchemaError::MissingRuleType),
    };
    let tree = raw.rule_tree.as_ref().map(decode_tree).unwrap_or_default();

    Rule::new(raw.regex, raw.kind, rule_type, tree)
}

/// Decode one level of a raw rule tree
pub fn decode_tree(raw: &Map<String, Value>) -> FieldGroup {
    let mut group = FieldGroup::new();

    for (key, value) in raw {
        let node = match value {
            Value::Object(map) if is_operator_node(map) => match decode_operator(map) {
                Ok(op) => ExpressionNode::Operator(op),
                Err(err) => ExpressionNode::Invalid(err),
            },
            Value::Object(map) => ExpressionNode::Group(decode_tree(map)),
            Value::Array(_) => ExpressionNode::Array,
            scalar => {
                warn!(
                    "ignoring scalar `{}` at rule tree key `{}`",
                    describe(scalar),
                    key
                );
                continue;
            }
        };
        group.insert(key.clone(), node);
    }

    group
}

/// Decode an operator node and its operands
pub fn decode_operator(raw: &Map<String, Value>) -> Result<Operator, SchemaError> {
    let operation = match raw.get("operation") {
        Some(Value::String(op)) => op.as_str(),
        Some(other) => return Err(SchemaError::UnknownOperation(describe(other))),
        None => return Err(SchemaError::UnknownOperation("(none)".to_string())),
    };

    match operation {
        "&" => Ok(Operator::And(
            Box::new(operand(raw, operation, "op1")?),
            Box::new(operand(raw, operation, "op2")?),
        )),
        "|" => Ok(Operator::Or(
            Box::new(operand(raw, operation, "op1")?),
            Box::new(operand(raw, operation, "op2")?),
        )),
        "!" => Ok(Operator::Not(Box::new(operand(raw, operation, "op")?))),
        "<" => Ok(Operator::Lt(number(raw, operation)?)),
        ">" => Ok(Operator::Gt(number(raw, operation)?)),
        "=" => {
            let value = field(raw, operation, "value")?;
            let value = render(value).map_err(|e| malformed(operation, e.to_string()))?;
            Ok(Operator::Eq(value))
        }
        "tag" => match field(raw, operation, "tag")? {
            Value::String(name) => Ok(Operator::Tag(name.clone())),
            other => Err(malformed(
                operation,
                format!("`tag` must be a string, got {}", describe(other)),
            )),
        },
        "path" => {
            let index = field(raw, operation, "index")?;
            index
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(Operator::Path)
                .ok_or_else(|| {
                    malformed(
                        operation,
                        format!("`index` must be a non-negative integer, got {}", describe(index)),
                    )
                })
        }
        other => Err(SchemaError::UnknownOperation(other.to_string())),
    }
}

fn field<'a>(raw: &'a Map<String, Value>, operation: &str, name: &str) -> Result<&'a Value, SchemaError> {
    raw.get(name)
        .ok_or_else(|| malformed(operation, format!("missing `{}`", name)))
}

fn operand(raw: &Map<String, Value>, operation: &str, name: &str) -> Result<Operator, SchemaError> {
    match field(raw, operation, name)? {
        Value::Object(map) => decode_operator(map),
        other => Err(malformed(
            operation,
            format!("`{}` must be an operator, got {}", name, describe(other)),
        )),
    }
}

fn number(raw: &Map<String, Value>, operation: &str) -> Result<f64, SchemaError> {
    to_number(field(raw, operation, "value")?).map_err(|e| malformed(operation, e.to_string()))
}

fn malformed(operation: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::MalformedOperand {
        operation: operation.to_string(),
        reason: reason.into(),
    }
}
