//! Rule definitions and evaluation

mod evaluator;
mod tree;
pub mod value;

pub use evaluator::{ExpressionEvaluator, Outcome};
pub use tree::TreeEvaluator;
pub use value::EvalError;

use crate::diagnostics::Template;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A problem with a rule that prevents it from being applied to a document.
///
/// Schema errors never abort a run; they are reported for the rule/document
/// pairing they occur in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("could not compile file pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("rule has no type, expected `allow` or `deny`")]
    MissingRuleType,
    #[error("invalid rule type `{0}`, expected `allow` or `deny`")]
    InvalidRuleType(String),
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("malformed `{operation}` operation: {reason}")]
    MalformedOperand { operation: String, reason: String },
    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

impl SchemaError {
    pub fn template(&self) -> Template {
        match self {
            SchemaError::InvalidPattern { .. } => Template::InvalidPattern,
            SchemaError::MissingRuleType | SchemaError::InvalidRuleType(_) => {
                Template::InvalidRuleType
            }
            SchemaError::UnknownOperation(_) | SchemaError::MalformedOperand { .. } => {
                Template::InvalidOperation
            }
            SchemaError::Evaluation(_) => Template::EvaluationFailed,
        }
    }
}

/// Rule polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Documents must satisfy every operator in the tree
    Allow,
    /// Documents must satisfy none of the operators in the tree
    Deny,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Allow => "allow",
            RuleType::Deny => "deny",
        }
    }

    /// Whether an operator result breaks a rule of this polarity
    pub fn is_broken_by(&self, holds: bool) -> bool {
        match self {
            RuleType::Allow => !holds,
            RuleType::Deny => holds,
        }
    }
}

impl FromStr for RuleType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(RuleType::Allow),
            "deny" => Ok(RuleType::Deny),
            other => Err(SchemaError::InvalidRuleType(other.to_string())),
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One level of a rule tree: document key to child node
pub type FieldGroup = BTreeMap<String, ExpressionNode>;

/// A node of a decoded rule tree
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    /// Structural descent into a nested mapping
    Group(FieldGroup),
    /// A leaf check applied to the document value at this key
    Operator(Operator),
    /// Array-valued rule node; recognized but never evaluated
    Array,
    /// An operator node that failed to decode
    Invalid(SchemaError),
}

/// A check applied to a single document value
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    And(Box<Operator>, Box<Operator>),
    Or(Box<Operator>, Box<Operator>),
    Not(Box<Operator>),
    Lt(f64),
    Gt(f64),
    Eq(String),
    /// Cross-document equality on a named tag
    Tag(String),
    /// Equality with a file path segment, counted backward from the file name
    Path(usize),
}

impl Operator {
    /// Template used when this operator breaks a rule
    pub fn template(&self) -> Template {
        match self {
            Operator::And(..) => Template::BrokenAnd,
            Operator::Or(..) => Template::BrokenOr,
            Operator::Not(_) => Template::BrokenNot,
            Operator::Lt(_) => Template::BrokenLt,
            Operator::Gt(_) => Template::BrokenGt,
            Operator::Eq(_) => Template::BrokenEq,
            Operator::Tag(_) => Template::BrokenTag,
            Operator::Path(_) => Template::BrokenPath,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::And(a, b) => write!(f, "AND({}, {})", a, b),
            Operator::Or(a, b) => write!(f, "OR({}, {})", a, b),
            Operator::Not(a) => write!(f, "NOT({})", a),
            Operator::Lt(v) => write!(f, "LT({})", v),
            Operator::Gt(v) => write!(f, "GT({})", v),
            Operator::Eq(v) => write!(f, "EQ({:?})", v),
            Operator::Tag(name) => write!(f, "TAG({})", name),
            Operator::Path(index) => write!(f, "PATH({})", index),
        }
    }
}

/// A verification rule
#[derive(Debug, Clone)]
pub struct Rule {
    /// File-name pattern as written in the ruleset
    pub pattern: String,
    regex: Result<Regex, SchemaError>,
    /// Resource kind the rule targets
    pub kind: String,
    /// Polarity, or the reason it could not be decoded
    pub rule_type: Result<RuleType, SchemaError>,
    /// Decoded expression tree; empty means the kind itself is the subject
    pub tree: FieldGroup,
}

impl Rule {
    /// Create a rule, compiling its file-name pattern
    pub fn new(
        pattern: impl Into<String>,
        kind: impl Into<String>,
        rule_type: Result<RuleType, SchemaError>,
        tree: FieldGroup,
    ) -> Self {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern).map_err(|e| SchemaError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        });

        Self {
            pattern,
            regex,
            kind: kind.into(),
            rule_type,
            tree,
        }
    }

    pub fn allow(pattern: impl Into<String>, kind: impl Into<String>, tree: FieldGroup) -> Self {
        Self::new(pattern, kind, Ok(RuleType::Allow), tree)
    }

    pub fn deny(pattern: impl Into<String>, kind: impl Into<String>, tree: FieldGroup) -> Self {
        Self::new(pattern, kind, Ok(RuleType::Deny), tree)
    }

    /// Check the rule's pattern against a file's base name
    pub fn matches_file(&self, file_name: &str) -> Result<bool, SchemaError> {
        match &self.regex {
            Ok(re) => Ok(re.is_match(file_name)),
            Err(e) => Err(e.clone()),
        }
    }

    /// Check if this rule targets a resource kind
    pub fn applies_to(&self, kind: &str) -> bool {
        self.kind == kind
    }

    /// A deny rule with an empty tree bans its kind outright
    pub fn is_blanket_deny(&self) -> bool {
        matches!(self.rule_type, Ok(RuleType::Deny)) && self.tree.is_empty()
    }
}

/// One entry of the ruleset's ignore list.
///
/// The entry always matches its literal file name. When it also parses as a
/// glob, names matching the glob are ignored too.
#[derive(Debug, Clone)]
pub struct IgnoreEntry {
    pub name: String,
    pub pattern: Option<glob::Pattern>,
}

impl IgnoreEntry {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let pattern = glob::Pattern::new(&name).ok();
        Self { name, pattern }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.name == file_name || self.pattern.as_ref().is_some_and(|p| p.matches(file_name))
    }
}

/// The full, immutable set of rules for a run
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    /// File names skipped entirely
    pub ignore: Vec<IgnoreEntry>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, ignore: Vec<IgnoreEntry>) -> Self {
        Self { rules, ignore }
    }

    /// Check if a file's base name is in the ignore set
    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.ignore.iter().any(|entry| entry.matches(file_name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
