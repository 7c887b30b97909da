//! Diagnostic records produced by a verification run

use crate::rules::RuleType;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Broad category of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// The directory walk failed for an entry
    Traversal,
    /// A file could not be parsed into documents
    Parse,
    /// A document is missing required fields or duplicates another resource
    Structural,
    /// A rule's allow/deny polarity was broken
    Rule,
    /// A rule could not be applied (bad pattern, operator or value)
    Schema,
}

impl DiagnosticKind {
    /// All kinds, in report order
    pub const ALL: [DiagnosticKind; 5] = [
        DiagnosticKind::Traversal,
        DiagnosticKind::Parse,
        DiagnosticKind::Structural,
        DiagnosticKind::Rule,
        DiagnosticKind::Schema,
    ];

    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Traversal => "traversal",
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::Structural => "structural",
            DiagnosticKind::Rule => "rule",
            DiagnosticKind::Schema => "schema",
        }
    }

    /// Get colored display name for terminal output
    pub fn colored(&self) -> String {
        match self {
            DiagnosticKind::Traversal | DiagnosticKind::Parse => {
                format!("\x1b[1;35m{}\x1b[0m", self.as_str())
            }
            DiagnosticKind::Structural => format!("\x1b[1;33m{}\x1b[0m", self.as_str()),
            DiagnosticKind::Rule => format!("\x1b[1;31m{}\x1b[0m", self.as_str()),
            DiagnosticKind::Schema => format!("\x1b[1;36m{}\x1b[0m", self.as_str()),
        }
    }
}

/// What went wrong, independent of where it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    TraversalFailed,
    ParseFailed,
    MissingKind,
    InvalidMetadata,
    MissingName,
    DuplicateResource,
    KindNotAllowed,
    MissingKey,
    ExpectedObject,
    BrokenAnd,
    BrokenOr,
    BrokenNot,
    BrokenLt,
    BrokenGt,
    BrokenEq,
    BrokenTag,
    BrokenPath,
    PathOutOfRange,
    InvalidPattern,
    InvalidRuleType,
    InvalidOperation,
    EvaluationFailed,
}

impl Template {
    /// The category this template belongs to
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Template::TraversalFailed => DiagnosticKind::Traversal,
            Template::ParseFailed => DiagnosticKind::Parse,
            Template::MissingKind
            | Template::InvalidMetadata
            | Template::MissingName
            | Template::DuplicateResource => DiagnosticKind::Structural,
            Template::KindNotAllowed
            | Template::MissingKey
            | Template::ExpectedObject
            | Template::BrokenAnd
            | Template::BrokenOr
            | Template::BrokenNot
            | Template::BrokenLt
            | Template::BrokenGt
            | Template::BrokenEq
            | Template::BrokenTag
            | Template::BrokenPath
            | Template::PathOutOfRange => DiagnosticKind::Rule,
            Template::InvalidPattern
            | Template::InvalidRuleType
            | Template::InvalidOperation
            | Template::EvaluationFailed => DiagnosticKind::Schema,
        }
    }

    /// Short human-readable phrase
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::TraversalFailed => "error while traversing folder",
            Template::ParseFailed => "could not parse file",
            Template::MissingKind => "resource does not have a 'kind' field",
            Template::InvalidMetadata => "resource has missing or invalid 'metadata'",
            Template::MissingName => "resource does not have 'metadata.name'",
            Template::DuplicateResource => "duplicate resource",
            Template::KindNotAllowed => "kind not allowed",
            Template::MissingKey => "resource missing expected key",
            Template::ExpectedObject => "expected object at key",
            Template::BrokenAnd => "broken AND() rule",
            Template::BrokenOr => "broken OR() rule",
            Template::BrokenNot => "broken NOT() rule",
            Template::BrokenLt => "broken LT() rule",
            Template::BrokenGt => "broken GT() rule",
            Template::BrokenEq => "broken EQ() rule",
            Template::BrokenTag => "broken TAG() rule",
            Template::BrokenPath => "broken PATH() rule",
            Template::PathOutOfRange => "PATH() index out of range",
            Template::InvalidPattern => "could not compile file pattern",
            Template::InvalidRuleType => "invalid rule type",
            Template::InvalidOperation => "invalid rule operation",
            Template::EvaluationFailed => "could not evaluate rule",
        }
    }
}

/// A single verification finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// What went wrong
    pub template: Template,
    /// File the finding belongs to
    pub path: PathBuf,
    /// Dot-joined document key, for rule findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// What the rule expected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// What the document contained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Polarity of the rule that produced the finding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<RuleType>,
    /// Position of the rule in the ruleset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<usize>,
    /// Position of the document within its file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_index: Option<usize>,
    /// Underlying error text for parse, traversal and schema findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(template: Template, path: impl AsRef<Path>) -> Self {
        Self {
            template,
            path: path.as_ref().to_path_buf(),
            key: None,
            expected: None,
            actual: None,
            rule_type: None,
            rule_index: None,
            document_index: None,
            detail: None,
        }
    }

    /// Category of this diagnostic
    pub fn kind(&self) -> DiagnosticKind {
        self.template.kind()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    /// Attach the rule that produced this diagnostic
    pub fn with_rule(mut self, rule_index: usize, rule_type: Option<RuleType>) -> Self {
        self.rule_index = Some(rule_index);
        self.rule_type = rule_type;
        self
    }

    pub fn with_document(mut self, document_index: usize) -> Self {
        self.document_index = Some(document_index);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.template.as_str(), self.path.display())?;
        if let Some(index) = self.document_index {
            write!(f, " (document {})", index + 1)?;
        }
        if let Some(ref key) = self.key {
            write!(f, " at key `{}`", key)?;
        }
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => write!(f, ": expected {}, got {}", expected, actual)?,
            (Some(expected), None) => write!(f, ": expected {}", expected)?,
            (None, Some(actual)) => write!(f, ": {}", actual)?,
            (None, None) => {}
        }
        if let Some(ref detail) = self.detail {
            write!(f, ": {}", detail)?;
        }
        if let (Some(index), Some(rule_type)) = (self.rule_index, self.rule_type) {
            write!(f, " [{} rule #{}]", rule_type, index + 1)?;
        } else if let Some(index) = self.rule_index {
            write!(f, " [rule #{}]", index + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_kinds() {
        assert_eq!(Template::MissingKind.kind(), DiagnosticKind::Structural);
        assert_eq!(Template::DuplicateResource.kind(), DiagnosticKind::Structural);
        assert_eq!(Template::KindNotAllowed.kind(), DiagnosticKind::Rule);
        assert_eq!(Template::PathOutOfRange.kind(), DiagnosticKind::Rule);
        assert_eq!(Template::InvalidOperation.kind(), DiagnosticKind::Schema);
        assert_eq!(Template::ParseFailed.kind(), DiagnosticKind::Parse);
        assert_eq!(Template::TraversalFailed.kind(), DiagnosticKind::Traversal);
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(DiagnosticKind::Rule.as_str(), "rule");
        assert_eq!(DiagnosticKind::Schema.as_str(), "schema");
        assert!(DiagnosticKind::Structural.colored().contains("structural"));
    }

    #[test]
    fn test_diagnostic_new() {
        let diag = Diagnostic::new(Template::MissingKey, "deploy/app.yaml");

        assert_eq!(diag.kind(), DiagnosticKind::Rule);
        assert_eq!(diag.path, PathBuf::from("deploy/app.yaml"));
        assert!(diag.key.is_none());
        assert!(diag.rule_type.is_none());
        assert!(diag.detail.is_none());
    }

    #[test]
    fn test_diagnostic_builder_chain() {
        let diag = Diagnostic::new(Template::BrokenLt, "app.yaml")
            .with_key("spec.replicas")
            .with_expected("LT(5)")
            .with_actual("10")
            .with_rule(0, Some(RuleType::Allow))
            .with_document(1);

        assert_eq!(diag.key.as_deref(), Some("spec.replicas"));
        assert_eq!(diag.expected.as_deref(), Some("LT(5)"));
        assert_eq!(diag.actual.as_deref(), Some("10"));
        assert_eq!(diag.rule_type, Some(RuleType::Allow));
        assert_eq!(diag.rule_index, Some(0));
        assert_eq!(diag.document_index, Some(1));
    }

    #[test]
    fn test_display_rule_violation() {
        let diag = Diagnostic::new(Template::BrokenLt, "app.yaml")
            .with_key("spec.replicas")
            .with_expected("LT(5)")
            .with_actual("10")
            .with_rule(1, Some(RuleType::Allow))
            .with_document(0);

        assert_eq!(
            diag.to_string(),
            "broken LT() rule in app.yaml (document 1) at key `spec.replicas`: expected LT(5), got 10 [allow rule #2]"
        );
    }

    #[test]
    fn test_display_with_detail() {
        let diag = Diagnostic::new(Template::ParseFailed, "broken.yaml").with_detail("bad indentation");
        assert_eq!(diag.to_string(), "could not parse file in broken.yaml: bad indentation");
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let diag = Diagnostic::new(Template::KindNotAllowed, "a.yaml").with_actual("Deployment");
        let json = serde_json::to_value(&diag).unwrap();

        assert_eq!(json["template"], "kind-not-allowed");
        assert_eq!(json["actual"], "Deployment");
        assert!(json.get("key").is_none());
        assert!(json.get("rule_type").is_none());
    }
}
