//! Rule selection: which rules apply to a file and its documents

use crate::context::TagTable;
use crate::diagnostics::{Diagnostic, Template};
use crate::parser::{document_kind, Document};
use crate::rules::{Rule, TreeEvaluator};
use log::debug;
use std::path::{Component, Path};

/// One document of a file, located for diagnostics
pub struct DocumentSite<'a> {
    pub file: &'a Path,
    pub segments: &'a [String],
    pub index: usize,
    pub document: &'a Document,
}

/// Applies a ruleset's rules to parsed files
pub struct RuleMatcher<'a> {
    rules: &'a [Rule],
}

impl<'a> RuleMatcher<'a> {
    pub fn new(rules: &'a [Rule]) -> Self {
        Self { rules }
    }

    /// Apply every rule whose pattern matches the file's base name
    pub fn check_file(&self, file: &Path, documents: &[Document], tags: &mut TagTable) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let segments = path_segments(file);

        for (rule_index, rule) in self.rules.iter().enumerate() {
            match rule.matches_file(&file_name) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    diagnostics.push(
                        Diagnostic::new(err.template(), file)
                            .with_rule(rule_index, rule.rule_type.clone().ok())
                            .with_detail(err.to_string()),
                    );
                    continue;
                }
            }

            for (document_index, document) in documents.iter().enumerate() {
                if document_kind(document).is_some_and(|kind| rule.applies_to(kind)) {
                    debug!(
                        "rule #{} applies to document {} of {}",
                        rule_index + 1,
                        document_index,
                        file.display()
                    );
                    let site = DocumentSite {
                        file,
                        segments: &segments,
                        index: document_index,
                        document,
                    };
                    diagnostics.extend(self.check_document(rule_index, rule, &site, tags));
                }
            }
        }

        diagnostics
    }

    /// Apply one rule to one document whose kind it targets
    fn check_document(
        &self,
        rule_index: usize,
        rule: &Rule,
        site: &DocumentSite<'_>,
        tags: &mut TagTable,
    ) -> Vec<Diagnostic> {
        if rule.is_blanket_deny() {
            return vec![Diagnostic::new(Template::KindNotAllowed, site.file)
                .with_rule(rule_index, rule.rule_type.clone().ok())
                .with_document(site.index)
                .with_actual(rule.kind.clone())];
        }

        match &rule.rule_type {
            Ok(rule_type) => TreeEvaluator::new(site.file, site.segments, *rule_type, rule_index, site.index)
                .evaluate(&rule.tree, site.document, tags),
            Err(err) => vec![Diagnostic::new(err.template(), site.file)
                .with_rule(rule_index, None)
                .with_document(site.index)
                .with_detail(err.to_string())],
        }
    }
}

/// A file path's normal components, root first, file name last
pub fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::rules::{ExpressionNode, FieldGroup, Operator, RuleType, SchemaError};
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    fn replicas_below_five() -> FieldGroup {
        let mut spec = FieldGroup::new();
        spec.insert("replicas".to_string(), ExpressionNode::Operator(Operator::Lt(5.0)));
        let mut tree = FieldGroup::new();
        tree.insert("spec".to_string(), ExpressionNode::Group(spec));
        tree
    }

    #[test]
    fn test_path_segments() {
        assert_eq!(
            path_segments(Path::new("/srv/manifests/prod/app.yaml")),
            vec!["srv", "manifests", "prod", "app.yaml"]
        );
        assert_eq!(path_segments(Path::new("./a/b.yaml")), vec!["a", "b.yaml"]);
    }

    #[test]
    fn test_blanket_deny_kind() {
        let rules = vec![Rule::deny(r"\.yaml$", "Deployment", FieldGroup::new())];
        let mut tags = TagTable::new();
        let docs = vec![doc(json!({"kind": "Deployment", "metadata": {"name": "x"}, "spec": {}}))];

        let diags = RuleMatcher::new(&rules).check_file(Path::new("app.yaml"), &docs, &mut tags);

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].template, Template::KindNotAllowed);
        assert_eq!(diags[0].actual.as_deref(), Some("Deployment"));
        assert_eq!(diags[0].rule_type, Some(RuleType::Deny));
    }

    #[test]
    fn test_pattern_must_match_base_name() {
        let rules = vec![Rule::deny(r"^app\.yaml$", "Deployment", FieldGroup::new())];
        let mut tags = TagTable::new();
        let docs = vec![doc(json!({"kind": "Deployment"}))];

        let matcher = RuleMatcher::new(&rules);
        assert_eq!(matcher.check_file(Path::new("prod/app.yaml"), &docs, &mut tags).len(), 1);
        assert!(matcher.check_file(Path::new("app.yaml/other.yaml"), &docs, &mut tags).is_empty());
    }

    #[test]
    fn test_kind_must_match() {
        let rules = vec![Rule::allow(".*", "Pod", replicas_below_five())];
        let mut tags = TagTable::new();
        let docs = vec![
            doc(json!({"kind": "Deployment", "spec": {"replicas": 10}})),
            doc(json!({"spec": {"replicas": 10}})),
        ];

        let diags = RuleMatcher::new(&rules).check_file(Path::new("a.yaml"), &docs, &mut tags);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_allow_rule_per_document() {
        let rules = vec![Rule::allow(".*", "Pod", replicas_below_five())];
        let mut tags = TagTable::new();
        let docs = vec![
            doc(json!({"kind": "Pod", "spec": {"replicas": 10}})),
            doc(json!({"kind": "Pod", "spec": {"replicas": 3}})),
        ];

        let diags = RuleMatcher::new(&rules).check_file(Path::new("a.yaml"), &docs, &mut tags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].document_index, Some(0));
        assert_eq!(diags[0].template, Template::BrokenLt);
    }

    #[test]
    fn test_invalid_pattern_only_skips_that_rule() {
        let rules = vec![
            Rule::deny("(", "Pod", FieldGroup::new()),
            Rule::deny(".*", "Pod", FieldGroup::new()),
        ];
        let mut tags = TagTable::new();
        let docs = vec![doc(json!({"kind": "Pod"}))];

        let diags = RuleMatcher::new(&rules).check_file(Path::new("a.yaml"), &docs, &mut tags);
        let templates: Vec<_> = diags.iter().map(|d| d.template).collect();
        assert_eq!(templates, vec![Template::InvalidPattern, Template::KindNotAllowed]);
        assert_eq!(diags[0].rule_index, Some(0));
    }

    #[test]
    fn test_invalid_rule_type() {
        let rules = vec![Rule::new(
            ".*",
            "Pod",
            Err(SchemaError::InvalidRuleType("warn".to_string())),
            replicas_below_five(),
        )];
        let mut tags = TagTable::new();
        let docs = vec![doc(json!({"kind": "Pod", "spec": {"replicas": 10}}))];

        let diags = RuleMatcher::new(&rules).check_file(Path::new("a.yaml"), &docs, &mut tags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind(), DiagnosticKind::Schema);
        assert_eq!(diags[0].template, Template::InvalidRuleType);
    }

    #[test]
    fn test_invalid_rule_type_with_empty_tree() {
        let rules = vec![Rule::new(".*", "Pod", Err(SchemaError::MissingRuleType), FieldGroup::new())];
        let mut tags = TagTable::new();
        let docs = vec![doc(json!({"kind": "Pod"}))];

        let diags = RuleMatcher::new(&rules).check_file(Path::new("a.yaml"), &docs, &mut tags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].template, Template::InvalidRuleType);
    }

    #[test]
    fn test_empty_allow_tree_passes() {
        let rules = vec![Rule::allow(".*", "Pod", FieldGroup::new())];
        let mut tags = TagTable::new();
        let docs = vec![doc(json!({"kind": "Pod"}))];

        assert!(RuleMatcher::new(&rules).check_file(Path::new("a.yaml"), &docs, &mut tags).is_empty());
    }

    #[test]
    fn test_path_operator_uses_file_path() {
        let mut metadata = FieldGroup::new();
        metadata.insert("namespace".to_string(), ExpressionNode::Operator(Operator::Path(1)));
        let mut tree = FieldGroup::new();
        tree.insert("metadata".to_string(), ExpressionNode::Group(metadata));
        let rules = vec![Rule::allow(".*", "Service", tree)];
        let mut tags = TagTable::new();
        let docs = vec![doc(json!({"kind": "Service", "metadata": {"name": "a", "namespace": "prod"}}))];

        let matcher = RuleMatcher::new(&rules);
        assert!(matcher.check_file(Path::new("clusters/prod/svc.yaml"), &docs, &mut tags).is_empty());
        assert_eq!(matcher.check_file(Path::new("clusters/dev/svc.yaml"), &docs, &mut tags).len(), 1);
    }

    #[test]
    fn test_check_document_reports_site() {
        let rules = vec![Rule::allow(".*", "Pod", replicas_below_five())];
        let document = doc(json!({"kind": "Pod", "spec": {"replicas": 9}}));
        let segments = path_segments(Path::new("prod/pods.yaml"));
        let site = DocumentSite {
            file: Path::new("prod/pods.yaml"),
            segments: &segments,
            index: 3,
            document: &document,
        };
        let mut tags = TagTable::new();

        let diags = RuleMatcher::new(&rules).check_document(0, &rules[0], &site, &mut tags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].template, Template::BrokenLt);
        assert_eq!(diags[0].document_index, Some(3));
        assert_eq!(diags[0].rule_index, Some(0));
    }
}
