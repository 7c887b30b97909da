//! Manifest parser - splits YAML/JSON files into resource documents

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("Document {index} is not a mapping")]
    NotAMapping { index: usize },
}

/// One resource's field tree
pub type Document = Map<String, Value>;

/// Kinds dropped by the default parser
pub const DEFAULT_SKIP_KINDS: &[&str] = &["CustomResourceDefinition"];

/// API versions dropped by the default parser
pub const DEFAULT_SKIP_API_VERSIONS: &[&str] = &["custom.k8s.io/v1"];

/// Turns a file into the ordered documents it contains
pub trait DocumentParser: Sync {
    fn parse_file(&self, path: &Path) -> Result<Vec<Document>, ParseError>;
}

/// Multi-document YAML parser (JSON is accepted as a YAML subset)
#[derive(Debug, Clone)]
pub struct YamlParser {
    skip_kinds: Vec<String>,
    skip_api_versions: Vec<String>,
}

impl Default for YamlParser {
    fn default() -> Self {
        Self {
            skip_kinds: DEFAULT_SKIP_KINDS.iter().map(|s| s.to_string()).collect(),
            skip_api_versions: DEFAULT_SKIP_API_VERSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl YamlParser {
    /// Create a parser that drops the given kinds and API versions
    pub fn new(skip_kinds: Vec<String>, skip_api_versions: Vec<String>) -> Self {
        Self {
            skip_kinds,
            skip_api_versions,
        }
    }

    /// Parse manifest source into documents
    pub fn parse_str(&self, source: &str) -> Result<Vec<Document>, ParseError> {
        let mut documents = Vec::new();

        for (index, de) in serde_yaml::Deserializer::from_str(source).enumerate() {
            match Value::deserialize(de)? {
                Value::Null => continue,
                Value::Object(map) => {
                    if self.is_skipped(&map) {
                        debug!("skipping document {} ({:?})", index, document_kind(&map));
                        continue;
                    }
                    documents.push(map);
                }
                _ => return Err(ParseError::NotAMapping { index }),
            }
        }

        Ok(documents)
    }

    fn is_skipped(&self, document: &Document) -> bool {
        let kind_skipped = document_kind(document)
            .is_some_and(|kind| self.skip_kinds.iter().any(|k| k == kind));
        let api_skipped = document
            .get("apiVersion")
            .and_then(Value::as_str)
            .is_some_and(|api| self.skip_api_versions.iter().any(|a| a == api));
        kind_skipped || api_skipped
    }
}

impl DocumentParser for YamlParser {
    fn parse_file(&self, path: &Path) -> Result<Vec<Document>, ParseError> {
        let source = fs::read_to_string(path)?;
        self.parse_str(&source)
    }
}

/// The document's `kind`, if it is a string
pub fn document_kind(document: &Document) -> Option<&str> {
    document.get("kind").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_single_document() {
        let docs = YamlParser::default()
            .parse_str("kind: Service\nmetadata:\n  name: svc\n")
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(document_kind(&docs[0]), Some("Service"));
        assert_eq!(docs[0]["metadata"]["name"], "svc");
    }

    #[test]
    fn test_parse_multi_document() {
        let source = r#"---
kind: Service
metadata:
  name: web
---
kind: Deployment
metadata:
  name: web
spec:
  replicas: 3
...
"#;
        let docs = YamlParser::default().parse_str(source).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(document_kind(&docs[1]), Some("Deployment"));
        assert_eq!(docs[1]["spec"]["replicas"], 3);
    }

    #[test]
    fn test_parse_json_document() {
        let docs = YamlParser::default()
            .parse_str(r#"{"kind": "Pod", "metadata": {"name": "p"}, "spec": {"replicas": 2}}"#)
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["spec"]["replicas"], 2);
    }

    #[test]
    fn test_empty_documents_skipped() {
        let docs = YamlParser::default().parse_str("---\n---\nkind: Pod\n---\n").unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_scalar_document_rejected() {
        let result = YamlParser::default().parse_str("kind: Pod\n---\njust a string\n");
        assert!(matches!(result, Err(ParseError::NotAMapping { index: 1 })));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = YamlParser::default().parse_str("kind: [unclosed\n");
        assert!(matches!(result, Err(ParseError::ParseYaml(_))));
    }

    #[test]
    fn test_custom_resources_skipped() {
        let source = r#"
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
---
apiVersion: custom.k8s.io/v1
kind: Widget
metadata:
  name: w
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: cm
"#;
        let docs = YamlParser::default().parse_str(source).unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(document_kind(&docs[0]), Some("ConfigMap"));
    }

    #[test]
    fn test_custom_skip_lists() {
        let parser = YamlParser::new(vec!["Secret".to_string()], Vec::new());
        let docs = parser
            .parse_str("kind: Secret\n---\nkind: CustomResourceDefinition\n")
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(document_kind(&docs[0]), Some("CustomResourceDefinition"));
    }

    #[test]
    fn test_parse_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "kind: Namespace\nmetadata:\n  name: prod").unwrap();

        let docs = YamlParser::default().parse_file(file.path()).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_parse_missing_file() {
        let result = YamlParser::default().parse_file(Path::new("/nonexistent/file.yaml"));
        assert!(matches!(result, Err(ParseError::ReadFile(_))));
    }
}
