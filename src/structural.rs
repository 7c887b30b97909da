//! Rule-independent checks every document must pass

use crate::context::{IdentityRegistry, ResourceIdentity};
use crate::diagnostics::{Diagnostic, Template};
use crate::parser::Document;
use crate::rules::value::{describe, render};
use serde_json::Value;
use std::path::Path;

/// Checks required fields and resource uniqueness for one file's documents
pub struct StructuralValidator<'a> {
    file: &'a Path,
}

impl<'a> StructuralValidator<'a> {
    pub fn new(file: &'a Path) -> Self {
        Self { file }
    }

    /// Validate every document of the file, in order
    pub fn validate(&self, documents: &[Document], registry: &mut IdentityRegistry) -> Vec<Diagnostic> {
        documents
            .iter()
            .enumerate()
            .filter_map(|(index, document)| self.validate_document(index, document, registry))
            .collect()
    }

    /// Validate one document, registering its identity on success.
    ///
    /// A document produces at most one structural diagnostic.
    pub fn validate_document(
        &self,
        index: usize,
        document: &Document,
        registry: &mut IdentityRegistry,
    ) -> Option<Diagnostic> {
        let identity = match resource_identity(document) {
            Ok(identity) => identity,
            Err((template, actual)) => {
                let diagnostic = Diagnostic::new(template, self.file).with_document(index);
                return Some(match actual {
                    Some(actual) => diagnostic.with_actual(actual),
                    None => diagnostic,
                });
            }
        };

        if registry.register(identity.clone()) {
            None
        } else {
            Some(
                Diagnostic::new(Template::DuplicateResource, self.file)
                    .with_document(index)
                    .with_actual(identity.to_string()),
            )
        }
    }
}

/// Resolve a document's identity, or the structural problem preventing it
pub fn resource_identity(document: &Document) -> Result<ResourceIdentity, (Template, Option<String>)> {
    let kind = match document.get("kind") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => return Err((Template::MissingKind, Some(describe(other)))),
        None => return Err((Template::MissingKind, None)),
    };

    let metadata = match document.get("metadata") {
        Some(Value::Object(metadata)) => metadata,
        Some(other) => return Err((Template::InvalidMetadata, Some(describe(other)))),
        None => return Err((Template::InvalidMetadata, None)),
    };

    let name = match metadata.get("name").filter(|v| !v.is_null()) {
        Some(name) => render(name).map_err(|_| (Template::MissingName, Some(describe(name))))?,
        None => return Err((Template::MissingName, None)),
    };

    let namespace = match metadata.get("namespace").filter(|v| !v.is_null()) {
        Some(ns) => Some(render(ns).map_err(|_| (Template::InvalidMetadata, Some(describe(ns))))?),
        None => None,
    };

    Ok(ResourceIdentity::new(name, namespace, kind))
}
