//! kubegate: verify Kubernetes manifests against a declarative ruleset
//!
//! A ruleset is a list of expression trees, each bound to a file-name pattern,
//! a resource kind and an allow/deny polarity. The [`Verifier`] walks a
//! directory, parses every manifest and reports structural problems
//! (missing `kind`, duplicate resources) together with every rule the
//! documents break.

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod loader;
pub mod matcher;
pub mod output;
pub mod parser;
pub mod rules;
pub mod structural;

pub use config::{CliOptions, Config, ConfigError};
pub use context::{IdentityRegistry, ResourceIdentity, RunContext, TagTable};
pub use diagnostics::{Diagnostic, DiagnosticKind, Template};
pub use engine::{VerifyReport, VerifyStatistics, Verifier};
pub use loader::{LoaderError, RuleLoader};
pub use parser::{Document, DocumentParser, ParseError, YamlParser};
pub use rules::{ExpressionNode, IgnoreEntry, Operator, Rule, RuleSet, RuleType, SchemaError};
