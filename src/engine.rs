//! Verification engine - walks a manifest tree and applies the ruleset

use crate::config::Config;
use crate::context::RunContext;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Template};
use crate::matcher::RuleMatcher;
use crate::parser::{Document, DocumentParser, ParseError, YamlParser};
use crate::rules::RuleSet;
use crate::structural::StructuralValidator;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Statistics about a verification run
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct VerifyStatistics {
    /// Files handed to the parser
    pub files_visited: usize,
    /// Files skipped by ignore, exclude or include filters
    pub files_skipped: usize,
    /// Files that failed to parse
    pub files_unparsed: usize,
    /// Documents run through structural and rule checks
    pub documents_checked: usize,
    /// Count per diagnostic kind
    pub per_kind: BTreeMap<DiagnosticKind, usize>,
}

impl VerifyStatistics {
    /// Record a diagnostic
    pub fn record(&mut self, diagnostic: &Diagnostic) {
        *self.per_kind.entry(diagnostic.kind()).or_insert(0) += 1;
    }

    /// Number of diagnostics of one kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.per_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Total number of diagnostics
    pub fn total(&self) -> usize {
        self.per_kind.values().sum()
    }
}

/// Everything a run produced, in walk order
#[derive(Debug, Default, Clone, Serialize)]
pub struct VerifyReport {
    pub diagnostics: Vec<Diagnostic>,
    pub statistics: VerifyStatistics,
}

impl VerifyReport {
    /// Add a diagnostic and count it
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.statistics.record(&diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    /// True if the run found nothing to report
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Number of diagnostics of one kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.statistics.count(kind)
    }
}

/// The main verification engine
pub struct Verifier<P = YamlParser> {
    rules: RuleSet,
    config: Config,
    parser: P,
}

impl Verifier<YamlParser> {
    /// Create a verifier using the default YAML parser configured from `config`
    pub fn new(rules: RuleSet, config: Config) -> Self {
        let parser = YamlParser::new(config.skip_kinds.clone(), config.skip_api_versions.clone());
        Self::with_parser(rules, config, parser)
    }
}

impl<P: DocumentParser> Verifier<P> {
    /// Create a verifier with a custom document parser
    pub fn with_parser(rules: RuleSet, config: Config, parser: P) -> Self {
        Self {
            rules,
            config,
            parser,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Verify every manifest under `root`.
    ///
    /// Files are parsed in parallel but checked strictly in sorted walk
    /// order against one [`RunContext`].
    pub fn verify(&self, root: &Path) -> VerifyReport {
        let mut report = VerifyReport::default();
        let files = self.collect_files(root, &mut report);
        let parsed = self.parse_all(&files);

        let mut context = RunContext::new();
        for (file, result) in parsed {
            match result {
                Ok(documents) => {
                    report.statistics.documents_checked += documents.len();
                    let diagnostics = self.check_file(&file, &documents, &mut context);
                    report.extend(diagnostics);
                }
                Err(err) => {
                    debug!("failed to parse {}: {}", file.display(), err);
                    report.statistics.files_unparsed += 1;
                    report.push(Diagnostic::new(Template::ParseFailed, &file).with_detail(err.to_string()));
                }
            }
        }

        debug!(
            "checked {} document(s) from {} file(s), {} tag(s) and {} resource(s) recorded",
            report.statistics.documents_checked,
            report.statistics.files_visited,
            context.tags.len(),
            context.identities.len()
        );
        report
    }

    /// Run structural checks and then every rule over one file's documents
    pub fn check_file(&self, file: &Path, documents: &[Document], context: &mut RunContext) -> Vec<Diagnostic> {
        let mut diagnostics = StructuralValidator::new(file).validate(documents, &mut context.identities);
        diagnostics.extend(RuleMatcher::new(&self.rules.rules).check_file(file, documents, &mut context.tags));
        diagnostics
    }

    /// Walk `root` in sorted order and return the files to check
    fn collect_files(&self, root: &Path, report: &mut VerifyReport) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("error while traversing {}: {}", root.display(), err);
                    let path = err.path().unwrap_or(root).to_path_buf();
                    report.push(Diagnostic::new(Template::TraversalFailed, path).with_detail(err.to_string()));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.is_skipped(root, path) {
                debug!("skipping {}", path.display());
                report.statistics.files_skipped += 1;
                continue;
            }

            debug!("visiting {}", path.display());
            report.statistics.files_visited += 1;
            files.push(path.to_path_buf());
        }

        files
    }

    fn is_skipped(&self, root: &Path, path: &Path) -> bool {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = path.strip_prefix(root).unwrap_or(path);

        self.rules.is_ignored(&file_name)
            || self.config.is_ignored(&file_name)
            || self.config.is_excluded(relative)
            || !self.config.matches_include(&file_name)
    }

    /// Parse files, in parallel unless `jobs` is 1, keeping input order
    fn parse_all(&self, files: &[PathBuf]) -> Vec<(PathBuf, Result<Vec<Document>, ParseError>)> {
        let parse = |file: &PathBuf| (file.clone(), self.parser.parse_file(file));

        if self.config.jobs == 1 {
            return files.iter().map(parse).collect();
        }

        match rayon::ThreadPoolBuilder::new().num_threads(self.config.jobs).build() {
            Ok(pool) => pool.install(|| files.par_iter().map(parse).collect()),
            Err(err) => {
                warn!("could not build parser thread pool, parsing sequentially: {}", err);
                files.iter().map(parse).collect()
            }
        }
    }
}
