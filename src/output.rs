//! Output formatters for verification results

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::engine::{VerifyReport, VerifyStatistics};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Format diagnostics as a numbered list, one per line
pub fn format_text(diagnostics: &[Diagnostic], colored: bool) -> String {
    let mut out = String::new();
    for (n, diag) in diagnostics.iter().enumerate() {
        if colored {
            out.push_str(&format!("{}. {}: {}\n", n + 1, diag.kind().colored(), diag));
        } else {
            out.push_str(&format!("{}. {}\n", n + 1, diag));
        }
    }
    out
}

/// Print diagnostics in human-readable text format
pub fn print_text(diagnostics: &[Diagnostic], colored: bool) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = handle.write_all(format_text(diagnostics, colored).as_bytes());
}

/// JSON output format
#[derive(Serialize)]
struct JsonOutput<'a> {
    diagnostics: Vec<JsonDiagnostic<'a>>,
    summary: JsonSummary,
    statistics: &'a VerifyStatistics,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    kind: DiagnosticKind,
    message: String,
    #[serde(flatten)]
    diagnostic: &'a Diagnostic,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    by_kind: BTreeMap<&'static str, usize>,
}

fn json_output(report: &VerifyReport) -> JsonOutput<'_> {
    let diagnostics = report
        .diagnostics
        .iter()
        .map(|d| JsonDiagnostic {
            kind: d.kind(),
            message: d.to_string(),
            diagnostic: d,
        })
        .collect();

    let by_kind = DiagnosticKind::ALL
        .iter()
        .map(|kind| (kind.as_str(), report.count(*kind)))
        .collect();

    JsonOutput {
        diagnostics,
        summary: JsonSummary {
            total: report.statistics.total(),
            by_kind,
        },
        statistics: &report.statistics,
    }
}

/// Print a report in JSON format
pub fn print_json(report: &VerifyReport) -> serde_json::Result<()> {
    println!("{}", format_json(report)?);
    Ok(())
}

/// Format a report as a pretty-printed JSON string
pub fn format_json(report: &VerifyReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json_output(report))
}

/// Print run statistics to stderr
pub fn print_statistics(stats: &VerifyStatistics) {
    eprintln!("\n\x1b[1mStatistics:\x1b[0m");
    eprintln!("  Files visited:     {}", stats.files_visited);
    eprintln!("  Files skipped:     {}", stats.files_skipped);
    eprintln!("  Files unparsed:    {}", stats.files_unparsed);
    eprintln!("  Documents checked: {}", stats.documents_checked);
    eprintln!("  Diagnostics:       {}", stats.total());
    eprintln!();
    eprintln!("  \x1b[1mBy kind:\x1b[0m");
    for kind in DiagnosticKind::ALL {
        eprintln!("    {:24} {}", kind.colored(), stats.count(kind));
    }
}

/// One-line summary printed after the diagnostics
pub fn summary_line(report: &VerifyReport) -> String {
    let files = report.statistics.files_visited;
    let file_word = if files == 1 { "file" } else { "files" };
    let total = report.diagnostics.len();

    if total == 0 {
        format!("No issues found in {} {}", files, file_word)
    } else {
        format!(
            "Found {} issue{} in {} {}",
            total,
            if total == 1 { "" } else { "s" },
            files,
            file_word
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Template;
    use crate::rules::RuleType;
    use pretty_assertions::assert_eq;

    fn sample_report() -> VerifyReport {
        let mut report = VerifyReport::default();
        report.statistics.files_visited = 2;
        report.push(Diagnostic::new(Template::DuplicateResource, "b.yaml").with_actual("Service default/web"));
        report.push(
            Diagnostic::new(Template::BrokenEq, "a.yaml")
                .with_key("metadata.name")
                .with_expected("EQ(\"web\")")
                .with_actual("api")
                .with_rule(0, Some(RuleType::Allow))
                .with_document(0),
        );
        report
    }

    #[test]
    fn test_format_text_numbered() {
        let report = sample_report();
        let text = format_text(&report.diagnostics, false);

        assert_eq!(
            text,
            "1. duplicate resource in b.yaml: Service default/web\n\
             2. broken EQ() rule in a.yaml (document 1) at key `metadata.name`: expected EQ(\"web\"), got api [allow rule #1]\n"
        );
    }

    #[test]
    fn test_format_text_colored_includes_kind() {
        let report = sample_report();
        let text = format_text(&report.diagnostics, true);
        assert!(text.starts_with("1. \x1b[1;33mstructural\x1b[0m: duplicate resource"));
    }

    #[test]
    fn test_format_text_empty() {
        assert_eq!(format_text(&[], false), "");
    }

    #[test]
    fn test_format_json_empty() {
        let output = format_json(&VerifyReport::default()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["diagnostics"].as_array().unwrap().len(), 0);
        assert_eq!(parsed["summary"]["total"], 0);
        assert_eq!(parsed["summary"]["by_kind"]["rule"], 0);
    }

    #[test]
    fn test_format_json_fields() {
        let output = format_json(&sample_report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        let rule = &parsed["diagnostics"][1];
        assert_eq!(rule["kind"], "rule");
        assert_eq!(rule["template"], "broken-eq");
        assert_eq!(rule["path"], "a.yaml");
        assert_eq!(rule["key"], "metadata.name");
        assert_eq!(rule["actual"], "api");
        assert_eq!(rule["rule_type"], "allow");
        assert_eq!(rule["rule_index"], 0);
        assert!(rule["message"].as_str().unwrap().starts_with("broken EQ() rule"));

        let dup = &parsed["diagnostics"][0];
        assert!(dup.get("key").is_none());
        assert!(dup.get("rule_type").is_none());
    }

    #[test]
    fn test_json_summary_counts() {
        let output = format_json(&sample_report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["summary"]["total"], 2);
        assert_eq!(parsed["summary"]["by_kind"]["structural"], 1);
        assert_eq!(parsed["summary"]["by_kind"]["rule"], 1);
        assert_eq!(parsed["summary"]["by_kind"]["schema"], 0);
        assert_eq!(parsed["statistics"]["files_visited"], 2);
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(summary_line(&sample_report()), "Found 2 issues in 2 files");

        let mut clean = VerifyReport::default();
        clean.statistics.files_visited = 1;
        assert_eq!(summary_line(&clean), "No issues found in 1 file");
    }
}
