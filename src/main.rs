//! kubegate CLI entry point

use clap::Parser;
use kubegate::config::CliOptions;
use kubegate::{output, Config, RuleLoader, Verifier};
use log::info;
use miette::{miette, IntoDiagnostic, Result};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "kubegate")]
#[command(author, version, about = "Verify Kubernetes manifests against a declarative ruleset", long_about = None)]
struct Cli {
    /// Directory (or single file) of manifests to verify
    root: PathBuf,

    /// Ruleset file (JSON or YAML)
    #[arg(short, long, env = "KUBEGATE_RULESET")]
    ruleset: Option<PathBuf>,

    /// Config file path (default: auto-detect .kubegaterc.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Skip files whose name matches this pattern (can be used multiple times)
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Exclude paths matching this glob, relative to ROOT (can be used multiple times)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Only verify files whose name matches this glob (can be used multiple times)
    #[arg(long = "include", value_name = "GLOB")]
    include: Vec<String>,

    /// Number of parser threads (0 = auto, 1 = sequential)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    jobs: Option<usize>,

    /// Show statistics at the end
    #[arg(long)]
    statistics: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    no_color: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let start_dir = std::env::current_dir().into_diagnostic()?;
    let mut config = Config::discover(cli.config.as_deref(), &start_dir).into_diagnostic()?;

    config
        .merge_cli(CliOptions {
            ruleset: cli.ruleset,
            ignore: cli.ignore,
            exclude: cli.exclude,
            include: cli.include,
            statistics: cli.statistics,
            jobs: cli.jobs,
        })
        .into_diagnostic()?;

    let ruleset_path = config
        .ruleset
        .clone()
        .ok_or_else(|| miette!("no ruleset given: pass --ruleset or set `ruleset` in a config file"))?;

    let rules = RuleLoader::new(&ruleset_path).load().into_diagnostic()?;
    info!("loaded {} rules from {}", rules.len(), ruleset_path.display());

    let statistics = config.statistics;
    let verifier = Verifier::new(rules, config);
    let report = verifier.verify(&cli.root);

    match cli.format {
        OutputFormat::Text => {
            let colored = !cli.no_color && std::io::stdout().is_terminal();
            output::print_text(&report.diagnostics, colored);
            eprintln!("\n{}", output::summary_line(&report));
        }
        OutputFormat::Json => {
            output::print_json(&report).into_diagnostic()?;
        }
    }

    if statistics {
        output::print_statistics(&report.statistics);
    }

    if report.is_clean() {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(1))
    }
}
