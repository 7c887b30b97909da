//! Configuration handling for kubegate

use crate::parser::{DEFAULT_SKIP_API_VERSIONS, DEFAULT_SKIP_KINDS};
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Failed to parse YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] globset::Error),
}

/// File names searched for, in order, in each directory up to the root
pub const CONFIG_NAMES: &[&str] = &[
    ".kubegaterc.json",
    ".kubegaterc.yaml",
    ".kubegaterc.yml",
    "kubegate.json",
    "kubegate.yaml",
];

/// Runtime verification configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Ruleset file, if not given on the command line
    pub ruleset: Option<PathBuf>,
    /// File-name patterns skipped alongside the ruleset's ignore list
    pub ignore: Vec<String>,
    /// Path globs, relative to the verified root, that are never visited
    pub exclude: Vec<String>,
    /// File-name globs; when non-empty only matching files are visited
    pub include: Vec<String>,
    /// Kinds the parser drops
    pub skip_kinds: Vec<String>,
    /// API versions the parser drops
    pub skip_api_versions: Vec<String>,
    /// Show statistics at the end
    pub statistics: bool,
    /// Number of parser threads (0 = auto, 1 = sequential)
    pub jobs: usize,
    ignore_patterns: GlobSet,
    exclude_patterns: GlobSet,
    include_patterns: Option<GlobSet>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ruleset: None,
            ignore: Vec::new(),
            exclude: Vec::new(),
            include: Vec::new(),
            skip_kinds: DEFAULT_SKIP_KINDS.iter().map(|s| s.to_string()).collect(),
            skip_api_versions: DEFAULT_SKIP_API_VERSIONS.iter().map(|s| s.to_string()).collect(),
            statistics: false,
            jobs: 0,
            ignore_patterns: GlobSet::empty(),
            exclude_patterns: GlobSet::empty(),
            include_patterns: None,
        }
    }
}

/// CLI options to merge into config
#[derive(Debug, Default)]
pub struct CliOptions {
    /// Ruleset file (replaces config if set)
    pub ruleset: Option<PathBuf>,
    /// Ignore patterns (adds to config)
    pub ignore: Vec<String>,
    /// Exclude globs (adds to config)
    pub exclude: Vec<String>,
    /// Include globs (replaces config if non-empty)
    pub include: Vec<String>,
    /// Show statistics
    pub statistics: bool,
    /// Number of parser threads
    pub jobs: Option<usize>,
}

/// Configuration file format (.kubegaterc.json or .kubegaterc.yaml)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Ruleset path, relative to the config file
    #[serde(default)]
    pub ruleset: Option<PathBuf>,

    /// File-name patterns to ignore, merged into the ruleset's own list
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Path globs to exclude
    #[serde(default)]
    pub exclude: Vec<String>,

    /// File-name globs to include
    #[serde(default)]
    pub include: Vec<String>,

    /// Number of parser threads (0 = auto)
    #[serde(default)]
    pub jobs: usize,

    /// Kinds the parser drops (defaults to CustomResourceDefinition)
    #[serde(default)]
    pub skip_kinds: Option<Vec<String>>,

    /// API versions the parser drops (defaults to custom.k8s.io/v1)
    #[serde(default)]
    pub skip_api_versions: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config_file: ConfigFile = if path.extension().is_some_and(|e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        Self::from_config_file(config_file, path.parent())
    }

    /// Try to find and load config from standard locations
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut current = start_dir.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.is_file() {
                    let config = Self::from_file(&config_path)?;
                    return Ok(Some((config_path, config)));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Load `explicit` if given, else search upward from `start_dir`.
    ///
    /// A config file that exists but cannot be read or compiled is an error,
    /// never a silent fallback to defaults.
    pub fn discover(explicit: Option<&Path>, start_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::find_and_load(start_dir)? {
            Some((path, config)) => {
                info!("using config: {}", path.display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Build config from a ConfigFile; relative paths resolve against `base_dir`
    pub fn from_config_file(file: ConfigFile, base_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ruleset = file.ruleset.map(|p| match base_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p,
        });

        let mut config = Self {
            ruleset,
            ignore: file.ignore,
            exclude: file.exclude,
            include: file.include,
            skip_kinds: file.skip_kinds.unwrap_or(defaults.skip_kinds),
            skip_api_versions: file.skip_api_versions.unwrap_or(defaults.skip_api_versions),
            jobs: file.jobs,
            ..Self::default()
        };
        config.compile()?;
        Ok(config)
    }

    /// Merge CLI options into this config (CLI takes precedence)
    pub fn merge_cli(&mut self, opts: CliOptions) -> Result<(), ConfigError> {
        if opts.ruleset.is_some() {
            self.ruleset = opts.ruleset;
        }

        self.ignore.extend(opts.ignore);
        self.exclude.extend(opts.exclude);

        if !opts.include.is_empty() {
            self.include = opts.include;
        }

        self.statistics = opts.statistics;

        if let Some(j) = opts.jobs {
            self.jobs = j;
        }

        self.compile()
    }

    fn compile(&mut self) -> Result<(), ConfigError> {
        self.ignore_patterns = build_lenient_globset(&self.ignore)?;
        self.exclude_patterns = build_globset(&self.exclude)?;
        self.include_patterns = if self.include.is_empty() {
            None
        } else {
            Some(build_globset(&self.include)?)
        };
        Ok(())
    }

    /// Check if a file name is one of the configured ignore entries or matches one as a glob
    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.ignore.iter().any(|name| name == file_name) || self.ignore_patterns.is_match(file_name)
    }

    /// Check if a path (relative to the verified root) should be excluded
    pub fn is_excluded(&self, relative_path: &Path) -> bool {
        self.exclude_patterns.is_match(relative_path)
    }

    /// Check if a file name passes the include filter
    pub fn matches_include(&self, file_name: &str) -> bool {
        match &self.include_patterns {
            Some(patterns) => patterns.is_match(file_name),
            None => true,
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Like `build_globset`, but entries that are not valid globs are left to literal matching
fn build_lenient_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => debug!("ignore entry `{}` is not a glob, matching it literally: {}", pattern, err),
        }
    }
    Ok(builder.build()?)
}
