//! Configuration file parsing for mutation testing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::MutationError;
use crate::hom::strategy_by_name;
use crate::mutator::{GenerationOptions, DEFAULT_SKIP_MARKERS};
use crate::operators::OperatorSelection;

/// Default name of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "bugbane.yaml";

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    /// Source file to mutate, relative to `project_root`
    pub source: PathBuf,
    /// Directory copied into every sandbox
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    pub test_command: TestCommand,
    #[serde(default)]
    pub settings: Settings,
}

/// Command that runs the test suite
///
/// `{mutant}` and `{root}` in `args` and `env` values are replaced with the
/// mutated file and the sandbox root.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TestCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Relative to the sandbox root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl TestCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Split a whitespace-separated command line
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: program.to_string(),
            args: parts.map(str::to_string).collect(),
            working_dir: None,
            env: BTreeMap::new(),
        })
    }

    /// Substitute placeholders and anchor the working directory at `root`
    pub fn resolve(&self, root: &Path, mutant: &Path) -> Self {
        let fill = |s: &String| {
            s.replace("{mutant}", &mutant.to_string_lossy())
                .replace("{root}", &root.to_string_lossy())
        };
        Self {
            program: self.program.clone(),
            args: self.args.iter().map(fill).collect(),
            working_dir: Some(match &self.working_dir {
                Some(dir) => root.join(dir),
                None => root.to_path_buf(),
            }),
            env: self.env.iter().map(|(k, v)| (k.clone(), fill(v))).collect(),
        }
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Global settings for mutation testing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Use only these operators (empty = the standard set)
    pub operators: Vec<String>,
    pub disable_operators: Vec<String>,
    /// Add experimental operators to the standard set
    pub experimental: bool,
    /// Mutation order; above 1 combines rewrites
    pub order: usize,
    pub hom_strategy: String,
    /// Share of mutants to run, 1..=100
    pub percentage: u8,
    /// Seed for sampling and the random strategy
    pub seed: u64,
    pub max_mutants: Option<usize>,
    /// Run only the mutant with this id
    pub mutation_number: Option<usize>,
    /// Mutant timeout as a multiple of the baseline duration
    pub timeout_factor: f64,
    /// Lower bound for the mutant timeout, in seconds
    pub min_timeout: f64,
    /// Parallel test runs
    pub jobs: usize,
    /// Attributes that exempt a function from mutation
    pub skip_markers: Vec<String>,
    /// Output fragments marking a mutant that failed to build
    pub unviable_markers: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            operators: Vec::new(),
            disable_operators: Vec::new(),
            experimental: false,
            order: 1,
            hom_strategy: default_hom_strategy(),
            percentage: 100,
            seed: 0,
            max_mutants: None,
            mutation_number: None,
            timeout_factor: 5.0,
            min_timeout: 1.0,
            jobs: default_jobs(),
            skip_markers: DEFAULT_SKIP_MARKERS.iter().map(|m| m.to_string()).collect(),
            unviable_markers: vec!["error[E".to_string(), "could not compile".to_string()],
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_hom_strategy() -> String {
    "first_to_last".to_string()
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Settings {
    pub fn operator_selection(&self) -> OperatorSelection {
        OperatorSelection {
            only: self.operators.clone(),
            disabled: self.disable_operators.clone(),
            experimental: self.experimental,
        }
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            order: self.order,
            percentage: self.percentage,
            seed: self.seed,
            mutation_number: self.mutation_number,
            max_mutants: self.max_mutants,
        }
    }

    pub fn min_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.min_timeout).unwrap_or(Duration::ZERO)
    }
}

impl Config {
    pub fn new(source: impl Into<PathBuf>, test_command: TestCommand) -> Self {
        Self {
            version: default_version(),
            source: source.into(),
            project_root: default_project_root(),
            test_command,
            settings: Settings::default(),
        }
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, MutationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MutationError::config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        Self::from_yaml(&content).map_err(|e| {
            MutationError::config(format!("Failed to parse config file '{}': {}", path.display(), e))
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// The source file as a path from the current directory
    pub fn source_path(&self) -> PathBuf {
        if self.source.is_absolute() {
            self.source.clone()
        } else {
            self.project_root.join(&self.source)
        }
    }

    /// Check settings that must hold before anything is generated
    pub fn validate(&self) -> Result<(), Vec<MutationError>> {
        let mut errors = Vec::new();
        let s = &self.settings;

        if self.test_command.program.trim().is_empty() {
            errors.push(MutationError::config("test_command.program must not be empty"));
        }
        if !(1..=100).contains(&s.percentage) {
            errors.push(MutationError::config(format!(
                "percentage must be between 1 and 100, got {}",
                s.percentage
            )));
        }
        if s.order < 1 {
            errors.push(MutationError::config("order must be at least 1"));
        }
        if !s.timeout_factor.is_finite() || s.timeout_factor <= 0.0 {
            errors.push(MutationError::config(format!(
                "timeout_factor must be a positive number, got {}",
                s.timeout_factor
            )));
        }
        if !s.min_timeout.is_finite() || s.min_timeout < 0.0 {
            errors.push(MutationError::config(format!(
                "min_timeout must not be negative, got {}",
                s.min_timeout
            )));
        }
        if s.jobs < 1 {
            errors.push(MutationError::config("jobs must be at least 1"));
        }
        if s.mutation_number == Some(0) {
            errors.push(MutationError::config("mutation_number starts at 1"));
        }
        if s.order > 1 {
            if let Err(e) = strategy_by_name(&s.hom_strategy) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Annotated example configuration
pub const EXAMPLE: &str = r#"# Example bugbane.yaml configuration file
version: "1.0"

# file to mutate, relative to project_root
source: src/calculator.rs
project_root: .

# {mutant} is the mutated file, {root} the sandbox copy of project_root.
# Sandboxes never copy target/, so with a per-sandbox CARGO_TARGET_DIR every
# mutant builds its dependencies from scratch. A compiler cache keeps those
# builds warm across sandboxes (uncomment RUSTC_WRAPPER, needs sccache).
# Pointing CARGO_TARGET_DIR at one shared directory also reuses dependencies,
# but cargo then serializes the builds of parallel jobs on its lock.
test_command:
  program: cargo
  args: [test, --quiet]
  env:
    CARGO_TARGET_DIR: "{root}/target"
    # RUSTC_WRAPPER: sccache

settings:
  # empty = every standard operator
  operators: []
  disable_operators: [swap_arguments]
  experimental: false

  # higher-order mutation
  order: 1
  hom_strategy: first_to_last

  # sampling
  percentage: 100
  seed: 0

  # mutant timeout = max(baseline * timeout_factor, min_timeout seconds)
  timeout_factor: 5.0
  min_timeout: 1.0
  jobs: 4

  skip_markers: ["mutants::skip", "no_mutate"]
  unviable_markers: ["error[E", "could not compile"]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
version: "1.0"
source: src/math.rs
test_command:
  program: cargo
  args: [test]
settings:
  percentage: 40
  order: 2
  hom_strategy: each_choice
  operators: [arithmetic]
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source, PathBuf::from("src/math.rs"));
        assert_eq!(config.project_root, PathBuf::from("."));
        assert_eq!(config.test_command, TestCommand::new("cargo", &["test"]));
        assert_eq!(config.settings.percentage, 40);
        assert_eq!(config.settings.order, 2);
        assert_eq!(config.settings.operator_selection().only, vec!["arithmetic"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
source: lib.rs
test_command:
  program: "true"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.settings.timeout_factor, 5.0);
        assert_eq!(config.settings.min_timeout(), Duration::from_secs(1));
        assert_eq!(config.settings.percentage, 100);
        assert_eq!(config.settings.skip_markers, vec!["mutants::skip", "no_mutate"]);
        assert!(config.settings.jobs >= 1);
    }

    #[test]
    fn test_example_is_valid() {
        let config = Config::from_yaml(EXAMPLE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.settings.disable_operators, vec!["swap_arguments"]);
        assert_eq!(config.source_path(), PathBuf::from("./src/calculator.rs"));
    }

    #[test]
    fn test_example_builds_inside_each_sandbox() {
        let config = Config::from_yaml(EXAMPLE).unwrap();
        let sandbox = Path::new("/tmp/bugbane-mutant-3-x");
        let resolved = config
            .test_command
            .resolve(sandbox, &sandbox.join("src/calculator.rs"));
        assert_eq!(
            resolved.env.get("CARGO_TARGET_DIR").map(String::as_str),
            Some("/tmp/bugbane-mutant-3-x/target")
        );
        assert!(!resolved.env.contains_key("RUSTC_WRAPPER"));
        assert!(EXAMPLE.contains("RUSTC_WRAPPER: sccache"));
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = Config::new("lib.rs", TestCommand::new("", &[]));
        config.settings.percentage = 0;
        config.settings.timeout_factor = -1.0;
        config.settings.jobs = 0;
        config.settings.order = 2;
        config.settings.hom_strategy = "zigzag".into();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().all(|e| e.is_configuration()));
        assert!(errors
            .iter()
            .any(|e| matches!(e, MutationError::UnknownStrategy { name, .. } if name == "zigzag")));
    }

    #[test]
    fn test_command_placeholders() {
        let mut command = TestCommand::new("sh", &["-c", "grep -q x {mutant}", "{root}"]);
        command.working_dir = Some(PathBuf::from("crate"));
        command.env.insert("OUT".into(), "{root}/out".into());

        let resolved = command.resolve(Path::new("/tmp/sb"), Path::new("/tmp/sb/src/lib.rs"));
        assert_eq!(resolved.args, vec!["-c", "grep -q x /tmp/sb/src/lib.rs", "/tmp/sb"]);
        assert_eq!(resolved.working_dir, Some(PathBuf::from("/tmp/sb/crate")));
        assert_eq!(resolved.env["OUT"], "/tmp/sb/out");
    }

    #[test]
    fn test_parse_command_line() {
        let command = TestCommand::parse("cargo test --quiet").unwrap();
        assert_eq!(command, TestCommand::new("cargo", &["test", "--quiet"]));
        assert_eq!(command.display(), "cargo test --quiet");
        assert!(TestCommand::parse("   ").is_none());
    }

    #[test]
    fn test_malformed_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "source: [unclosed").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Failed to parse config file"));

        let missing = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read config file"));
    }
}
