//! CLI for the mutation testing engine

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use bugbane::codegen::{RustSerializer, Serializer};
use bugbane::config::{DEFAULT_CONFIG_FILE, EXAMPLE};
use bugbane::report::mutant_diff;
use bugbane::{
    hom, prepare, run_mutation_tests_with, CancellationToken, Catalog, Config, MutationError,
    MutationReport, ProcessRunner, TestCommand,
};

#[derive(Parser)]
#[command(name = "bugbane")]
#[command(author, version, about = "Tree-based mutation testing for Rust", long_about = None)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate mutants and run the test command against each
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Write a YAML report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print a diff for every mutant
        #[arg(long)]
        show_mutants: bool,
    },

    /// Generate mutants and print their diffs without running tests
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List mutation operators
    ListOperators,

    /// List higher-order mutation strategies
    ListStrategies,

    /// Show example configuration
    Example,
}

/// Where the configuration comes from, plus overrides
#[derive(Args)]
struct TargetArgs {
    /// Path to the config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Source file to mutate (overrides the config file)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Project directory copied for every mutant
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Test command line, e.g. "cargo test --quiet"
    #[arg(short, long)]
    test_command: Option<String>,

    /// Use only this operator (repeatable)
    #[arg(short, long = "operator")]
    operators: Vec<String>,

    /// Disable this operator (repeatable)
    #[arg(short, long = "disable")]
    disable: Vec<String>,

    /// Add experimental operators
    #[arg(short, long)]
    experimental: bool,

    /// Mutation order
    #[arg(long)]
    order: Option<usize>,

    /// Higher-order strategy
    #[arg(long)]
    hom_strategy: Option<String>,

    /// Percentage of mutants to keep
    #[arg(long)]
    percentage: Option<u8>,

    /// Sampling seed
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many mutants
    #[arg(long)]
    max_mutants: Option<usize>,

    /// Run only the mutant with this id
    #[arg(short = 'm', long)]
    mutation_number: Option<usize>,

    /// Timeout as a multiple of the baseline duration
    #[arg(long)]
    timeout_factor: Option<f64>,

    /// Minimum timeout in seconds
    #[arg(long)]
    min_timeout: Option<f64>,

    /// Parallel test runs
    #[arg(short, long)]
    jobs: Option<usize>,
}

impl TargetArgs {
    /// Load the config file, or build one from flags, then apply overrides
    fn load(&self) -> anyhow::Result<Config> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            let (Some(source), Some(command)) = (&self.source, &self.test_command) else {
                bail!(MutationError::ConfigError {
                    message: format!(
                        "Config file '{}' not found; pass --source and --test-command instead",
                        self.config.display()
                    ),
                });
            };
            Config::new(source.clone(), parse_command(command)?)
        };

        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if let Some(project) = &self.project {
            config.project_root = project.clone();
        }
        if let Some(command) = &self.test_command {
            config.test_command = parse_command(command)?;
        }

        let s = &mut config.settings;
        if !self.operators.is_empty() {
            s.operators = self.operators.clone();
        }
        s.disable_operators.extend(self.disable.iter().cloned());
        s.experimental |= self.experimental;
        if let Some(order) = self.order {
            s.order = order;
        }
        if let Some(strategy) = &self.hom_strategy {
            s.hom_strategy = strategy.clone();
        }
        if let Some(percentage) = self.percentage {
            s.percentage = percentage;
        }
        if let Some(seed) = self.seed {
            s.seed = seed;
        }
        if self.max_mutants.is_some() {
            s.max_mutants = self.max_mutants;
        }
        if self.mutation_number.is_some() {
            s.mutation_number = self.mutation_number;
        }
        if let Some(factor) = self.timeout_factor {
            s.timeout_factor = factor;
        }
        if let Some(min) = self.min_timeout {
            s.min_timeout = min;
        }
        if let Some(jobs) = self.jobs {
            s.jobs = jobs;
        }

        Ok(config)
    }
}

fn parse_command(line: &str) -> anyhow::Result<TestCommand> {
    TestCommand::parse(line).ok_or_else(|| {
        anyhow::Error::new(MutationError::ConfigError {
            message: "test command must not be empty".to_string(),
        })
    })
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("bugbane=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            target,
            report,
            show_mutants,
        } => run_tests(&target, report.as_deref(), show_mutants),
        Commands::Show { target } => print_mutants(&target),
        Commands::ListOperators => list_operators(),
        Commands::ListStrategies => {
            list_strategies();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Example => {
            println!("{}", EXAMPLE);
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            let configuration = e
                .downcast_ref::<MutationError>()
                .is_some_and(MutationError::is_configuration);
            ExitCode::from(if configuration { 2 } else { 3 })
        }
    }
}

/// Token cancelled by Ctrl-C; running mutants finish, queued ones are skipped
fn interrupt_token() -> anyhow::Result<CancellationToken> {
    let cancel = CancellationToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("{}", "Interrupted, waiting for running mutants...".yellow());
        handler.cancel();
    })
    .context("could not install the Ctrl-C handler")?;
    Ok(cancel)
}

fn run_tests(target: &TargetArgs, report_path: Option<&Path>, show_mutants: bool) -> anyhow::Result<ExitCode> {
    println!("{}", "Loading configuration...".dimmed());
    let config = target.load()?;
    let catalog = Catalog::builtin()?;

    println!(
        "Mutating {} with `{}`",
        config.source_path().display(),
        config.test_command.display()
    );
    println!("{}", "Running baseline and mutants...".dimmed());

    let cancel = interrupt_token()?;
    let run = run_mutation_tests_with(&config, &catalog, &ProcessRunner, &cancel)
        .with_context(|| format!("mutation run on '{}' failed", config.source_path().display()))?;

    let report = MutationReport::new(run);
    if show_mutants {
        report.print_diffs();
    }
    report.print();

    if let Some(path) = report_path {
        report
            .write_yaml(path)
            .with_context(|| format!("could not write report to '{}'", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if cancel.is_cancelled() {
        println!(
            "{} {} mutant(s) not run",
            "Interrupted:".yellow().bold(),
            report.run.not_run.len()
        );
        Ok(ExitCode::from(130))
    } else if report.survived() > 0 {
        Ok(ExitCode::from(1)) // Some mutants survived
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_mutants(target: &TargetArgs) -> anyhow::Result<ExitCode> {
    let config = target.load()?;
    let catalog = Catalog::builtin()?;
    let prepared = prepare(&config, &catalog)?;

    for error in &prepared.generation.errors {
        println!("{} {}", "skipped:".yellow(), error);
    }
    for mutant in &prepared.generation.mutants {
        println!("{}", mutant.describe().bold());
        match RustSerializer.serialize(&mutant.tree) {
            Ok(mutated) => print!("{}", mutant_diff(&prepared.normalized_source, &mutated, mutant)),
            Err(e) => println!("  {}: {}", "cannot serialize".yellow(), e),
        }
    }
    println!();
    println!("{} mutant(s)", prepared.generation.mutants.len());
    Ok(ExitCode::SUCCESS)
}

fn list_operators() -> anyhow::Result<ExitCode> {
    let catalog = Catalog::builtin()?;
    println!("{}", "Mutation operators:".bold());
    for op in catalog.operators() {
        let tag = if op.experimental() { " (experimental)".yellow().to_string() } else { String::new() };
        println!("  {:<20} {}{}", op.name(), op.description(), tag);
    }
    Ok(ExitCode::SUCCESS)
}

fn list_strategies() {
    println!("{}", "Higher-order mutation strategies:".bold());
    for strategy in hom::strategies() {
        println!("  {:<20} {}", strategy.name(), strategy.description());
    }
}
