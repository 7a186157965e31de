//! Test runner for mutation testing
//!
//! This module coordinates the mutation testing process:
//! - Parses the source and generates mutants
//! - Runs the unmutated baseline to calibrate the timeout
//! - Runs the test command against every mutant in its own sandbox
//! - Collects and scores the outcomes

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::codegen::{RustSerializer, Serializer};
use crate::config::{Config, TestCommand};
use crate::error::{GenerationError, MutationError, Result};
use crate::frontend::{Parser, RustParser};
use crate::hom::strategy_by_name;
use crate::mutator::{Generation, Generator, MarkerSkip, Mutant};
use crate::operators::Catalog;
use crate::sandbox::Sandbox;
use crate::score::ScoreReport;
use crate::tree::SyntaxTree;

/// Status of a mutant after testing
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Tests failed - mutant was detected
    Killed,
    /// Tests passed - mutant was NOT detected
    Survived,
    /// Tests ran past the timeout; counts as detected
    TimedOut,
    /// Mutant could not be built or run
    Errored(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Killed => "killed",
            Outcome::Survived => "survived",
            Outcome::TimedOut => "timed_out",
            Outcome::Errored(_) => "errored",
        }
    }
}

/// What a finished test command left behind
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub success: bool,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    pub timed_out: bool,
    /// Combined stdout and stderr
    pub output: String,
    pub duration: Duration,
}

/// Executes a test command
pub trait TestRunner: Send + Sync {
    /// Run `command`; `None` waits without limit
    fn run(&self, command: &TestCommand, timeout: Option<Duration>) -> Result<RunOutput>;
}

/// Runs test commands as child processes
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

/// How long to wait for pipe readers once the process tree is gone
const READER_GRACE: Duration = Duration::from_secs(2);

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Option<mpsc::Receiver<String>> {
    stream.map(|mut s| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = s.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

fn collect(output: Option<mpsc::Receiver<String>>) -> String {
    output
        .and_then(|rx| rx.recv_timeout(READER_GRACE).ok())
        .unwrap_or_default()
}

/// Kill every process in the child's group
///
/// The child leads its own group, so this reaches the test binaries that
/// `cargo` or a shell started under it.
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

impl TestRunner for ProcessRunner {
    fn run(&self, command: &TestCommand, timeout: Option<Duration>) -> Result<RunOutput> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| MutationError::TestExecutionError {
            error: format!("failed to start '{}': {}", command.program, e),
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = match timeout {
            Some(limit) => child.wait_timeout(limit),
            None => child.wait().map(Some),
        };
        let status = waited.map_err(|e| MutationError::TestExecutionError {
            error: format!("failed to wait for '{}': {}", command.program, e),
        })?;

        match status {
            Some(status) => {
                // stragglers left in the background would hold the pipes open
                kill_group(&child);
                Ok(RunOutput {
                    success: status.success(),
                    code: status.code(),
                    timed_out: false,
                    output: format!("{}\n{}", collect(stdout), collect(stderr)),
                    duration: start.elapsed(),
                })
            }
            None => {
                kill_group(&child);
                let _ = child.kill();
                let _ = child.wait();
                Ok(RunOutput {
                    success: false,
                    code: None,
                    timed_out: true,
                    output: format!("{}\n{}", collect(stdout), collect(stderr)),
                    duration: start.elapsed(),
                })
            }
        }
    }
}

/// Map a finished run to an outcome
pub fn classify(run: &RunOutput, unviable_markers: &[String]) -> Outcome {
    if run.timed_out {
        Outcome::TimedOut
    } else if run.success {
        Outcome::Survived
    } else if let Some(marker) = unviable_markers.iter().find(|m| run.output.contains(m.as_str())) {
        Outcome::Errored(format!("mutant does not build ({})", marker))
    } else {
        Outcome::Killed
    }
}

/// Per-mutant timeout: `max(baseline * factor, min)`
pub fn mutant_timeout(baseline: Duration, factor: f64, min: Duration) -> Duration {
    Duration::try_from_secs_f64(baseline.as_secs_f64() * factor)
        .unwrap_or(Duration::MAX)
        .max(min)
}

/// Shared flag that stops dispatching new mutant runs
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of running a single mutant
#[derive(Debug, Clone)]
pub struct MutantResult {
    pub mutant: Mutant,
    pub outcome: Outcome,
    pub duration: Duration,
    /// Serialized mutant, when serialization succeeded
    pub mutated_source: Option<String>,
}

/// Everything needed to run mutants against one source file
pub struct Execution<'a> {
    pub runner: &'a dyn TestRunner,
    pub serializer: &'a dyn Serializer,
    pub project_root: &'a Path,
    pub source_file: &'a Path,
    pub command: &'a TestCommand,
    pub unviable_markers: &'a [String],
    pub jobs: usize,
}

impl Execution<'_> {
    /// Run the unmutated source once, failing if its tests fail
    pub fn baseline(&self, original_source: &str) -> Result<Duration> {
        let sandbox = Sandbox::create(self.project_root, self.source_file, "baseline", original_source)
            .map_err(|e| MutationError::TestExecutionError {
                error: format!("failed to prepare baseline sandbox: {}", e),
            })?;
        let command = self.command.resolve(sandbox.root(), sandbox.source_file());
        info!(command = %command.display(), "running baseline");

        let run = self.runner.run(&command, None)?;
        sandbox.cleanup();
        if !run.success {
            return Err(MutationError::BaselineFailed {
                status: run
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                output: run.output,
            });
        }
        Ok(run.duration)
    }

    /// Serialize, materialise and test one mutant
    pub fn run_mutant(&self, mutant: Mutant, timeout: Duration) -> MutantResult {
        let start = Instant::now();
        let (outcome, mutated_source) = match self.serializer.serialize(&mutant.tree) {
            Ok(source) => (self.test_source(mutant.id, &source, timeout), Some(source)),
            Err(e) => (Outcome::Errored(e.to_string()), None),
        };
        debug!(mutant = %mutant.describe(), outcome = outcome.label(), "mutant finished");
        MutantResult {
            mutant,
            outcome,
            duration: start.elapsed(),
            mutated_source,
        }
    }

    fn test_source(&self, id: usize, source: &str, timeout: Duration) -> Outcome {
        let sandbox = match Sandbox::for_mutant(self.project_root, self.source_file, id, source) {
            Ok(sandbox) => sandbox,
            Err(e) => return Outcome::Errored(format!("failed to prepare sandbox: {}", e)),
        };
        let command = self.command.resolve(sandbox.root(), sandbox.source_file());
        let outcome = match self.runner.run(&command, Some(timeout)) {
            Ok(run) => classify(&run, self.unviable_markers),
            Err(e) => Outcome::Errored(e.to_string()),
        };
        sandbox.cleanup();
        outcome
    }

    /// Run every mutant on a pool of `jobs` threads
    ///
    /// Returns finished results in mutant order plus the ids that were never
    /// started because `cancel` was set.
    pub fn run_all(
        &self,
        mutants: Vec<Mutant>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(Vec<MutantResult>, Vec<usize>)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.max(1))
            .build()
            .map_err(|e| MutationError::TestExecutionError {
                error: format!("failed to start worker pool: {}", e),
            })?;

        let runs: Vec<std::result::Result<MutantResult, usize>> = pool.install(|| {
            mutants
                .into_par_iter()
                .map(|mutant| {
                    if cancel.is_cancelled() {
                        Err(mutant.id)
                    } else {
                        Ok(self.run_mutant(mutant, timeout))
                    }
                })
                .collect()
        });

        let mut results = Vec::new();
        let mut not_run = Vec::new();
        for run in runs {
            match run {
                Ok(result) => results.push(result),
                Err(id) => not_run.push(id),
            }
        }
        Ok((results, not_run))
    }
}

/// Parsed source and generated mutants, before anything runs
#[derive(Debug)]
pub struct Prepared {
    pub source_file: PathBuf,
    pub original_source: String,
    /// The unmutated tree as the serializer prints it, for diffs
    pub normalized_source: String,
    pub tree: SyntaxTree,
    pub operators: Vec<String>,
    pub generation: Generation,
}

/// Validate the configuration, parse the source and generate mutants
pub fn prepare(config: &Config, catalog: &Catalog) -> Result<Prepared> {
    if let Err(errors) = config.validate() {
        let mut errors = errors.into_iter();
        return Err(match (errors.next(), errors.next()) {
            (Some(first), None) => first,
            (Some(first), Some(second)) => {
                let mut messages = vec![first.to_string(), second.to_string()];
                messages.extend(errors.map(|e| e.to_string()));
                MutationError::config(messages.join("; "))
            }
            (None, _) => MutationError::config("invalid configuration"),
        });
    }

    let settings = &config.settings;
    let operators = catalog.select(&settings.operator_selection())?;

    let source_file = config.source_path();
    if !source_file.is_file() {
        return Err(MutationError::FileNotFound { file: source_file });
    }
    if !source_file.starts_with(&config.project_root) {
        return Err(MutationError::config(format!(
            "source '{}' is not inside project_root '{}'",
            source_file.display(),
            config.project_root.display()
        )));
    }
    let original_source =
        std::fs::read_to_string(&source_file).map_err(|e| MutationError::FileReadError {
            file: source_file.clone(),
            error: e.to_string(),
        })?;
    let tree = RustParser.parse(&original_source).map_err(|e| match e {
        MutationError::ParseError { error, .. } => MutationError::ParseError {
            file: source_file.clone(),
            error,
        },
        other => other,
    })?;

    let operator_names = operators.iter().map(|op| op.name().to_string()).collect();
    let mut generator = Generator::new(operators)
        .with_skip(Box::new(MarkerSkip::new(settings.skip_markers.clone())))
        .with_options(settings.generation_options());
    if settings.order > 1 {
        generator = generator.with_strategy(strategy_by_name(&settings.hom_strategy)?);
    }
    let generation = generator.generate(&tree);
    info!(
        file = %source_file.display(),
        mutants = generation.mutants.len(),
        skipped = generation.errors.len(),
        "generated mutants"
    );

    let normalized_source = RustSerializer
        .serialize(&tree)
        .map_err(|e| MutationError::Unprintable {
            file: source_file.clone(),
            error: e.to_string(),
        })?;
    if RustParser.parse(&normalized_source).ok().as_ref() != Some(&tree) {
        warn!(
            file = %source_file.display(),
            "source does not survive a print/parse round trip; mutants may not build"
        );
    }

    Ok(Prepared {
        source_file,
        original_source,
        normalized_source,
        tree,
        operators: operator_names,
        generation,
    })
}

/// Outcome of a whole mutation testing run
#[derive(Debug)]
pub struct MutationRun {
    pub source_file: PathBuf,
    pub normalized_source: String,
    pub results: Vec<MutantResult>,
    /// Mutant ids never started because the run was cancelled
    pub not_run: Vec<usize>,
    pub generation_errors: Vec<GenerationError>,
    pub baseline: Duration,
    pub timeout: Duration,
    pub score: ScoreReport,
    pub duration: Duration,
}

/// Run mutation testing with the given configuration
pub fn run_mutation_tests(config: &Config, catalog: &Catalog) -> Result<MutationRun> {
    run_mutation_tests_with(config, catalog, &ProcessRunner, &CancellationToken::new())
}

/// Run mutation testing with a custom runner and cancellation token
pub fn run_mutation_tests_with(
    config: &Config,
    catalog: &Catalog,
    runner: &dyn TestRunner,
    cancel: &CancellationToken,
) -> Result<MutationRun> {
    let started = Instant::now();
    let prepared = prepare(config, catalog)?;
    let settings = &config.settings;

    let execution = Execution {
        runner,
        serializer: &RustSerializer,
        project_root: &config.project_root,
        source_file: &prepared.source_file,
        command: &config.test_command,
        unviable_markers: &settings.unviable_markers,
        jobs: settings.jobs,
    };

    let baseline = execution.baseline(&prepared.original_source)?;
    let timeout = mutant_timeout(baseline, settings.timeout_factor, settings.min_timeout());
    info!(
        baseline_ms = baseline.as_millis() as u64,
        timeout_ms = timeout.as_millis() as u64,
        "baseline passed"
    );

    let (results, not_run) = execution.run_all(prepared.generation.mutants, timeout, cancel)?;

    let mut score = ScoreReport::new(prepared.operators);
    for result in &results {
        score.record(result.mutant.operators(), &result.outcome);
    }
    info!(
        killed = score.killed,
        survived = score.survived,
        timed_out = score.timed_out,
        errored = score.errored,
        not_run = not_run.len(),
        "mutation run finished"
    );

    Ok(MutationRun {
        source_file: prepared.source_file,
        normalized_source: prepared.normalized_source,
        results,
        not_run,
        generation_errors: prepared.generation.errors,
        baseline,
        timeout,
        score,
        duration: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Score;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    const SOURCE: &str = "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\nfn within(x: i32, y: i32) -> bool {\n    x <= y\n}\n";

    fn project(source: &str) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src").join("lib.rs"), source).unwrap();
        let mut config = Config::new("src/lib.rs", TestCommand::new("unused", &["{mutant}"]));
        config.project_root = dir.path().to_path_buf();
        config.settings.jobs = 2;
        (dir, config)
    }

    /// Reads the file named by the first argument and decides from its text
    struct Scripted<F>(F);

    impl<F> TestRunner for Scripted<F>
    where
        F: Fn(&str) -> RunOutput + Send + Sync,
    {
        fn run(&self, command: &TestCommand, _timeout: Option<Duration>) -> Result<RunOutput> {
            let text = fs::read_to_string(&command.args[0]).unwrap();
            Ok((self.0)(&text))
        }
    }

    fn passed() -> RunOutput {
        RunOutput {
            success: true,
            code: Some(0),
            ..Default::default()
        }
    }

    fn failed(output: &str) -> RunOutput {
        RunOutput {
            success: false,
            code: Some(101),
            output: output.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify() {
        let markers = vec!["error[E".to_string()];
        assert_eq!(classify(&passed(), &markers), Outcome::Survived);
        assert_eq!(classify(&failed("assertion failed"), &markers), Outcome::Killed);
        assert!(matches!(
            classify(&failed("error[E0308]: mismatched types"), &markers),
            Outcome::Errored(_)
        ));
        let timed_out = RunOutput {
            timed_out: true,
            ..Default::default()
        };
        assert_eq!(classify(&timed_out, &markers), Outcome::TimedOut);
    }

    #[test]
    fn test_mutant_timeout() {
        let min = Duration::from_secs(1);
        assert_eq!(mutant_timeout(Duration::from_millis(100), 5.0, min), min);
        assert_eq!(
            mutant_timeout(Duration::from_secs(2), 5.0, min),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_process_runner_exit_codes() {
        let ok = ProcessRunner
            .run(&TestCommand::new("sh", &["-c", "echo hi"]), Some(Duration::from_secs(10)))
            .unwrap();
        assert!(ok.success);
        assert!(ok.output.contains("hi"));

        let bad = ProcessRunner
            .run(&TestCommand::new("sh", &["-c", "echo nope >&2; exit 3"]), None)
            .unwrap();
        assert!(!bad.success);
        assert_eq!(bad.code, Some(3));
        assert!(bad.output.contains("nope"));
    }

    #[test]
    fn test_process_runner_timeout() {
        let run = ProcessRunner
            .run(
                &TestCommand::new("sh", &["-c", "while :; do :; done"]),
                Some(Duration::from_millis(200)),
            )
            .unwrap();
        assert!(run.timed_out);
        assert!(run.duration < Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_kills_grandchildren() {
        let dir = TempDir::new().unwrap();
        let mut command = TestCommand::new("sh", &["-c", "sh -c 'sleep 2; touch marker'; true"]);
        command.working_dir = Some(dir.path().to_path_buf());

        let run = ProcessRunner
            .run(&command, Some(Duration::from_millis(200)))
            .unwrap();
        assert!(run.timed_out);

        std::thread::sleep(Duration::from_secs(3));
        assert!(!dir.path().join("marker").exists());
    }

    #[test]
    fn test_background_process_does_not_block_output() {
        let started = Instant::now();
        let run = ProcessRunner
            .run(
                &TestCommand::new("sh", &["-c", "sleep 30 & echo done"]),
                Some(Duration::from_secs(20)),
            )
            .unwrap();
        assert!(run.success);
        assert!(run.output.contains("done"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_if_let_source_prints_valid_mutants() {
        let (_dir, mut config) = project(
            "fn pick(o: Option<i32>) -> i32 {\n    if let Some(v) = o { v + 1 } else { 0 }\n}\n",
        );
        config.settings.experimental = true;
        let prepared = prepare(&config, &Catalog::builtin().unwrap()).unwrap();

        assert!(prepared.normalized_source.contains("if let Some(v) = o"));
        assert!(!prepared.generation.mutants.is_empty());
        for mutant in &prepared.generation.mutants {
            let source = RustSerializer.serialize(&mutant.tree).unwrap();
            assert!(!source.contains("(let"), "{}: {}", mutant.describe(), source);
            assert!(RustParser.parse(&source).is_ok());
        }
    }

    #[test]
    fn test_process_runner_spawn_failure() {
        let result = ProcessRunner.run(&TestCommand::new("/definitely/not/here", &[]), None);
        assert!(matches!(result, Err(MutationError::TestExecutionError { .. })));
    }

    #[test]
    fn test_arithmetic_mutant_killed_and_boundary_survives() {
        let (_dir, mut config) = project(SOURCE);
        config.settings.operators = vec!["arithmetic".into(), "boundary".into()];
        // tests only check add
        let runner = Scripted(|text: &str| {
            if text.contains("a + b") {
                passed()
            } else {
                failed("add failed")
            }
        });

        let run = run_mutation_tests_with(
            &config,
            &Catalog::builtin().unwrap(),
            &runner,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(run.results.len(), 2);
        assert_eq!(run.results[0].outcome, Outcome::Killed);
        assert_eq!(run.results[1].outcome, Outcome::Survived);
        assert!(run.results[1]
            .mutated_source
            .as_deref()
            .unwrap()
            .contains("x < y"));
        assert_eq!(run.score.mutation_score(), Score::Percent(50.0));
        assert_eq!(run.score.per_operator["boundary"].survived, 1);
        assert!(run.not_run.is_empty());
    }

    #[test]
    fn test_failing_baseline_aborts() {
        let (_dir, config) = project(SOURCE);
        let runner = Scripted(|_: &str| failed("broken suite"));
        let result = run_mutation_tests_with(
            &config,
            &Catalog::builtin().unwrap(),
            &runner,
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(MutationError::BaselineFailed { output, .. }) if output == "broken suite"));
    }

    #[test]
    fn test_unserializable_mutant_is_errored() {
        let (_dir, mut config) = project("fn neg(x: i32) -> i32 {\n    -x\n}\n");
        config.settings.operators = vec!["invert_negatives".into()];
        let runner = Scripted(|_: &str| passed());

        let run = run_mutation_tests_with(
            &config,
            &Catalog::builtin().unwrap(),
            &runner,
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(run.results.len(), 1);
        assert!(matches!(&run.results[0].outcome, Outcome::Errored(reason) if reason.contains("unary plus")));
        assert_eq!(run.score.mutation_score(), Score::Undefined);
    }

    #[test]
    fn test_cancellation_stops_dispatch() {
        let (_dir, mut config) = project(SOURCE);
        config.settings.jobs = 1;
        let cancel = CancellationToken::new();
        let calls = AtomicUsize::new(0);
        let trigger = cancel.clone();
        let runner = Scripted(move |_: &str| {
            // first call is the baseline
            if calls.fetch_add(1, Ordering::SeqCst) >= 1 {
                trigger.cancel();
            }
            passed()
        });

        let run = run_mutation_tests_with(&config, &Catalog::builtin().unwrap(), &runner, &cancel).unwrap();
        let total = run.results.len() + run.not_run.len();
        assert!(total > 2);
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.score.total, 1);
    }

    #[test]
    fn test_missing_source_file() {
        let (_dir, mut config) = project(SOURCE);
        config.source = PathBuf::from("src/missing.rs");
        let result = prepare(&config, &Catalog::builtin().unwrap());
        assert!(matches!(result, Err(MutationError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_error_names_file() {
        let (_dir, config) = project("fn broken( {");
        let result = prepare(&config, &Catalog::builtin().unwrap());
        match result {
            Err(MutationError::ParseError { file, .. }) => assert!(file.ends_with("src/lib.rs")),
            other => panic!("expected a parse error, got {:?}", other.map(|p| p.source_file)),
        }
    }

    #[test]
    fn test_invalid_settings_abort_before_generation() {
        let (_dir, mut config) = project(SOURCE);
        config.settings.operators = vec!["teleport".into()];
        let result = prepare(&config, &Catalog::builtin().unwrap());
        assert!(matches!(result, Err(e) if e.is_configuration()));

        config.settings.operators.clear();
        config.settings.percentage = 0;
        let result = prepare(&config, &Catalog::builtin().unwrap());
        assert!(matches!(result, Err(MutationError::ConfigError { .. })));
    }
}
