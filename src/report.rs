//! Report generation for mutation testing results
//!
//! This module formats and displays mutation testing results, and writes
//! them as YAML for other tools.

use colored::Colorize;
use serde::Serialize;
use similar::TextDiff;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::codegen::snippet;
use crate::error::{MutationError, Result};
use crate::mutator::Mutant;
use crate::runner::{MutantResult, MutationRun, Outcome};
use crate::score::{OperatorTally, Score};

/// Summary report of mutation testing
#[derive(Debug)]
pub struct MutationReport {
    pub run: MutationRun,
}

#[derive(Debug, Serialize)]
struct YamlReport {
    source: String,
    total: usize,
    killed: usize,
    survived: usize,
    timed_out: usize,
    errored: usize,
    not_run: Vec<usize>,
    /// Absent when no mutant was evaluable
    mutation_score: Option<f64>,
    baseline_seconds: f64,
    timeout_seconds: f64,
    duration_seconds: f64,
    per_operator: BTreeMap<String, OperatorTally>,
    mutants: Vec<YamlMutant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    generation_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct YamlMutant {
    id: usize,
    operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    path: String,
    original: String,
    replacement: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    seconds: f64,
}

impl YamlMutant {
    fn new(result: &MutantResult) -> Self {
        let (original, replacement) = change_summary(&result.mutant);
        Self {
            id: result.mutant.id,
            operator: result.mutant.operator_name(),
            function: result.mutant.function.clone(),
            path: result
                .mutant
                .path()
                .map(|p| p.to_string())
                .unwrap_or_default(),
            original,
            replacement,
            outcome: result.outcome.label(),
            reason: match &result.outcome {
                Outcome::Errored(reason) => Some(reason.clone()),
                _ => None,
            },
            seconds: result.duration.as_secs_f64(),
        }
    }
}

/// `original` and `replacement` snippets, joined with ` | ` for higher-order mutants
fn change_summary(mutant: &Mutant) -> (String, String) {
    let originals: Vec<String> = mutant.rewrites.iter().map(|r| snippet(&r.original)).collect();
    let replacements: Vec<String> = mutant.rewrites.iter().map(|r| snippet(&r.replacement)).collect();
    (originals.join(" | "), replacements.join(" | "))
}

/// Unified diff between the unmutated and the mutated source
pub fn mutant_diff(original: &str, mutated: &str, mutant: &Mutant) -> String {
    TextDiff::from_lines(original, mutated)
        .unified_diff()
        .context_radius(2)
        .header("original", &format!("mutant #{}", mutant.id))
        .to_string()
}

impl MutationReport {
    pub fn new(run: MutationRun) -> Self {
        Self { run }
    }

    pub fn killed(&self) -> usize {
        self.run.score.killed
    }

    pub fn survived(&self) -> usize {
        self.run.score.survived
    }

    pub fn timeouts(&self) -> usize {
        self.run.score.timed_out
    }

    pub fn errored(&self) -> usize {
        self.run.score.errored
    }

    pub fn total(&self) -> usize {
        self.run.score.total
    }

    pub fn score(&self) -> Score {
        self.run.score.mutation_score()
    }

    /// Get surviving mutants (test gaps)
    pub fn surviving_mutants(&self) -> Vec<&MutantResult> {
        self.run
            .results
            .iter()
            .filter(|r| r.outcome == Outcome::Survived)
            .collect()
    }

    /// Print the report to stdout
    pub fn print(&self) {
        println!();
        println!("{}", "Mutation Testing Report".bold());
        println!("{}", "=".repeat(60));
        println!();

        for result in &self.run.results {
            let status_str = match &result.outcome {
                Outcome::Killed => "[KILLED]".green().bold(),
                Outcome::Survived => "[SURVIVED]".red().bold(),
                Outcome::TimedOut => "[TIMEOUT]".yellow().bold(),
                Outcome::Errored(_) => "[ERROR]".yellow().bold(),
            };
            let (original, replacement) = change_summary(&result.mutant);

            println!(
                "{} {} {} - {} -> {}",
                status_str,
                format!("#{}", result.mutant.id).dimmed(),
                result.mutant.operator_name(),
                original,
                replacement
            );
            println!("        {}", location(&result.mutant, &self.run.source_file).dimmed());
            if let Outcome::Errored(reason) = &result.outcome {
                println!("        {}", reason.dimmed());
            }
        }

        println!();
        println!("{}", "Summary".bold());
        println!("{}", "-".repeat(40));
        println!("Total mutants:     {}", self.total());
        println!(
            "Killed:            {} {}",
            self.killed(),
            "(good - tests caught the mutant)".dimmed()
        );
        println!(
            "Survived:          {} {}",
            self.survived(),
            "(bad - tests missed the mutant)".dimmed()
        );
        if self.timeouts() > 0 {
            println!(
                "Timeouts:          {} {}",
                self.timeouts(),
                "(counted as killed)".dimmed()
            );
        }
        if self.errored() > 0 {
            println!("Errors:            {}", self.errored());
        }
        if !self.run.not_run.is_empty() {
            println!("Not run:           {}", self.run.not_run.len());
        }
        if !self.run.generation_errors.is_empty() {
            println!("Skipped:           {}", self.run.generation_errors.len());
        }

        println!();
        let score_colored = match self.score() {
            Score::Percent(p) if p >= 90.0 => format!("{:.2}%", p).green().bold(),
            Score::Percent(p) if p >= 70.0 => format!("{:.2}%", p).yellow().bold(),
            Score::Percent(p) => format!("{:.2}%", p).red().bold(),
            Score::Undefined => Score::Undefined.to_string().yellow().bold(),
        };
        println!("Mutation Score:    {}", score_colored);
        println!(
            "Duration:          {}",
            format_duration(self.run.duration)
        );

        println!();
        println!("{}", "Per Operator".bold());
        println!("{}", "-".repeat(40));
        for (name, tally) in &self.run.score.per_operator {
            println!(
                "  {:<20} killed {:>3}  survived {:>3}  timeout {:>3}  error {:>3}",
                name, tally.killed, tally.survived, tally.timed_out, tally.errored
            );
        }

        let survivors = self.surviving_mutants();
        if !survivors.is_empty() {
            println!();
            println!("{}", "Surviving Mutants (improve your tests!)".red().bold());
            println!("{}", "-".repeat(40));
            for result in survivors {
                let (original, replacement) = change_summary(&result.mutant);
                println!("  • {} -> {}", original.yellow(), replacement.yellow());
                println!("    {}", location(&result.mutant, &self.run.source_file));
            }
        }

        println!();
        println!("{}", "Score Interpretation".dimmed());
        println!("{}", "-".repeat(40).dimmed());
        println!("{}", "90-100%: Excellent test coverage".dimmed());
        println!("{}", "70-89%:  Good coverage, some gaps".dimmed());
        println!("{}", "50-69%:  Moderate, needs improvement".dimmed());
        println!("{}", "<50%:    Poor, significant gaps".dimmed());
    }

    /// Print a unified diff for every mutant that was serialized
    pub fn print_diffs(&self) {
        for result in &self.run.results {
            if let Some(mutated) = &result.mutated_source {
                println!("{}", result.mutant.describe().bold());
                print!("{}", mutant_diff(&self.run.normalized_source, mutated, &result.mutant));
            }
        }
    }

    /// Serialize the report as YAML
    pub fn to_yaml(&self) -> Result<String> {
        let score = &self.run.score;
        let report = YamlReport {
            source: self.run.source_file.display().to_string(),
            total: score.total,
            killed: score.killed,
            survived: score.survived,
            timed_out: score.timed_out,
            errored: score.errored,
            not_run: self.run.not_run.clone(),
            mutation_score: score.mutation_score().percent(),
            baseline_seconds: self.run.baseline.as_secs_f64(),
            timeout_seconds: self.run.timeout.as_secs_f64(),
            duration_seconds: self.run.duration.as_secs_f64(),
            per_operator: score.per_operator.clone(),
            mutants: self.run.results.iter().map(YamlMutant::new).collect(),
            generation_errors: self
                .run
                .generation_errors
                .iter()
                .map(|e| e.to_string())
                .collect(),
        };
        serde_yaml::to_string(&report).map_err(|e| MutationError::WriteError {
            file: "report".into(),
            error: e.to_string(),
        })
    }

    /// Write the YAML report to `path`
    pub fn write_yaml(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).map_err(|e| MutationError::WriteError {
            file: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}

fn location(mutant: &Mutant, file: &Path) -> String {
    let path = mutant.path().map(|p| p.to_string()).unwrap_or_default();
    match &mutant.function {
        Some(function) => format!("{} in function '{}' at {}", file.display(), function, path),
        None => format!("{} at {}", file.display(), path),
    }
}

/// Format duration in a human-readable way
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}
