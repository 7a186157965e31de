//! Mutation score aggregation
//!
//! Tallies are plain counters, so recording outcomes in any order and merging
//! partial reports in any order gives the same result.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::runner::Outcome;

/// Killed (including timed out) mutants over the evaluable ones
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Percentage rounded to two decimal places
    Percent(f64),
    /// Every mutant errored, or there were none
    Undefined,
}

impl Score {
    pub fn percent(&self) -> Option<f64> {
        match self {
            Score::Percent(p) => Some(*p),
            Score::Undefined => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Percent(p) => write!(f, "{:.2}%", p),
            Score::Undefined => f.write_str("undefined (no evaluable mutants)"),
        }
    }
}

/// Outcome counts for one operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperatorTally {
    pub killed: usize,
    pub survived: usize,
    pub timed_out: usize,
    pub errored: usize,
}

impl OperatorTally {
    fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Killed => self.killed += 1,
            Outcome::Survived => self.survived += 1,
            Outcome::TimedOut => self.timed_out += 1,
            Outcome::Errored(_) => self.errored += 1,
        }
    }

    fn merge(&mut self, other: &OperatorTally) {
        self.killed += other.killed;
        self.survived += other.survived;
        self.timed_out += other.timed_out;
        self.errored += other.errored;
    }

    pub fn total(&self) -> usize {
        self.killed + self.survived + self.timed_out + self.errored
    }
}

/// Aggregated outcomes of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreReport {
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub per_operator: BTreeMap<String, OperatorTally>,
}

impl ScoreReport {
    /// Empty report with a zero tally for every operator
    pub fn new<I, S>(operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            per_operator: operators
                .into_iter()
                .map(|name| (name.into(), OperatorTally::default()))
                .collect(),
            ..Default::default()
        }
    }

    /// Count one mutant's outcome against each operator that built it
    pub fn record<'a>(&mut self, operators: impl IntoIterator<Item = &'a str>, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Killed => self.killed += 1,
            Outcome::Survived => self.survived += 1,
            Outcome::TimedOut => self.timed_out += 1,
            Outcome::Errored(_) => self.errored += 1,
        }
        let distinct: BTreeSet<&str> = operators.into_iter().collect();
        for name in distinct {
            self.per_operator.entry(name.to_string()).or_default().add(outcome);
        }
    }

    /// Fold another partial report into this one
    pub fn merge(&mut self, other: &ScoreReport) {
        self.total += other.total;
        self.killed += other.killed;
        self.survived += other.survived;
        self.timed_out += other.timed_out;
        self.errored += other.errored;
        for (name, tally) in &other.per_operator {
            self.per_operator.entry(name.clone()).or_default().merge(tally);
        }
    }

    pub fn mutation_score(&self) -> Score {
        let evaluable = self.total - self.errored;
        if evaluable == 0 {
            return Score::Undefined;
        }
        let detected = (self.killed + self.timed_out) as f64;
        let percent = detected / evaluable as f64 * 100.0;
        Score::Percent((percent * 100.0).round() / 100.0)
    }
}
