//! Mutant generation
//!
//! This module walks the syntax tree, asks every active operator for
//! candidates at every matching node, and splices each candidate into its
//! own deep copy of the tree. The source tree is never modified.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::hom::{FirstToLast, HomStrategy};
use crate::operators::OperatorRef;
use crate::tree::{Node, NodePath, Site, SyntaxTree};

/// Attribute paths that exempt a function from mutation
pub const DEFAULT_SKIP_MARKERS: &[&str] = &["mutants::skip", "no_mutate"];

/// One node replacement inside a mutant
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub operator: String,
    pub path: NodePath,
    pub original: Node,
    pub replacement: Node,
}

/// An independent, rewritten copy of the source tree
#[derive(Debug, Clone)]
pub struct Mutant {
    /// Ordinal of this mutant in the unsampled sequence, starting at 1
    pub id: usize,
    /// Exactly one rewrite for first-order mutants
    pub rewrites: Vec<Rewrite>,
    pub tree: SyntaxTree,
    /// Function holding the first rewrite, if any
    pub function: Option<String>,
}

impl Mutant {
    /// Operator name, `+`-joined for higher-order mutants
    pub fn operator_name(&self) -> String {
        let names: Vec<&str> = self.rewrites.iter().map(|r| r.operator.as_str()).collect();
        names.join("+")
    }

    /// Operator names of every rewrite, for per-operator tallies
    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.rewrites.iter().map(|r| r.operator.as_str())
    }

    pub fn path(&self) -> Option<&NodePath> {
        self.rewrites.first().map(|r| &r.path)
    }

    pub fn order(&self) -> usize {
        self.rewrites.len()
    }

    /// Rebuild the unmutated tree from the recorded rewrites
    pub fn revert(&self) -> SyntaxTree {
        let mut tree = self.tree.clone();
        for rewrite in self.rewrites.iter().rev() {
            tree.replace(&rewrite.path, rewrite.original.clone());
        }
        tree
    }

    /// Short human-readable label, e.g. `#3 arithmetic at /0/3/0 in add`
    pub fn describe(&self) -> String {
        let path = self
            .path()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "/".to_string());
        match &self.function {
            Some(function) => format!("#{} {} at {} in {}", self.id, self.operator_name(), path, function),
            None => format!("#{} {} at {}", self.id, self.operator_name(), path),
        }
    }
}

/// Decides whether a site is exempt from mutation
pub trait SkipPredicate: Send + Sync {
    fn skip(&self, site: &Site<'_>) -> bool;
}

/// Skips every site inside a function carrying one of the markers
#[derive(Debug, Clone)]
pub struct MarkerSkip {
    markers: Vec<String>,
}

impl MarkerSkip {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl Default for MarkerSkip {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl SkipPredicate for MarkerSkip {
    fn skip(&self, site: &Site<'_>) -> bool {
        let own_markers: &[String] = match site.node {
            Node::Function { markers, .. } => markers.as_slice(),
            _ => &[],
        };
        own_markers
            .iter()
            .chain(site.function_markers())
            .any(|m| self.markers.iter().any(|wanted| wanted == m))
    }
}

/// Knobs for one generation pass
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// 1 for first-order mutants, more to combine rewrites
    pub order: usize,
    /// Share of candidates to keep, 1..=100
    pub percentage: u8,
    pub seed: u64,
    /// Keep only the mutant with this id
    pub mutation_number: Option<usize>,
    pub max_mutants: Option<usize>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            order: 1,
            percentage: 100,
            seed: 0,
            mutation_number: None,
            max_mutants: None,
        }
    }
}

/// Mutants plus the candidates that could not be produced
#[derive(Debug, Default)]
pub struct Generation {
    pub mutants: Vec<Mutant>,
    pub errors: Vec<GenerationError>,
}

/// Produces mutants from a tree with a fixed operator set
pub struct Generator {
    operators: Vec<OperatorRef>,
    skip: Box<dyn SkipPredicate>,
    strategy: Box<dyn HomStrategy>,
    options: GenerationOptions,
}

impl Generator {
    pub fn new(operators: Vec<OperatorRef>) -> Self {
        Self {
            operators,
            skip: Box::new(MarkerSkip::default()),
            strategy: Box::new(FirstToLast),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_skip(mut self, skip: Box<dyn SkipPredicate>) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn HomStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn operators(&self) -> &[OperatorRef] {
        &self.operators
    }

    /// First-order rewrites in operator order, then pre-order
    pub fn rewrites(&self, tree: &SyntaxTree) -> (Vec<Rewrite>, Vec<GenerationError>) {
        let sites = tree.walk();
        let mut rewrites = Vec::new();
        let mut errors = Vec::new();

        for op in &self.operators {
            for site in &sites {
                if !op.targets(site.node.kind()) || self.skip.skip(site) {
                    continue;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| op.candidates(site.node)));
                let candidates = match outcome {
                    Ok(Ok(candidates)) => candidates,
                    Ok(Err(e)) => {
                        errors.push(generation_error(op.name(), &site.path, e.to_string()));
                        continue;
                    }
                    Err(panic) => {
                        errors.push(generation_error(op.name(), &site.path, panic_message(&*panic)));
                        continue;
                    }
                };
                for replacement in candidates {
                    rewrites.push(Rewrite {
                        operator: op.name().to_string(),
                        path: site.path.clone(),
                        original: site.node.clone(),
                        replacement,
                    });
                }
            }
        }

        (rewrites, errors)
    }

    /// Generate mutants for `tree`
    pub fn generate(&self, tree: &SyntaxTree) -> Generation {
        let (rewrites, mut errors) = self.rewrites(tree);
        let mut rng = fastrand::Rng::with_seed(self.options.seed);

        let groups: Vec<Vec<usize>> = if self.options.order > 1 {
            self.strategy.group(&rewrites, self.options.order, &mut rng)
        } else {
            (0..rewrites.len()).map(|i| vec![i]).collect()
        };

        let selected = sample(groups.len(), self.options.percentage, &mut rng);
        debug!(
            candidates = groups.len(),
            selected = selected.len(),
            "sampled mutation candidates"
        );

        let functions = function_names(tree);
        let mut mutants = Vec::new();
        for index in selected {
            let id = index + 1;
            if self.options.mutation_number.is_some_and(|wanted| wanted != id) {
                continue;
            }
            if self.options.max_mutants.is_some_and(|max| mutants.len() >= max) {
                break;
            }
            let group: Vec<Rewrite> = groups[index].iter().map(|&i| rewrites[i].clone()).collect();
            match splice(tree, &group) {
                Ok(mutated) => {
                    let function = group
                        .first()
                        .and_then(|r| enclosing_function(&functions, &r.path));
                    mutants.push(Mutant {
                        id,
                        rewrites: group,
                        tree: mutated,
                        function,
                    });
                }
                Err(e) => errors.push(e),
            }
        }

        for error in &errors {
            warn!(operator = %error.operator, path = %error.path, "skipping candidate: {}", error.reason);
        }

        Generation { mutants, errors }
    }
}

fn generation_error(operator: &str, path: &NodePath, reason: String) -> GenerationError {
    GenerationError {
        operator: operator.to_string(),
        path: path.clone(),
        reason,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("operator panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("operator panicked: {}", s)
    } else {
        "operator panicked".to_string()
    }
}

/// Indices to keep out of `n`, in ascending order
///
/// Keeps `ceil(n * percentage / 100)` indices chosen uniformly.
fn sample(n: usize, percentage: u8, rng: &mut fastrand::Rng) -> Vec<usize> {
    let percentage = usize::from(percentage.min(100));
    if percentage == 100 {
        return (0..n).collect();
    }
    let keep = (n * percentage).div_ceil(100);
    let mut chosen = rng.choose_multiple(0..n, keep);
    chosen.sort_unstable();
    chosen
}

/// Clone `tree` and splice every rewrite into the copy
fn splice(tree: &SyntaxTree, group: &[Rewrite]) -> Result<SyntaxTree, GenerationError> {
    let mut mutated = tree.clone();
    for rewrite in group {
        if mutated
            .replace(&rewrite.path, rewrite.replacement.clone())
            .is_none()
        {
            return Err(generation_error(
                &rewrite.operator,
                &rewrite.path,
                "path does not resolve in the copied tree".to_string(),
            ));
        }
    }
    Ok(mutated)
}

/// Paths and names of every function in the tree
fn function_names(tree: &SyntaxTree) -> Vec<(NodePath, String)> {
    tree.walk()
        .into_iter()
        .filter_map(|site| match site.node {
            Node::Function { name, .. } => Some((site.path, name.clone())),
            _ => None,
        })
        .collect()
}

fn enclosing_function(functions: &[(NodePath, String)], path: &NodePath) -> Option<String> {
    functions
        .iter()
        .filter(|(fpath, _)| fpath.is_prefix_of(path))
        .max_by_key(|(fpath, _)| fpath.depth())
        .map(|(_, name)| name.clone())
}
