//! Mutation operator catalog
//!
//! Every operator is a stateless rewrite rule: given a node of one of its
//! target kinds it returns the alternative nodes that could replace it. The
//! engine decides where each rewrite is applied; operators never see the tree.

mod arithmetic;
mod assignment;
mod calls;
mod conditional;
mod literals;
mod logical;
mod relational;
mod returns;
mod unary;

use std::collections::HashSet;
use std::sync::Arc;

pub use arithmetic::ArithmeticMutator;
pub use assignment::IncrementsMutator;
pub use calls::{RemoveCallMutator, SwapArgumentsMutator};
pub use conditional::{NegateGuardMutator, RemoveConditionalMutator, SwapBranchesMutator};
pub use literals::{ReplaceIntegerMutator, ReplaceStringMutator};
pub use logical::{LogicalMutator, NegateBooleanMutator};
pub use relational::{BoundaryMutator, EqualityMutator, NegateRelationalMutator};
pub use returns::ReturnValuesMutator;
pub use unary::{InvertNegativesMutator, RemoveUnaryMutator};

use crate::error::{CandidateError, MutationError, Result};
use crate::tree::{Node, NodeKind};

/// A named, pure rewrite rule
pub trait MutationOperator: Send + Sync {
    /// Stable identifier used in configuration and reports
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Node kinds this operator inspects; must not be empty
    fn target_kinds(&self) -> &'static [NodeKind];

    /// Replacement nodes for `node`, in a fixed order
    fn candidates(&self, node: &Node) -> std::result::Result<Vec<Node>, CandidateError>;

    /// Experimental operators are only active when asked for
    fn experimental(&self) -> bool {
        false
    }

    fn targets(&self, kind: NodeKind) -> bool {
        self.target_kinds().contains(&kind)
    }
}

/// Shared handle to an operator
pub type OperatorRef = Arc<dyn MutationOperator>;

/// Which operators a run uses
#[derive(Debug, Clone, Default)]
pub struct OperatorSelection {
    /// Use only these operators (empty = the standard set)
    pub only: Vec<String>,
    /// Remove these from the selection
    pub disabled: Vec<String>,
    /// Add the experimental operators to the standard set
    pub experimental: bool,
}

/// The validated set of known operators
#[derive(Clone)]
pub struct Catalog {
    operators: Vec<OperatorRef>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.operators.iter().map(|op| op.name()))
            .finish()
    }
}

impl Catalog {
    /// Build a catalog, rejecting operators without target kinds or with
    /// duplicate names
    pub fn new(operators: Vec<OperatorRef>) -> Result<Self> {
        let mut seen = HashSet::new();
        for op in &operators {
            if op.target_kinds().is_empty() {
                return Err(MutationError::MissingTargetKind {
                    name: op.name().to_string(),
                });
            }
            if !seen.insert(op.name()) {
                return Err(MutationError::config(format!(
                    "Mutation operator '{}' registered twice",
                    op.name()
                )));
            }
        }
        Ok(Self { operators })
    }

    /// Catalog of every built-in operator
    pub fn builtin() -> Result<Self> {
        Self::new(vec![
            Arc::new(ArithmeticMutator),
            Arc::new(NegateRelationalMutator),
            Arc::new(BoundaryMutator),
            Arc::new(EqualityMutator),
            Arc::new(LogicalMutator),
            Arc::new(NegateBooleanMutator),
            Arc::new(RemoveUnaryMutator),
            Arc::new(InvertNegativesMutator),
            Arc::new(IncrementsMutator),
            Arc::new(ReturnValuesMutator),
            Arc::new(RemoveConditionalMutator),
            Arc::new(SwapBranchesMutator),
            Arc::new(NegateGuardMutator),
            Arc::new(SwapArgumentsMutator),
            Arc::new(RemoveCallMutator),
            Arc::new(ReplaceIntegerMutator),
            Arc::new(ReplaceStringMutator),
        ])
    }

    pub fn operators(&self) -> &[OperatorRef] {
        &self.operators
    }

    pub fn get(&self, name: &str) -> Option<&OperatorRef> {
        self.operators.iter().find(|op| op.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.operators.iter().map(|op| op.name().to_string()).collect()
    }

    /// Resolve a selection to operators, keeping catalog order
    pub fn select(&self, selection: &OperatorSelection) -> Result<Vec<OperatorRef>> {
        for name in selection.only.iter().chain(&selection.disabled) {
            if self.get(name).is_none() {
                return Err(MutationError::UnknownOperator {
                    name: name.clone(),
                    available: self.names(),
                });
            }
        }

        let chosen = self
            .operators
            .iter()
            .filter(|op| {
                if selection.only.is_empty() {
                    !op.experimental() || selection.experimental
                } else {
                    selection.only.iter().any(|n| n == op.name())
                }
            })
            .filter(|op| !selection.disabled.iter().any(|n| n == op.name()))
            .cloned()
            .collect();

        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{Parser, RustParser};
    use pretty_assertions::assert_eq;

    struct Blind;

    impl MutationOperator for Blind {
        fn name(&self) -> &'static str {
            "blind"
        }
        fn description(&self) -> &'static str {
            "targets nothing"
        }
        fn target_kinds(&self) -> &'static [NodeKind] {
            &[]
        }
        fn candidates(&self, _node: &Node) -> std::result::Result<Vec<Node>, CandidateError> {
            Ok(Vec::new())
        }
    }

    const SAMPLE: &str = r#"
fn sample(a: i32, b: i32, flag: bool, name: &str) -> i32 {
    let mut total = a + b * 2 - (a % 3) / 1;
    total += 1;
    total = total - b;
    if a < b && !flag || a == 0 {
        total = -total;
    } else if a >= b {
        return 7;
    } else {
        total -= a << 1;
    }
    while total > 100 {
        total = compute(total, b, a);
    }
    check(name, "label", true);
    total.max(a)
}

fn ratio(x: f64) -> f64 { 2.5 }
fn ok(x: i32, y: i32) -> bool { x <= y }
fn nothing() -> Option<u8> { lookup() }
"#;

    #[test]
    fn test_empty_target_kinds_rejected() {
        let result = Catalog::new(vec![Arc::new(Blind)]);
        assert!(matches!(
            result,
            Err(MutationError::MissingTargetKind { name }) if name == "blind"
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Catalog::new(vec![Arc::new(ArithmeticMutator), Arc::new(ArithmeticMutator)]);
        assert!(matches!(result, Err(MutationError::ConfigError { .. })));
    }

    #[test]
    fn test_standard_selection_skips_experimental() {
        let catalog = Catalog::builtin().unwrap();
        let standard = catalog.select(&OperatorSelection::default()).unwrap();
        assert!(standard.iter().all(|op| !op.experimental()));
        assert!(standard.iter().any(|op| op.name() == "arithmetic"));

        let all = catalog
            .select(&OperatorSelection {
                experimental: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.len(), catalog.operators().len());
    }

    #[test]
    fn test_select_only_and_disable() {
        let catalog = Catalog::builtin().unwrap();
        let chosen = catalog
            .select(&OperatorSelection {
                only: vec!["boundary".into(), "arithmetic".into(), "logical".into()],
                disabled: vec!["logical".into()],
                experimental: false,
            })
            .unwrap();
        let names: Vec<&str> = chosen.iter().map(|op| op.name()).collect();
        assert_eq!(names, vec!["arithmetic", "boundary"]);
    }

    #[test]
    fn test_unknown_operator_name() {
        let catalog = Catalog::builtin().unwrap();
        let result = catalog.select(&OperatorSelection {
            only: vec!["teleport".into()],
            ..Default::default()
        });
        assert!(matches!(result, Err(MutationError::UnknownOperator { name, .. }) if name == "teleport"));
    }

    #[test]
    fn test_candidates_are_valid_and_never_noop() {
        let tree = RustParser.parse(SAMPLE).unwrap();
        let catalog = Catalog::builtin().unwrap();
        let mut produced = 0;

        for op in catalog.operators() {
            for site in tree.walk() {
                if !op.targets(site.node.kind()) {
                    continue;
                }
                let first = op.candidates(site.node).unwrap();
                let second = op.candidates(site.node).unwrap();
                assert_eq!(first, second, "{} is not deterministic", op.name());
                for candidate in first {
                    produced += 1;
                    assert_ne!(&candidate, site.node, "{} emitted a no-op", op.name());
                    assert_eq!(
                        candidate.kind().is_expression(),
                        site.node.kind().is_expression(),
                        "{} changed the syntactic category at {}",
                        op.name(),
                        site.path
                    );
                }
            }
        }

        assert!(produced > 20);
    }

    #[test]
    fn test_non_target_nodes_yield_nothing() {
        let catalog = Catalog::builtin().unwrap();
        let name = Node::name("x");
        for op in catalog.operators() {
            if !op.targets(name.kind()) {
                assert!(op.candidates(&name).unwrap().is_empty(), "{}", op.name());
            }
        }
    }
}
