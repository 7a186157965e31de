use crate::error::CandidateError;
use crate::tree::{Node, NodeKind, UnaryOp};

use super::MutationOperator;

/// Removes conditionals
///
/// `if c { body }` becomes the bare `{ body }` and `while c` becomes
/// `while true`.
pub struct RemoveConditionalMutator;

/// Swaps the branches of an `if`/`else` and negates the test
pub struct SwapBranchesMutator;

/// Negates the guard of an `if` or `while`
pub struct NegateGuardMutator;

impl MutationOperator for RemoveConditionalMutator {
    fn name(&self) -> &'static str {
        "remove_conditional"
    }

    fn description(&self) -> &'static str {
        "remove conditions (if c { .. } -> { .. }, while c -> while true)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::If, NodeKind::While]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(match node {
            Node::If { test, body, .. } if !test.is_pattern_guard() => {
                vec![Node::Block { body: body.clone() }]
            }
            Node::While { test, body }
                if **test != Node::boolean(true) && !test.is_pattern_guard() =>
            {
                vec![Node::While {
                    test: Box::new(Node::boolean(true)),
                    body: body.clone(),
                }]
            }
            _ => Vec::new(),
        })
    }
}

impl MutationOperator for SwapBranchesMutator {
    fn name(&self) -> &'static str {
        "swap_branches"
    }

    fn description(&self) -> &'static str {
        "swap if/else branches (if c { a } else { b } -> if !c { b } else { a })"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::If]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        let Node::If { test, body, orelse } = node else {
            return Ok(Vec::new());
        };
        if orelse.is_empty() || test.is_pattern_guard() {
            return Ok(Vec::new());
        }
        // an `else if` chain moves into a plain block
        let new_body = match orelse.as_slice() {
            [chained @ Node::If { .. }] => vec![Node::Expr {
                value: Box::new(chained.clone()),
                semi: false,
            }],
            stmts => stmts.to_vec(),
        };
        Ok(vec![Node::If {
            test: Box::new((**test).clone().negated()),
            body: new_body,
            orelse: body.clone(),
        }])
    }
}

impl MutationOperator for NegateGuardMutator {
    fn name(&self) -> &'static str {
        "negate_guard"
    }

    fn description(&self) -> &'static str {
        "negate conditions (if c -> if !c)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::If, NodeKind::While]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        let negate = |test: &Node| Box::new(Node::unary(UnaryOp::Not, test.clone()));
        Ok(match node {
            Node::If { test, .. } | Node::While { test, .. } if test.is_pattern_guard() => Vec::new(),
            Node::If { test, body, orelse } => vec![Node::If {
                test: negate(test),
                body: body.clone(),
                orelse: orelse.clone(),
            }],
            Node::While { test, body } => vec![Node::While {
                test: negate(test),
                body: body.clone(),
            }],
            _ => Vec::new(),
        })
    }
}
