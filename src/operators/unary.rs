use crate::error::CandidateError;
use crate::tree::{Node, NodeKind, UnaryOp};

use super::MutationOperator;

/// Drops a sign operator, leaving the bare operand
pub struct RemoveUnaryMutator;

/// Turns `-x` into `+x` for variables
///
/// Literal operands are skipped: `+5` and `5` would be the same value.
pub struct InvertNegativesMutator;

impl MutationOperator for RemoveUnaryMutator {
    fn name(&self) -> &'static str {
        "remove_unary"
    }

    fn description(&self) -> &'static str {
        "remove unary sign operators (-x -> x)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::UnaryExpr]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(match node {
            Node::UnaryExpr {
                op: UnaryOp::Neg | UnaryOp::Plus,
                operand,
            } => vec![(**operand).clone()],
            _ => Vec::new(),
        })
    }
}

impl MutationOperator for InvertNegativesMutator {
    fn name(&self) -> &'static str {
        "invert_negatives"
    }

    fn description(&self) -> &'static str {
        "invert negation of variables (-x -> +x)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::UnaryExpr]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(match node {
            Node::UnaryExpr {
                op: UnaryOp::Neg,
                operand,
            } if matches!(&**operand, Node::Name(_)) => {
                vec![Node::unary(UnaryOp::Plus, (**operand).clone())]
            }
            _ => Vec::new(),
        })
    }

    fn experimental(&self) -> bool {
        true
    }
}
