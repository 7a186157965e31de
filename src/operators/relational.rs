use crate::error::CandidateError;
use crate::tree::{CmpOp, Node, NodeKind};

use super::MutationOperator;

/// Negates relational comparisons (`<` -> `>=`)
pub struct NegateRelationalMutator;

/// Shifts comparison boundaries (`<` -> `<=`)
pub struct BoundaryMutator;

/// Flips equality (`==` -> `!=`)
pub struct EqualityMutator;

fn swap_op(node: &Node, table: fn(CmpOp) -> Option<CmpOp>) -> Vec<Node> {
    match node {
        Node::Compare { op, left, right } => table(*op)
            .map(|new_op| Node::Compare {
                op: new_op,
                left: left.clone(),
                right: right.clone(),
            })
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

impl MutationOperator for NegateRelationalMutator {
    fn name(&self) -> &'static str {
        "negate_relational"
    }

    fn description(&self) -> &'static str {
        "negate relational operators (a < b -> a >= b)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Compare]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(swap_op(node, |op| match op {
            CmpOp::Lt => Some(CmpOp::Ge),
            CmpOp::Ge => Some(CmpOp::Lt),
            CmpOp::Le => Some(CmpOp::Gt),
            CmpOp::Gt => Some(CmpOp::Le),
            CmpOp::Eq | CmpOp::Ne => None,
        }))
    }
}

impl MutationOperator for BoundaryMutator {
    fn name(&self) -> &'static str {
        "boundary"
    }

    fn description(&self) -> &'static str {
        "move comparison boundaries (a <= b -> a < b)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Compare]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(swap_op(node, |op| match op {
            CmpOp::Lt => Some(CmpOp::Le),
            CmpOp::Le => Some(CmpOp::Lt),
            CmpOp::Gt => Some(CmpOp::Ge),
            CmpOp::Ge => Some(CmpOp::Gt),
            CmpOp::Eq | CmpOp::Ne => None,
        }))
    }
}

impl MutationOperator for EqualityMutator {
    fn name(&self) -> &'static str {
        "equality"
    }

    fn description(&self) -> &'static str {
        "flip equality checks (a == b -> a != b)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Compare]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(swap_op(node, |op| match op {
            CmpOp::Eq => Some(CmpOp::Ne),
            CmpOp::Ne => Some(CmpOp::Eq),
            _ => None,
        }))
    }
}
