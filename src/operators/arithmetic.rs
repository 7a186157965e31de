use crate::error::CandidateError;
use crate::tree::{BinOp, Node, NodeKind};

use super::MutationOperator;

/// Swaps arithmetic, bitwise and shift operators
pub struct ArithmeticMutator;

fn replacements(op: BinOp) -> &'static [BinOp] {
    match op {
        BinOp::Add => &[BinOp::Sub],
        BinOp::Sub => &[BinOp::Add],
        BinOp::Mul => &[BinOp::Div],
        BinOp::Div => &[BinOp::Mul],
        BinOp::Rem => &[BinOp::Mul],
        BinOp::FloorDiv => &[BinOp::Mul],
        BinOp::BitAnd => &[BinOp::BitOr, BinOp::BitXor],
        BinOp::BitOr => &[BinOp::BitAnd, BinOp::BitXor],
        BinOp::BitXor => &[BinOp::BitAnd, BinOp::BitOr],
        BinOp::Shl => &[BinOp::Shr],
        BinOp::Shr => &[BinOp::Shl],
    }
}

impl MutationOperator for ArithmeticMutator {
    fn name(&self) -> &'static str {
        "arithmetic"
    }

    fn description(&self) -> &'static str {
        "replace arithmetic, bitwise and shift operators (a + b -> a - b)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::BinaryExpr]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        let Node::BinaryExpr { op, left, right } = node else {
            return Ok(Vec::new());
        };
        Ok(replacements(*op)
            .iter()
            .map(|&new_op| Node::BinaryExpr {
                op: new_op,
                left: left.clone(),
                right: right.clone(),
            })
            .collect())
    }
}
