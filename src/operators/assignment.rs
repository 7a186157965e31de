use crate::error::CandidateError;
use crate::tree::{BinOp, Node, NodeKind};

use super::MutationOperator;

/// Swaps increments and decrements
///
/// Covers `x += e` / `x -= e` and the spelled-out `x = x + e` / `x = x - e`.
pub struct IncrementsMutator;

fn flip(op: BinOp) -> Option<BinOp> {
    match op {
        BinOp::Add => Some(BinOp::Sub),
        BinOp::Sub => Some(BinOp::Add),
        _ => None,
    }
}

impl MutationOperator for IncrementsMutator {
    fn name(&self) -> &'static str {
        "increments"
    }

    fn description(&self) -> &'static str {
        "swap increments and decrements (x += 1 -> x -= 1)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::AugAssign, NodeKind::Assign]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        match node {
            Node::AugAssign { target, op, value } => Ok(flip(*op)
                .map(|new_op| Node::AugAssign {
                    target: target.clone(),
                    op: new_op,
                    value: value.clone(),
                })
                .into_iter()
                .collect()),
            Node::Assign { target, value } => match &**value {
                Node::BinaryExpr { op, left, right } if left == target => Ok(flip(*op)
                    .map(|new_op| Node::Assign {
                        target: target.clone(),
                        value: Box::new(Node::BinaryExpr {
                            op: new_op,
                            left: left.clone(),
                            right: right.clone(),
                        }),
                    })
                    .into_iter()
                    .collect()),
                _ => Ok(Vec::new()),
            },
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aug(op: BinOp) -> Node {
        Node::AugAssign {
            target: Box::new(Node::name("x")),
            op,
            value: Box::new(Node::int(1)),
        }
    }

    fn assign(target: &str, value: Node) -> Node {
        Node::Assign {
            target: Box::new(Node::name(target)),
            value: Box::new(value),
        }
    }

    #[test]
    fn test_aug_assign_flips() {
        assert_eq!(IncrementsMutator.candidates(&aug(BinOp::Add)).unwrap(), vec![aug(BinOp::Sub)]);
        assert_eq!(IncrementsMutator.candidates(&aug(BinOp::Sub)).unwrap(), vec![aug(BinOp::Add)]);
        assert!(IncrementsMutator.candidates(&aug(BinOp::Mul)).unwrap().is_empty());
    }

    #[test]
    fn test_spelled_out_increment() {
        let node = assign("x", Node::binary(BinOp::Add, Node::name("x"), Node::int(2)));
        assert_eq!(
            IncrementsMutator.candidates(&node).unwrap(),
            vec![assign("x", Node::binary(BinOp::Sub, Node::name("x"), Node::int(2)))]
        );
    }

    #[test]
    fn test_assignment_of_other_name_ignored() {
        let node = assign("x", Node::binary(BinOp::Add, Node::name("y"), Node::int(2)));
        assert!(IncrementsMutator.candidates(&node).unwrap().is_empty());
    }
}
