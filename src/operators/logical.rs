use crate::error::CandidateError;
use crate::tree::{BoolOp, Literal, Node, NodeKind, UnaryOp};

use super::MutationOperator;

/// Swaps `&&` and `||`
pub struct LogicalMutator;

/// Flips boolean literals and drops logical negation
pub struct NegateBooleanMutator;

impl MutationOperator for LogicalMutator {
    fn name(&self) -> &'static str {
        "logical"
    }

    fn description(&self) -> &'static str {
        "swap logical connectives (a && b -> a || b)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::BoolExpr]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        let Node::BoolExpr { op, left, right } = node else {
            return Ok(Vec::new());
        };
        let flipped = match op {
            BoolOp::And => BoolOp::Or,
            BoolOp::Or => BoolOp::And,
        };
        Ok(vec![Node::BoolExpr {
            op: flipped,
            left: left.clone(),
            right: right.clone(),
        }])
    }
}

impl MutationOperator for NegateBooleanMutator {
    fn name(&self) -> &'static str {
        "negate_boolean"
    }

    fn description(&self) -> &'static str {
        "flip boolean literals and remove `!` (true -> false, !a -> a)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Literal, NodeKind::UnaryExpr]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(match node {
            Node::Literal(Literal::Bool(value)) => vec![Node::boolean(!value)],
            Node::UnaryExpr {
                op: UnaryOp::Not,
                operand,
            } => vec![(**operand).clone()],
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_and_becomes_or() {
        let node = Node::BoolExpr {
            op: BoolOp::And,
            left: Box::new(Node::name("a")),
            right: Box::new(Node::name("b")),
        };
        let out = LogicalMutator.candidates(&node).unwrap();
        assert_eq!(
            out,
            vec![Node::BoolExpr {
                op: BoolOp::Or,
                left: Box::new(Node::name("a")),
                right: Box::new(Node::name("b")),
            }]
        );
    }

    #[test]
    fn test_boolean_literal_flips() {
        assert_eq!(
            NegateBooleanMutator.candidates(&Node::boolean(true)).unwrap(),
            vec![Node::boolean(false)]
        );
    }

    #[test]
    fn test_not_removed() {
        let node = Node::unary(UnaryOp::Not, Node::name("ready"));
        assert_eq!(
            NegateBooleanMutator.candidates(&node).unwrap(),
            vec![Node::name("ready")]
        );
    }

    #[test]
    fn test_other_literals_ignored() {
        assert!(NegateBooleanMutator.candidates(&Node::int(3)).unwrap().is_empty());
        let neg = Node::unary(UnaryOp::Neg, Node::name("x"));
        assert!(NegateBooleanMutator.candidates(&neg).unwrap().is_empty());
    }
}
