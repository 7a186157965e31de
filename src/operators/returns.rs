use crate::error::CandidateError;
use crate::tree::{BinOp, Literal, Node, NodeKind, UnaryOp};

use super::MutationOperator;

/// Replaces returned values with a different value of the same class
///
/// | returned value        | replacement            |
/// |-----------------------|------------------------|
/// | boolean               | its negation           |
/// | `0`                   | `1`                    |
/// | other integer         | `0`                    |
/// | float `v`             | `-(v + 1)`             |
/// | arithmetic expression | the expression `+ 1`   |
/// | string                | `""` (or `"mutated"`)  |
/// | anything else         | `None`                 |
///
/// Function-level suppression markers are honoured by the engine, not here.
pub struct ReturnValuesMutator;

pub(crate) const STRING_SENTINEL: &str = "mutated";

fn is_boolean(node: &Node) -> bool {
    matches!(
        node,
        Node::Literal(Literal::Bool(_))
            | Node::Compare { .. }
            | Node::BoolExpr { .. }
            | Node::UnaryExpr {
                op: UnaryOp::Not,
                ..
            }
    )
}

fn replacement(value: &Node) -> Option<Node> {
    if is_boolean(value) {
        return Some(match value {
            Node::Literal(Literal::Bool(b)) => Node::boolean(!b),
            other => other.clone().negated(),
        });
    }

    match value {
        Node::Literal(Literal::Int(0)) => Some(Node::int(1)),
        Node::Literal(Literal::Int(_)) => Some(Node::int(0)),
        Node::Literal(Literal::Float(v)) => Some(Node::unary(
            UnaryOp::Neg,
            Node::Literal(Literal::Float(if v.is_nan() { 0.0 } else { v + 1.0 })),
        )),
        Node::Literal(Literal::Str(s)) if s.is_empty() => Some(Node::string(STRING_SENTINEL)),
        Node::Literal(Literal::Str(_)) => Some(Node::string("")),
        Node::Literal(Literal::None) => None,
        Node::BinaryExpr { .. } => Some(Node::binary(BinOp::Add, value.clone(), Node::int(1))),
        _ => Some(Node::Literal(Literal::None)),
    }
}

impl MutationOperator for ReturnValuesMutator {
    fn name(&self) -> &'static str {
        "return_values"
    }

    fn description(&self) -> &'static str {
        "replace returned values (return true -> return false, return x -> return None)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Return]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        let Node::Return {
            value: Some(value),
            implicit,
        } = node
        else {
            return Ok(Vec::new());
        };
        Ok(replacement(value)
            .map(|new_value| Node::Return {
                value: Some(Box::new(new_value)),
                implicit: *implicit,
            })
            .into_iter()
            .collect())
    }
}
