use crate::error::CandidateError;
use crate::tree::{Literal, Node, NodeKind};

use super::returns::STRING_SENTINEL;
use super::MutationOperator;

/// Perturbs integer constants: `n -> n + 1` and `n -> 0`
pub struct ReplaceIntegerMutator;

/// Replaces string constants with a fixed sentinel
pub struct ReplaceStringMutator;

impl MutationOperator for ReplaceIntegerMutator {
    fn name(&self) -> &'static str {
        "replace_integer"
    }

    fn description(&self) -> &'static str {
        "replace integer constants (5 -> 6, 5 -> 0)"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Literal]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        let Node::Literal(Literal::Int(value)) = node else {
            return Ok(Vec::new());
        };
        let bumped = value
            .checked_add(1)
            .ok_or_else(|| CandidateError(format!("integer {} cannot be incremented", value)))?;
        let mut out = vec![Node::int(bumped)];
        if *value != 0 {
            out.push(Node::int(0));
        }
        Ok(out)
    }

    fn experimental(&self) -> bool {
        true
    }
}

impl MutationOperator for ReplaceStringMutator {
    fn name(&self) -> &'static str {
        "replace_string"
    }

    fn description(&self) -> &'static str {
        "replace string constants (\"abc\" -> \"mutated\")"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Literal]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(match node {
            Node::Literal(Literal::Str(s)) if s == STRING_SENTINEL => vec![Node::string("")],
            Node::Literal(Literal::Str(_)) => vec![Node::string(STRING_SENTINEL)],
            _ => Vec::new(),
        })
    }

    fn experimental(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integer_replacements() {
        assert_eq!(
            ReplaceIntegerMutator.candidates(&Node::int(5)).unwrap(),
            vec![Node::int(6), Node::int(0)]
        );
        assert_eq!(
            ReplaceIntegerMutator.candidates(&Node::int(0)).unwrap(),
            vec![Node::int(1)]
        );
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let err = ReplaceIntegerMutator
            .candidates(&Node::int(u128::MAX))
            .unwrap_err();
        assert!(err.0.contains("cannot be incremented"));
    }

    #[test]
    fn test_string_replacements() {
        assert_eq!(
            ReplaceStringMutator.candidates(&Node::string("abc")).unwrap(),
            vec![Node::string("mutated")]
        );
        assert_eq!(
            ReplaceStringMutator.candidates(&Node::string("mutated")).unwrap(),
            vec![Node::string("")]
        );
        assert!(ReplaceStringMutator.candidates(&Node::int(1)).unwrap().is_empty());
    }
}
