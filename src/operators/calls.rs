use crate::error::CandidateError;
use crate::tree::{Node, NodeKind};

use super::MutationOperator;

/// Swaps call arguments
///
/// Two arguments are swapped once. With more, each argument trades places
/// with its right neighbour (wrapping around), one mutant per pair.
pub struct SwapArgumentsMutator;

/// Removes call statements whose value is discarded
///
/// `log(x);` becomes `{}`. Only statements ending in `;` qualify, so the
/// removed call never supplies a value.
pub struct RemoveCallMutator;

fn swapped_args(args: &[Node]) -> Vec<Vec<Node>> {
    let n = args.len();
    let pairs: Vec<(usize, usize)> = match n {
        0 | 1 => Vec::new(),
        2 => vec![(0, 1)],
        _ => (0..n).map(|i| (i, (i + 1) % n)).collect(),
    };
    pairs
        .into_iter()
        .filter(|&(i, j)| args[i] != args[j])
        .map(|(i, j)| {
            let mut out = args.to_vec();
            out.swap(i, j);
            out
        })
        .collect()
}

impl MutationOperator for SwapArgumentsMutator {
    fn name(&self) -> &'static str {
        "swap_arguments"
    }

    fn description(&self) -> &'static str {
        "swap call arguments (f(a, b) -> f(b, a))"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Call, NodeKind::MethodCall]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(match node {
            Node::Call { func, args } => swapped_args(args)
                .into_iter()
                .map(|args| Node::Call {
                    func: func.clone(),
                    args,
                })
                .collect(),
            Node::MethodCall {
                receiver,
                method,
                args,
            } => swapped_args(args)
                .into_iter()
                .map(|args| Node::MethodCall {
                    receiver: receiver.clone(),
                    method: method.clone(),
                    args,
                })
                .collect(),
            _ => Vec::new(),
        })
    }
}

impl MutationOperator for RemoveCallMutator {
    fn name(&self) -> &'static str {
        "remove_call"
    }

    fn description(&self) -> &'static str {
        "remove call statements (log(x); -> {})"
    }

    fn target_kinds(&self) -> &'static [NodeKind] {
        &[NodeKind::Expr]
    }

    fn candidates(&self, node: &Node) -> Result<Vec<Node>, CandidateError> {
        Ok(match node {
            Node::Expr { value, semi: true }
                if matches!(**value, Node::Call { .. } | Node::MethodCall { .. }) =>
            {
                vec![Node::Expr {
                    value: Box::new(Node::Block { body: Vec::new() }),
                    semi: false,
                }]
            }
            _ => Vec::new(),
        })
    }
}
