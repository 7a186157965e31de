//! Higher-order mutation strategies
//!
//! A strategy decides which first-order rewrites are combined into one
//! higher-order mutant. Strategies only pick indices; the engine does the
//! splicing. Rewrites in one group never overlap.

use crate::error::{MutationError, Result};
use crate::mutator::Rewrite;

/// Groups first-order rewrites into higher-order mutants
pub trait HomStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Partition `rewrites` (by index) into groups of at most `order`
    ///
    /// Every index appears in exactly one group.
    fn group(&self, rewrites: &[Rewrite], order: usize, rng: &mut fastrand::Rng) -> Vec<Vec<usize>>;
}

/// Pairs the first remaining rewrite with the last one
pub struct FirstToLast;

/// Takes rewrites in generation order
pub struct EachChoice;

/// Only groups rewrites produced by different operators
pub struct BetweenOperators;

/// Takes rewrites in a seeded random order
pub struct RandomChoice;

/// Greedily fill groups from `candidates`, in order
///
/// A group is seeded with the first unused candidate and extended with later
/// candidates that do not overlap it and pass `compatible`.
fn fill_groups(
    rewrites: &[Rewrite],
    candidates: Vec<usize>,
    order: usize,
    compatible: impl Fn(&Rewrite, &Rewrite) -> bool,
) -> Vec<Vec<usize>> {
    let mut pool = candidates;
    let mut groups = Vec::new();

    while !pool.is_empty() {
        let mut group = vec![pool.remove(0)];
        let mut index = 0;
        while group.len() < order && index < pool.len() {
            let next = &rewrites[pool[index]];
            let fits = group.iter().all(|&taken| {
                let taken = &rewrites[taken];
                !taken.path.overlaps(&next.path) && compatible(taken, next)
            });
            if fits {
                group.push(pool.remove(index));
            } else {
                index += 1;
            }
        }
        groups.push(group);
    }

    groups
}

impl HomStrategy for FirstToLast {
    fn name(&self) -> &'static str {
        "first_to_last"
    }

    fn description(&self) -> &'static str {
        "combine the first remaining mutation with the last one"
    }

    fn group(&self, rewrites: &[Rewrite], order: usize, _rng: &mut fastrand::Rng) -> Vec<Vec<usize>> {
        let n = rewrites.len();
        let mut alternating = Vec::with_capacity(n);
        let (mut front, mut back) = (0, n);
        while front < back {
            alternating.push(front);
            front += 1;
            if front < back {
                back -= 1;
                alternating.push(back);
            }
        }
        fill_groups(rewrites, alternating, order, |_, _| true)
    }
}

impl HomStrategy for EachChoice {
    fn name(&self) -> &'static str {
        "each_choice"
    }

    fn description(&self) -> &'static str {
        "combine consecutive mutations in generation order"
    }

    fn group(&self, rewrites: &[Rewrite], order: usize, _rng: &mut fastrand::Rng) -> Vec<Vec<usize>> {
        fill_groups(rewrites, (0..rewrites.len()).collect(), order, |_, _| true)
    }
}

impl HomStrategy for BetweenOperators {
    fn name(&self) -> &'static str {
        "between_operators"
    }

    fn description(&self) -> &'static str {
        "combine mutations from different operators"
    }

    fn group(&self, rewrites: &[Rewrite], order: usize, _rng: &mut fastrand::Rng) -> Vec<Vec<usize>> {
        fill_groups(rewrites, (0..rewrites.len()).collect(), order, |a, b| {
            a.operator != b.operator
        })
    }
}

impl HomStrategy for RandomChoice {
    fn name(&self) -> &'static str {
        "random"
    }

    fn description(&self) -> &'static str {
        "combine mutations in random order"
    }

    fn group(&self, rewrites: &[Rewrite], order: usize, rng: &mut fastrand::Rng) -> Vec<Vec<usize>> {
        let mut shuffled: Vec<usize> = (0..rewrites.len()).collect();
        rng.shuffle(&mut shuffled);
        fill_groups(rewrites, shuffled, order, |_, _| true)
    }
}

/// All built-in strategies, default first
pub fn strategies() -> Vec<Box<dyn HomStrategy>> {
    vec![
        Box::new(FirstToLast),
        Box::new(EachChoice),
        Box::new(BetweenOperators),
        Box::new(RandomChoice),
    ]
}

/// Look a strategy up by name
pub fn strategy_by_name(name: &str) -> Result<Box<dyn HomStrategy>> {
    let mut all = strategies();
    match all.iter().position(|s| s.name() == name) {
        Some(index) => Ok(all.swap_remove(index)),
        None => Err(MutationError::UnknownStrategy {
            name: name.to_string(),
            available: all.iter().map(|s| s.name().to_string()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, NodePath};
    use pretty_assertions::assert_eq;

    fn rewrite(operator: &str, path: &[usize]) -> Rewrite {
        Rewrite {
            operator: operator.to_string(),
            path: NodePath::from_indices(path.to_vec()),
            original: Node::int(0),
            replacement: Node::int(1),
        }
    }

    fn disjoint(groups: &[Vec<usize>], rewrites: &[Rewrite]) -> bool {
        groups.iter().all(|group| {
            group.iter().enumerate().all(|(i, &a)| {
                group[i + 1..]
                    .iter()
                    .all(|&b| !rewrites[a].path.overlaps(&rewrites[b].path))
            })
        })
    }

    fn flat_sorted(groups: &[Vec<usize>]) -> Vec<usize> {
        let mut all: Vec<usize> = groups.iter().flatten().copied().collect();
        all.sort_unstable();
        all
    }

    #[test]
    fn test_first_to_last_pairs_ends() {
        let rewrites: Vec<_> = (0..4).map(|i| rewrite("arithmetic", &[i])).collect();
        let groups = FirstToLast.group(&rewrites, 2, &mut fastrand::Rng::with_seed(1));
        assert_eq!(groups, vec![vec![0, 3], vec![1, 2]]);
    }

    #[test]
    fn test_each_choice_skips_overlapping() {
        let rewrites = vec![
            rewrite("arithmetic", &[0]),
            rewrite("arithmetic", &[0, 1]),
            rewrite("boundary", &[1]),
        ];
        let groups = EachChoice.group(&rewrites, 2, &mut fastrand::Rng::with_seed(1));
        assert_eq!(groups, vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_between_operators_mixes_operators() {
        let rewrites = vec![
            rewrite("arithmetic", &[0]),
            rewrite("arithmetic", &[1]),
            rewrite("boundary", &[2]),
            rewrite("boundary", &[3]),
        ];
        let groups = BetweenOperators.group(&rewrites, 2, &mut fastrand::Rng::with_seed(1));
        assert_eq!(groups, vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_every_strategy_partitions_without_overlap() {
        let rewrites = vec![
            rewrite("arithmetic", &[0]),
            rewrite("arithmetic", &[0, 0]),
            rewrite("boundary", &[1]),
            rewrite("logical", &[2, 1]),
            rewrite("logical", &[2]),
            rewrite("boundary", &[3]),
        ];
        for strategy in strategies() {
            for order in 2..=4 {
                let groups = strategy.group(&rewrites, order, &mut fastrand::Rng::with_seed(7));
                assert_eq!(flat_sorted(&groups), (0..rewrites.len()).collect::<Vec<_>>());
                assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= order));
                assert!(disjoint(&groups, &rewrites), "{}", strategy.name());
            }
        }
    }

    #[test]
    fn test_random_is_seeded() {
        let rewrites: Vec<_> = (0..10).map(|i| rewrite("arithmetic", &[i])).collect();
        let a = RandomChoice.group(&rewrites, 3, &mut fastrand::Rng::with_seed(42));
        let b = RandomChoice.group(&rewrites, 3, &mut fastrand::Rng::with_seed(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_strategy() {
        assert!(strategy_by_name("each_choice").is_ok());
        let err = strategy_by_name("sideways").err().unwrap();
        assert!(matches!(err, MutationError::UnknownStrategy { name, .. } if name == "sideways"));
    }
}
