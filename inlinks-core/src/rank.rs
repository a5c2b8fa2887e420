// PageRank over a finished link graph

use inlinks_scanner::LinkGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub const MIN_NODE_SIZE: f64 = 10.0;
pub const MAX_NODE_SIZE: f64 = 50.0;

pub type RankScores = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    pub damping: f64,
    /// Per-node tolerance; iteration stops when the L1 change drops below
    /// `node_count * tolerance`.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1.0e-6,
            max_iterations: 100,
        }
    }
}

pub fn compute_rank(graph: &LinkGraph) -> RankScores {
    compute_rank_with(graph, &RankConfig::default())
}

/// Iterative PageRank with uniform teleport.
///
/// Rank held by pages without outgoing links is spread evenly over every
/// page, so the scores always sum to 1. Links to URLs that never became
/// nodes do not count towards a page's out-degree.
pub fn compute_rank_with(graph: &LinkGraph, config: &RankConfig) -> RankScores {
    let nodes = graph.nodes();
    let n = nodes.len();

    match n {
        0 => return RankScores::new(),
        1 => return RankScores::from([(nodes[0].clone(), 1.0)]),
        _ => {}
    }

    let position: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, url)| (url.as_str(), i))
        .collect();
    let outgoing: Vec<Vec<usize>> = nodes
        .iter()
        .map(|url| {
            graph
                .fetched_successors(url)
                .iter()
                .filter_map(|target| position.get(target.as_str()).copied())
                .collect()
        })
        .collect();

    let size = n as f64;
    let damping = config.damping;
    let mut ranks = vec![1.0 / size; n];

    for iteration in 0..config.max_iterations {
        let dangling: f64 = outgoing
            .iter()
            .zip(&ranks)
            .filter(|(targets, _)| targets.is_empty())
            .map(|(_, rank)| rank)
            .sum();

        let base = (1.0 - damping) / size + damping * dangling / size;
        let mut next = vec![base; n];
        for (source, targets) in outgoing.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = damping * ranks[source] / targets.len() as f64;
            for &target in targets {
                next[target] += share;
            }
        }

        let change: f64 = next
            .iter()
            .zip(&ranks)
            .map(|(new, old)| (new - old).abs())
            .sum();
        ranks = next;

        if change < size * config.tolerance {
            debug!("PageRank converged after {} iterations", iteration + 1);
            break;
        }
    }

    nodes.into_iter().zip(ranks).collect()
}

/// Map each score linearly from `[min, max]` onto
/// `[MIN_NODE_SIZE, MAX_NODE_SIZE]`. Equal scores all get the midpoint.
pub fn node_sizes(scores: &RankScores) -> BTreeMap<String, f64> {
    let min = scores.values().copied().fold(f64::INFINITY, f64::min);
    let max = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    scores
        .iter()
        .map(|(url, score)| {
            let size = if spread.abs() <= f64::EPSILON {
                (MIN_NODE_SIZE + MAX_NODE_SIZE) / 2.0
            } else {
                MIN_NODE_SIZE + (MAX_NODE_SIZE - MIN_NODE_SIZE) * ((score - min) / spread)
            };
            (url.clone(), size)
        })
        .collect()
}
