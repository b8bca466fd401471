//! Louvain community detection on the co-occurrence network.
//!
//! # Algorithm
//!
//! 1. Start with every node in its own community
//! 2. Visit nodes in id order and move each into the neighbouring community
//!    with the largest positive modularity gain; repeat until a full pass
//!    moves nothing
//! 3. Collapse each community into a meta-node (`Sᵀ A S`) and go back to 2
//! 4. Stop when a level produces no move
//!
//! A node only leaves its community for a strictly better gain, and equal
//! gains resolve to the lowest community id, so the partition is a pure
//! function of the network.

use super::graph::Network;
use crate::data::FeatureDomain;
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum modularity improvement for a move.
const GAIN_EPSILON: f64 = 1e-12;

/// Community membership of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCommunity {
    /// Feature name.
    pub node: String,
    /// Community id.
    pub community: usize,
}

/// Composition of one community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    /// Community id.
    pub id: usize,
    /// Member feature names in node order.
    pub members: Vec<String>,
    /// Number of phenotype members.
    pub n_phenotypes: usize,
    /// Number of gene members.
    pub n_genes: usize,
    /// Number of edges with both ends inside the community.
    pub n_internal_edges: usize,
}

/// Partition of the network nodes into communities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityAssignment {
    /// One entry per node, in node id order.
    pub assignments: Vec<NodeCommunity>,
    /// Number of communities.
    pub n_communities: usize,
    /// Modularity of the partition on the original network.
    pub modularity: f64,
    /// Number of aggregation levels that changed the partition.
    pub levels: usize,
}

impl CommunityAssignment {
    /// Community id of a feature.
    pub fn community_of(&self, node: &str) -> Option<usize> {
        self.assignments
            .iter()
            .find(|a| a.node == node)
            .map(|a| a.community)
    }

    /// Member names of a community.
    pub fn members(&self, community: usize) -> Vec<&str> {
        self.assignments
            .iter()
            .filter(|a| a.community == community)
            .map(|a| a.node.as_str())
            .collect()
    }

    /// Number of members per community id.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_communities];
        for a in &self.assignments {
            sizes[a.community] += 1;
        }
        sizes
    }

    /// Community id per node id.
    pub fn membership(&self) -> Vec<usize> {
        self.assignments.iter().map(|a| a.community).collect()
    }

    /// Per-community composition against the network the partition came from.
    pub fn summarize(&self, network: &Network) -> Vec<CommunitySummary> {
        let mut summaries: Vec<CommunitySummary> = (0..self.n_communities)
            .map(|id| CommunitySummary {
                id,
                members: Vec::new(),
                n_phenotypes: 0,
                n_genes: 0,
                n_internal_edges: 0,
            })
            .collect();

        for (node, a) in network.nodes.iter().zip(&self.assignments) {
            let summary = &mut summaries[a.community];
            summary.members.push(node.name.clone());
            match node.domain {
                FeatureDomain::Phenotype => summary.n_phenotypes += 1,
                FeatureDomain::Gene => summary.n_genes += 1,
            }
        }
        for e in &network.edges {
            let c = self.assignments[e.source].community;
            if c == self.assignments[e.target].community {
                summaries[c].n_internal_edges += 1;
            }
        }
        summaries
    }
}

/// Partition the network into modularity-maximising communities.
///
/// Isolated nodes end up as singleton communities. A network without edges
/// yields all singletons and a modularity of zero.
pub fn detect_communities(network: &Network) -> CommunityAssignment {
    let n = network.n_nodes();
    let adjacency = network.adjacency();

    // original node -> current meta-node
    let mut membership: Vec<usize> = (0..n).collect();
    let mut graph = adjacency.clone();
    let mut levels = 0;

    if adjacency.sum() > 0.0 {
        loop {
            let (partition, moved) = local_moving(&graph);
            if !moved {
                break;
            }
            levels += 1;
            let (partition, n_communities) = renumber(&partition);
            for m in membership.iter_mut() {
                *m = partition[*m];
            }
            graph = aggregate(&graph, &partition, n_communities);
            debug!("Louvain level {}: {} communities", levels, n_communities);
        }
    }

    let (membership, n_communities) = renumber(&membership);
    let modularity = modularity_of(&adjacency, &membership);

    CommunityAssignment {
        assignments: network
            .nodes
            .iter()
            .zip(&membership)
            .map(|(node, &community)| NodeCommunity {
                node: node.name.clone(),
                community,
            })
            .collect(),
        n_communities,
        modularity,
        levels,
    }
}

/// Modularity of a partition (community id per node id).
pub fn modularity(network: &Network, membership: &[usize]) -> f64 {
    modularity_of(&network.adjacency(), membership)
}

fn modularity_of(adjacency: &DMatrix<f64>, membership: &[usize]) -> f64 {
    let two_m = adjacency.sum();
    if two_m <= 0.0 {
        return 0.0;
    }
    let n_communities = membership.iter().max().map_or(0, |&c| c + 1);
    let mut internal = vec![0.0; n_communities];
    let mut total = vec![0.0; n_communities];
    for i in 0..adjacency.nrows() {
        for j in 0..adjacency.ncols() {
            let w = adjacency[(i, j)];
            total[membership[i]] += w;
            if membership[i] == membership[j] {
                internal[membership[i]] += w;
            }
        }
    }
    internal
        .iter()
        .zip(&total)
        .map(|(&inside, &tot)| inside / two_m - (tot / two_m).powi(2))
        .sum()
}

/// One local-moving phase. Returns the community of each node and whether any node moved.
fn local_moving(graph: &DMatrix<f64>) -> (Vec<usize>, bool) {
    let n = graph.nrows();
    let m = graph.sum() / 2.0;
    let strength: Vec<f64> = (0..n).map(|i| graph.row(i).sum()).collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut sigma_tot = strength.clone();
    let mut moved_any = false;

    loop {
        let mut moved = false;
        for i in 0..n {
            let current = community[i];

            // Weight from i into each neighbouring community, ordered by id
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for j in 0..n {
                let w = graph[(i, j)];
                if j != i && w > 0.0 {
                    *links.entry(community[j]).or_insert(0.0) += w;
                }
            }

            sigma_tot[current] -= strength[i];
            let gain = |c: usize, k_in: f64| {
                k_in / m - sigma_tot[c] * strength[i] / (2.0 * m * m)
            };

            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&c, &k_in) in &links {
                let g = gain(c, k_in);
                if g > best_gain + GAIN_EPSILON {
                    best = c;
                    best_gain = g;
                }
            }

            sigma_tot[best] += strength[i];
            if best != current {
                community[i] = best;
                moved = true;
                moved_any = true;
            }
        }
        if !moved {
            break;
        }
    }

    (community, moved_any)
}

/// Relabel communities 0.. in order of first appearance.
fn renumber(partition: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let relabelled = partition
        .iter()
        .map(|&c| {
            let next = mapping.len();
            *mapping.entry(c).or_insert(next)
        })
        .collect();
    (relabelled, mapping.len())
}

/// Collapse communities into meta-nodes: `Sᵀ A S`.
fn aggregate(graph: &DMatrix<f64>, partition: &[usize], n_communities: usize) -> DMatrix<f64> {
    let indicator = DMatrix::from_fn(graph.nrows(), n_communities, |i, c| {
        if partition[i] == c {
            1.0
        } else {
            0.0
        }
    });
    indicator.transpose() * graph * &indicator
}
