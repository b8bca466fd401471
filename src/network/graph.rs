//! Hybrid co-occurrence network built from significant associations.

use crate::correct::bh::{validate_alpha, CorrectedAssociation};
use crate::data::FeatureDomain;
use crate::error::Result;
use crate::test::TestKind;
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A feature node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Stable node id (position in the node list).
    pub id: usize,
    /// Feature name.
    pub name: String,
    /// Feature domain.
    pub domain: FeatureDomain,
}

/// Direction of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSign {
    /// Features co-occur more often than expected.
    Positive,
    /// Features co-occur less often than expected.
    Negative,
}

/// An undirected edge between two distinct nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Node id of the first feature.
    pub source: usize,
    /// Node id of the second feature.
    pub target: usize,
    /// |phi|.
    pub weight: f64,
    /// Signed phi coefficient.
    pub phi: f64,
    /// Direction of the association.
    pub sign: EdgeSign,
    /// BH-adjusted p-value of the association.
    pub adjusted_p: f64,
    /// Test that produced the p-value.
    pub test_used: TestKind,
}

impl Edge {
    /// The node on the other end of the edge.
    pub fn other(&self, node: usize) -> usize {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

/// Undirected weighted network of features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// Nodes in id order.
    pub nodes: Vec<Node>,
    /// Edges in the order their associations were supplied.
    pub edges: Vec<Edge>,
    /// Significance threshold used to admit edges.
    pub alpha: f64,
}

impl Network {
    /// Number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// Node id for a feature name.
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Number of edges incident to a node.
    pub fn degree(&self, node: usize) -> usize {
        self.edges
            .iter()
            .filter(|e| e.source == node || e.target == node)
            .count()
    }

    /// Sum of incident edge weights.
    pub fn strength(&self, node: usize) -> f64 {
        self.edges
            .iter()
            .filter(|e| e.source == node || e.target == node)
            .map(|e| e.weight)
            .sum()
    }

    /// Neighbouring node ids, ascending.
    pub fn neighbors(&self, node: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self
            .edges
            .iter()
            .filter(|e| e.source == node || e.target == node)
            .map(|e| e.other(node))
            .collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// Nodes without any edge.
    pub fn isolated_nodes(&self) -> Vec<usize> {
        let mut connected = vec![false; self.n_nodes()];
        for e in &self.edges {
            connected[e.source] = true;
            connected[e.target] = true;
        }
        (0..self.n_nodes()).filter(|&i| !connected[i]).collect()
    }

    /// Degree divided by `n - 1`, per node.
    pub fn degree_centrality(&self) -> Vec<f64> {
        let n = self.n_nodes();
        if n <= 1 {
            return vec![0.0; n];
        }
        let mut degrees = vec![0usize; n];
        for e in &self.edges {
            degrees[e.source] += 1;
            degrees[e.target] += 1;
        }
        degrees
            .into_iter()
            .map(|d| d as f64 / (n - 1) as f64)
            .collect()
    }

    /// Number of edges linking a phenotype to a gene.
    pub fn n_cross_domain_edges(&self) -> usize {
        self.edges
            .iter()
            .filter(|e| self.nodes[e.source].domain != self.nodes[e.target].domain)
            .count()
    }

    /// Edge density, `2E / (n (n - 1))`.
    pub fn density(&self) -> f64 {
        let n = self.n_nodes();
        if n <= 1 {
            return 0.0;
        }
        2.0 * self.n_edges() as f64 / (n * (n - 1)) as f64
    }

    /// Total edge weight.
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Symmetric weighted adjacency matrix (zero diagonal).
    pub fn adjacency(&self) -> DMatrix<f64> {
        let n = self.n_nodes();
        let mut adjacency = DMatrix::zeros(n, n);
        for e in &self.edges {
            adjacency[(e.source, e.target)] += e.weight;
            adjacency[(e.target, e.source)] += e.weight;
        }
        adjacency
    }
}

/// Build the co-occurrence network from corrected associations.
///
/// Every feature named in `associations` becomes a node, in order of first
/// appearance. A pair becomes an edge only if its adjusted p-value is below
/// `alpha`; features without significant associations stay as isolated nodes.
///
/// # Arguments
/// * `associations` - BH-corrected pairwise associations
/// * `alpha` - Significance threshold on the adjusted p-value, in (0, 1)
pub fn build_network(associations: &[CorrectedAssociation], alpha: f64) -> Result<Network> {
    validate_alpha(alpha)?;

    let mut nodes: Vec<Node> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut node_id = |name: &str, domain: FeatureDomain, nodes: &mut Vec<Node>| -> usize {
        if let Some(&id) = index.get(name) {
            return id;
        }
        let id = nodes.len();
        nodes.push(Node {
            id,
            name: name.to_string(),
            domain,
        });
        index.insert(name.to_string(), id);
        id
    };

    let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();
    let mut edges = Vec::new();
    for assoc in associations {
        let r = &assoc.record;
        let a = node_id(&r.feature_a, r.domain_a, &mut nodes);
        let b = node_id(&r.feature_b, r.domain_b, &mut nodes);

        if a == b || assoc.adjusted_p.is_nan() || assoc.adjusted_p >= alpha {
            continue;
        }
        if !seen_pairs.insert((a.min(b), a.max(b))) {
            debug!("Duplicate association {} / {} ignored", r.feature_a, r.feature_b);
            continue;
        }

        edges.push(Edge {
            source: a,
            target: b,
            weight: r.phi.abs(),
            phi: r.phi,
            sign: if r.phi < 0.0 {
                EdgeSign::Negative
            } else {
                EdgeSign::Positive
            },
            adjusted_p: assoc.adjusted_p,
            test_used: r.test_used,
        });
    }

    debug!(
        "Network: {} nodes, {} edges at alpha = {}",
        nodes.len(),
        edges.len(),
        alpha
    );

    Ok(Network {
        nodes,
        edges,
        alpha,
    })
}
