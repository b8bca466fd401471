//! Co-occurrence network construction and community detection.

pub mod community;
pub mod graph;

pub use community::{
    detect_communities, modularity, CommunityAssignment, CommunitySummary, NodeCommunity,
};
pub use graph::{build_network, Edge, EdgeSign, Network, Node};
