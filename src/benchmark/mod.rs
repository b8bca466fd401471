//! Benchmarking utilities for evaluating the association engine.
//!
//! Synthetic strain collections with planted phenotype/gene groups give a
//! known ground truth for the network and rule branches.

mod generate;

pub use generate::{generate_synthetic, SyntheticConfig, SyntheticData};
