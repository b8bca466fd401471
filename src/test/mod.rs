//! Statistical hypothesis testing for feature co-occurrence.

pub mod contingency;

pub use contingency::{
    analyze_pair, analyze_pairs, feature_pairs, test_table, AssociationRecord, ContingencyTable,
    TestKind,
};
