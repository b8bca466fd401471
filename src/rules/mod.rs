//! Association-rule mining.

pub mod apriori;

pub use apriori::{
    frequent_itemsets, mine_rules, mine_rules_default, AssociationRule, FrequentItemset,
    RuleConfig,
};
