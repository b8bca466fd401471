//! Prevalence profiling and bootstrap prevalence estimation.

pub mod bootstrap;
mod prevalence;

pub use bootstrap::{
    bootstrap_prevalence, bootstrap_prevalence_with_config, derive_seed, BootstrapConfig,
    PrevalenceEstimate,
};
pub use prevalence::{profile_prevalence, PrevalenceProfile};
