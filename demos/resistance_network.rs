//! End-to-end example on a synthetic strain collection.
//!
//! This example shows how to:
//! 1. Generate strains with planted phenotype/gene groups
//! 2. Profile feature prevalence
//! 3. Run the full analysis pipeline
//! 4. Examine the network, communities and rules

use amr_network::prelude::*;

fn main() -> Result<()> {
    println!("=== Resistance Network Example ===\n");

    let data = generate_synthetic(&SyntheticConfig::default())?;
    let matrix = &data.matrix;

    println!("Data dimensions:");
    println!("  Strains:  {}", matrix.n_strains());
    println!("  Features: {}", matrix.n_features());
    println!("  Planted groups: {}", data.linked_groups.len());
    println!();

    println!("=== Prevalence Profile ===\n");
    let profile = profile_prevalence(matrix);
    println!("{}", profile);

    println!("=== Running Pipeline ===\n");
    let bundle = Pipeline::new()
        .bootstrap_iterations(2000)
        .significance_alpha(0.05)
        .min_support(0.1)
        .min_confidence(0.7)
        .seed(42)
        .run(matrix)?;
    println!("{}", bundle);

    if let Some(estimates) = bundle.prevalence.value() {
        println!("=== Prevalence (95% CI) ===\n");
        println!("{:<12} {:>8} {:>8} {:>8}", "Feature", "Est.%", "Lower", "Upper");
        println!("{}", "-".repeat(40));
        for e in estimates.iter().take(10) {
            println!(
                "{:<12} {:>8.1} {:>8.1} {:>8.1}",
                e.feature, e.point_estimate, e.ci_lower, e.ci_upper
            );
        }
        println!();
    }

    if let Some(analysis) = bundle.network.value() {
        println!("=== Strongest Associations ===\n");
        let mut significant: Vec<&CorrectedAssociation> =
            analysis.associations.iter().filter(|a| a.significant).collect();
        significant.sort_by(|a, b| b.record.phi.abs().total_cmp(&a.record.phi.abs()));
        for a in significant.iter().take(10) {
            println!(
                "  {} - {}: phi = {:.3} ({}, q = {:.2e}, {})",
                a.record.feature_a,
                a.record.feature_b,
                a.record.phi,
                a.record.test_used.name(),
                a.adjusted_p,
                a.strength.name()
            );
        }

        println!("\n=== Communities ===\n");
        for summary in analysis.community_summaries.iter().filter(|s| s.members.len() > 1) {
            println!(
                "  Community {} ({} phenotypes, {} genes): {}",
                summary.id,
                summary.n_phenotypes,
                summary.n_genes,
                summary.members.join(", ")
            );
        }
        println!();
    }

    if let Some(rules) = bundle.rules.value() {
        println!("=== Top Rules ===\n");
        for rule in rules.iter().take(10) {
            println!("  {}", rule);
        }
    }

    println!("\n=== Configuration (YAML) ===\n");
    println!("{}", bundle.config.to_yaml()?);

    Ok(())
}
