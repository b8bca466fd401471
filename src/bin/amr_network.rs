//! amr-network - antimicrobial resistance association and network CLI
//!
//! Command-line interface for prevalence estimation, co-occurrence networks
//! and association rules over phenotype/gene presence tables.

use amr_network::benchmark::{generate_synthetic, SyntheticConfig};
use amr_network::data::{FeatureDomain, FeatureMatrix};
use amr_network::error::Result;
use amr_network::pipeline::{AnalysisConfig, Pipeline};
use amr_network::profile::profile_prevalence;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::path::{Path, PathBuf};

/// Output format for profiles.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
}

/// File format for the result bundle.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BundleFormat {
    Json,
    Yaml,
}

/// Resistance association and network analysis
#[derive(Parser)]
#[command(name = "amr-network")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis on phenotype and gene tables
    Run {
        /// Phenotype presence/absence TSV (strains × phenotypes)
        #[arg(short, long)]
        phenotypes: PathBuf,

        /// Gene presence/absence TSV (strains × genes)
        #[arg(short, long)]
        genes: Option<PathBuf>,

        /// Analysis configuration YAML (defaults used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output path for the result bundle
        #[arg(short, long)]
        output: PathBuf,

        /// Output format: json or yaml
        #[arg(short, long, value_enum, default_value = "json")]
        format: BundleFormat,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Run single-threaded
        #[arg(long)]
        sequential: bool,
    },

    /// Profile feature prevalence of a table
    Profile {
        /// Presence/absence TSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output format: text, json, or yaml
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Write a default configuration and a synthetic dataset
    Example {
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Random seed for the synthetic strains
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            phenotypes,
            genes,
            config,
            output,
            format,
            seed,
            sequential,
        } => cmd_run(
            &phenotypes,
            genes.as_deref(),
            config.as_deref(),
            &output,
            format,
            seed,
            sequential,
        ),
        Commands::Profile { input, format } => cmd_profile(&input, format),
        Commands::Example { output_dir, seed } => cmd_example(&output_dir, seed),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    phenotypes_path: &Path,
    genes_path: Option<&Path>,
    config_path: Option<&Path>,
    output_path: &Path,
    format: BundleFormat,
    seed: Option<u64>,
    sequential: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            AnalysisConfig::from_yaml_file(path)?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(seed) = seed {
        config.random_seed = seed;
    }
    if sequential {
        config.parallel = false;
    }

    info!("Loading phenotypes from {:?}", phenotypes_path);
    let phenotypes = FeatureMatrix::from_tsv(phenotypes_path, FeatureDomain::Phenotype)?;
    let matrix = match genes_path {
        Some(path) => {
            info!("Loading genes from {:?}", path);
            let genes = FeatureMatrix::from_tsv(path, FeatureDomain::Gene)?;
            FeatureMatrix::combine(&phenotypes, &genes)?
        }
        None => phenotypes,
    };

    let bundle = Pipeline::from_config(&config).run(&matrix)?;

    info!("Writing results to {:?}", output_path);
    match format {
        BundleFormat::Yaml => std::fs::write(output_path, bundle.to_yaml()?)?,
        BundleFormat::Json => bundle.write_json(output_path)?,
    }

    eprint!("{}", bundle);
    for branch in bundle.failed_branches() {
        eprintln!("  {} branch failed", branch);
    }
    Ok(())
}

fn cmd_profile(input: &Path, format: Format) -> Result<()> {
    let matrix = FeatureMatrix::from_tsv(input, FeatureDomain::Phenotype)?;
    let profile = profile_prevalence(&matrix);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
        Format::Yaml => print!("{}", serde_yaml::to_string(&profile)?),
        Format::Text => {
            println!("Input: {:?}", input);
            println!();
            print!("{}", profile);
        }
    }
    Ok(())
}

fn cmd_example(output_dir: &Path, seed: u64) -> Result<()> {
    let data = generate_synthetic(&SyntheticConfig::default().with_seed(seed))?;
    data.write_to_dir(output_dir)?;

    let config_path = output_dir.join("analysis.yaml");
    std::fs::write(&config_path, AnalysisConfig::default().to_yaml()?)?;

    eprintln!("Wrote example data to {:?}", output_dir);
    eprintln!(
        "  amr-network run -p {:?} -g {:?} -c {:?} -o results.json",
        output_dir.join("phenotypes.tsv"),
        output_dir.join("genes.tsv"),
        config_path
    );
    Ok(())
}
