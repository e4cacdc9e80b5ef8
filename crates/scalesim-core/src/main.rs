//! ScaleSim CLI: compare autoscaling policies on a demand profile.

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use scalesim_core::config::SimConfig;
use scalesim_core::demand::{self, DemandProfile};
use scalesim_core::{logging, metrics};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "scalesim",
    about = "Compare reactive and predictive autoscaling on a demand profile",
    version
)]
struct Cli {
    /// Log level: trace, debug, info, warn or error (RUST_LOG overrides).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation with a single scaling policy.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Demand profile file (overrides demand.path).
        #[arg(short, long)]
        profile: Option<PathBuf>,
        /// Scaling policy name (overrides autoscaler.policy).
        #[arg(long)]
        policy: Option<String>,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare scaling policies on the same profile and seed.
    Compare {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Demand profile file (overrides demand.path).
        #[arg(short, long)]
        profile: Option<PathBuf>,
        /// Comma-separated list of scaling policy names.
        #[arg(short = 'P', long, value_delimiter = ',')]
        policies: Vec<String>,
        /// Output results to JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a synthetic day-shaped demand profile.
    GenProfile {
        /// Number of buckets.
        #[arg(long, default_value = "1440")]
        buckets: usize,
        /// Mean requests per bucket.
        #[arg(long, default_value = "20")]
        base: f64,
        /// Peak-to-mean swing in requests per bucket.
        #[arg(long, default_value = "15")]
        amplitude: f64,
        /// Relative noise std-dev.
        #[arg(long, default_value = "0.1")]
        noise: f64,
        /// Random seed.
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List available scaling and routing policies.
    ListPolicies,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            profile,
            policy,
            output,
        } => {
            let mut sim_config = load_config(&config, profile.as_deref());
            if let Some(policy) = policy {
                sim_config.autoscaler.policy = policy;
            }
            let demand = load_demand(&sim_config);

            let result = scalesim_core::run_with_config(&sim_config, &demand).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });
            println!("{}", metrics::format_table(&result));

            if let Some(output_path) = output {
                write_json(&result, &output_path);
            }
        }
        Commands::Compare {
            config,
            profile,
            policies,
            output,
        } => {
            let sim_config = load_config(&config, profile.as_deref());
            let demand = load_demand(&sim_config);
            let names: Vec<&str> = if policies.is_empty() {
                scalesim_policies::available_scaling_policies()
            } else {
                policies.iter().map(|s| s.as_str()).collect()
            };

            for name in &names {
                if let Err(e) = sim_config.build_scaling_policy_named(name) {
                    eprintln!("Skipping {}: {}", name, e);
                }
            }
            let results = scalesim_core::compare_policies(&sim_config, &demand, &names);
            println!("{}", metrics::format_comparison_table(&results));

            for result in &results {
                println!("{}", metrics::format_table(result));
            }

            if let Some(output_path) = output {
                write_json(&results, &output_path);
            }
        }
        Commands::GenProfile {
            buckets,
            base,
            amplitude,
            noise,
            seed,
            output,
        } => {
            if buckets == 0 {
                eprintln!("Error: --buckets must be > 0");
                std::process::exit(1);
            }
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let samples = demand::generate_diurnal(buckets, base, amplitude, noise, &mut rng);
            demand::write_profile(&samples, &output).unwrap_or_else(|e| {
                eprintln!("Error writing profile: {}", e);
                std::process::exit(1);
            });
            println!(
                "Generated {} buckets ({} requests) to {}",
                samples.len(),
                samples.iter().sum::<f64>(),
                output.display()
            );
        }
        Commands::ListPolicies => {
            println!("Available scaling policies:");
            for name in scalesim_policies::available_scaling_policies() {
                println!("  - {}", name);
            }
            println!("Available routing policies:");
            for name in scalesim_policies::available_routers() {
                println!("  - {}", name);
            }
        }
    }
}

fn load_config(path: &Path, profile: Option<&Path>) -> SimConfig {
    let mut config = SimConfig::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });
    if let Some(profile) = profile {
        config.demand.path = Some(profile.display().to_string());
    }
    config
}

fn load_demand(config: &SimConfig) -> DemandProfile {
    config.load_profile().unwrap_or_else(|e| {
        eprintln!("Error loading demand profile: {}", e);
        std::process::exit(1);
    })
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing results: {}", e);
        std::process::exit(1);
    });
    std::fs::write(path, json).unwrap_or_else(|e| {
        eprintln!("Error writing output: {}", e);
        std::process::exit(1);
    });
    println!("Results written to {}", path.display());
}
