use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use rollplot::environment::Environment;
use rollplot::environments::Cstr;
use rollplot::policies::{ConstantPolicy, ProportionalPolicy, RandomPolicy};
use rollplot::policy::Policy;
use rollplot::{PlotConfig, RolloutConfig, RolloutDataset, collect_to_file, performance_plots};

#[derive(Debug, Parser)]
#[command(name = "rollplot", version)]
#[command(about = "Collect CSTR control rollouts and compare policies against an oracle")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the built-in policies and the oracle on the CSTR and save the rollouts
    Collect {
        /// Dataset file name (`.json` is appended when it has no extension)
        #[arg(long, default_value = "cstr_data")]
        output: String,

        /// Rollout settings TOML; the flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Repetitions per policy [default: 50]
        #[arg(long)]
        reps: Option<usize>,

        /// Oracle lookahead horizon, in control steps [default: 17]
        #[arg(long)]
        horizon: Option<usize>,

        /// Candidate actions per action dimension tried by the oracle [default: 15]
        #[arg(long)]
        grid: Option<usize>,

        /// Base seed; repetition k resets with seed + k [default: 0]
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Render the three-panel comparison figure from a saved dataset
    Plot {
        /// Dataset written by `collect`
        #[arg(long)]
        data: PathBuf,

        /// Policies to compare, comma-separated, in legend order (default: all)
        #[arg(long, value_delimiter = ',')]
        policies: Vec<String>,

        /// Output SVG path (overrides the config file)
        #[arg(long)]
        output: Option<String>,

        /// Plot style TOML
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn builtin_policies(env: &Cstr, seed: u64) -> Vec<(String, Box<dyn Policy>)> {
    let bounds = env.action_bounds();
    let (low, high) = bounds[0];
    vec![
        (
            "random".to_string(),
            Box::new(RandomPolicy::new(bounds.clone(), seed.wrapping_add(1000))),
        ),
        (
            // obs = [Ca, T, Ca_sp]
            "p-control".to_string(),
            Box::new(ProportionalPolicy::new(0, 2, -60.0, 300.0, (low, high))),
        ),
        ("constant".to_string(), Box::new(ConstantPolicy::new(vec![300.0]))),
    ]
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Collect {
            output,
            config,
            reps,
            horizon,
            grid,
            seed,
        } => {
            let mut config = match &config {
                Some(path) => RolloutConfig::from_toml_file(path)
                    .with_context(|| format!("loading rollout config {}", path.display()))?,
                None => RolloutConfig::default(),
            };
            config.repetitions = reps.unwrap_or(config.repetitions);
            config.oracle_horizon = horizon.unwrap_or(config.oracle_horizon);
            config.oracle_grid = grid.unwrap_or(config.oracle_grid);
            config.seed = seed.unwrap_or(config.seed);

            let env = Cstr::new();
            let mut policies = builtin_policies(&env, config.seed);
            let path = collect_to_file(&mut policies, &env, &output, &config)
                .with_context(|| format!("collecting rollouts into {output}"))?;
            println!("Saved rollouts to {}", path.display());
        }
        Command::Plot {
            data,
            policies,
            output,
            config,
        } => {
            let mut plot_config = match &config {
                Some(path) => PlotConfig::from_toml_file(path)
                    .with_context(|| format!("loading plot config {}", path.display()))?,
                None => PlotConfig::default(),
            };
            if let Some(output) = output {
                plot_config.output = output;
            }

            let dataset = RolloutDataset::load(&data)
                .with_context(|| format!("loading dataset {}", data.display()))?;
            let policies = if policies.is_empty() {
                dataset.policies.keys().cloned().collect()
            } else {
                policies
            };
            info!("plotting oracle + {:?}", policies);

            let summary = performance_plots(&dataset, &policies, &plot_config)
                .context("rendering comparison figure")?;
            for (policy, mad) in &summary.mad {
                println!("{policy}:");
                println!("  Median Absolute Deviation (MAD): {mad:.4}");
            }
            println!("Saved figure to {}", plot_config.output);
        }
    }
    Ok(())
}
