use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use episodic_rl::config::{ConfigLayers, LayerKind};
use episodic_rl::experiment::{ExperimentRunner, ExperimentSummary};

#[derive(Parser, Debug)]
#[command(about = "Train or evaluate an episodic RL agent from layered YAML configs", version)]
struct Args {
    /// YAML config file; repeat to layer several files (later files win).
    #[arg(long = "config")]
    configs: Vec<PathBuf>,
    /// Master seed (config value, 41 by default, when omitted).
    #[arg(long)]
    seed: Option<u64>,
    /// Evaluate the configured checkpoint instead of training.
    #[arg(long)]
    eval_only: bool,
    /// Override the number of training episodes.
    #[arg(long)]
    episodes: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut layers = ConfigLayers::new();
    for path in &args.configs {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        layers = layers
            .with_yaml(LayerKind::Override, &text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
    }
    let mut config = layers.resolve().context("invalid configuration")?;

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(episodes) = args.episodes {
        config.training.episodes = episodes;
    }
    if args.eval_only {
        config.evaluation.eval_only = true;
    }

    let runner = ExperimentRunner::new(config).context("invalid configuration")?;
    let summary = runner.run().context("experiment failed")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ExperimentSummary) {
    println!();
    println!("agent: {}", summary.agent.name());
    if summary.start_episode > 0 {
        println!("resumed from episode {}", summary.start_episode);
    }
    if let Some(report) = &summary.training {
        println!(
            "trained {} episodes ({} env steps), avg reward {:.2}",
            report.episodes, report.env_steps, report.final_avg_reward
        );
        for (episode, eval) in &report.evaluations {
            println!(
                "  eval @ {:>6}: reward {:.2}, length {:.1}",
                episode, eval.reward_mean, eval.length_mean
            );
        }
        if let Some(last) = report.checkpoints.last() {
            println!("last checkpoint: {}", last.display());
        }
    }
    if let Some(eval) = &summary.evaluation {
        println!(
            "evaluated {} episodes: reward {:.2}, length {:.1}",
            eval.episodes, eval.reward_mean, eval.length_mean
        );
    }
}
