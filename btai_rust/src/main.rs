#![warn(clippy::all, clippy::pedantic)]

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use btai_rust::agent::BtaiAgent;
use btai_rust::environment::{Corridor, Environment};
use btai_rust::params::{EXPLORATION_CONSTANT, PLANNING_STEPS};
use btai_rust::planning::{Evaluation, MctsConfig};

/// Runs a branching-time active inference agent in a corridor.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Number of cells in the corridor
    #[arg(long, default_value_t = 5)]
    length: usize,

    /// Maximum number of actions before giving up
    #[arg(long, default_value_t = 20)]
    steps: usize,

    /// Planning iterations per action
    #[arg(long, default_value_t = PLANNING_STEPS)]
    planning_steps: usize,

    /// Exploration constant of the UCT score
    #[arg(long, default_value_t = EXPLORATION_CONSTANT)]
    exp_const: f64,

    /// Seed of the planner, random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Score of hypothetical futures
    #[arg(long, value_enum, default_value_t = EvaluationArg::DoubleKl)]
    evaluation: EvaluationArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum EvaluationArg {
    /// Expected free energy
    Efe,
    /// KL divergence of states and observations from the preferences
    DoubleKl,
}

impl From<EvaluationArg> for Evaluation {
    fn from(arg: EvaluationArg) -> Self {
        match arg {
            EvaluationArg::Efe => Self::Efe,
            EvaluationArg::DoubleKl => Self::DoubleKl,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut env = Corridor::new(cli.length)?;
    let prefs = env.preferences();

    let mut config = MctsConfig::with_preferences(prefs.view(), prefs.view())
        .with_planning_steps(cli.planning_steps);
    config.exp_const = cli.exp_const;
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let first = env.reset();
    let mut agent = BtaiAgent::new(&env, config, first)?;
    for _ in 0..cli.steps {
        if env.solved() {
            break;
        }
        let outcome = agent.step(&mut env, cli.evaluation.into())?;
        info!(
            action = outcome.action,
            position = env.position(),
            free_energy = outcome.free_energy,
            "agent moved"
        );
    }

    if env.solved() {
        info!(steps = agent.steps(), "goal reached");
    } else {
        warn!(steps = agent.steps(), "goal not reached");
    }
    Ok(())
}
