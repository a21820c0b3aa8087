//! The perception-action cycle.
//!
//! Each [`BtaiAgent::step`] infers hidden states over the whole graph, plans
//! with UCT over hypothetical futures, performs the chosen action and
//! integrates the observation that comes back.
//!
//! ```
//! use btai_rust::agent::{BtaiAgent, Phase};
//! use btai_rust::environment::{Corridor, Environment};
//! use btai_rust::planning::{Evaluation, MctsConfig};
//!
//! let mut env = Corridor::new(3)?;
//! let prefs = env.preferences();
//! let config = MctsConfig::with_preferences(prefs.view(), prefs.view())
//!     .with_planning_steps(10)
//!     .with_seed(1);
//! let first = env.reset();
//! let mut agent = BtaiAgent::new(&env, config, first)?;
//!
//! let outcome = agent.step(&mut env, Evaluation::DoubleKl)?;
//! assert!(outcome.action < env.n_actions());
//! assert_eq!(agent.phase(), Phase::Integrated);
//! # Ok::<(), btai_rust::BtaiError>(())
//! ```

use ndarray::{Array1, Array2, Array3};
use tracing::{debug, info};

use crate::environment::Environment;
use crate::error::Result;
use crate::graph::{FactorGraph, VarId};
use crate::inference::{inference, VmpConfig};
use crate::planning::{Evaluation, MCTSPlanner, MctsConfig};

/// Where the agent stands in its perception-action cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Inferring hidden states and planning over hypothetical futures
    #[default]
    Predicting,
    /// The chosen action is being performed
    Acting,
    /// The environment's response has been received
    Observing,
    /// The graph has been advanced by one time step
    Integrated,
}

/// Result of one perception-action cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub action: usize,
    pub observation: Array1<f64>,
    /// Variational free energy after the inference that preceded planning
    pub free_energy: f64,
}

/// Branching-time active inference agent.
///
/// Holds the factor graph of its past and hypothetical futures, and a UCT
/// planner searching over the latter.
#[derive(Clone, Debug)]
pub struct BtaiAgent {
    graph: FactorGraph,
    planner: MCTSPlanner,
    vmp: VmpConfig,
    a: Array2<f64>,
    b: Array3<f64>,
    phase: Phase,
    steps: usize,
}

impl BtaiAgent {
    /// Builds `s0 ~ Cat(D)` and the observed `o0 ~ Cat(A·s0)`; `s0` becomes
    /// the tree root.
    pub fn new<E: Environment + ?Sized>(
        env: &E,
        config: MctsConfig,
        initial_obs: Array1<f64>,
    ) -> Result<Self> {
        let mut graph = FactorGraph::new();
        let s0 = graph.categorical(env.d().clone())?;
        let o0 = graph.transition(s0, env.a().clone())?;
        graph.set_observed(o0, initial_obs)?;
        graph.set_tree_root(s0)?;
        Ok(Self {
            graph,
            planner: MCTSPlanner::new(config),
            vmp: VmpConfig::default(),
            a: env.a().clone(),
            b: env.b().clone(),
            phase: Phase::Predicting,
            steps: 0,
        })
    }

    #[must_use]
    pub fn with_vmp(mut self, vmp: VmpConfig) -> Self {
        self.vmp = vmp;
        self
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    #[must_use]
    pub const fn planner(&self) -> &MCTSPlanner {
        &self.planner
    }

    /// Number of completed cycles.
    #[must_use]
    pub const fn steps(&self) -> usize {
        self.steps
    }

    /// Current belief state, the root of the lookahead tree.
    pub fn root(&self) -> Option<VarId> {
        self.graph.tree_root()
    }

    /// Runs one cycle: infer, plan, act, observe, integrate.
    ///
    /// On error the phase reached so far is kept.
    pub fn step<E: Environment + ?Sized>(
        &mut self,
        env: &mut E,
        evaluation: Evaluation,
    ) -> Result<StepOutcome> {
        self.phase = Phase::Predicting;
        let vars = self.graph.var_ids();
        let report = inference(&mut self.graph, &vars, &self.vmp)?;
        debug!(
            iterations = report.iterations,
            free_energy = report.free_energy,
            "beliefs updated"
        );
        let action = self
            .planner
            .plan(&mut self.graph, &self.a, &self.b, evaluation, &self.vmp)?;

        self.phase = Phase::Acting;
        let observation = env.execute(action)?;

        self.phase = Phase::Observing;
        self.graph
            .integrate(action, observation.clone(), &self.a, &self.b)?;

        self.phase = Phase::Integrated;
        self.steps += 1;
        info!(
            step = self.steps,
            action,
            free_energy = report.free_energy,
            solved = env.solved(),
            "step completed"
        );
        Ok(StepOutcome {
            action,
            observation,
            free_energy: report.free_energy,
        })
    }
}
