//! Planner configurations and strategy tags.

use ndarray::{Array1, ArrayView1};

use crate::math::softmax;
use crate::params::{
    ACTION_PRECISION, EXPLORATION_CONSTANT, PLANNING_STEPS, PREFERENCE_PRECISION,
    PROPAGATION_DISCOUNT,
};

/// How the generic planner picks the next node to expand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeSelection {
    /// Lowest-cost frontier node
    Min,
    /// Frontier node sampled with weight proportional to `−cost`
    Sampling,
    /// Frontier node sampled from `softmax(−cost)`
    #[default]
    SoftmaxSampling,
    /// Descend from the root along the highest UCT score
    Uct,
}

/// How a newly expanded state is scored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Evaluation {
    /// `KL[Q(s) ‖ C(s)] + KL[Q(o) ‖ C(o)]`
    #[default]
    DoubleKl,
    /// Expected free energy, risk plus ambiguity
    Efe,
}

/// How a score travels through the tree after evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Propagation {
    /// Only visit counts change
    NoOp,
    /// Each ancestor adds the cost of the child it was reached from
    #[default]
    Upward,
    /// The node adds its parent's cost before visits are counted
    Downward,
    /// Each ancestor adds the discounted minimum cost of its children
    MinUpward,
}

/// How the final action is chosen among the root's children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionSelection {
    /// Most visited child, ties broken by lowest cost
    #[default]
    MaxVisitsMinCost,
    /// Lowest `cost / visits`
    MinAverageCost,
    /// Sample from `softmax(visits)`
    SoftmaxVisits,
}

/// Configuration of the generic tree-search planner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlgoTreeConfig {
    /// Number of actions available to the agent
    pub n_actions: usize,
    /// Preferred distribution over hidden states
    pub state_pref: Array1<f64>,
    /// Preferred distribution over observations
    pub obs_pref: Array1<f64>,
    /// Deepest level that may be expanded, `None` for unbounded
    pub max_tree_depth: Option<usize>,
    pub node_selection: NodeSelection,
    pub evaluation: Evaluation,
    pub propagation: Propagation,
    pub action_selection: ActionSelection,
    /// Exploration weight of UCT node selection
    pub exploration_constant: f64,
    /// Discount applied by [`Propagation::MinUpward`]
    pub discount: f64,
    /// Seed of the planner's generator, `None` to seed from the OS
    pub seed: Option<u64>,
}

impl AlgoTreeConfig {
    /// Default strategies: softmax sampling, double KL, upward propagation.
    #[must_use]
    pub fn new(n_actions: usize, state_pref: Array1<f64>, obs_pref: Array1<f64>) -> Self {
        Self {
            n_actions,
            state_pref,
            obs_pref,
            max_tree_depth: None,
            node_selection: NodeSelection::default(),
            evaluation: Evaluation::default(),
            propagation: Propagation::default(),
            action_selection: ActionSelection::default(),
            exploration_constant: EXPLORATION_CONSTANT,
            discount: PROPAGATION_DISCOUNT,
            seed: None,
        }
    }

    #[must_use]
    pub const fn with_max_tree_depth(mut self, depth: usize) -> Self {
        self.max_tree_depth = Some(depth);
        self
    }

    #[must_use]
    pub const fn with_node_selection(mut self, strategy: NodeSelection) -> Self {
        self.node_selection = strategy;
        self
    }

    #[must_use]
    pub const fn with_evaluation(mut self, strategy: Evaluation) -> Self {
        self.evaluation = strategy;
        self
    }

    #[must_use]
    pub const fn with_propagation(mut self, strategy: Propagation) -> Self {
        self.propagation = strategy;
        self
    }

    #[must_use]
    pub const fn with_action_selection(mut self, strategy: ActionSelection) -> Self {
        self.action_selection = strategy;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Configuration of the UCT planner.
///
/// Preferences are stored sharpened: `softmax(pref · pref_precision)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MctsConfig {
    obs_pref: Array1<f64>,
    state_pref: Array1<f64>,
    /// Number of select/expand/evaluate/propagate iterations per decision
    pub planning_steps: usize,
    /// Exploration constant of the UCT score
    pub exp_const: f64,
    /// Precision applied to the raw preferences
    pub pref_precision: f64,
    /// Precision of the softmax used to draw the final action
    pub action_precision: f64,
    /// Seed of the planner's generator, `None` to seed from the OS
    pub seed: Option<u64>,
}

impl MctsConfig {
    #[must_use]
    pub fn new(
        obs_pref: ArrayView1<'_, f64>,
        state_pref: ArrayView1<'_, f64>,
        planning_steps: usize,
        exp_const: f64,
        pref_precision: f64,
        action_precision: f64,
    ) -> Self {
        Self {
            obs_pref: softmax((&obs_pref * pref_precision).view()),
            state_pref: softmax((&state_pref * pref_precision).view()),
            planning_steps,
            exp_const,
            pref_precision,
            action_precision,
            seed: None,
        }
    }

    /// Default hyper-parameters for the given raw preferences.
    #[must_use]
    pub fn with_preferences(
        obs_pref: ArrayView1<'_, f64>,
        state_pref: ArrayView1<'_, f64>,
    ) -> Self {
        Self::new(
            obs_pref,
            state_pref,
            PLANNING_STEPS,
            EXPLORATION_CONSTANT,
            PREFERENCE_PRECISION,
            ACTION_PRECISION,
        )
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn with_planning_steps(mut self, steps: usize) -> Self {
        self.planning_steps = steps;
        self
    }

    /// Sharpened preferences over observations.
    #[must_use]
    pub const fn obs_preferences(&self) -> &Array1<f64> {
        &self.obs_pref
    }

    /// Sharpened preferences over hidden states.
    #[must_use]
    pub const fn state_preferences(&self) -> &Array1<f64> {
        &self.state_pref
    }

    /// Replaces the state preferences as given (no sharpening).
    pub fn set_state_preferences(&mut self, state_pref: Array1<f64>) {
        self.state_pref = state_pref;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mcts_config_sharpens_preferences() {
        let (obs, states) = (array![1.0, 0.0], array![0.0, 0.0]);
        let conf = MctsConfig::new(obs.view(), states.view(), 10, 2.0, 3.0, 1.0);
        let expected = 3.0_f64.exp() / (3.0_f64.exp() + 1.0);
        assert!((conf.obs_preferences()[0] - expected).abs() < 1e-12);
        assert_eq!(conf.state_preferences(), &array![0.5, 0.5]);
    }

    #[test]
    fn test_algo_tree_defaults() {
        let conf = AlgoTreeConfig::new(3, array![0.5, 0.5], array![0.5, 0.5]);
        assert_eq!(conf.node_selection, NodeSelection::SoftmaxSampling);
        assert_eq!(conf.evaluation, Evaluation::DoubleKl);
        assert_eq!(conf.propagation, Propagation::Upward);
        assert_eq!(conf.action_selection, ActionSelection::MaxVisitsMinCost);
        assert_eq!(conf.max_tree_depth, None);
    }
}
