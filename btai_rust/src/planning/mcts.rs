//! Monte Carlo Tree Search over hypothetical futures of the factor graph.
//!
//! Every iteration descends the tree along the highest UCT score, expands
//! all actions of the reached node at once, runs VMP on the new nodes,
//! scores them, and adds the best score to every ancestor. The action is
//! finally drawn from a softmax over the average cost of the root's children.

use ndarray::{Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::config::{Evaluation, MctsConfig};
use super::evaluation::uct;
use crate::error::{BtaiError, Result};
use crate::graph::{FactorGraph, VarId};
use crate::inference::{ambiguity_uct, inference, risk, VmpConfig};
use crate::math::{kl_categorical, sample_index, softmax};

/// Statistics of one root action after planning.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionDetail {
    /// The action evaluated
    pub action: usize,
    /// Number of backups through the action's branch
    pub visits: usize,
    /// Accumulated cost of the branch
    pub cost: f64,
    /// `cost / visits`
    pub average_cost: f64,
}

/// UCT planner operating directly on a [`FactorGraph`].
#[derive(Clone, Debug)]
pub struct MCTSPlanner {
    config: MctsConfig,
    rng: StdRng,
    /// Action drawn by the last call to `select_action`
    best_action: Option<usize>,
    /// Details from the last planning cycle
    last_details: Vec<ActionDetail>,
}

impl MCTSPlanner {
    /// Creates a planner; the generator is seeded from `config.seed`.
    #[must_use]
    pub fn new(config: MctsConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            rng,
            best_action: None,
            last_details: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Returns the action drawn by the last planning cycle.
    #[must_use]
    pub const fn best_action(&self) -> Option<usize> {
        self.best_action
    }

    /// Returns details of the last planning cycle.
    #[must_use]
    pub fn last_plan_details(&self) -> &[ActionDetail] {
        &self.last_details
    }

    /// Descends from `root` along the highest UCT score while the current
    /// node has all `n_actions` branches.
    pub fn select_node(&self, graph: &FactorGraph, root: VarId, n_actions: usize) -> Result<VarId> {
        let mut current = root;
        loop {
            let children = action_children(graph, current)?;
            if children.len() != n_actions || children.is_empty() {
                return Ok(current);
            }
            let parent_visits = graph.var(current)?.stats.visits;
            let mut best: Option<(f64, VarId)> = None;
            for child in children {
                let stats = &graph.var(child)?.stats;
                let score = uct(stats.cost, stats.visits, parent_visits, self.config.exp_const);
                if best.is_none_or(|(s, _)| score > s) {
                    best = Some((score, child));
                }
            }
            match best {
                Some((_, child)) => current = child,
                None => return Ok(current),
            }
        }
    }

    /// Expands every action of `node`.
    ///
    /// Returns `[s0, o0, s1, o1, …]`, the state and observation created for
    /// each action in order. New states start with zero cost and one visit.
    pub fn expansion(
        &self,
        graph: &mut FactorGraph,
        node: VarId,
        a: &Array2<f64>,
        b: &Array3<f64>,
    ) -> Result<Vec<VarId>> {
        let n_actions = b.len_of(Axis(2));
        let mut expanded = Vec::with_capacity(2 * n_actions);
        for action in 0..n_actions {
            let s = graph.transition(node, b.index_axis(Axis(2), action).to_owned())?;
            let stats = &mut graph.var_mut(s)?.stats;
            stats.action = Some(action);
            stats.cost = 0.0;
            stats.visits = 1;
            let o = graph.transition(s, a.clone())?;
            expanded.push(s);
            expanded.push(o);
        }
        Ok(expanded)
    }

    /// Scores each `(state, observation)` pair and stores the score as the
    /// state's cost.
    pub fn evaluation(
        &self,
        graph: &mut FactorGraph,
        nodes: &[VarId],
        a: &Array2<f64>,
        strategy: Evaluation,
    ) -> Result<()> {
        if nodes.len() % 2 != 0 {
            return Err(BtaiError::InvalidParameters(format!(
                "expected state/observation pairs, got {} nodes",
                nodes.len()
            )));
        }
        for pair in nodes.chunks_exact(2) {
            let s = graph.var(pair[0])?.posterior.probabilities()?.to_owned();
            let o = graph.var(pair[1])?.posterior.probabilities()?.to_owned();
            let cost = match strategy {
                Evaluation::Efe => self.efe(&s, &o, a)?,
                Evaluation::DoubleKl => self.double_kl(&s, &o)?,
            };
            graph.var_mut(pair[0])?.stats.cost = cost;
        }
        Ok(())
    }

    /// `oᵀ(ln o − ln C) − diag(ln Aᵀ A)·s`
    fn efe(&self, s: &Array1<f64>, o: &Array1<f64>, a: &Array2<f64>) -> Result<f64> {
        let obs_risk = risk(o.view(), self.config.obs_preferences().view())?;
        Ok(obs_risk + ambiguity_uct(a.view(), s.view())?)
    }

    /// `KL[o ‖ C(o)] + KL[s ‖ C(s)]`
    fn double_kl(&self, s: &Array1<f64>, o: &Array1<f64>) -> Result<f64> {
        let obs = kl_categorical(o.view(), self.config.obs_preferences().view())?;
        let state = kl_categorical(s.view(), self.config.state_preferences().view())?;
        Ok(obs + state)
    }

    /// Adds the cost of the best expanded state to each of its ancestors and
    /// counts one visit on each.
    pub fn propagation(&self, graph: &mut FactorGraph, nodes: &[VarId]) -> Result<()> {
        let mut best: Option<(f64, VarId)> = None;
        for &n in nodes {
            let stats = &graph.var(n)?.stats;
            if stats.action.is_some() && best.is_none_or(|(c, _)| stats.cost < c) {
                best = Some((stats.cost, n));
            }
        }
        let (cost, node) = best.ok_or(BtaiError::NothingToEvaluate)?;

        let mut current = graph.parent_var(node)?;
        while let Some(ancestor) = current {
            let stats = &mut graph.var_mut(ancestor)?.stats;
            stats.cost += cost;
            stats.visits += 1;
            current = graph.parent_var(ancestor)?;
        }
        Ok(())
    }

    /// Draws an action from `softmax(−precision · cost / visits)` over the
    /// root's expanded children.
    pub fn select_action(&mut self, graph: &FactorGraph, root: VarId) -> Result<usize> {
        self.last_details.clear();
        for child in action_children(graph, root)? {
            let stats = &graph.var(child)?.stats;
            if let Some(action) = stats.action {
                self.last_details.push(ActionDetail {
                    action,
                    visits: stats.visits,
                    cost: stats.cost,
                    average_cost: stats.cost / stats.visits.max(1) as f64,
                });
            }
        }
        if self.last_details.is_empty() {
            return Err(BtaiError::EmptyTree);
        }

        let logits: Array1<f64> = self
            .last_details
            .iter()
            .map(|d| -self.config.action_precision * d.average_cost)
            .collect();
        let weights = softmax(logits.view());
        let index = sample_index(&weights.to_vec(), &mut self.rng)?;
        let action = self.last_details[index].action;
        self.best_action = Some(action);
        Ok(action)
    }

    /// Runs `planning_steps` iterations from the graph's tree root and draws
    /// the action to perform.
    pub fn plan(
        &mut self,
        graph: &mut FactorGraph,
        a: &Array2<f64>,
        b: &Array3<f64>,
        strategy: Evaluation,
        vmp: &VmpConfig,
    ) -> Result<usize> {
        let root = graph.tree_root().ok_or(BtaiError::MissingTreeRoot)?;
        let n_actions = b.len_of(Axis(2));
        for step in 0..self.config.planning_steps {
            let node = self.select_node(graph, root, n_actions)?;
            let expanded = self.expansion(graph, node, a, b)?;
            inference(graph, &expanded, vmp)?;
            self.evaluation(graph, &expanded, a, strategy)?;
            self.propagation(graph, &expanded)?;
            debug!(step, node = %node, "planning iteration");
        }
        self.select_action(graph, root)
    }
}

/// Hidden children of `node` that were created by an expansion.
fn action_children(graph: &FactorGraph, node: VarId) -> Result<Vec<VarId>> {
    let mut children = Vec::new();
    for child in graph.child_vars(node)? {
        let var = graph.var(child)?;
        if var.is_hidden() && var.stats.action.is_some() {
            children.push(child);
        }
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn planner() -> MCTSPlanner {
        let flat = array![0.0, 0.0];
        let conf = MctsConfig::new(flat.view(), flat.view(), 10, 2.0, 1.0, 1.0).with_seed(3);
        MCTSPlanner::new(conf)
    }

    fn root_graph() -> (FactorGraph, VarId) {
        let mut g = FactorGraph::new();
        let root = g.categorical(array![0.5, 0.5]).unwrap();
        g.set_tree_root(root).unwrap();
        (g, root)
    }

    #[test]
    fn test_expansion_creates_all_actions() {
        let (mut g, root) = root_graph();
        let a = Array2::from_elem((2, 2), 0.5);
        let b = Array3::from_elem((2, 2, 3), 0.5);
        let nodes = planner().expansion(&mut g, root, &a, &b).unwrap();

        assert_eq!(nodes.len(), 6);
        for (k, pair) in nodes.chunks(2).enumerate() {
            let s = g.var(pair[0]).unwrap();
            assert_eq!(s.stats.action, Some(k));
            assert_eq!(s.stats.visits, 1);
            assert_eq!(s.stats.cost, 0.0);
            assert_eq!(g.parent_var(pair[1]).unwrap(), Some(pair[0]));
        }
    }

    #[test]
    fn test_select_node_stops_at_incomplete_node() {
        let (mut g, root) = root_graph();
        let p = planner();
        assert_eq!(p.select_node(&g, root, 2).unwrap(), root);

        let a = Array2::from_elem((2, 2), 0.5);
        let b = Array3::from_elem((2, 2, 2), 0.5);
        let nodes = p.expansion(&mut g, root, &a, &b).unwrap();
        // Lower cost wins when visits are equal
        g.var_mut(nodes[0]).unwrap().stats.cost = 5.0;
        g.var_mut(nodes[2]).unwrap().stats.cost = 1.0;
        assert_eq!(p.select_node(&g, root, 2).unwrap(), nodes[2]);
    }

    #[test]
    fn test_evaluation_rejects_odd_node_lists() {
        let (mut g, root) = root_graph();
        let a = Array2::from_elem((2, 2), 0.5);
        let err = planner().evaluation(&mut g, &[root], &a, Evaluation::Efe).unwrap_err();
        assert!(matches!(err, BtaiError::InvalidParameters(_)));
    }

    #[test]
    fn test_select_action_records_details() {
        let (mut g, root) = root_graph();
        let a = Array2::from_elem((2, 2), 0.5);
        let b = Array3::from_elem((2, 2, 2), 0.5);
        let mut p = planner();
        let nodes = p.expansion(&mut g, root, &a, &b).unwrap();
        g.var_mut(nodes[0]).unwrap().stats.cost = 4.0;
        g.var_mut(nodes[0]).unwrap().stats.visits = 2;

        let action = p.select_action(&g, root).unwrap();
        assert!(action < 2);
        assert_eq!(p.best_action(), Some(action));
        let details = p.last_plan_details();
        assert_eq!(details.len(), 2);
        assert!((details[0].average_cost - 2.0).abs() < 1e-12);
    }
}
