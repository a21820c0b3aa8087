//! Generic tree-search planner with pluggable strategies.
//!
//! One planning iteration:
//! 1. `node_selection` picks a frontier node (a node with unexplored actions)
//! 2. `expansion` adds one action branch: a state and its observation
//! 3. VMP runs on the two new variables
//! 4. `evaluation` scores the new state
//! 5. `propagation` carries the score and a visit toward the root
//!
//! After the last iteration `action_selection` picks an action among the
//! root's children.

use ndarray::{Array1, Array2, Array3, Axis, Ix2, Ix3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::config::{ActionSelection, AlgoTreeConfig, NodeSelection, Propagation};
use super::evaluation::{evaluate, uct};
use crate::distributions::{Categorical, Dirichlet};
use crate::error::{BtaiError, Result};
use crate::graph::{FactorGraph, VarId};
use crate::inference::{inference, VmpConfig};
use crate::math::{sample_index, softmax};

/// A state that still has unexplored actions, with its observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Frontier {
    state: VarId,
    observation: Option<VarId>,
}

/// Generic tree-search planner.
#[derive(Clone, Debug)]
pub struct AlgoTree {
    config: AlgoTreeConfig,
    frontier: Vec<Frontier>,
    tree_root: Option<VarId>,
    last_expansion: Option<(VarId, VarId)>,
    rng: StdRng,
}

impl AlgoTree {
    #[must_use]
    pub fn new(config: AlgoTreeConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            frontier: Vec::new(),
            tree_root: None,
            last_expansion: None,
            rng,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AlgoTreeConfig {
        &self.config
    }

    /// States awaiting expansion with their observations, oldest first.
    #[must_use]
    pub fn frontier(&self) -> Vec<(VarId, Option<VarId>)> {
        self.frontier
            .iter()
            .map(|f| (f.state, f.observation))
            .collect()
    }

    /// Picks the next node to expand.
    ///
    /// The root is returned until all of its actions have been expanded; the
    /// configured strategy is used afterwards.
    pub fn node_selection(&mut self, graph: &FactorGraph) -> Result<VarId> {
        let root = graph.tree_root().ok_or(BtaiError::MissingTreeRoot)?;
        if self.tree_root != Some(root) {
            self.frontier.clear();
            self.tree_root = Some(root);
        }

        if self.frontier.is_empty() {
            let observation = graph.child_vars(root)?.first().copied();
            self.frontier.push(Frontier {
                state: root,
                observation,
            });
            return Ok(root);
        }
        if self.frontier[0].state == root {
            return Ok(root);
        }

        match self.config.node_selection {
            NodeSelection::Min => self.select_min(graph),
            NodeSelection::Sampling => self.select_sampling(graph),
            NodeSelection::SoftmaxSampling => self.select_softmax(graph),
            NodeSelection::Uct => self.select_uct(graph, root),
        }
    }

    fn frontier_costs(&self, graph: &FactorGraph) -> Result<Vec<f64>> {
        if self.frontier.is_empty() {
            return Err(BtaiError::EmptyTree);
        }
        self.frontier
            .iter()
            .map(|f| graph.var(f.state).map(|v| v.stats.cost))
            .collect()
    }

    fn select_min(&self, graph: &FactorGraph) -> Result<VarId> {
        let costs = self.frontier_costs(graph)?;
        costs
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.frontier[i].state)
            .ok_or(BtaiError::EmptyTree)
    }

    fn select_sampling(&mut self, graph: &FactorGraph) -> Result<VarId> {
        // Weights are −cost, shifted to be non-negative when costs are positive.
        let mut weights: Vec<f64> = self.frontier_costs(graph)?.iter().map(|g| -g).collect();
        let lowest = weights.iter().copied().fold(f64::INFINITY, f64::min);
        if lowest < 0.0 {
            weights.iter_mut().for_each(|w| *w -= lowest);
        }
        let i = sample_index(&weights, &mut self.rng)?;
        Ok(self.frontier[i].state)
    }

    fn select_softmax(&mut self, graph: &FactorGraph) -> Result<VarId> {
        let neg_costs: Array1<f64> = self.frontier_costs(graph)?.iter().map(|g| -g).collect();
        let weights = softmax(neg_costs.view());
        let i = sample_index(&weights.to_vec(), &mut self.rng)?;
        Ok(self.frontier[i].state)
    }

    fn select_uct(&self, graph: &FactorGraph, root: VarId) -> Result<VarId> {
        let mut current = root;
        loop {
            if self.frontier.iter().any(|f| f.state == current) {
                return Ok(current);
            }
            let parent_visits = graph.var(current)?.stats.visits;
            let mut best: Option<(f64, VarId)> = None;
            for child in self.action_children(graph, current)? {
                let node = graph.var(child)?;
                if node.stats.pruned {
                    continue;
                }
                let score = uct(
                    node.stats.cost,
                    node.stats.visits,
                    parent_visits,
                    self.config.exploration_constant,
                );
                if best.is_none_or(|(s, _)| score > s) {
                    best = Some((score, child));
                }
            }
            current = best.map(|(_, child)| child).ok_or(BtaiError::EmptyTree)?;
        }
    }

    /// Hidden children of `node` that were created by an expansion.
    fn action_children(&self, graph: &FactorGraph, node: VarId) -> Result<Vec<VarId>> {
        let mut children = Vec::new();
        for child in graph.child_vars(node)? {
            let var = graph.var(child)?;
            if var.is_hidden() && var.stats.action.is_some() {
                children.push(child);
            }
        }
        Ok(children)
    }

    /// Actions of `node` that have no branch yet.
    pub fn unexplored_actions(&self, graph: &FactorGraph, node: VarId) -> Result<Vec<usize>> {
        let mut explored = vec![false; self.config.n_actions];
        for child in graph.child_vars(node)? {
            if let Some(a) = graph.var(child)?.stats.action {
                if let Some(slot) = explored.get_mut(a) {
                    *slot = true;
                }
            }
        }
        let unexplored: Vec<usize> = (0..self.config.n_actions).filter(|&a| !explored[a]).collect();
        if unexplored.is_empty() {
            return Err(BtaiError::NoUnexploredAction(node));
        }
        Ok(unexplored)
    }

    /// Number of expansions between the tree root and `node`.
    pub fn distance_from_root(&self, graph: &FactorGraph, node: VarId) -> Result<usize> {
        let root = self
            .tree_root
            .or_else(|| graph.tree_root())
            .ok_or(BtaiError::MissingTreeRoot)?;
        let mut current = node;
        let mut distance = 0;
        while current != root {
            current = graph.parent_var(current)?.ok_or(BtaiError::NotInTree(node))?;
            distance += 1;
        }
        Ok(distance)
    }

    /// Expands one random unexplored action of `node`.
    ///
    /// `a` is the `[obs, state]` likelihood and `b` the `[to, from, action]`
    /// transition tensor. Returns the new state and observation.
    pub fn expansion(
        &mut self,
        graph: &mut FactorGraph,
        node: VarId,
        a: &Array2<f64>,
        b: &Array3<f64>,
    ) -> Result<(VarId, VarId)> {
        let depth = self.distance_from_root(graph, node)?;
        if let Some(max) = self.config.max_tree_depth {
            if depth >= max {
                return Err(BtaiError::MaxDepthReached { depth: max });
            }
        }
        let unexplored = self.unexplored_actions(graph, node)?;
        let action = unexplored[self.rng.random_range(0..unexplored.len())];
        if action >= b.shape()[2] {
            return Err(BtaiError::IndexOutOfRange {
                index: action,
                size: b.shape()[2],
            });
        }

        let s = graph.transition(node, b.index_axis(Axis(2), action).to_owned())?;
        let o = graph.transition(s, a.clone())?;
        {
            let state = graph.var_mut(s)?;
            state.stats.action = Some(action);
            state.biased = Some(Categorical::new(self.config.state_pref.clone()).into());
        }
        graph.var_mut(o)?.biased = Some(Categorical::new(self.config.obs_pref.clone()).into());
        self.last_expansion = Some((s, o));

        if unexplored.len() == 1 {
            self.frontier.retain(|f| f.state != node);
        }
        let within_depth = self.config.max_tree_depth.is_none_or(|max| depth + 1 < max);
        if within_depth {
            self.frontier.push(Frontier {
                state: s,
                observation: Some(o),
            });
        } else {
            graph.var_mut(s)?.stats.pruned = true;
            self.prune_exhausted(graph, node)?;
        }
        debug!(node = %node, action, state = %s, depth = depth + 1, "expanded");
        Ok((s, o))
    }

    /// Expansion with Dirichlet variables over the likelihood and the
    /// transitions; their expected parameters are used as fixed tensors.
    pub fn expansion_learned(
        &mut self,
        graph: &mut FactorGraph,
        node: VarId,
        a_var: VarId,
        b_var: VarId,
    ) -> Result<(VarId, VarId)> {
        let a = Dirichlet::expected_params(graph.var(a_var)?.posterior.params())?
            .into_dimensionality::<Ix2>()
            .map_err(|e| BtaiError::InvalidParameters(e.to_string()))?;
        let b = Dirichlet::expected_params(graph.var(b_var)?.posterior.params())?
            .into_dimensionality::<Ix3>()
            .map_err(|e| BtaiError::InvalidParameters(e.to_string()))?;
        self.expansion(graph, node, &a, &b)
    }

    /// Marks ancestors pruned while they are fully expanded and every one of
    /// their branches is pruned.
    fn prune_exhausted(&self, graph: &mut FactorGraph, node: VarId) -> Result<()> {
        let mut current = node;
        while Some(current) != self.tree_root {
            let children = self.action_children(graph, current)?;
            let fully_expanded = children.len() >= self.config.n_actions;
            let mut all_pruned = true;
            for &c in &children {
                all_pruned &= graph.var(c)?.stats.pruned;
            }
            if !(fully_expanded && all_pruned) {
                break;
            }
            graph.var_mut(current)?.stats.pruned = true;
            match graph.parent_var(current)? {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(())
    }

    /// State and observation created by the last expansion.
    #[must_use]
    pub fn last_expanded_nodes(&self) -> Vec<VarId> {
        self.last_expansion
            .map(|(s, o)| vec![s, o])
            .unwrap_or_default()
    }

    /// Scores the last expanded state and stores the score as its cost.
    pub fn evaluation(&self, graph: &mut FactorGraph) -> Result<f64> {
        let (s, o) = self.last_expansion.ok_or(BtaiError::NothingToEvaluate)?;
        let cost = evaluate(graph, s, o, self.config.evaluation)?;
        graph.var_mut(s)?.stats.cost = cost;
        Ok(cost)
    }

    /// Counts one visit on `node` and each ancestor up to `root`, moving
    /// costs as the configured strategy dictates.
    pub fn propagation(&self, graph: &mut FactorGraph, node: VarId, root: VarId) -> Result<()> {
        if self.config.propagation == Propagation::Downward && node != root {
            let parent = graph.parent_var(node)?.ok_or(BtaiError::NotInTree(node))?;
            let parent_cost = graph.var(parent)?.stats.cost;
            graph.var_mut(node)?.stats.cost += parent_cost;
        }

        let mut current = node;
        while current != root {
            graph.var_mut(current)?.stats.visits += 1;
            let parent = graph.parent_var(current)?.ok_or(BtaiError::NotInTree(node))?;
            let increment = match self.config.propagation {
                Propagation::Upward => graph.var(current)?.stats.cost,
                Propagation::MinUpward => {
                    let mut lowest = f64::INFINITY;
                    for child in self.action_children(graph, parent)? {
                        lowest = lowest.min(graph.var(child)?.stats.cost);
                    }
                    if lowest.is_finite() {
                        self.config.discount * lowest
                    } else {
                        0.0
                    }
                }
                Propagation::NoOp | Propagation::Downward => 0.0,
            };
            graph.var_mut(parent)?.stats.cost += increment;
            current = parent;
        }
        graph.var_mut(root)?.stats.visits += 1;
        Ok(())
    }

    /// Picks the action to perform among the root's expanded children.
    pub fn action_selection(&mut self, graph: &FactorGraph, root: VarId) -> Result<usize> {
        let mut candidates = Vec::new();
        for child in self.action_children(graph, root)? {
            let stats = &graph.var(child)?.stats;
            if let Some(action) = stats.action {
                candidates.push((action, stats.visits, stats.cost));
            }
        }
        if candidates.is_empty() {
            return Err(BtaiError::EmptyTree);
        }

        let index = match self.config.action_selection {
            ActionSelection::MaxVisitsMinCost => {
                let mut best = 0;
                for (i, &(_, visits, cost)) in candidates.iter().enumerate() {
                    let (_, best_visits, best_cost) = candidates[best];
                    if visits > best_visits || (visits == best_visits && cost < best_cost) {
                        best = i;
                    }
                }
                best
            }
            ActionSelection::MinAverageCost => candidates
                .iter()
                .map(|&(_, visits, cost)| cost / visits.max(1) as f64)
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(0, |(i, _)| i),
            ActionSelection::SoftmaxVisits => {
                let visits: Array1<f64> = candidates.iter().map(|&(_, v, _)| v as f64).collect();
                let weights = softmax(visits.view());
                sample_index(&weights.to_vec(), &mut self.rng)?
            }
        };
        Ok(candidates[index].0)
    }

    /// Runs `steps` planning iterations from the graph's tree root and
    /// returns the selected action.
    ///
    /// Planning stops early once the tree can no longer grow.
    pub fn plan(
        &mut self,
        graph: &mut FactorGraph,
        a: &Array2<f64>,
        b: &Array3<f64>,
        steps: usize,
        vmp: &VmpConfig,
    ) -> Result<usize> {
        let root = graph.tree_root().ok_or(BtaiError::MissingTreeRoot)?;
        for step in 0..steps {
            let node = self.node_selection(graph)?;
            let (s, _) = match self.expansion(graph, node, a, b) {
                Ok(expanded) => expanded,
                Err(BtaiError::NoUnexploredAction(_) | BtaiError::MaxDepthReached { .. }) => {
                    debug!(step, "tree fully expanded");
                    break;
                }
                Err(e) => return Err(e),
            };
            inference(graph, &self.last_expanded_nodes(), vmp)?;
            self.evaluation(graph)?;
            self.propagation(graph, s, root)?;
        }
        self.action_selection(graph, root)
    }
}
