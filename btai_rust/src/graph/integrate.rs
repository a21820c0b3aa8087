//! Advancing the tree root by one real time step.

use ndarray::{Array1, Array2, Array3};
use tracing::info;

use super::node::VarId;
use super::FactorGraph;
use crate::error::{BtaiError, Result};
use crate::params::ACTION_CONFIDENCE;

/// Belief over the executed action: `ACTION_CONFIDENCE` on `action`, the rest
/// spread evenly over the other actions.
pub fn action_prior(n_actions: usize, action: usize) -> Result<Array1<f64>> {
    if action >= n_actions {
        return Err(BtaiError::IndexOutOfRange {
            index: action,
            size: n_actions,
        });
    }
    if n_actions == 1 {
        return Ok(Array1::ones(1));
    }
    let rest = (1.0 - ACTION_CONFIDENCE) / (n_actions - 1) as f64;
    let mut prior = Array1::from_elem(n_actions, rest);
    prior[action] = ACTION_CONFIDENCE;
    Ok(prior)
}

impl FactorGraph {
    /// Appends the executed `action` and the resulting `observation` ahead of
    /// the tree root, then drops the hidden lookahead tree of the old root.
    ///
    /// `a` is the `[obs, state]` likelihood, `b` the `[to, from, action]`
    /// transition tensor. Returns the new tree root.
    pub fn integrate(
        &mut self,
        action: usize,
        observation: Array1<f64>,
        a: &Array2<f64>,
        b: &Array3<f64>,
    ) -> Result<VarId> {
        let root = self.tree_root().ok_or(BtaiError::MissingTreeRoot)?;
        let u = self.categorical(action_prior(b.shape()[2], action)?)?;
        self.remove_hidden_children(root)?;
        let state = self.active_transition(root, u, b.clone())?;
        let obs = self.transition(state, a.clone())?;
        self.advance(root, state, obs, action, observation)
    }

    /// Same as [`FactorGraph::integrate`] with Dirichlet variables over the
    /// likelihood (`a_var`, rank 2) and the transitions (`b_var`, rank 3).
    pub fn integrate_learned(
        &mut self,
        action: usize,
        observation: Array1<f64>,
        a_var: VarId,
        b_var: VarId,
    ) -> Result<VarId> {
        let root = self.tree_root().ok_or(BtaiError::MissingTreeRoot)?;
        let n_actions = self.var(b_var)?.posterior.params().shape().get(2).copied().unwrap_or(0);
        let u = self.categorical(action_prior(n_actions, action)?)?;
        self.remove_hidden_children(root)?;
        let state = self.active_transition_learned(root, u, b_var)?;
        let obs = self.transition_learned(state, a_var)?;
        self.advance(root, state, obs, action, observation)
    }

    /// Same as [`FactorGraph::integrate_learned`], with the action drawn from
    /// `Cat(θ)`, `θ ~ Dir(u_var)`. The count of the executed action is
    /// incremented first.
    pub fn integrate_with_action_counts(
        &mut self,
        u_var: VarId,
        action: usize,
        observation: Array1<f64>,
        a_var: VarId,
        b_var: VarId,
    ) -> Result<VarId> {
        let root = self.tree_root().ok_or(BtaiError::MissingTreeRoot)?;
        let node = self.var_mut(u_var)?;
        let kind = node.posterior.kind();
        let not_dirichlet = || BtaiError::UnsupportedKind {
            operation: "action counts",
            kind,
        };
        node.posterior
            .as_dirichlet_mut()
            .ok_or_else(not_dirichlet)?
            .increase_param(&[action])?;
        if let Some(prior) = node.prior.as_mut().and_then(|p| p.as_dirichlet_mut()) {
            prior.increase_param(&[action])?;
        }

        let u = self.categorical_learned(u_var)?;
        self.remove_hidden_children(root)?;
        let state = self.active_transition_learned(root, u, b_var)?;
        let obs = self.transition_learned(state, a_var)?;
        self.advance(root, state, obs, action, observation)
    }

    fn advance(
        &mut self,
        old_root: VarId,
        state: VarId,
        obs: VarId,
        action: usize,
        observation: Array1<f64>,
    ) -> Result<VarId> {
        self.set_observed(obs, observation)?;
        self.set_tree_root(state)?;
        self.compact();
        info!(action, old_root = %old_root, new_root = %state, "integrated");
        Ok(state)
    }
}
