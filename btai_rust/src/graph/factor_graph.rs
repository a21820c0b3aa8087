//! The container owning every variable and factor of one generative model.

use ndarray::{Array1, Array2, Array3, ArrayD};
use tracing::trace;

use super::arena::Arena;
use super::factor::Factor;
use super::node::{FactorId, VarId, VarKind, VarNode};
use crate::distributions::{ActiveTransition, Categorical, Dirichlet, Distribution, Transition};
use crate::error::{BtaiError, Result};

/// Factor graph over categorical and Dirichlet variables.
///
/// A graph is a plain value: `FactorGraph::new()` starts a fresh model and
/// `std::mem::replace` swaps one in.
#[derive(Clone, Debug, Default)]
pub struct FactorGraph {
    vars: Arena<VarNode>,
    factors: Arena<Factor>,
    tree_root: Option<VarId>,
}

impl FactorGraph {
    /// Creates an empty graph.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vars: Arena::new(),
            factors: Arena::new(),
            tree_root: None,
        }
    }

    // ---- builders ----

    /// `x ~ Cat(param)`.
    pub fn categorical(&mut self, param: Array1<f64>) -> Result<VarId> {
        non_empty(param.shape())?;
        let n = param.len();
        let child = self.add_var(VarNode::hidden(Some(Categorical::new(param).into()), n));
        self.add_factor(Factor::Categorical {
            child,
            dirichlet: None,
        })?;
        Ok(child)
    }

    /// `x ~ Cat(θ)` with `θ ~ Dir(d)`; `dirichlet` is a rank-1 Dirichlet variable.
    pub fn categorical_learned(&mut self, dirichlet: VarId) -> Result<VarId> {
        let shape = self.dirichlet_shape(dirichlet, 1)?;
        let child = self.add_var(VarNode::hidden(None, shape[0]));
        self.add_factor(Factor::Categorical {
            child,
            dirichlet: Some(dirichlet),
        })?;
        Ok(child)
    }

    /// `to ~ P(to | from)` with a fixed `[to, from]` matrix.
    pub fn transition(&mut self, from: VarId, param: Array2<f64>) -> Result<VarId> {
        self.expect_states(from, param.shape()[1], param.shape())?;
        non_empty(param.shape())?;
        let n = param.shape()[0];
        let to = self.add_var(VarNode::hidden(Some(Transition::new(param).into()), n));
        self.add_factor(Factor::Transition {
            from,
            to,
            dirichlet: None,
        })?;
        Ok(to)
    }

    /// `to ~ P(to | from)` with a rank-2 Dirichlet variable over the matrix.
    pub fn transition_learned(&mut self, from: VarId, dirichlet: VarId) -> Result<VarId> {
        let shape = self.dirichlet_shape(dirichlet, 2)?;
        self.expect_states(from, shape[1], &shape)?;
        let to = self.add_var(VarNode::hidden(None, shape[0]));
        self.add_factor(Factor::Transition {
            from,
            to,
            dirichlet: Some(dirichlet),
        })?;
        Ok(to)
    }

    /// `to ~ P(to | from, action)` with a fixed `[to, from, action]` tensor.
    pub fn active_transition(
        &mut self,
        from: VarId,
        action: VarId,
        param: Array3<f64>,
    ) -> Result<VarId> {
        self.expect_states(from, param.shape()[1], param.shape())?;
        self.expect_states(action, param.shape()[2], param.shape())?;
        non_empty(param.shape())?;
        let n = param.shape()[0];
        let to = self.add_var(VarNode::hidden(Some(ActiveTransition::new(param).into()), n));
        self.add_factor(Factor::ActiveTransition {
            from,
            action,
            to,
            dirichlet: None,
        })?;
        Ok(to)
    }

    /// `to ~ P(to | from, action)` with a rank-3 Dirichlet variable over the tensor.
    pub fn active_transition_learned(
        &mut self,
        from: VarId,
        action: VarId,
        dirichlet: VarId,
    ) -> Result<VarId> {
        let shape = self.dirichlet_shape(dirichlet, 3)?;
        self.expect_states(from, shape[1], &shape)?;
        self.expect_states(action, shape[2], &shape)?;
        let to = self.add_var(VarNode::hidden(None, shape[0]));
        self.add_factor(Factor::ActiveTransition {
            from,
            action,
            to,
            dirichlet: Some(dirichlet),
        })?;
        Ok(to)
    }

    /// `θ ~ Dir(param)`; the posterior starts equal to the prior.
    pub fn dirichlet(&mut self, param: ArrayD<f64>) -> Result<VarId> {
        let prior: Distribution = Dirichlet::new(param)?.into();
        let child = self.add_var(VarNode::with_posterior(Some(prior.clone()), prior));
        self.add_factor(Factor::Dirichlet { child })?;
        Ok(child)
    }

    fn add_var(&mut self, node: VarNode) -> VarId {
        VarId(self.vars.insert(node))
    }

    /// Inserts a factor and links it to its child and parents.
    fn add_factor(&mut self, factor: Factor) -> Result<FactorId> {
        let child = factor.child();
        let parents = factor.parents();
        for &p in &parents {
            self.var(p)?;
        }
        let id = FactorId(self.factors.insert(factor));
        self.var_mut(child)?.parent = Some(id);
        for p in parents {
            self.var_mut(p)?.children.push(id);
        }
        trace!(factor = %id, child = %child, "factor added");
        Ok(id)
    }

    fn expect_states(&self, var: VarId, expected: usize, shape: &[usize]) -> Result<()> {
        let found = self.var(var)?.n_states();
        if found == expected {
            Ok(())
        } else {
            Err(BtaiError::ShapeMismatch {
                expected: shape.to_vec(),
                found: vec![found],
            })
        }
    }

    fn dirichlet_shape(&self, var: VarId, rank: usize) -> Result<Vec<usize>> {
        let posterior = &self.var(var)?.posterior;
        if posterior.as_dirichlet().is_none() {
            return Err(BtaiError::UnsupportedKind {
                operation: "learned parameters",
                kind: posterior.kind(),
            });
        }
        let shape = posterior.params().shape().to_vec();
        if shape.len() == rank {
            Ok(shape)
        } else {
            Err(BtaiError::ShapeMismatch {
                expected: vec![0; rank],
                found: shape,
            })
        }
    }

    // ---- accessors ----

    pub fn var(&self, id: VarId) -> Result<&VarNode> {
        self.vars.get(id.0).ok_or(BtaiError::StaleVar(id))
    }

    pub fn var_mut(&mut self, id: VarId) -> Result<&mut VarNode> {
        self.vars.get_mut(id.0).ok_or(BtaiError::StaleVar(id))
    }

    pub fn factor(&self, id: FactorId) -> Result<&Factor> {
        self.factors.get(id.0).ok_or(BtaiError::StaleFactor(id))
    }

    #[must_use]
    pub fn contains(&self, id: VarId) -> bool {
        self.vars.contains(id.0)
    }

    #[must_use]
    pub const fn n_vars(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub const fn n_factors(&self) -> usize {
        self.factors.len()
    }

    #[must_use]
    pub fn n_hidden_vars(&self) -> usize {
        self.vars.values().filter(|v| v.is_hidden()).count()
    }

    #[must_use]
    pub fn n_observed_vars(&self) -> usize {
        self.n_vars() - self.n_hidden_vars()
    }

    /// All live variables, in creation order.
    #[must_use]
    pub fn var_ids(&self) -> Vec<VarId> {
        self.vars.keys().into_iter().map(VarId).collect()
    }

    /// All live factors, in creation order.
    #[must_use]
    pub fn factor_ids(&self) -> Vec<FactorId> {
        self.factors.keys().into_iter().map(FactorId).collect()
    }

    #[must_use]
    pub const fn tree_root(&self) -> Option<VarId> {
        self.tree_root
    }

    pub fn set_tree_root(&mut self, root: VarId) -> Result<()> {
        self.var(root)?;
        self.tree_root = Some(root);
        Ok(())
    }

    /// First parent of the factor defining `var`.
    pub fn parent_var(&self, var: VarId) -> Result<Option<VarId>> {
        match self.var(var)?.parent {
            Some(f) => Ok(self.factor(f)?.parent(0)),
            None => Ok(None),
        }
    }

    /// Factors for which `var` is a parent.
    pub fn children(&self, var: VarId) -> Result<&[FactorId]> {
        Ok(self.var(var)?.children())
    }

    /// Variables defined by the factors for which `var` is a parent.
    pub fn child_vars(&self, var: VarId) -> Result<Vec<VarId>> {
        self.var(var)?
            .children
            .iter()
            .map(|&f| self.factor(f).map(Factor::child))
            .collect()
    }

    /// Clamps `var` to `observation` and marks it observed.
    pub fn set_observed(&mut self, var: VarId, observation: Array1<f64>) -> Result<()> {
        let node = self.var_mut(var)?;
        if node.n_states() != observation.len() {
            return Err(BtaiError::ShapeMismatch {
                expected: vec![node.n_states()],
                found: vec![observation.len()],
            });
        }
        node.posterior = Categorical::new(observation).into();
        node.kind = VarKind::Observed;
        Ok(())
    }

    // ---- pruning ----

    /// Removes `factor`, its child variable and everything below it.
    ///
    /// The factor is unlinked from every parent; removed slots stay reserved
    /// until [`FactorGraph::compact`].
    pub fn remove_branch(&mut self, factor: FactorId) -> Result<()> {
        let removed = self.factor(factor)?.clone();
        for p in removed.parents() {
            if let Ok(parent) = self.var_mut(p) {
                parent.children.retain(|&f| f != factor);
            }
        }

        let child = removed.child();
        let below = self.var(child)?.children.clone();
        for f in below {
            if self.factors.contains(f.0) {
                self.remove_branch(f)?;
            }
        }

        self.vars.remove(child.0);
        self.factors.remove(factor.0);
        if self.tree_root == Some(child) {
            self.tree_root = None;
        }
        Ok(())
    }

    /// Releases the slots of removed variables and factors.
    pub fn compact(&mut self) {
        self.vars.compact();
        self.factors.compact();
    }

    /// Removes every branch below `var` whose child is hidden, keeping
    /// observed descendants, then compacts.
    pub fn remove_hidden_children(&mut self, var: VarId) -> Result<()> {
        self.remove_children_where(var, VarNode::is_hidden)
    }

    /// Removes every branch below `var` created by tree search, then compacts.
    pub fn remove_state_children(&mut self, var: VarId) -> Result<()> {
        self.remove_children_where(var, |node| node.stats.action.is_some())
    }

    fn remove_children_where(&mut self, var: VarId, pred: impl Fn(&VarNode) -> bool) -> Result<()> {
        let children = self.var(var)?.children.clone();
        for f in children {
            let child = self.factor(f)?.child();
            if pred(self.var(child)?) {
                self.remove_branch(f)?;
            }
        }
        self.compact();
        Ok(())
    }
}

fn non_empty(shape: &[usize]) -> Result<()> {
    if shape.iter().any(|&d| d == 0) {
        return Err(BtaiError::InvalidParameters(format!(
            "parameter tensor of shape {shape:?} has no outcome"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn chain() -> (FactorGraph, VarId, VarId) {
        let mut g = FactorGraph::new();
        let s = g.categorical(array![0.5, 0.5]).unwrap();
        let o = g.transition(s, array![[0.9, 0.1], [0.1, 0.9]]).unwrap();
        (g, s, o)
    }

    #[test]
    fn test_builders_link_parents_and_children() {
        let (g, s, o) = chain();
        assert_eq!(g.n_vars(), 2);
        assert_eq!(g.n_factors(), 2);
        assert_eq!(g.parent_var(o).unwrap(), Some(s));
        assert_eq!(g.parent_var(s).unwrap(), None);
        assert_eq!(g.child_vars(s).unwrap(), vec![o]);

        let f = g.var(o).unwrap().parent().unwrap();
        assert_eq!(g.factor(f).unwrap().child(), o);
        assert!(g.var(s).unwrap().children().contains(&f));
    }

    #[test]
    fn test_new_variables_are_hidden_and_uniform() {
        let (g, _, o) = chain();
        let node = g.var(o).unwrap();
        assert!(node.is_hidden());
        assert_eq!(node.posterior.params().iter().copied().collect::<Vec<f64>>(), vec![0.5, 0.5]);
        assert_eq!(g.n_hidden_vars(), 2);
    }

    #[test]
    fn test_transition_rejects_mismatched_parent() {
        let (mut g, s, _) = chain();
        let err = g.transition(s, Array2::from_elem((2, 3), 0.5)).unwrap_err();
        assert!(matches!(err, BtaiError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_learned_builders_check_rank() {
        let mut g = FactorGraph::new();
        let d = g.dirichlet(array![1.0, 1.0].into_dyn()).unwrap();
        let x = g.categorical_learned(d).unwrap();
        assert_eq!(g.var(x).unwrap().n_states(), 2);
        assert!(g.transition_learned(x, d).is_err());
    }

    #[test]
    fn test_set_observed() {
        let (mut g, _, o) = chain();
        g.set_observed(o, array![0.0, 1.0]).unwrap();
        assert_eq!(g.n_observed_vars(), 1);
        assert!(g.set_observed(o, array![1.0]).is_err());
    }

    #[test]
    fn test_remove_branch_is_recursive() {
        let (mut g, s, o) = chain();
        let o2 = g.transition(o, array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
        let f = g.var(o).unwrap().parent().unwrap();

        g.remove_branch(f).unwrap();
        assert!(!g.contains(o));
        assert!(!g.contains(o2));
        assert!(g.children(s).unwrap().is_empty());
        assert_eq!(g.n_vars(), 1);
        assert_eq!(g.n_factors(), 1);
    }

    #[test]
    fn test_stale_handles_error() {
        let (mut g, _, o) = chain();
        let f = g.var(o).unwrap().parent().unwrap();
        g.remove_branch(f).unwrap();
        g.compact();
        let _ = g.categorical(array![1.0]).unwrap();
        assert!(matches!(g.var(o), Err(BtaiError::StaleVar(_))));
        assert!(matches!(g.factor(f), Err(BtaiError::StaleFactor(_))));
    }

    #[test]
    fn test_remove_hidden_children_keeps_observed() {
        let (mut g, s, o) = chain();
        g.set_observed(o, array![1.0, 0.0]).unwrap();
        let hidden = g.transition(s, array![[0.5, 0.5], [0.5, 0.5]]).unwrap();

        g.remove_hidden_children(s).unwrap();
        assert!(g.contains(o));
        assert!(!g.contains(hidden));
    }
}
