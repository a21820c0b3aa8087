//! Factors: the distributions linking a child variable to its parents.
//!
//! # Messages
//!
//! With `L` the log-parameters of the factor (or their Dirichlet expectation
//! when the parameters are learned) and `t`, `f`, `a` the posteriors of the
//! `to`, `from` and `action` variables:
//! ```text
//! Transition          → to:     L·f              → from:   Lᵀ·t
//! ActiveTransition    L̄ = Σₖ L[:, :, k]·aₖ
//!                     → to:     L̄·f              → from:   L̄ᵀ·t
//!                     → action: mₖ = tᵀ·L[:, :, k]·f
//! any → Dirichlet parent: outer product of the adjacent posteriors
//! ```
//!
//! # Free energy
//!
//! ```text
//! F_factor = −H[Q(child)] − E_Q[ln P(child | parents)]
//! ```
//! The entropy term only counts when the child is hidden.

use ndarray::{Array1, Array2, Array3, ArrayD, Axis, Ix1, Ix2, Ix3};

use super::node::{VarId, VarNode};
use super::FactorGraph;
use crate::distributions::{Dirichlet, Distribution, DistributionKind};
use crate::error::{BtaiError, Result};
use crate::math::{log_beta, outer2, outer3};

/// A factor of the graph. Parameters are stored on the child variable
/// (`prior`) or, when learned, come from the posterior of a Dirichlet parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Factor {
    /// `P(child)` with a fixed or Dirichlet-distributed parameter vector.
    Categorical {
        child: VarId,
        dirichlet: Option<VarId>,
    },
    /// `P(to | from)`.
    Transition {
        from: VarId,
        to: VarId,
        dirichlet: Option<VarId>,
    },
    /// `P(to | from, action)`.
    ActiveTransition {
        from: VarId,
        action: VarId,
        to: VarId,
        dirichlet: Option<VarId>,
    },
    /// Prior over the pseudo-counts of a Dirichlet variable.
    Dirichlet { child: VarId },
}

impl Factor {
    #[must_use]
    pub const fn kind(&self) -> DistributionKind {
        match self {
            Self::Categorical { .. } => DistributionKind::Categorical,
            Self::Transition { .. } => DistributionKind::Transition,
            Self::ActiveTransition { .. } => DistributionKind::ActiveTransition,
            Self::Dirichlet { .. } => DistributionKind::Dirichlet,
        }
    }

    /// Variable defined by this factor.
    #[must_use]
    pub const fn child(&self) -> VarId {
        match self {
            Self::Categorical { child, .. } | Self::Dirichlet { child } => *child,
            Self::Transition { to, .. } | Self::ActiveTransition { to, .. } => *to,
        }
    }

    /// Parent variables: states first, then the action, then the Dirichlet.
    #[must_use]
    pub fn parents(&self) -> Vec<VarId> {
        match self {
            Self::Categorical { dirichlet, .. } => dirichlet.iter().copied().collect(),
            Self::Transition {
                from, dirichlet, ..
            } => std::iter::once(*from).chain(*dirichlet).collect(),
            Self::ActiveTransition {
                from,
                action,
                dirichlet,
                ..
            } => [*from, *action].into_iter().chain(*dirichlet).collect(),
            Self::Dirichlet { .. } => Vec::new(),
        }
    }

    /// The `i`-th parent, in the order of [`Factor::parents`].
    #[must_use]
    pub fn parent(&self, i: usize) -> Option<VarId> {
        self.parents().get(i).copied()
    }

    #[must_use]
    pub const fn dirichlet(&self) -> Option<VarId> {
        match self {
            Self::Categorical { dirichlet, .. }
            | Self::Transition { dirichlet, .. }
            | Self::ActiveTransition { dirichlet, .. } => *dirichlet,
            Self::Dirichlet { .. } => None,
        }
    }

    /// Message from this factor toward `target`.
    pub fn message(&self, graph: &FactorGraph, target: VarId) -> Result<ArrayD<f64>> {
        let not_adjacent = || BtaiError::NotAdjacent {
            var: target,
            kind: self.kind(),
        };
        match *self {
            Self::Categorical { child, dirichlet } => {
                if target == child {
                    self.log_params(graph)
                } else if Some(target) == dirichlet {
                    Ok(posterior_vector(graph.var(child)?)?.into_dyn())
                } else {
                    Err(not_adjacent())
                }
            }
            Self::Transition {
                from,
                to,
                dirichlet,
            } => {
                let f = posterior_vector(graph.var(from)?)?;
                let t = posterior_vector(graph.var(to)?)?;
                if Some(target) == dirichlet {
                    return Ok(outer2(t.view(), f.view()).into_dyn());
                }
                let log_a = into_rank::<Ix2>(self.log_params(graph)?)?;
                if target == to {
                    Ok(log_a.dot(&f).into_dyn())
                } else if target == from {
                    Ok(log_a.t().dot(&t).into_dyn())
                } else {
                    Err(not_adjacent())
                }
            }
            Self::ActiveTransition {
                from,
                action,
                to,
                dirichlet,
            } => {
                let f = posterior_vector(graph.var(from)?)?;
                let a = posterior_vector(graph.var(action)?)?;
                let t = posterior_vector(graph.var(to)?)?;
                if Some(target) == dirichlet {
                    return Ok(outer3(t.view(), f.view(), a.view()).into_dyn());
                }
                let log_b = into_rank::<Ix3>(self.log_params(graph)?)?;
                if target == to {
                    Ok(average_over_actions(&log_b, &a).dot(&f).into_dyn())
                } else if target == from {
                    Ok(average_over_actions(&log_b, &a).t().dot(&t).into_dyn())
                } else if target == action {
                    let m: Array1<f64> = log_b
                        .axis_iter(Axis(2))
                        .map(|slice| t.dot(&slice.dot(&f)))
                        .collect();
                    Ok(m.into_dyn())
                } else {
                    Err(not_adjacent())
                }
            }
            Self::Dirichlet { child } => {
                if target == child {
                    Ok(dirichlet_prior(graph.var(child)?)?.params().clone())
                } else {
                    Err(not_adjacent())
                }
            }
        }
    }

    /// Contribution of this factor to the variational free energy.
    pub fn free_energy(&self, graph: &FactorGraph) -> Result<f64> {
        let child = graph.var(self.child())?;
        let neg_entropy = if child.is_hidden() {
            -child.posterior.entropy()?
        } else {
            0.0
        };

        let energy = match *self {
            Self::Categorical { .. } => {
                let log_d = into_rank::<Ix1>(self.log_params(graph)?)?;
                posterior_vector(child)?.dot(&log_d)
            }
            Self::Transition { from, .. } => {
                let log_a = into_rank::<Ix2>(self.log_params(graph)?)?;
                let f = posterior_vector(graph.var(from)?)?;
                posterior_vector(child)?.dot(&log_a.dot(&f))
            }
            Self::ActiveTransition { from, action, .. } => {
                let log_b = into_rank::<Ix3>(self.log_params(graph)?)?;
                let f = posterior_vector(graph.var(from)?)?;
                let a = posterior_vector(graph.var(action)?)?;
                posterior_vector(child)?.dot(&average_over_actions(&log_b, &a).dot(&f))
            }
            Self::Dirichlet { .. } => {
                let prior = dirichlet_prior(child)?.params();
                let expected_log = Dirichlet::expected_log(child.posterior.params())?;
                if expected_log.shape() != prior.shape() {
                    return Err(BtaiError::ShapeMismatch {
                        expected: prior.shape().to_vec(),
                        found: expected_log.shape().to_vec(),
                    });
                }
                let cross: f64 = prior
                    .iter()
                    .zip(expected_log.iter())
                    .map(|(&p, &e)| (p - 1.0) * e)
                    .sum();
                let log_norm: f64 = prior.lanes(Axis(0)).into_iter().map(log_beta).sum();
                cross - log_norm
            }
        };
        Ok(neg_entropy - energy)
    }

    /// Log-parameters of the factor: the child's fixed prior, or the
    /// Dirichlet expectation of the learned parameters.
    pub fn log_params(&self, graph: &FactorGraph) -> Result<ArrayD<f64>> {
        if let Some(d) = self.dirichlet() {
            return Dirichlet::expected_log(graph.var(d)?.posterior.params());
        }
        graph
            .var(self.child())?
            .prior
            .as_ref()
            .map(Distribution::log_params)
            .ok_or_else(|| {
                BtaiError::InvalidParameters(format!(
                    "{} factor of {} has neither fixed nor learned parameters",
                    self.kind(),
                    self.child()
                ))
            })
    }
}

/// `Σₖ L[:, :, k] · aₖ`
fn average_over_actions(log_b: &Array3<f64>, a: &Array1<f64>) -> Array2<f64> {
    let (n_to, n_from, _) = log_b.dim();
    log_b
        .axis_iter(Axis(2))
        .zip(a.iter())
        .fold(Array2::zeros((n_to, n_from)), |acc, (slice, &w)| acc + &slice * w)
}

fn posterior_vector(node: &VarNode) -> Result<Array1<f64>> {
    Ok(node.posterior.probabilities()?.to_owned())
}

fn dirichlet_prior(node: &VarNode) -> Result<&Dirichlet> {
    let prior = node
        .prior
        .as_ref()
        .ok_or_else(|| BtaiError::InvalidParameters("Dirichlet variable without prior".into()))?;
    prior.as_dirichlet().ok_or(BtaiError::UnsupportedKind {
        operation: "Dirichlet factor",
        kind: prior.kind(),
    })
}

fn into_rank<D: ndarray::Dimension>(values: ArrayD<f64>) -> Result<ndarray::Array<f64, D>> {
    let found = values.shape().to_vec();
    values
        .into_dimensionality::<D>()
        .map_err(|_| BtaiError::ShapeMismatch {
            expected: vec![0; D::NDIM.unwrap_or(0)],
            found,
        })
}
