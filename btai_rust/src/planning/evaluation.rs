//! Scores shared by both planners.
//!
//! # Upper Confidence bound for Trees
//!
//! ```text
//! UCT(child) = −cost/visits + C · sqrt( ln(parent visits) / visits )
//! ```

use ndarray::Ix2;

use super::config::Evaluation;
use crate::distributions::{kl, Distribution};
use crate::error::{BtaiError, Result};
use crate::graph::{FactorGraph, VarId, VarNode};
use crate::inference::{ambiguity, risk};

/// UCT score of a child; unvisited children score `+∞`.
#[must_use]
pub fn uct(cost: f64, visits: usize, parent_visits: usize, exploration: f64) -> f64 {
    if visits == 0 {
        return f64::INFINITY;
    }
    let n = visits as f64;
    let log_parent = (parent_visits.max(1) as f64).ln();
    -cost / n + exploration * (log_parent / n).sqrt()
}

/// Scores the state `s` and its observation `o` with the given strategy.
pub fn evaluate(graph: &FactorGraph, s: VarId, o: VarId, strategy: Evaluation) -> Result<f64> {
    match strategy {
        Evaluation::DoubleKl => double_kl(graph, s, o),
        Evaluation::Efe => efe(graph, s, o),
    }
}

/// `KL[Q(s) ‖ C(s)] + KL[Q(o) ‖ C(o)]`
pub fn double_kl(graph: &FactorGraph, s: VarId, o: VarId) -> Result<f64> {
    let s = graph.var(s)?;
    let o = graph.var(o)?;
    Ok(kl(&s.posterior, preference(s)?)? + kl(&o.posterior, preference(o)?)?)
}

/// `KL[Q(o) ‖ C(o)] + Σⱼ Q(sⱼ) H[A[:, j]]`, with `A` the likelihood of `o`.
pub fn efe(graph: &FactorGraph, s: VarId, o: VarId) -> Result<f64> {
    let s = graph.var(s)?;
    let o = graph.var(o)?;
    let likelihood = match &o.prior {
        Some(Distribution::Transition(a)) => a.params().view(),
        Some(other) => {
            return Err(BtaiError::UnsupportedKind {
                operation: "expected free energy",
                kind: other.kind(),
            });
        }
        None => {
            // Learned likelihood
            return efe_learned(graph, s, o);
        }
    };
    let preferred = preference(o)?.probabilities()?;
    Ok(risk(o.posterior.probabilities()?, preferred)?
        + ambiguity(likelihood, s.posterior.probabilities()?)?)
}

fn efe_learned(graph: &FactorGraph, s: &VarNode, o: &VarNode) -> Result<f64> {
    let factor = o
        .parent()
        .ok_or_else(|| BtaiError::InvalidParameters("observation without likelihood".into()))?;
    let likelihood = graph
        .factor(factor)?
        .log_params(graph)?
        .mapv(f64::exp)
        .into_dimensionality::<Ix2>()
        .map_err(|e| BtaiError::InvalidParameters(e.to_string()))?;
    let preferred = preference(o)?.probabilities()?;
    Ok(risk(o.posterior.probabilities()?, preferred)?
        + ambiguity(likelihood.view(), s.posterior.probabilities()?)?)
}

fn preference(node: &VarNode) -> Result<&Distribution> {
    node.biased
        .as_ref()
        .ok_or_else(|| BtaiError::InvalidParameters("node has no preferred distribution".into()))
}
