//! Expected Free Energy terms used to score hypothetical futures.
//!
//! # Expected Free Energy (EFE)
//!
//! For a predicted state belief `s` and predicted observation belief `o`:
//! ```text
//! G = Risk + Ambiguity
//! Risk      = KL[o ‖ C]                       C: preferred observations
//! Ambiguity = Σⱼ sⱼ · H[A[:, j]]              A: likelihood [obs, state]
//! ```

use ndarray::{ArrayView1, ArrayView2, Axis};

use crate::error::{BtaiError, Result};
use crate::math::{entropy, kl_categorical, safe_ln};

/// Divergence of predicted observations from preferred ones.
///
/// Lower risk means the predicted outcome is closer to what the agent wants.
pub fn risk(predicted: ArrayView1<'_, f64>, preferred: ArrayView1<'_, f64>) -> Result<f64> {
    kl_categorical(predicted, preferred)
}

/// Expected entropy of the likelihood under the state belief.
///
/// High ambiguity means the states the agent expects to visit produce
/// uninformative observations.
pub fn ambiguity(likelihood: ArrayView2<'_, f64>, states: ArrayView1<'_, f64>) -> Result<f64> {
    check_states(likelihood, states)?;
    Ok(likelihood
        .axis_iter(Axis(1))
        .zip(states.iter())
        .map(|(column, &s)| s * entropy(column))
        .sum())
}

/// Ambiguity written as the tree-search planner computes it:
///
/// ```text
/// −diag(ln Aᵀ · A) · s
/// ```
///
/// Numerically the same quantity as [`ambiguity`].
pub fn ambiguity_uct(likelihood: ArrayView2<'_, f64>, states: ArrayView1<'_, f64>) -> Result<f64> {
    check_states(likelihood, states)?;
    let log_a = likelihood.mapv(safe_ln);
    let diag = log_a.t().dot(&likelihood).diag().to_owned();
    Ok(-diag.dot(&states))
}

/// `G = KL[o ‖ C] + Σⱼ sⱼ · H[A[:, j]]`
///
/// Lower EFE is better (the planner minimizes it).
pub fn expected_free_energy(
    predicted_obs: ArrayView1<'_, f64>,
    preferred_obs: ArrayView1<'_, f64>,
    likelihood: ArrayView2<'_, f64>,
    states: ArrayView1<'_, f64>,
) -> Result<f64> {
    Ok(risk(predicted_obs, preferred_obs)? + ambiguity(likelihood, states)?)
}

fn check_states(likelihood: ArrayView2<'_, f64>, states: ArrayView1<'_, f64>) -> Result<()> {
    if likelihood.ncols() == states.len() {
        Ok(())
    } else {
        Err(BtaiError::ShapeMismatch {
            expected: vec![likelihood.nrows(), states.len()],
            found: likelihood.shape().to_vec(),
        })
    }
}
