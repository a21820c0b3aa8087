//! Variational message passing.
//!
//! Each sweep sets the posterior of every hidden variable to the exact
//! minimizer of the free energy with all other beliefs held fixed:
//! ```text
//! ln Q(x) ∝ Σ_{f ∈ adjacent(x)} m_{f→x}
//! ```
//! Categorical posteriors store the softmax of the summed messages, Dirichlet
//! posteriors store the summed counts.

use ndarray::ArrayD;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::graph::{FactorGraph, VarId};
use crate::params::{VMP_EPSILON, VMP_MAX_ITER};

/// Stopping rule of [`inference`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VmpConfig {
    /// Minimum decrease of free energy between two sweeps
    pub epsilon: f64,
    /// Maximum number of sweeps
    pub max_iter: usize,
}

impl Default for VmpConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl VmpConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            epsilon: VMP_EPSILON,
            max_iter: VMP_MAX_ITER,
        }
    }

    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    #[must_use]
    pub const fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

/// Outcome of one call to [`inference`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceReport {
    /// Number of sweeps performed
    pub iterations: usize,
    /// Free energy after the last sweep
    pub free_energy: f64,
}

/// Runs VMP over `vars` until the free energy stops decreasing by more than
/// `config.epsilon` or `config.max_iter` sweeps have run.
///
/// Observed variables in `vars` keep their evidence but still contribute to
/// the free energy.
pub fn inference(
    graph: &mut FactorGraph,
    vars: &[VarId],
    config: &VmpConfig,
) -> Result<InferenceReport> {
    let mut free_energy = f64::MAX;
    let mut iterations = 0;

    loop {
        for &var in vars {
            if graph.var(var)?.is_hidden() {
                update_posterior(graph, var)?;
            }
        }
        iterations += 1;

        let previous = free_energy;
        free_energy = variational_free_energy(graph, vars)?;
        debug!(iterations, free_energy, "vmp sweep");

        if !free_energy.is_finite() {
            warn!(iterations, free_energy, "free energy is not finite, stopping");
            break;
        }
        if previous - free_energy < config.epsilon || iterations >= config.max_iter {
            break;
        }
    }

    Ok(InferenceReport {
        iterations,
        free_energy,
    })
}

/// Sum of the free-energy contributions of the factors defining `vars`.
pub fn variational_free_energy(graph: &FactorGraph, vars: &[VarId]) -> Result<f64> {
    let mut total = 0.0;
    for &var in vars {
        if let Some(f) = graph.var(var)?.parent() {
            total += graph.factor(f)?.free_energy(graph)?;
        }
    }
    Ok(total)
}

/// Replaces the posterior of `var` using the messages of its children
/// factors, then of its defining factor.
fn update_posterior(graph: &mut FactorGraph, var: VarId) -> Result<()> {
    let node = graph.var(var)?;
    let mut sum: Option<ArrayD<f64>> = None;
    for &f in node.children().iter().chain(node.parent().iter()) {
        let msg = graph.factor(f)?.message(graph, var)?;
        trace!(factor = %f, var = %var, "message");
        sum = Some(match sum {
            Some(acc) => acc + msg,
            None => msg,
        });
    }
    if let Some(sum) = sum {
        graph.var_mut(var)?.posterior.update_params(sum)?;
    }
    Ok(())
}
