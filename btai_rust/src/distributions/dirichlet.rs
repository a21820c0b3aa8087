//! Dirichlet prior over the columns of a categorical parameter tensor.
//!
//! # Mathematical Foundation
//!
//! Every column `α` (lane along axis 0) is an independent Dirichlet:
//! ```text
//! E[ln θₖ]  = ψ(αₖ) − ψ(α₀)                         α₀ = Σₖ αₖ
//! H[Dir(α)] = ln B(α) + (α₀ − K)ψ(α₀) − Σₖ (αₖ − 1)ψ(αₖ)
//! ```

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

use crate::error::{BtaiError, Result};
use crate::math::{digamma, log_beta};

/// Dirichlet pseudo-counts, strictly positive, same layout as the tensor they
/// parameterize.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dirichlet {
    params: ArrayD<f64>,
}

fn check_positive(params: &ArrayD<f64>) -> Result<()> {
    if params.ndim() == 0 || params.is_empty() {
        return Err(BtaiError::InvalidParameters(
            "Dirichlet parameters must have at least one outcome".into(),
        ));
    }
    if let Some(bad) = params.iter().find(|&&a| !(a > 0.0 && a.is_finite())) {
        return Err(BtaiError::InvalidParameters(format!(
            "Dirichlet parameters must be positive, found {bad}"
        )));
    }
    Ok(())
}

impl Dirichlet {
    /// Creates a Dirichlet from pseudo-counts; rejects non-positive entries.
    pub fn new(params: ArrayD<f64>) -> Result<Self> {
        check_positive(&params)?;
        Ok(Self { params })
    }

    #[must_use]
    pub const fn params(&self) -> &ArrayD<f64> {
        &self.params
    }

    /// Element-wise logarithm of the pseudo-counts.
    #[must_use]
    pub fn log_params(&self) -> ArrayD<f64> {
        self.params.mapv(f64::ln)
    }

    /// Replaces the pseudo-counts as given (no normalization).
    pub fn update_params(&mut self, new_params: ArrayD<f64>) -> Result<()> {
        if new_params.shape() != self.params.shape() {
            return Err(BtaiError::ShapeMismatch {
                expected: self.params.shape().to_vec(),
                found: new_params.shape().to_vec(),
            });
        }
        check_positive(&new_params)?;
        self.params = new_params;
        Ok(())
    }

    /// Conjugate count increment at a full index, e.g. `[to, from, action]`.
    pub fn increase_param(&mut self, index: &[usize]) -> Result<()> {
        let shape = self.params.shape().to_vec();
        if index.len() != shape.len() {
            return Err(BtaiError::ShapeMismatch {
                expected: shape,
                found: index.to_vec(),
            });
        }
        if let Some((&i, &size)) = index.iter().zip(&shape).find(|&(&i, &size)| i >= size) {
            return Err(BtaiError::IndexOutOfRange { index: i, size });
        }
        self.params[IxDyn(index)] += 1.0;
        Ok(())
    }

    /// Entropy summed over all columns.
    pub fn entropy(&self) -> Result<f64> {
        let mut total = 0.0;
        for column in self.params.lanes(Axis(0)) {
            let alpha0 = column.sum();
            let k = column.len() as f64;
            let mut h = log_beta(column) + (alpha0 - k) * digamma(alpha0)?;
            for &a in column {
                h -= (a - 1.0) * digamma(a)?;
            }
            total += h;
        }
        Ok(total)
    }

    /// Expected logarithm of the parameterized probabilities:
    /// `ψ(α) − ψ(column sum)`.
    pub fn expected_log(params: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        let mut out = params.to_owned();
        if out.ndim() == 0 {
            return Ok(out);
        }
        for mut column in out.lanes_mut(Axis(0)) {
            let psi_sum = digamma(column.sum())?;
            for a in &mut column {
                *a = digamma(*a)? - psi_sum;
            }
        }
        Ok(out)
    }

    /// `exp(E[ln θ])`, a (sub-normalized) point estimate used for planning.
    pub fn expected_params(params: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        Ok(Self::expected_log(params)?.mapv(f64::exp))
    }
}
