//! Conditional distributions: `P(to | from)` and `P(to | from, action)`.

use ndarray::{Array2, Array3, ArrayD, Dimension};

use crate::error::{BtaiError, Result};
use crate::math::{safe_ln, softmax_columns};

/// Column-wise softmax that keeps the rank of the stored tensor.
fn normalized<D: Dimension>(
    current: &[usize],
    new_params: ArrayD<f64>,
) -> Result<ndarray::Array<f64, D>> {
    if new_params.shape() != current {
        return Err(BtaiError::ShapeMismatch {
            expected: current.to_vec(),
            found: new_params.shape().to_vec(),
        });
    }
    softmax_columns(new_params.view())
        .into_dimensionality::<D>()
        .map_err(|e| BtaiError::InvalidParameters(e.to_string()))
}

/// Transition matrix `P(to | from)` laid out as `[to, from]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    params: Array2<f64>,
}

impl Transition {
    #[must_use]
    pub const fn new(params: Array2<f64>) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn params(&self) -> &Array2<f64> {
        &self.params
    }

    #[must_use]
    pub fn log_params(&self) -> Array2<f64> {
        self.params.mapv(safe_ln)
    }

    /// Replaces the parameters by their column-wise softmax.
    pub fn update_params(&mut self, new_params: ArrayD<f64>) -> Result<()> {
        self.params = normalized(self.params.shape(), new_params)?;
        Ok(())
    }
}

/// Action-conditioned transition tensor `P(to | from, action)` laid out as
/// `[to, from, action]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveTransition {
    params: Array3<f64>,
}

impl ActiveTransition {
    #[must_use]
    pub const fn new(params: Array3<f64>) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn params(&self) -> &Array3<f64> {
        &self.params
    }

    #[must_use]
    pub fn log_params(&self) -> Array3<f64> {
        self.params.mapv(safe_ln)
    }

    /// Number of actions (size of the last axis).
    #[must_use]
    pub fn n_actions(&self) -> usize {
        self.params.shape()[2]
    }

    /// Replaces the parameters by their column-wise softmax.
    pub fn update_params(&mut self, new_params: ArrayD<f64>) -> Result<()> {
        self.params = normalized(self.params.shape(), new_params)?;
        Ok(())
    }
}
