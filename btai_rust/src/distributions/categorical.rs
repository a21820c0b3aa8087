//! Categorical distribution over a finite set of outcomes.

use ndarray::{Array1, ArrayD, Ix1};

use crate::error::{BtaiError, Result};
use crate::math::{entropy, safe_ln, softmax, uniform_vector};

/// Categorical distribution `Cat(p)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Categorical {
    /// Outcome probabilities
    params: Array1<f64>,
}

impl Categorical {
    /// Creates a categorical distribution from probabilities, stored as given.
    #[must_use]
    pub const fn new(params: Array1<f64>) -> Self {
        Self { params }
    }

    /// Uniform distribution over `n` outcomes.
    #[must_use]
    pub fn uniform(n: usize) -> Self {
        Self::new(uniform_vector(n))
    }

    /// Number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true when the distribution has no outcome.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[must_use]
    pub const fn params(&self) -> &Array1<f64> {
        &self.params
    }

    /// Element-wise logarithm of the probabilities (floored).
    #[must_use]
    pub fn log_params(&self) -> Array1<f64> {
        self.params.mapv(safe_ln)
    }

    /// Replaces the parameters by `softmax(new_params)`.
    ///
    /// `new_params` are unnormalized log-probabilities, e.g. a sum of messages.
    pub fn update_params(&mut self, new_params: ArrayD<f64>) -> Result<()> {
        if new_params.shape() != self.params.shape() {
            return Err(BtaiError::ShapeMismatch {
                expected: self.params.shape().to_vec(),
                found: new_params.shape().to_vec(),
            });
        }
        let logits = new_params
            .into_dimensionality::<Ix1>()
            .map_err(|e| BtaiError::InvalidParameters(e.to_string()))?;
        self.params = softmax(logits.view());
        Ok(())
    }

    /// Shannon entropy `−Σ p ln p` (zero entries contribute nothing).
    #[must_use]
    pub fn entropy(&self) -> f64 {
        entropy(self.params.view())
    }
}
