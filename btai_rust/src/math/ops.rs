//! Tensor helpers and divergences.
//!
//! All probability tensors are normalized along axis 0, so "column" below
//! means one lane along that axis.

use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView1, ArrayViewD, ArrayViewMut1, Axis, IxDyn};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::{Error as WeightError, WeightedIndex};

use super::special::{digamma, ln_gamma};
use crate::error::{BtaiError, Result};
use crate::params::LOG_FLOOR;

/// Logarithm with probabilities floored at `LOG_FLOOR`.
///
/// Keeps `0 · ln 0` terms finite inside contractions.
#[inline]
#[must_use]
pub fn safe_ln(p: f64) -> f64 {
    p.max(LOG_FLOOR).ln()
}

/// Normalized exponential of one lane, in place.
///
/// Degenerate input (all `-inf`, NaN, or an underflowing sum) falls back to
/// the uniform distribution.
fn softmax_lane(mut lane: ArrayViewMut1<'_, f64>) {
    let n = lane.len();
    if n == 0 {
        return;
    }
    let uniform = 1.0 / n as f64;
    let max = lane.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        lane.fill(uniform);
        return;
    }

    lane.mapv_inplace(|v| (v - max).exp());
    let sum = lane.sum();
    if sum > 0.0 && sum.is_finite() {
        lane /= sum;
    } else {
        lane.fill(uniform);
    }
}

/// Softmax of a vector.
#[must_use]
pub fn softmax(x: ArrayView1<'_, f64>) -> Array1<f64> {
    let mut out = x.to_owned();
    softmax_lane(out.view_mut());
    out
}

/// Softmax of every column (lane along axis 0) of a tensor of any rank.
#[must_use]
pub fn softmax_columns(x: ArrayViewD<'_, f64>) -> ArrayD<f64> {
    let mut out = x.to_owned();
    if out.ndim() == 0 {
        return out;
    }
    for lane in out.lanes_mut(Axis(0)) {
        softmax_lane(lane);
    }
    out
}

/// One-hot vector of length `size` with a 1 at `index`.
pub fn one_hot(size: usize, index: usize) -> Result<Array1<f64>> {
    if index >= size {
        return Err(BtaiError::IndexOutOfRange { index, size });
    }
    let mut v = Array1::zeros(size);
    v[index] = 1.0;
    Ok(v)
}

/// Uniform distribution over `n` outcomes.
#[must_use]
pub fn uniform_vector(n: usize) -> Array1<f64> {
    if n == 0 {
        return Array1::zeros(0);
    }
    Array1::from_elem(n, 1.0 / n as f64)
}

/// Tensor of the given shape whose columns are uniform distributions.
#[must_use]
pub fn uniform(shape: &[usize]) -> ArrayD<f64> {
    match shape.first() {
        Some(&n) if n > 0 => ArrayD::from_elem(IxDyn(shape), 1.0 / n as f64),
        _ => ArrayD::zeros(IxDyn(shape)),
    }
}

/// Outer product `out[i, j] = a[i] · b[j]`.
#[must_use]
pub fn outer2(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

/// Outer product `out[i, j, k] = a[i] · b[j] · c[k]`.
#[must_use]
pub fn outer3(
    a: ArrayView1<'_, f64>,
    b: ArrayView1<'_, f64>,
    c: ArrayView1<'_, f64>,
) -> Array3<f64> {
    Array3::from_shape_fn((a.len(), b.len(), c.len()), |(i, j, k)| a[i] * b[j] * c[k])
}

/// Shannon entropy of a probability vector, skipping zero entries.
#[must_use]
pub fn entropy(p: ArrayView1<'_, f64>) -> f64 {
    -p.iter().filter(|&&x| x > 0.0).map(|&x| x * x.ln()).sum::<f64>()
}

/// `KL[p ‖ q] = Σ p · (ln p − ln q)` for probability vectors.
pub fn kl_categorical(p: ArrayView1<'_, f64>, q: ArrayView1<'_, f64>) -> Result<f64> {
    if p.len() != q.len() {
        return Err(BtaiError::ShapeMismatch {
            expected: vec![p.len()],
            found: vec![q.len()],
        });
    }
    Ok(p.iter()
        .zip(q.iter())
        .filter(|&(&pi, _)| pi > 0.0)
        .map(|(&pi, &qi)| pi * (pi.ln() - safe_ln(qi)))
        .sum())
}

/// Closed-form KL divergence between Dirichlet tensors, summed over columns.
///
/// ```text
/// KL[Dir(p) ‖ Dir(q)] = ln Γ(p₀) − ln Γ(q₀)
///                     + Σₖ [ ln Γ(qₖ) − ln Γ(pₖ) + (pₖ − qₖ)(ψ(pₖ) − ψ(p₀)) ]
/// ```
pub fn kl_dirichlet(p: ArrayViewD<'_, f64>, q: ArrayViewD<'_, f64>) -> Result<f64> {
    if p.shape() != q.shape() {
        return Err(BtaiError::ShapeMismatch {
            expected: p.shape().to_vec(),
            found: q.shape().to_vec(),
        });
    }
    if p.ndim() == 0 {
        return Ok(0.0);
    }

    let mut kl = 0.0;
    for (pc, qc) in p.lanes(Axis(0)).into_iter().zip(q.lanes(Axis(0))) {
        let p0 = pc.sum();
        let q0 = qc.sum();
        let psi_p0 = digamma(p0)?;
        kl += ln_gamma(p0) - ln_gamma(q0);
        for (&pk, &qk) in pc.iter().zip(qc.iter()) {
            kl += ln_gamma(qk) - ln_gamma(pk) + (pk - qk) * (digamma(pk)? - psi_p0);
        }
    }
    Ok(kl)
}

/// Draws an index with probability proportional to `weights`.
///
/// When every weight is zero the draw is uniform. Empty, negative or
/// non-finite weights are rejected.
pub fn sample_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<usize> {
    if let Some(&w) = weights.iter().find(|w| !w.is_finite()) {
        return Err(BtaiError::InvalidParameters(format!(
            "sampling weight {w} is not finite"
        )));
    }
    match WeightedIndex::<f64>::new(weights) {
        Ok(dist) => Ok(dist.sample(rng)),
        Err(WeightError::InsufficientNonZero) => Ok(rng.random_range(0..weights.len())),
        Err(WeightError::InvalidInput) => Err(BtaiError::InvalidParameters(
            "cannot sample from an empty weight vector".into(),
        )),
        Err(e) => Err(BtaiError::InvalidParameters(format!(
            "sampling weights {weights:?}: {e}"
        ))),
    }
}
