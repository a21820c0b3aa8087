//! Special functions used by Dirichlet entropy and divergence.
//!
//! # Digamma
//!
//! ```text
//! ψ(x) ≈ −γ − 1/x + ζ(2)·x                               x ≤ 1e-6
//! ψ(x) = ψ(x + 1) − 1/x                                  recurrence until x ≥ 8.5
//! ψ(x) ≈ ln x − 1/(2x) − 1/(12x²) + 1/(120x⁴) − …        asymptotic series
//! ```
//!
//! # Multivariate beta
//!
//! ```text
//! ln B(α) = Σₖ ln Γ(αₖ) − ln Γ(Σₖ αₖ)
//! ```

use ndarray::ArrayView1;

use crate::error::{BtaiError, Result};
use crate::params::{DIGAMMA_ASYMPTOTIC, DIGAMMA_SMALL, EULER_MASCHERONI, ZETA_TWO};

/// Natural logarithm of the gamma function.
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    statrs::function::gamma::ln_gamma(x)
}

/// Digamma function ψ(x), the derivative of ln Γ(x).
///
/// Fails for non-positive (or NaN) arguments.
pub fn digamma(x: f64) -> Result<f64> {
    if x.is_nan() || x <= 0.0 {
        return Err(BtaiError::DomainError {
            function: "digamma",
            value: x,
        });
    }
    if x <= DIGAMMA_SMALL {
        return Ok(-EULER_MASCHERONI - 1.0 / x + ZETA_TWO * x);
    }

    let mut x = x;
    let mut result = 0.0;
    while x < DIGAMMA_ASYMPTOTIC {
        result -= 1.0 / x;
        x += 1.0;
    }

    let r = 1.0 / x;
    let r2 = r * r;
    result += x.ln()
        - 0.5 * r
        - r2 * (1.0 / 12.0
            - r2 * (1.0 / 120.0 - r2 * (1.0 / 252.0 - r2 * (1.0 / 240.0 - r2 / 132.0))));
    Ok(result)
}

/// Logarithm of the multivariate beta function.
#[must_use]
pub fn log_beta(alpha: ArrayView1<'_, f64>) -> f64 {
    let sum_ln_gamma: f64 = alpha.iter().map(|&a| ln_gamma(a)).sum();
    sum_ln_gamma - ln_gamma(alpha.sum())
}

/// Multivariate beta function.
#[must_use]
pub fn beta(alpha: ArrayView1<'_, f64>) -> f64 {
    log_beta(alpha).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_digamma_reference_values() {
        assert!((digamma(1.0).unwrap() + EULER_MASCHERONI).abs() < 1e-10);
        assert!((digamma(2.0).unwrap() - (1.0 - EULER_MASCHERONI)).abs() < 1e-10);
        assert!((digamma(0.3458).unwrap() + 3.0103).abs() < 1e-4);
        assert!((digamma(10.0).unwrap() - 2.251_752_589_066_721).abs() < 1e-10);
    }

    #[test]
    fn test_digamma_recurrence() {
        for &x in &[0.1, 0.7, 3.2, 8.4, 8.6, 25.0] {
            let lhs = digamma(x + 1.0).unwrap();
            let rhs = digamma(x).unwrap() + 1.0 / x;
            assert!((lhs - rhs).abs() < 1e-9, "ψ(x+1) != ψ(x) + 1/x at {}", x);
        }
    }

    #[test]
    fn test_digamma_small_argument_series() {
        let x = 1e-7;
        let value = digamma(x).unwrap();
        assert!((value - (-EULER_MASCHERONI - 1.0 / x + ZETA_TWO * x)).abs() < 1e-6);
    }

    #[test]
    fn test_digamma_rejects_non_positive() {
        assert!(matches!(
            digamma(0.0),
            Err(BtaiError::DomainError { function: "digamma", .. })
        ));
        assert!(digamma(-1.5).is_err());
        assert!(digamma(f64::NAN).is_err());
    }

    #[test]
    fn test_beta_reference_values() {
        assert!((beta(array![1.5, 0.2].view()) - 4.477_609_374_347).abs() < 1e-9);
        assert!((beta(array![2.0, 2.0].view()) - 1.0 / 6.0).abs() < 1e-12);
        assert!((beta(array![0.01, 3.5].view()) - 98.340_093_400_3).abs() < 1e-7);
    }

    #[test]
    fn test_log_beta_matches_beta() {
        let alpha = array![0.5, 1.5, 2.5];
        assert!((log_beta(alpha.view()).exp() - beta(alpha.view())).abs() < 1e-12);
    }
}
