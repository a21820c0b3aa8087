//! Probability distributions attached to factors and variables.
//!
//! Four kinds exist, wrapped in the tagged [`Distribution`] enum:
//! - [`Categorical`]: a vector of probabilities
//! - [`Transition`]: `P(to | from)`, a matrix normalized per column
//! - [`ActiveTransition`]: `P(to | from, action)`, one matrix per action
//! - [`Dirichlet`]: positive pseudo-counts over the columns of one of the above

mod categorical;
mod dirichlet;
mod transition;

use std::fmt;

use ndarray::{ArrayD, ArrayView1, ArrayViewD};

pub use categorical::Categorical;
pub use dirichlet::Dirichlet;
pub use transition::{ActiveTransition, Transition};

use crate::error::{BtaiError, Result};
use crate::math::{kl_categorical, kl_dirichlet};

/// Tag identifying the kind of a distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DistributionKind {
    Categorical,
    Transition,
    ActiveTransition,
    Dirichlet,
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Categorical => "categorical",
            Self::Transition => "transition",
            Self::ActiveTransition => "active transition",
            Self::Dirichlet => "Dirichlet",
        };
        f.write_str(name)
    }
}

/// A distribution of any kind.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Distribution {
    Categorical(Categorical),
    Transition(Transition),
    ActiveTransition(ActiveTransition),
    Dirichlet(Dirichlet),
}

impl Distribution {
    #[must_use]
    pub const fn kind(&self) -> DistributionKind {
        match self {
            Self::Categorical(_) => DistributionKind::Categorical,
            Self::Transition(_) => DistributionKind::Transition,
            Self::ActiveTransition(_) => DistributionKind::ActiveTransition,
            Self::Dirichlet(_) => DistributionKind::Dirichlet,
        }
    }

    /// Parameters as a tensor of dynamic rank.
    #[must_use]
    pub fn params(&self) -> ArrayViewD<'_, f64> {
        match self {
            Self::Categorical(d) => d.params().view().into_dyn(),
            Self::Transition(d) => d.params().view().into_dyn(),
            Self::ActiveTransition(d) => d.params().view().into_dyn(),
            Self::Dirichlet(d) => d.params().view(),
        }
    }

    /// Element-wise logarithm of the parameters.
    #[must_use]
    pub fn log_params(&self) -> ArrayD<f64> {
        match self {
            Self::Categorical(d) => d.log_params().into_dyn(),
            Self::Transition(d) => d.log_params().into_dyn(),
            Self::ActiveTransition(d) => d.log_params().into_dyn(),
            Self::Dirichlet(d) => d.log_params(),
        }
    }

    /// Replaces the parameters.
    ///
    /// Probability tensors store the softmax of `new_params` (per column);
    /// Dirichlet counts are stored as given.
    pub fn update_params(&mut self, new_params: ArrayD<f64>) -> Result<()> {
        match self {
            Self::Categorical(d) => d.update_params(new_params),
            Self::Transition(d) => d.update_params(new_params),
            Self::ActiveTransition(d) => d.update_params(new_params),
            Self::Dirichlet(d) => d.update_params(new_params),
        }
    }

    /// Entropy of the distribution.
    ///
    /// Conditional distributions have no marginal entropy and fail with
    /// [`BtaiError::UnsupportedKind`].
    pub fn entropy(&self) -> Result<f64> {
        match self {
            Self::Categorical(d) => Ok(d.entropy()),
            Self::Dirichlet(d) => d.entropy(),
            Self::Transition(_) | Self::ActiveTransition(_) => Err(BtaiError::UnsupportedKind {
                operation: "entropy",
                kind: self.kind(),
            }),
        }
    }

    #[must_use]
    pub const fn as_categorical(&self) -> Option<&Categorical> {
        match self {
            Self::Categorical(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_dirichlet(&self) -> Option<&Dirichlet> {
        match self {
            Self::Dirichlet(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dirichlet_mut(&mut self) -> Option<&mut Dirichlet> {
        match self {
            Self::Dirichlet(d) => Some(d),
            _ => None,
        }
    }

    /// Parameters as a probability vector, for categorical distributions only.
    pub fn probabilities(&self) -> Result<ArrayView1<'_, f64>> {
        self.as_categorical()
            .map(|c| c.params().view())
            .ok_or(BtaiError::UnsupportedKind {
                operation: "probabilities",
                kind: self.kind(),
            })
    }
}

impl From<Categorical> for Distribution {
    fn from(d: Categorical) -> Self {
        Self::Categorical(d)
    }
}

impl From<Transition> for Distribution {
    fn from(d: Transition) -> Self {
        Self::Transition(d)
    }
}

impl From<ActiveTransition> for Distribution {
    fn from(d: ActiveTransition) -> Self {
        Self::ActiveTransition(d)
    }
}

impl From<Dirichlet> for Distribution {
    fn from(d: Dirichlet) -> Self {
        Self::Dirichlet(d)
    }
}

/// Kullback-Leibler divergence `KL[d1 ‖ d2]`.
///
/// Both arguments must be of the same kind, and only categorical and
/// Dirichlet distributions are supported.
pub fn kl(d1: &Distribution, d2: &Distribution) -> Result<f64> {
    match (d1, d2) {
        (Distribution::Categorical(p), Distribution::Categorical(q)) => {
            kl_categorical(p.params().view(), q.params().view())
        }
        (Distribution::Dirichlet(p), Distribution::Dirichlet(q)) => {
            kl_dirichlet(p.params().view(), q.params().view())
        }
        _ if d1.kind() != d2.kind() => Err(BtaiError::KindMismatch {
            left: d1.kind(),
            right: d2.kind(),
        }),
        _ => Err(BtaiError::UnsupportedKind {
            operation: "KL divergence",
            kind: d1.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_kind_and_params_view() {
        let d = Distribution::from(Categorical::new(array![0.25, 0.75]));
        assert_eq!(d.kind(), DistributionKind::Categorical);
        assert_eq!(d.params().shape(), &[2]);

        let t = Distribution::from(Transition::new(Array2::from_elem((3, 2), 1.0 / 3.0)));
        assert_eq!(t.kind(), DistributionKind::Transition);
        assert_eq!(t.params().shape(), &[3, 2]);
    }

    #[test]
    fn test_entropy_unsupported_for_transitions() {
        let t = Distribution::from(Transition::new(Array2::from_elem((2, 2), 0.5)));
        assert!(matches!(
            t.entropy(),
            Err(BtaiError::UnsupportedKind {
                operation: "entropy",
                kind: DistributionKind::Transition
            })
        ));
    }

    #[test]
    fn test_kl_dispatch() {
        let p = Distribution::from(Categorical::new(array![0.5, 0.5]));
        assert!(kl(&p, &p).unwrap().abs() < 1e-12);

        let d = Distribution::from(Dirichlet::new(array![0.5, 0.5].into_dyn()).unwrap());
        assert!(matches!(
            kl(&p, &d),
            Err(BtaiError::KindMismatch {
                left: DistributionKind::Categorical,
                right: DistributionKind::Dirichlet
            })
        ));

        let t = Distribution::from(Transition::new(Array2::from_elem((2, 2), 0.5)));
        assert!(matches!(kl(&t, &t), Err(BtaiError::UnsupportedKind { .. })));
    }

    #[test]
    fn test_update_params_through_enum() {
        let mut d = Distribution::from(Categorical::uniform(2));
        d.update_params(array![0.0, 100.0].into_dyn()).unwrap();
        assert!(d.params()[[1]] > 0.999);

        let mut dir = Distribution::from(Dirichlet::new(array![1.0, 1.0].into_dyn()).unwrap());
        dir.update_params(array![2.0, 5.0].into_dyn()).unwrap();
        assert_eq!(dir.params()[[1]], 5.0);
    }
}
