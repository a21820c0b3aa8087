//! Random-variable nodes and their handles.

use std::fmt;

use super::arena::Key;
use crate::distributions::{Categorical, Distribution};

/// Handle to a variable of a [`FactorGraph`](super::FactorGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) Key);

/// Handle to a factor of a [`FactorGraph`](super::FactorGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactorId(pub(crate) Key);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for FactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}.{}", self.0.index(), self.0.generation())
    }
}

/// Whether a variable is inferred or clamped to evidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarKind {
    Hidden,
    Observed,
}

/// Per-node bookkeeping used by tree search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeStats {
    /// Number of backups that passed through the node
    pub visits: usize,
    /// Accumulated cost (lower is better)
    pub cost: f64,
    /// Action that created the node, if it was created by an expansion
    pub action: Option<usize>,
    /// Set when the node can no longer be expanded or selected
    pub pruned: bool,
}

/// A random variable.
///
/// The defining factor and the factors it feeds are maintained by the graph;
/// the distributions and tree statistics are free for algorithms to update.
#[derive(Clone, Debug)]
pub struct VarNode {
    /// Hidden or observed
    pub kind: VarKind,
    /// Name matched against evidence files
    pub name: Option<String>,
    /// Fixed parameters of the defining factor, `None` when they are learned
    pub prior: Option<Distribution>,
    /// Current belief, or the evidence for observed variables
    pub posterior: Distribution,
    /// Preferred distribution, only set inside planning
    pub biased: Option<Distribution>,
    /// Tree-search scratch data
    pub stats: TreeStats,
    pub(super) parent: Option<FactorId>,
    pub(super) children: Vec<FactorId>,
}

impl VarNode {
    /// Creates a hidden variable with the given parameters and a uniform
    /// posterior over `n_states` outcomes.
    pub(super) fn hidden(prior: Option<Distribution>, n_states: usize) -> Self {
        Self::with_posterior(prior, Categorical::uniform(n_states).into())
    }

    pub(super) fn with_posterior(prior: Option<Distribution>, posterior: Distribution) -> Self {
        Self {
            kind: VarKind::Hidden,
            name: None,
            prior,
            posterior,
            biased: None,
            stats: TreeStats::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Factor defining this variable.
    #[must_use]
    pub const fn parent(&self) -> Option<FactorId> {
        self.parent
    }

    /// Factors for which this variable is a parent.
    #[must_use]
    pub fn children(&self) -> &[FactorId] {
        &self.children
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.kind == VarKind::Hidden
    }

    /// Number of outcomes of the posterior (size of axis 0).
    #[must_use]
    pub fn n_states(&self) -> usize {
        self.posterior.params().shape().first().copied().unwrap_or(0)
    }
}
