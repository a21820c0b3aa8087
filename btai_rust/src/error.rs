//! Error type shared by distributions, the factor graph, inference and planning.

use std::io;

use thiserror::Error;

use crate::distributions::DistributionKind;
use crate::graph::{FactorId, VarId};

/// Failures surfaced to the immediate caller.
///
/// All of them are configuration or programming errors: nothing here is
/// transient, and no operation retries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BtaiError {
    /// New parameters do not have the shape of the ones they replace.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The operation has no meaning for this kind of distribution.
    #[error("{operation} is not supported for {kind} distributions")]
    UnsupportedKind {
        operation: &'static str,
        kind: DistributionKind,
    },

    /// A binary operation received two different kinds of distribution.
    #[error("cannot compare a {left} distribution with a {right} distribution")]
    KindMismatch {
        left: DistributionKind,
        right: DistributionKind,
    },

    /// A message was requested for a variable the factor does not touch.
    #[error("variable {var} is not adjacent to this {kind} factor")]
    NotAdjacent { var: VarId, kind: DistributionKind },

    /// The variable handle was removed from the graph (or never existed).
    #[error("stale variable handle {0}")]
    StaleVar(VarId),

    /// The factor handle was removed from the graph (or never existed).
    #[error("stale factor handle {0}")]
    StaleFactor(FactorId),

    /// Every action of the node already has a branch.
    #[error("no unexplored action left for variable {0}")]
    NoUnexploredAction(VarId),

    /// The node sits at the configured maximum depth of the tree.
    #[error("maximum tree depth {depth} reached")]
    MaxDepthReached { depth: usize },

    /// The node is not a descendant of the tree root.
    #[error("variable {0} is not part of the planning tree")]
    NotInTree(VarId),

    /// The tree root has no action-bearing children to choose from.
    #[error("the tree root has no expanded children")]
    EmptyTree,

    /// Evaluation was requested before any expansion took place.
    #[error("no expanded nodes to evaluate")]
    NothingToEvaluate,

    /// The factor graph has no tree root.
    #[error("the factor graph has no tree root")]
    MissingTreeRoot,

    /// A special function was evaluated outside its domain.
    #[error("{function} is undefined at {value}")]
    DomainError { function: &'static str, value: f64 },

    /// Parameters violate a distribution's constraints.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// An index does not fit the dimension it addresses.
    #[error("index {index} out of range for size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// An evidence line is not `<name> <index>`.
    #[error("malformed evidence on line {line}: {content:?}")]
    EvidenceFormat { line: usize, content: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BtaiError>;
