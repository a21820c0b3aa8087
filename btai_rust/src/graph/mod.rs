//! Factor graph: variables, factors, and the operations that grow and prune
//! the graph during planning.
//!
//! Nodes live in generation-checked arenas inside [`FactorGraph`] and refer to
//! each other through [`VarId`] and [`FactorId`] handles.

mod arena;
mod evidence;
mod factor;
mod factor_graph;
mod integrate;
mod node;

pub use factor::Factor;
pub use factor_graph::FactorGraph;
pub use integrate::action_prior;
pub use node::{FactorId, TreeStats, VarId, VarKind, VarNode};
