//! Tree search over hypothetical futures.
//!
//! Two planners share the per-node statistics stored on each variable
//! (visits, cost, originating action, pruned flag):
//! - [`AlgoTree`]: one action branch per expansion, with pluggable node
//!   selection, evaluation, propagation and action selection
//! - [`MCTSPlanner`]: UCT descent, all actions expanded at once, action drawn
//!   from a softmax over average costs
//!
//! # Mathematical Foundation
//!
//! ```text
//! DOUBLE_KL = KL[Q(s) ‖ C(s)] + KL[Q(o) ‖ C(o)]
//! EFE       = KL[Q(o) ‖ C(o)] + E_Q(s)[ H[P(o | s)] ]
//! UCT       = −cost/visits + C · sqrt( ln(parent visits) / visits )
//! ```

mod config;
mod evaluation;
mod mcts;
mod tree;

pub use config::{
    ActionSelection, AlgoTreeConfig, Evaluation, MctsConfig, NodeSelection, Propagation,
};
pub use evaluation::{double_kl, efe, evaluate, uct};
pub use mcts::{ActionDetail, MCTSPlanner};
pub use tree::AlgoTree;
