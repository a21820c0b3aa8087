//! Branching-time active inference.
//!
//! A discrete active-inference agent built from three pieces:
//! - a factor graph over categorical and Dirichlet random variables
//! - variational message passing (VMP) to infer hidden states
//! - tree search over hypothetical futures to pick actions
//!
//! # Mathematical Foundation
//!
//! Variational free energy of the approximate posterior `Q`:
//! ```text
//! F = E_Q[ln Q(x) − ln P(o, x)] = Σ_factors ( −H[Q(child)] − E_Q[ln P(child | parents)] )
//! ```
//!
//! Expected free energy of a hypothetical future state:
//! ```text
//! G = KL[Q(o) ‖ C(o)] + E_Q(s)[ H[P(o | s)] ]
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]

pub mod agent;
pub mod distributions;
pub mod environment;
pub mod error;
pub mod graph;
pub mod inference;
pub mod math;
pub mod params;
pub mod planning;

pub use error::{BtaiError, Result};
