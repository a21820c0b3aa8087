//! Discrete variational inference.
//!
//! # Mathematical Foundation
//!
//! Variational Free Energy, summed over the factors defining the variables:
//! ```text
//! F = Σ_factors ( −H[Q(child)] − E_Q[ln P(child | parents)] )
//! ```
//!
//! Belief update (coordinate ascent, one hidden variable at a time):
//! ```text
//! Q(x) = softmax( Σ_{f ∈ adjacent(x)} m_{f→x} )
//! ```
//!
//! Expected Free Energy for planning:
//! ```text
//! G = Risk + Ambiguity
//! ```

mod free_energy;
mod vmp;

pub use free_energy::{ambiguity, ambiguity_uct, expected_free_energy, risk};
pub use vmp::{inference, variational_free_energy, InferenceReport, VmpConfig};
