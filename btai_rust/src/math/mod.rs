//! Numeric utilities shared by distributions, inference and planning.
//!
//! This module provides:
//! - Special functions (digamma, log-gamma, multivariate beta)
//! - Tensor helpers (softmax, one-hot, uniform, outer products)
//! - Divergences between categorical and Dirichlet parameters

mod ops;
mod special;

pub use ops::{
    entropy, kl_categorical, kl_dirichlet, one_hot, outer2, outer3, safe_ln, sample_index,
    softmax, softmax_columns, uniform, uniform_vector,
};
pub use special::{beta, digamma, ln_gamma, log_beta};
