//! Numerical constants and default hyperparameters.

// Special functions
pub const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;
pub const ZETA_TWO: f64 = 1.644_934_066_848_226_4; // π²/6
pub const DIGAMMA_SMALL: f64 = 1e-6; // Series around zero below this
pub const DIGAMMA_ASYMPTOTIC: f64 = 8.5; // Recurrence target for the Stirling series

/// Probabilities are floored here before taking logarithms.
pub const LOG_FLOOR: f64 = 1e-16;

// Variational message passing
pub const VMP_EPSILON: f64 = 0.01;
pub const VMP_MAX_ITER: usize = usize::MAX;

/// Prior mass on the executed action when a time step is integrated.
pub const ACTION_CONFIDENCE: f64 = 0.9;

// Tree search
pub const PLANNING_STEPS: usize = 150;
pub const EXPLORATION_CONSTANT: f64 = 2.4;
pub const PREFERENCE_PRECISION: f64 = 3.0;
pub const ACTION_PRECISION: f64 = 1.0;
pub const PROPAGATION_DISCOUNT: f64 = 0.9;
