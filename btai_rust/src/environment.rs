//! The world the agent acts in.
//!
//! An environment exposes its generative model (`A`, `B`, `D`) and returns a
//! one-hot observation for every executed action.

use ndarray::{Array1, Array2, Array3};

use crate::error::{BtaiError, Result};
use crate::math::one_hot;

/// Discrete environment with a known generative model.
pub trait Environment {
    fn n_actions(&self) -> usize;

    fn n_states(&self) -> usize;

    fn n_observations(&self) -> usize;

    /// Likelihood `P(o | s)`, shape `[obs, state]`.
    fn a(&self) -> &Array2<f64>;

    /// Transition `P(s' | s, u)`, shape `[to, from, action]`.
    fn b(&self) -> &Array3<f64>;

    /// Prior over the initial state.
    fn d(&self) -> &Array1<f64>;

    /// Restarts the episode and returns the first observation.
    fn reset(&mut self) -> Array1<f64>;

    /// Performs `action` and returns the resulting one-hot observation.
    fn execute(&mut self, action: usize) -> Result<Array1<f64>>;

    /// Whether the goal has been reached.
    fn solved(&self) -> bool;
}

/// Moves in a one-dimensional corridor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    Left = 0,
    Right = 1,
    Stay = 2,
}

impl Move {
    pub const ALL: [Self; 3] = [Self::Left, Self::Right, Self::Stay];

    /// Cell reached from `cell` in a corridor of `length` cells.
    #[must_use]
    pub fn apply(self, cell: usize, length: usize) -> usize {
        match self {
            Self::Left => cell.saturating_sub(1),
            Self::Right => (cell + 1).min(length - 1),
            Self::Stay => cell,
        }
    }
}

impl TryFrom<usize> for Move {
    type Error = BtaiError;

    fn try_from(action: usize) -> Result<Self> {
        Self::ALL
            .get(action)
            .copied()
            .ok_or(BtaiError::IndexOutOfRange {
                index: action,
                size: Self::ALL.len(),
            })
    }
}

/// Fully observable corridor; the agent starts in the first cell and must
/// reach the last one.
///
/// Walls are absorbing: moving into one leaves the agent in place.
#[derive(Clone, Debug)]
pub struct Corridor {
    length: usize,
    position: usize,
    a: Array2<f64>,
    b: Array3<f64>,
    d: Array1<f64>,
}

impl Corridor {
    /// Creates a corridor of `length` cells, at least two.
    pub fn new(length: usize) -> Result<Self> {
        if length < 2 {
            return Err(BtaiError::InvalidParameters(format!(
                "a corridor needs at least two cells, got {length}"
            )));
        }
        let mut b = Array3::zeros((length, length, Move::ALL.len()));
        for (k, step) in Move::ALL.iter().enumerate() {
            for from in 0..length {
                b[[step.apply(from, length), from, k]] = 1.0;
            }
        }
        Ok(Self {
            length,
            position: 0,
            a: Array2::eye(length),
            b,
            d: one_hot(length, 0)?,
        })
    }

    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn goal(&self) -> usize {
        self.length - 1
    }

    /// Raw preferences: minus the distance to the goal.
    #[must_use]
    pub fn preferences(&self) -> Array1<f64> {
        let goal = self.goal();
        (0..self.length).map(|cell| -((goal - cell) as f64)).collect()
    }

    fn observe(&self) -> Array1<f64> {
        self.a.column(self.position).to_owned()
    }
}

impl Environment for Corridor {
    fn n_actions(&self) -> usize {
        Move::ALL.len()
    }

    fn n_states(&self) -> usize {
        self.length
    }

    fn n_observations(&self) -> usize {
        self.length
    }

    fn a(&self) -> &Array2<f64> {
        &self.a
    }

    fn b(&self) -> &Array3<f64> {
        &self.b
    }

    fn d(&self) -> &Array1<f64> {
        &self.d
    }

    fn reset(&mut self) -> Array1<f64> {
        self.position = 0;
        self.observe()
    }

    fn execute(&mut self, action: usize) -> Result<Array1<f64>> {
        let step = Move::try_from(action)?;
        self.position = step.apply(self.position, self.length);
        Ok(self.observe())
    }

    fn solved(&self) -> bool {
        self.position == self.goal()
    }
}
