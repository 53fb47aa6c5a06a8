//! This module is used to build, transform and interconnect linear time invariant state space models
//!
//! A discrete state space model is given by
//! $$
//! x\[k+1\] = A x\[k\] + B u\[k\]
//! $$
//! $$
//! y\[k\] = C x\[k\] + D u\[k\]
//! $$
//! and its continuous counterpart by $`\dot x = Ax + Bu`$, $`y = Cx + Du`$.
//!
//! Models are values: [`StateSpace::add_gain`], [`couple`], [`StateSpace::discretise`] and
//! [`StateSpace::reduce`] all return a new model and leave their arguments untouched.

use nalgebra as na;
use num_complex::Complex;
use std::fmt;
use thiserror::Error;

pub mod bilinear;
#[doc(inline)]
pub use bilinear::Bilinear;
pub mod exponential;
#[doc(inline)]
pub use exponential::Exponential;
pub mod reduction;
#[doc(inline)]
pub use reduction::{BalancedTruncation, Reduction};

#[derive(Error, Debug)]
pub enum StateSpaceError {
    #[error("{context}: expected a {expected:?} matrix, found {found:?}")]
    Dimension {
        context: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("time steps do not match: {0:?} and {1:?}")]
    TimeStep(Option<f64>, Option<f64>),
    #[error("invalid time step: {0}")]
    InvalidTimeStep(f64),
    #[error("singular matrix: {0}")]
    Singular(String),
    #[error("{0} requires a discrete time model")]
    Continuous(String),
    #[error("{0} requires a continuous time model")]
    Discrete(String),
    #[error("model reduction failed: {0}")]
    Reduction(String),
}

type Result<T> = std::result::Result<T, StateSpaceError>;
type Matrix = na::DMatrix<f64>;

/// Checks that `matrix` is `expected` rows by columns
pub fn check_shape(context: &str, matrix: &Matrix, expected: (usize, usize)) -> Result<()> {
    if matrix.shape() == expected {
        Ok(())
    } else {
        Err(StateSpaceError::Dimension {
            context: context.to_owned(),
            expected,
            found: matrix.shape(),
        })
    }
}

/// Assembles a block matrix from rows of blocks
///
/// The height of each row of blocks is given by its first block and the width of each column of
/// blocks by the first row.
pub fn block(rows: &[&[&Matrix]]) -> Matrix {
    let nrows: usize = rows.iter().map(|row| row[0].nrows()).sum();
    let ncols: usize = rows
        .first()
        .map_or(0, |row| row.iter().map(|m| m.ncols()).sum());
    let mut out = Matrix::zeros(nrows, ncols);
    let mut i = 0;
    for row in rows {
        let mut j = 0;
        for m in row.iter() {
            if m.nrows() > 0 && m.ncols() > 0 {
                out.view_mut((i, j), m.shape()).copy_from(*m);
            }
            j += m.ncols();
        }
        i += row[0].nrows();
    }
    out
}

/// Assembles a block diagonal matrix
pub fn block_diag(blocks: &[&Matrix]) -> Matrix {
    let nrows: usize = blocks.iter().map(|m| m.nrows()).sum();
    let ncols: usize = blocks.iter().map(|m| m.ncols()).sum();
    let mut out = Matrix::zeros(nrows, ncols);
    let (mut i, mut j) = (0, 0);
    for m in blocks {
        if m.nrows() > 0 && m.ncols() > 0 {
            out.view_mut((i, j), m.shape()).copy_from(*m);
        }
        i += m.nrows();
        j += m.ncols();
    }
    out
}

/// Side of a model a gain is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// the gain maps new inputs to the current inputs: $`u = K u'`$
    Input,
    /// the gain maps the current outputs to new outputs: $`y' = K y`$
    Output,
}

/// Continuous to discrete transformation of a state space model
pub trait Discretisation {
    /// Returns the discrete model sampled at `dt`
    fn discretise(ss: &StateSpace, dt: f64) -> Result<StateSpace>;
}

/// Linear time invariant state space model
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpace {
    a: Matrix,
    b: Matrix,
    c: Matrix,
    d: Matrix,
    dt: Option<f64>,
}
impl StateSpace {
    /// Creates a new state space model, `dt` is `None` for a continuous model
    pub fn new(a: Matrix, b: Matrix, c: Matrix, d: Matrix, dt: Option<f64>) -> Result<Self> {
        let n = a.nrows();
        check_shape("state matrix A", &a, (n, n))?;
        check_shape("input matrix B", &b, (n, b.ncols()))?;
        check_shape("output matrix C", &c, (c.nrows(), n))?;
        check_shape("feedthrough matrix D", &d, (c.nrows(), b.ncols()))?;
        if let Some(dt) = dt {
            if !(dt.is_finite() && dt > 0f64) {
                return Err(StateSpaceError::InvalidTimeStep(dt));
            }
        }
        Ok(Self { a, b, c, d, dt })
    }
    /// Creates a new discrete state space model with the sampling time `dt`
    pub fn discrete(a: Matrix, b: Matrix, c: Matrix, d: Matrix, dt: f64) -> Result<Self> {
        Self::new(a, b, c, d, Some(dt))
    }
    /// Creates a new continuous state space model
    pub fn continuous(a: Matrix, b: Matrix, c: Matrix, d: Matrix) -> Result<Self> {
        Self::new(a, b, c, d, None)
    }
    pub fn a(&self) -> &Matrix {
        &self.a
    }
    pub fn b(&self) -> &Matrix {
        &self.b
    }
    pub fn c(&self) -> &Matrix {
        &self.c
    }
    pub fn d(&self) -> &Matrix {
        &self.d
    }
    /// Sampling time, `None` for a continuous model
    pub fn dt(&self) -> Option<f64> {
        self.dt
    }
    pub fn is_discrete(&self) -> bool {
        self.dt.is_some()
    }
    pub fn n_states(&self) -> usize {
        self.a.nrows()
    }
    pub fn n_inputs(&self) -> usize {
        self.b.ncols()
    }
    pub fn n_outputs(&self) -> usize {
        self.c.nrows()
    }
    /// Applies a static gain to either the inputs or the outputs of the model
    ///
    /// On the input side the gain rows must match the number of inputs and the model inputs
    /// become the gain columns ($`B'=BK`$, $`D'=DK`$). On the output side the gain columns must
    /// match the number of outputs and the model outputs become the gain rows
    /// ($`C'=KC`$, $`D'=KD`$).
    pub fn add_gain(&self, gain: &Matrix, target: Target) -> Result<Self> {
        match target {
            Target::Input => {
                check_shape("input gain", gain, (self.n_inputs(), gain.ncols()))?;
                Ok(Self {
                    a: self.a.clone(),
                    b: &self.b * gain,
                    c: self.c.clone(),
                    d: &self.d * gain,
                    dt: self.dt,
                })
            }
            Target::Output => {
                check_shape("output gain", gain, (gain.nrows(), self.n_outputs()))?;
                Ok(Self {
                    a: self.a.clone(),
                    b: self.b.clone(),
                    c: gain * &self.c,
                    d: gain * &self.d,
                    dt: self.dt,
                })
            }
        }
    }
    /// Returns the model discretised at `dt` with the method `T`
    pub fn discretise<T: Discretisation>(&self, dt: f64) -> Result<Self> {
        if self.is_discrete() {
            return Err(StateSpaceError::Discrete("discretisation".to_owned()));
        }
        if !(dt.is_finite() && dt > 0f64) {
            return Err(StateSpaceError::InvalidTimeStep(dt));
        }
        T::discretise(self, dt)
    }
    /// Returns a reduced order model
    pub fn reduce(&self, rom: &dyn Reduction) -> Result<Self> {
        let reduced = rom.run(self)?;
        check_shape(
            "reduced order model D",
            &reduced.d,
            (self.n_outputs(), self.n_inputs()),
        )?;
        log::info!(
            "Model order reduced from {} down to {} states",
            self.n_states(),
            reduced.n_states()
        );
        Ok(reduced)
    }
    /// Eigen values of the state matrix
    pub fn eigenvalues(&self) -> Vec<Complex<f64>> {
        if self.n_states() == 0 {
            return vec![];
        }
        self.a.complex_eigenvalues().iter().cloned().collect()
    }
    /// Largest eigen value modulus of the state matrix
    pub fn spectral_radius(&self) -> f64 {
        self.eigenvalues()
            .iter()
            .map(|l| l.norm())
            .fold(0f64, f64::max)
    }
    /// Asymptotic stability: eigen values inside the unit circle for a discrete model or in the
    /// left half plane for a continuous one
    pub fn is_stable(&self) -> bool {
        match self.dt {
            Some(_) => self.spectral_radius() < 1f64,
            None => self.eigenvalues().iter().all(|l| l.re < 0f64),
        }
    }
    /// Steady state gain
    pub fn dc_gain(&self) -> Result<Matrix> {
        let n = self.n_states();
        let m = match self.dt {
            Some(_) => Matrix::identity(n, n) - &self.a,
            None => -&self.a,
        };
        let x = m
            .lu()
            .solve(&self.b)
            .ok_or_else(|| StateSpaceError::Singular("steady state gain".to_owned()))?;
        Ok(&self.c * x + &self.d)
    }
}

/// Couples 2 state space models in a feedback loop
///
/// The inputs of each model are driven by the outputs of the other one and by external inputs:
/// $`u_1 = K_{12} y_2 + v_1`$ and $`u_2 = K_{21} y_1 + v_2`$.
/// The coupled model state vector is $`[x_1; x_2]`$, the inputs $`[v_1; v_2]`$ and the outputs
/// $`[y_1; y_2]`$. The algebraic loop through the feedthrough matrices is solved exactly.
pub fn couple(ss1: &StateSpace, ss2: &StateSpace, k12: &Matrix, k21: &Matrix) -> Result<StateSpace> {
    let dt = match (ss1.dt, ss2.dt) {
        (Some(dt1), Some(dt2)) if (dt1 - dt2).abs() < 1e-10 * dt1 => Some(dt1),
        (None, None) => None,
        (dt1, dt2) => return Err(StateSpaceError::TimeStep(dt1, dt2)),
    };
    check_shape("coupling gain K12", k12, (ss1.n_inputs(), ss2.n_outputs()))?;
    check_shape("coupling gain K21", k21, (ss2.n_inputs(), ss1.n_outputs()))?;
    let (a1, b1, c1, d1) = (&ss1.a, &ss1.b, &ss1.c, &ss1.d);
    let (a2, b2, c2, d2) = (&ss2.a, &ss2.b, &ss2.c, &ss2.d);
    let (nu1, nu2) = (ss1.n_inputs(), ss2.n_inputs());

    let k11 = k12 * d2 * k21;
    let k22 = k21 * d1 * k12;
    let l1_inv = (Matrix::identity(nu1, nu1) - k11 * d1)
        .try_inverse()
        .ok_or_else(|| StateSpaceError::Singular("I - K12 D2 K21 D1".to_owned()))?;
    let l2_inv = (Matrix::identity(nu2, nu2) - k22 * d2)
        .try_inverse()
        .ok_or_else(|| StateSpaceError::Singular("I - K21 D1 K12 D2".to_owned()))?;
    let l1_inv_k12 = &l1_inv * k12;
    let l2_inv_k21 = &l2_inv * k21;

    // u1 and u2 as functions of [x1; x2] and [v1; v2]
    let u1_x1 = &l1_inv_k12 * d2 * k21 * c1;
    let u1_x2 = &l1_inv_k12 * c2;
    let u1_v2 = &l1_inv_k12 * d2;
    let u2_x1 = &l2_inv_k21 * c1;
    let u2_x2 = &l2_inv_k21 * d1 * k12 * c2;
    let u2_v1 = &l2_inv_k21 * d1;

    let a = block(&[
        &[&(a1 + b1 * &u1_x1), &(b1 * &u1_x2)],
        &[&(b2 * &u2_x1), &(a2 + b2 * &u2_x2)],
    ]);
    let b = block(&[
        &[&(b1 * &l1_inv), &(b1 * &u1_v2)],
        &[&(b2 * &u2_v1), &(b2 * &l2_inv)],
    ]);
    let c = block(&[
        &[&(c1 + d1 * &u1_x1), &(d1 * &u1_x2)],
        &[&(d2 * &u2_x1), &(c2 + d2 * &u2_x2)],
    ]);
    let d = block(&[
        &[&(d1 * &l1_inv), &(d1 * &u1_v2)],
        &[&(d2 * &u2_v1), &(d2 * &l2_inv)],
    ]);
    log::debug!(
        "coupled {}x{} and {}x{} models",
        ss1.n_outputs(),
        ss1.n_inputs(),
        ss2.n_outputs(),
        ss2.n_inputs()
    );
    StateSpace::new(a, b, c, d, dt)
}

impl fmt::Display for StateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r##"
StateSpace:
 - time step: {}
 - states : {}
 - inputs : {}
 - outputs: {}
"##,
            self.dt
                .map_or("continuous".to_owned(), |dt| format!("{:e}", dt)),
            self.n_states(),
            self.n_inputs(),
            self.n_outputs()
        )
    }
}
