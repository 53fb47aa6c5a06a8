//! Linear structural beam model
//!
//! The beam equations of motion are written in the non-dimensional time $`\hat t = t/t_{ref}`$
//! ```math
//! M \ddot q + t_{ref} C \dot q + t_{ref}^2 K q = \hat F
//! ```
//! where the derivatives are taken with respect to $`\hat t`$ and the forces $`\hat F`$ are
//! scaled by $`t_{ref}^2`$.
//! The state vector is $`x = [q; \dot q]`$ in nodal coordinates or $`x = [\eta; \dot\eta]`$ with
//! $`q = \Phi\eta`$ when the beam is projected onto its modes.

use crate::{
    settings::{BeamSettings, Coordinates, DiscretisationMethod},
    state_space::{self, Bilinear, Exponential, StateSpace, StateSpaceError},
};
use nalgebra as na;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BeamError {
    #[error("beam state space: {0}")]
    StateSpace(#[from] StateSpaceError),
    #[error("the mass matrix is not positive definite")]
    MassNotPositiveDefinite,
    #[error("singular {0} matrix")]
    Singular(String),
    #[error("modal projection requested without modes")]
    NoModes,
    #[error("{context}: expected {expected:?}, found {found:?}")]
    Dimension {
        context: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("the beam state space has not been assembled")]
    NotAssembled,
}
type Result<T> = std::result::Result<T, BeamError>;
type Matrix = na::DMatrix<f64>;

fn check_shape(context: &str, matrix: &Matrix, expected: (usize, usize)) -> Result<()> {
    if matrix.shape() == expected {
        Ok(())
    } else {
        Err(BeamError::Dimension {
            context: context.to_owned(),
            expected,
            found: matrix.shape(),
        })
    }
}

/// Structural matrices
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub mass: Matrix,
    pub damping: Matrix,
    pub stiffness: Matrix,
    /// Mode shapes as columns, computed from the mass and stiffness if `None`
    pub modes: Option<Matrix>,
}
impl Structure {
    pub fn new(mass: Matrix, damping: Matrix, stiffness: Matrix) -> Self {
        Self {
            mass,
            damping,
            stiffness,
            modes: None,
        }
    }
    pub fn with_modes(self, modes: Matrix) -> Self {
        Self {
            modes: Some(modes),
            ..self
        }
    }
    pub fn num_dof(&self) -> usize {
        self.mass.nrows()
    }
}

/// Mass normalised modes and natural frequencies `[rd/s]` of `K φ = ω² M φ`, sorted by
/// increasing frequency
pub fn normal_modes(mass: &Matrix, stiffness: &Matrix) -> Result<(Matrix, Vec<f64>)> {
    let l = mass
        .clone()
        .cholesky()
        .ok_or(BeamError::MassNotPositiveDefinite)?
        .l();
    let l_inv = l
        .try_inverse()
        .ok_or_else(|| BeamError::Singular("mass Cholesky factor".to_owned()))?;
    let k = &l_inv * stiffness * l_inv.transpose();
    let eig = ((&k + k.transpose()) * 0.5).symmetric_eigen();
    let mut idx: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    idx.sort_by(|&i, &j| eig.eigenvalues[i].total_cmp(&eig.eigenvalues[j]));
    let frequencies = idx
        .iter()
        .map(|&i| eig.eigenvalues[i].max(0f64).sqrt())
        .collect();
    let modes = l_inv.transpose() * eig.eigenvectors.select_columns(&idx);
    Ok((modes, frequencies))
}

/// Structural subsystem
#[derive(Debug, Clone)]
pub struct LinearBeam {
    mass: Matrix,
    damping: Matrix,
    stiffness: Matrix,
    modes: Option<Matrix>,
    frequencies: Vec<f64>,
    settings: BeamSettings,
    t_ref: f64,
    ss: Option<StateSpace>,
}
impl LinearBeam {
    /// Creates the beam model
    ///
    /// With modal projection the modes are computed if the structure has none and truncated to
    /// `num_modes`
    pub fn new(structure: Structure, settings: BeamSettings) -> Result<Self> {
        let n = structure.num_dof();
        check_shape("mass", &structure.mass, (n, n))?;
        check_shape("damping", &structure.damping, (n, n))?;
        check_shape("stiffness", &structure.stiffness, (n, n))?;
        let (modes, frequencies) = match (structure.modes, settings.modal_projection) {
            (Some(modes), _) => {
                if modes.nrows() != n {
                    return Err(BeamError::Dimension {
                        context: "modes".to_owned(),
                        expected: (n, modes.ncols()),
                        found: modes.shape(),
                    });
                }
                let frequencies = modes
                    .column_iter()
                    .map(|phi| {
                        let k = (phi.transpose() * &structure.stiffness * phi)[(0, 0)];
                        let m = (phi.transpose() * &structure.mass * phi)[(0, 0)];
                        (k / m).max(0f64).sqrt()
                    })
                    .collect();
                (Some(modes), frequencies)
            }
            (None, true) => {
                let (modes, frequencies) = normal_modes(&structure.mass, &structure.stiffness)?;
                (Some(modes), frequencies)
            }
            (None, false) => (None, vec![]),
        };
        let (modes, frequencies) = match (modes, settings.num_modes) {
            (Some(modes), Some(num_modes)) if num_modes < modes.ncols() => (
                Some(modes.columns(0, num_modes).into_owned()),
                frequencies.into_iter().take(num_modes).collect(),
            ),
            (modes, _) => (modes, frequencies),
        };
        if let Some(modes) = &modes {
            log::info!("Beam: {} DOFs, {} modes", n, modes.ncols());
        } else {
            log::info!("Beam: {} DOFs", n);
        }
        Ok(Self {
            mass: structure.mass,
            damping: structure.damping,
            stiffness: structure.stiffness,
            modes,
            frequencies,
            settings,
            t_ref: 1f64,
            ss: None,
        })
    }
    pub fn num_dof(&self) -> usize {
        self.mass.nrows()
    }
    pub fn num_modes(&self) -> usize {
        self.modes.as_ref().map_or(0, |modes| modes.ncols())
    }
    pub fn modes(&self) -> Option<&Matrix> {
        self.modes.as_ref()
    }
    /// Natural frequencies `[rd/s]`
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }
    pub fn settings(&self) -> &BeamSettings {
        &self.settings
    }
    pub fn mass(&self) -> &Matrix {
        &self.mass
    }
    pub fn damping(&self) -> &Matrix {
        &self.damping
    }
    pub fn stiffness(&self) -> &Matrix {
        &self.stiffness
    }
    pub fn t_ref(&self) -> f64 {
        self.t_ref
    }
    /// Returns a new beam with the aerodynamic stiffness and damping added to the structural ones
    pub fn add_aerodynamic_terms(&self, stiffness: &Matrix, damping: &Matrix) -> Result<Self> {
        let n = self.num_dof();
        check_shape("aerodynamic stiffness", stiffness, (n, n))?;
        check_shape("aerodynamic damping", damping, (n, n))?;
        Ok(Self {
            stiffness: &self.stiffness + stiffness,
            damping: &self.damping + damping,
            ss: None,
            ..self.clone()
        })
    }
    /// Sets the reference time used to write the equations of motion in non-dimensional time
    pub fn set_time_scale(&mut self, t_ref: f64) {
        self.t_ref = t_ref;
        self.ss = None;
    }
    /// Continuous state space model
    pub fn continuous(&self) -> Result<StateSpace> {
        let t = self.t_ref;
        let (m, c, k) = match (&self.modes, self.settings.modal_projection) {
            (Some(phi), true) => (
                phi.transpose() * &self.mass * phi,
                phi.transpose() * &self.damping * phi,
                phi.transpose() * &self.stiffness * phi,
            ),
            (None, true) => return Err(BeamError::NoModes),
            (_, false) => (
                self.mass.clone(),
                self.damping.clone(),
                self.stiffness.clone(),
            ),
        };
        let n = m.nrows();
        let m_inv = m
            .try_inverse()
            .ok_or_else(|| BeamError::Singular("mass".to_owned()))?;
        let a = state_space::block(&[
            &[&Matrix::zeros(n, n), &Matrix::identity(n, n)],
            &[&(-&m_inv * &k * (t * t)), &(-&m_inv * &c * t)],
        ]);
        let zeros = Matrix::zeros(n, n);
        let ss = match (&self.modes, self.settings.modal_projection, self.settings.inout_coords) {
            (Some(phi), true, Coordinates::Nodes) => {
                let nodal = self.num_dof();
                StateSpace::continuous(
                    a,
                    state_space::block(&[&[&Matrix::zeros(n, nodal)], &[&(&m_inv * phi.transpose())]]),
                    state_space::block_diag(&[phi, phi]),
                    Matrix::zeros(2 * nodal, nodal),
                )?
            }
            _ => StateSpace::continuous(
                a,
                state_space::block(&[&[&zeros], &[&m_inv]]),
                Matrix::identity(2 * n, 2 * n),
                Matrix::zeros(2 * n, n),
            )?,
        };
        Ok(ss)
    }
    /// Builds the discrete state space model at the sampling time `dt`
    pub fn assemble(&mut self, dt: f64) -> Result<&StateSpace> {
        let continuous = self.continuous()?;
        let ss = match self.settings.discretisation {
            DiscretisationMethod::Exponential => continuous.discretise::<Exponential>(dt)?,
            DiscretisationMethod::Bilinear => continuous.discretise::<Bilinear>(dt)?,
        };
        log::info!(
            "Beam state space: {} states, {} inputs, {} outputs (t_ref={:e}, dt={:e})",
            ss.n_states(),
            ss.n_inputs(),
            ss.n_outputs(),
            self.t_ref,
            dt
        );
        Ok(self.ss.insert(ss))
    }
    /// Discrete state space model
    pub fn ss(&self) -> Result<&StateSpace> {
        self.ss.as_ref().ok_or(BeamError::NotAssembled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn oscillator(omega: f64) -> Structure {
        Structure::new(
            Matrix::identity(1, 1),
            Matrix::zeros(1, 1),
            Matrix::from_element(1, 1, omega * omega),
        )
    }

    fn two_dof() -> Structure {
        Structure::new(
            Matrix::from_diagonal(&na::DVector::from_vec(vec![1., 2.])),
            Matrix::zeros(2, 2),
            Matrix::from_row_slice(2, 2, &[3., -1., -1., 1.]),
        )
    }

    #[test]
    fn oscillator_transition_matrix() {
        let omega = 3f64;
        let dt = 0.01;
        let mut beam = LinearBeam::new(oscillator(omega), BeamSettings::default()).unwrap();
        let ss = beam.assemble(dt).unwrap();
        let (s, c) = (omega * dt).sin_cos();
        assert_relative_eq!(ss.a()[(0, 0)], c, epsilon = 1e-10);
        assert_relative_eq!(ss.a()[(0, 1)], s / omega, epsilon = 1e-10);
        assert_relative_eq!(ss.a()[(1, 0)], -omega * s, epsilon = 1e-10);
        assert_eq!(ss.n_inputs(), 1);
        assert_eq!(ss.n_outputs(), 2);
    }

    #[test]
    fn time_scale() {
        let mut beam = LinearBeam::new(oscillator(2.), BeamSettings::default()).unwrap();
        beam.set_time_scale(0.5);
        let ss = beam.continuous().unwrap();
        assert_relative_eq!(ss.a()[(1, 0)], -4. * 0.25, epsilon = 1e-12);
        assert!(matches!(beam.ss(), Err(BeamError::NotAssembled)));
    }

    #[test]
    fn bilinear_discretisation() {
        let structure = Structure::new(
            Matrix::identity(1, 1),
            Matrix::from_element(1, 1, 0.4),
            Matrix::from_element(1, 1, 4.),
        );
        let settings = BeamSettings {
            discretisation: DiscretisationMethod::Bilinear,
            ..Default::default()
        };
        let mut tustin = LinearBeam::new(structure.clone(), settings).unwrap();
        let mut zoh = LinearBeam::new(structure, BeamSettings::default()).unwrap();
        let ss = tustin.assemble(0.05).unwrap().clone();
        let dc = ss.dc_gain().unwrap();
        assert_relative_eq!(dc[(0, 0)], 0.25, epsilon = 1e-10);
        assert_relative_eq!(dc[(1, 0)], 0., epsilon = 1e-10);
        // Tustin has a feedthrough, zero order hold has none
        assert!(ss.d().norm() > 0.);
        let zoh = zoh.assemble(0.05).unwrap();
        assert_eq!(zoh.d().norm(), 0.);
        assert_relative_eq!(zoh.dc_gain().unwrap(), dc, epsilon = 1e-9);
    }

    #[test]
    fn mass_normalised_modes() {
        let s = two_dof();
        let (phi, omega) = normal_modes(&s.mass, &s.stiffness).unwrap();
        assert_relative_eq!(
            phi.transpose() * &s.mass * &phi,
            Matrix::identity(2, 2),
            epsilon = 1e-10
        );
        let k = phi.transpose() * &s.stiffness * &phi;
        assert_relative_eq!(k[(0, 0)], omega[0] * omega[0], epsilon = 1e-10);
        assert_relative_eq!(k[(1, 1)], omega[1] * omega[1], epsilon = 1e-10);
        assert!(omega[0] <= omega[1]);
    }

    #[test]
    fn modal_projection_shapes() {
        let settings = BeamSettings {
            modal_projection: true,
            num_modes: Some(1),
            ..Default::default()
        };
        let mut beam = LinearBeam::new(two_dof(), settings.clone()).unwrap();
        assert_eq!(beam.num_modes(), 1);
        let s = two_dof();
        let (_, omega) = normal_modes(&s.mass, &s.stiffness).unwrap();
        assert_eq!(beam.frequencies().len(), 1);
        assert_relative_eq!(beam.frequencies()[0], omega[0], epsilon = 1e-12);
        let ss = beam.assemble(0.1).unwrap();
        assert_eq!((ss.n_states(), ss.n_inputs(), ss.n_outputs()), (2, 2, 4));
        let mut beam = LinearBeam::new(
            two_dof(),
            BeamSettings {
                inout_coords: Coordinates::Modes,
                ..settings
            },
        )
        .unwrap();
        let ss = beam.assemble(0.1).unwrap();
        assert_eq!((ss.n_states(), ss.n_inputs(), ss.n_outputs()), (2, 1, 2));
    }

    #[test]
    fn aerodynamic_terms() {
        let beam = LinearBeam::new(oscillator(1.), BeamSettings::default()).unwrap();
        let stiffer = beam
            .add_aerodynamic_terms(&Matrix::from_element(1, 1, 3.), &Matrix::from_element(1, 1, 0.1))
            .unwrap();
        assert_eq!(stiffer.stiffness()[(0, 0)], 4.);
        assert_eq!(stiffer.damping()[(0, 0)], 0.1);
        assert_eq!(beam.stiffness()[(0, 0)], 1.);
        assert!(beam
            .add_aerodynamic_terms(&Matrix::zeros(2, 2), &Matrix::zeros(1, 1))
            .is_err());
    }

    #[test]
    fn singular_mass() {
        let s = Structure::new(Matrix::zeros(1, 1), Matrix::zeros(1, 1), Matrix::identity(1, 1));
        assert!(matches!(
            LinearBeam::new(
                s,
                BeamSettings {
                    modal_projection: true,
                    ..Default::default()
                }
            ),
            Err(BeamError::MassNotPositiveDefinite)
        ));
    }
}
