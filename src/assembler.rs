//! Linear aeroelastic system assembler
//!
//! The aerodynamic and structural subsystems are interconnected in a feedback loop where the
//! structural displacements and velocities drive the aerodynamic lattice and the aerodynamic
//! forces drive the structure:
//! ```text
//!        +-------+  forces   +------+
//!   ---->| UVLM  |---------->| Beam |---+--> [q; dq]
//!        +-------+           +------+   |
//!            ^                          |
//!            +--------------------------+
//! ```
//! The joint state vector is the aerodynamic state vector followed by the structural one,
//! see [`StatePartition`].

use crate::{
    beam::{BeamError, LinearBeam, Structure},
    error::{Advisory, AdvisoryKind, Outcome},
    gains::{AeroelasticGains, GainsError, Linearisation},
    io,
    scaling::ScalingFactors,
    settings::{Coordinates, RigidTimeScaling, Settings},
    state_space::{self, couple, Reduction, StateSpace, StateSpaceError, Target},
    uvlm::LinearUvlm,
    AeroelasticError,
};
use nalgebra as na;
use rayon::prelude::*;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

type Result<T> = std::result::Result<T, AeroelasticError>;
type Matrix = na::DMatrix<f64>;

/// Coupling gains
#[derive(Debug, Clone, PartialEq)]
pub struct Couplings {
    /// lattice forces to structural forces, `None` if the aerodynamic model was loaded
    pub ksa: Option<Matrix>,
    /// structural displacements and velocities to lattice displacements and velocities, `None`
    /// if the aerodynamic model was loaded
    pub kas: Option<Matrix>,
    /// nodal to modal coordinates of the aerodynamic inputs
    pub in_mode: Option<Matrix>,
    /// nodal to modal coordinates of the aerodynamic outputs
    pub out_mode: Option<Matrix>,
    /// beam outputs to aerodynamic inputs
    pub tas: Matrix,
    /// aerodynamic outputs to beam inputs
    pub tsa: Matrix,
}

/// Slices of the aeroelastic state vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePartition {
    pub aero: Range<usize>,
    pub beam: Range<usize>,
}
impl StatePartition {
    fn new(n_aero: usize, n_beam: usize) -> Self {
        Self {
            aero: 0..n_aero,
            beam: n_aero..n_aero + n_beam,
        }
    }
}

/// Joint system spectral radius at a given reference speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stability {
    pub speed: f64,
    pub spectral_radius: f64,
}
impl Stability {
    pub fn is_stable(&self) -> bool {
        self.spectral_radius < 1f64
    }
}

/// Input and output gains projecting the nodal aerodynamic model onto the modes `phi`
///
/// The input gain maps the modal coordinates and velocities (followed by the external inputs) to
/// the nodal ones divided by the reference `length`; the external inputs are passed through.
/// The external channels (gusts, control surfaces) are not divided by `length`, so external
/// inputs of a non-dimensional aerodynamic model must already be scaled.
/// The output gain is $`\Phi^T`$.
pub fn modal_projection(phi: &Matrix, n_inputs: usize, length: f64) -> Result<(Matrix, Matrix)> {
    let (num_dof, num_modes) = phi.shape();
    let n_ext = n_inputs.checked_sub(2 * num_dof).ok_or_else(|| {
        AeroelasticError::Unsupported(format!(
            "{} aerodynamic inputs cannot be projected onto {} modes of {} DOFs",
            n_inputs, num_modes, num_dof
        ))
    })?;
    let phi_l = phi / length;
    let in_mode = state_space::block_diag(&[&phi_l, &phi_l, &Matrix::identity(n_ext, n_ext)]);
    Ok((in_mode, phi.transpose()))
}

/// [`LinearAeroelastic`] builder
#[derive(Default)]
pub struct LinearAeroelasticBuilder {
    settings: Option<Settings>,
    uvlm: Option<StateSpace>,
    structure: Option<Structure>,
    linearisation: Option<Box<dyn Linearisation>>,
    rom: Option<Box<dyn Reduction>>,
}
impl LinearAeroelasticBuilder {
    pub fn settings(self, settings: Settings) -> Self {
        Self {
            settings: Some(settings),
            ..self
        }
    }
    /// Discrete aerodynamic state space model
    pub fn uvlm(self, uvlm: StateSpace) -> Self {
        Self {
            uvlm: Some(uvlm),
            ..self
        }
    }
    pub fn structure(self, structure: Structure) -> Self {
        Self {
            structure: Some(structure),
            ..self
        }
    }
    /// Source of the aeroelastic gains
    pub fn linearisation(self, linearisation: impl Linearisation + 'static) -> Self {
        Self {
            linearisation: Some(Box::new(linearisation)),
            ..self
        }
    }
    /// Aerodynamic model reduction, replaces the one given in the settings
    pub fn rom(self, rom: impl Reduction + 'static) -> Self {
        Self {
            rom: Some(Box::new(rom)),
            ..self
        }
    }
    pub fn build(self) -> Result<LinearAeroelastic> {
        let settings = self
            .settings
            .ok_or_else(|| AeroelasticError::MissingArguments("settings".to_owned()))?;
        settings.validate()?;
        let (ss, uvlm_loaded) = match &settings.uvlm_filename {
            Some(path) => (io::load_state_space(path)?, true),
            None => (
                self.uvlm.ok_or_else(|| {
                    AeroelasticError::MissingArguments("UVLM state space".to_owned())
                })?,
                false,
            ),
        };
        let uvlm = LinearUvlm::new(ss, &settings.aero_settings)?;
        let uvlm = match self.rom {
            Some(rom) => uvlm.with_rom(rom),
            None => uvlm,
        };
        let structure = self
            .structure
            .ok_or_else(|| AeroelasticError::MissingArguments("structure".to_owned()))?;
        let beam = LinearBeam::new(structure, settings.beam_settings.clone())?;
        let linearisation = self
            .linearisation
            .ok_or_else(|| AeroelasticError::MissingArguments("linearisation".to_owned()))?;
        Ok(LinearAeroelastic {
            scaling: settings.scaling(),
            settings,
            uvlm,
            uvlm_loaded,
            beam,
            linearisation,
            assembly: None,
        })
    }
}

/// Result of the assembly
#[derive(Debug, Clone)]
struct Assembly {
    gains: AeroelasticGains,
    beam: LinearBeam,
    aero: StateSpace,
    couplings: Couplings,
    ss: StateSpace,
    partition: StatePartition,
}

/// Rebuilds the beam in the time scale `t_ref` and couples it with the aerodynamic model
fn recouple(
    beam: &mut LinearBeam,
    aero: &StateSpace,
    couplings: &Couplings,
    t_ref: f64,
) -> Result<StateSpace> {
    let dt = aero
        .dt()
        .ok_or_else(|| StateSpaceError::Continuous("the aerodynamic model".to_owned()))?;
    beam.set_time_scale(t_ref);
    let beam_ss = beam.assemble(dt)?;
    Ok(couple(aero, beam_ss, &couplings.tas, &couplings.tsa)?)
}

/// Linear aeroelastic system
pub struct LinearAeroelastic {
    settings: Settings,
    scaling: ScalingFactors,
    uvlm: LinearUvlm,
    uvlm_loaded: bool,
    beam: LinearBeam,
    linearisation: Box<dyn Linearisation>,
    assembly: Option<Assembly>,
}
impl LinearAeroelastic {
    pub fn builder() -> LinearAeroelasticBuilder {
        LinearAeroelasticBuilder::default()
    }
    /// Assembles the aeroelastic system
    ///
    /// The aeroelastic gains are recomputed, the aerodynamic stiffness and damping are added to
    /// the structural ones, the aerodynamic model is projected onto the structural degrees of
    /// freedom and both systems are coupled.
    pub fn assemble(&mut self) -> Result<Outcome<StateSpace>> {
        let mut advisories = vec![];
        let gains = self.linearisation.gains()?;
        for (name, gain) in gains.named() {
            log::debug!("{}: {:?}", name, gain.shape());
        }
        let num_dof = self.beam.num_dof();
        if gains.num_dof() != num_dof {
            return Err(GainsError::Shape {
                name: "structural DOFs".to_owned(),
                expected: (num_dof, num_dof),
                found: (gains.num_dof(), gains.num_dof()),
            }
            .into());
        }
        let (flex, rigid) = (gains.num_dof_flex, gains.num_dof_rig);

        let mut beam = self
            .beam
            .add_aerodynamic_terms(&gains.stiffness(), &gains.damping())?;
        beam.set_time_scale(self.scaling.time);
        let beam_ss = beam.assemble(self.uvlm.dt())?.clone();

        let (aero, ksa, kas, in_mode, out_mode) = if self.uvlm_loaded {
            let advisory = Advisory::new(
                AdvisoryKind::LoadedProjection,
                "the aerodynamic model read from file is assumed projected onto the structure",
            );
            log::warn!("{}", advisory);
            advisories.push(advisory);
            (self.uvlm.ss().clone(), None, None, None, None)
        } else {
            let uvlm = self.uvlm.ss();
            let n_zeta = gains.n_zeta();
            let n_ext = uvlm.n_inputs().checked_sub(2 * n_zeta).ok_or_else(|| {
                GainsError::Shape {
                    name: "Kdisp".to_owned(),
                    expected: (uvlm.n_inputs() / 2, num_dof),
                    found: gains.kdisp.shape(),
                }
            })?;
            let kas = state_space::block_diag(&[
                &state_space::block(&[
                    &[&gains.kdisp, &gains.kdisp_vel],
                    &[&gains.kvel_disp, &gains.kvel_vel],
                ]),
                &Matrix::identity(n_ext, n_ext),
            ]);
            let ksa = gains.kforces.clone();
            log::debug!("Kas: {:?}, Ksa: {:?}", kas.shape(), ksa.shape());
            let mut aero = uvlm
                .add_gain(&kas, Target::Input)?
                .add_gain(&ksa, Target::Output)?;
            let beam_settings = &self.settings.beam_settings;
            let (in_mode, out_mode) = if beam_settings.modal_projection
                && beam_settings.inout_coords == Coordinates::Modes
            {
                let phi = beam.modes().ok_or(BeamError::NoModes)?;
                let (in_mode, out_mode) =
                    modal_projection(phi, aero.n_inputs(), self.scaling.length)?;
                aero = aero
                    .add_gain(&in_mode, Target::Input)?
                    .add_gain(&out_mode, Target::Output)?;
                (Some(in_mode), Some(out_mode))
            } else {
                (None, None)
            };
            if let Some(rom) = self.uvlm.rom() {
                aero = aero.reduce(rom)?;
            }
            (aero, Some(ksa), Some(kas), in_mode, out_mode)
        };
        log::info!(
            "Aerodynamic model projected onto the structure: {} states, {} inputs, {} outputs",
            aero.n_states(),
            aero.n_inputs(),
            aero.n_outputs()
        );

        let scaling = &self.scaling;
        let mut tas = Matrix::identity(aero.n_inputs(), beam_ss.n_outputs());
        let tsa = Matrix::identity(beam_ss.n_inputs(), aero.n_outputs())
            * (scaling.force * scaling.time * scaling.time);
        if rigid > 0 {
            if scaling.time != 1f64 {
                let message = format!(
                    "time scaling (t_ref={}) is not supported with {} rigid body DOFs",
                    scaling.time, rigid
                );
                match self.settings.rigid_time_scaling {
                    RigidTimeScaling::Reject => return Err(AeroelasticError::Unsupported(message)),
                    RigidTimeScaling::Warn => {
                        let advisory = Advisory::new(AdvisoryKind::RigidTimeScaling, &message);
                        log::warn!("{}", advisory);
                        advisories.push(advisory);
                    }
                }
            }
            let (nrows, ncols) = tas.shape();
            let k = flex + 3;
            let mut flexible = tas.view_mut((0, 0), (k.min(nrows), k.min(ncols)));
            flexible /= scaling.length;
            let (start, end) = (num_dof.min(nrows), (num_dof + k).min(nrows));
            let mut velocities = tas.view_mut((start, 0), (end - start, ncols));
            velocities /= scaling.length;
        } else if !self.settings.beam_settings.modal_projection {
            tas /= scaling.length;
        }
        let couplings = Couplings {
            ksa,
            kas,
            in_mode,
            out_mode,
            tas,
            tsa,
        };
        log::debug!("Tas: {:?}, Tsa: {:?}", couplings.tas.shape(), couplings.tsa.shape());

        let ss = couple(&aero, &beam_ss, &couplings.tas, &couplings.tsa)?;
        let partition = StatePartition::new(aero.n_states(), beam_ss.n_states());
        log::info!("Aeroelastic system: {}", ss);
        self.assembly = Some(Assembly {
            gains,
            beam,
            aero,
            couplings,
            ss: ss.clone(),
            partition,
        });
        Ok(Outcome::new(ss, advisories))
    }
    /// Updates the aeroelastic system for a new reference speed
    ///
    /// Only the beam is rebuilt in the new time scale, the aerodynamic model and the coupling
    /// gains are reused.
    pub fn update(&mut self, speed: f64) -> Result<StateSpace> {
        if !(speed.is_finite() && speed > 0f64) {
            return Err(AeroelasticError::Speed(speed));
        }
        let assembly = self
            .assembly
            .as_mut()
            .ok_or(AeroelasticError::NotAssembled)?;
        let scaling = self.scaling.with_speed(speed);
        log::info!(
            "Updating the aeroelastic system at {}m/s (t_ref={:e})",
            speed,
            scaling.time
        );
        let ss = recouple(
            &mut assembly.beam,
            &assembly.aero,
            &assembly.couplings,
            scaling.time,
        )?;
        assembly.ss = ss.clone();
        self.scaling = scaling;
        Ok(ss)
    }
    /// Spectral radius of the aeroelastic system for each reference speed
    ///
    /// The assembled system is left untouched.
    pub fn sweep(&self, speeds: &[f64]) -> Result<Vec<Stability>> {
        let assembly = self
            .assembly
            .as_ref()
            .ok_or(AeroelasticError::NotAssembled)?;
        if let Some(speed) = speeds.iter().find(|v| !(v.is_finite() && **v > 0f64)) {
            return Err(AeroelasticError::Speed(*speed));
        }
        let scaling = self.scaling;
        speeds
            .par_iter()
            .map(|&speed| -> Result<Stability> {
                let mut beam = assembly.beam.clone();
                let ss = recouple(
                    &mut beam,
                    &assembly.aero,
                    &assembly.couplings,
                    scaling.with_speed(speed).time,
                )?;
                Ok(Stability {
                    speed,
                    spectral_radius: ss.spectral_radius(),
                })
            })
            .collect()
    }
    /// Saves the projected aerodynamic model
    pub fn save_uvlm<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let assembly = self
            .assembly
            .as_ref()
            .ok_or(AeroelasticError::NotAssembled)?;
        Ok(io::save_state_space(&assembly.aero, path)?)
    }
    fn assembly(&self) -> Result<&Assembly> {
        self.assembly.as_ref().ok_or(AeroelasticError::NotAssembled)
    }
    /// Aeroelastic state space model
    pub fn ss(&self) -> Result<&StateSpace> {
        Ok(&self.assembly()?.ss)
    }
    pub fn couplings(&self) -> Result<&Couplings> {
        Ok(&self.assembly()?.couplings)
    }
    pub fn partition(&self) -> Result<&StatePartition> {
        Ok(&self.assembly()?.partition)
    }
    pub fn gains(&self) -> Result<&AeroelasticGains> {
        Ok(&self.assembly()?.gains)
    }
    /// Projected aerodynamic model
    pub fn aero(&self) -> Result<&StateSpace> {
        Ok(&self.assembly()?.aero)
    }
    /// Beam with the aerodynamic terms
    pub fn beam(&self) -> Result<&LinearBeam> {
        Ok(&self.assembly()?.beam)
    }
    /// Beam without the aerodynamic terms
    pub fn structure(&self) -> &LinearBeam {
        &self.beam
    }
    pub fn uvlm(&self) -> &LinearUvlm {
        &self.uvlm
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    /// Scaling factors at the current reference speed
    pub fn scaling(&self) -> &ScalingFactors {
        &self.scaling
    }
}
