//! # Linear aeroelastic assembler
//!
//! Couples the linear discrete-time state space model of an unsteady vortex lattice (UVLM)
//! aerodynamic model with the linear state space model of a flexible beam.
//!
//! The aerodynamic model is usually written in non-dimensional form (see [`scaling`]), the beam
//! is assembled in the same non-dimensional time so that both systems share the same time step.
//! The aerodynamic inputs and outputs are projected onto the structural degrees of freedom
//! (nodal or modal, see [`gains`]) before both systems are interconnected with [`state_space::couple`].
//!
//! # Example
//! ```no_run
//! use aeroela::{LinearAeroelastic, Settings, io, beam::Structure, gains::ReferenceState};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_pickle("data/settings.pkl")?;
//!     let uvlm = io::load_state_space("data/uvlm.pkl")?;
//!     let structure: Structure = io::load_structure("data/beam.pkl")?;
//!     let reference: ReferenceState = io::load_reference_state("data/reference.pkl")?;
//!     let mut aeroelastic = LinearAeroelastic::builder()
//!         .settings(settings)
//!         .uvlm(uvlm)
//!         .structure(structure)
//!         .linearisation(reference)
//!         .build()?;
//!     let assembly = aeroelastic.assemble()?;
//!     println!("{}", assembly.value);
//!     let faster = aeroelastic.update(120.)?;
//!     println!("stable at 120m/s: {}", faster.is_stable());
//!     Ok(())
//! }
//! ```

pub mod assembler;
pub mod beam;
pub mod error;
pub mod gains;
pub mod io;
pub mod scaling;
pub mod settings;
pub mod state_space;
pub mod uvlm;

#[doc(inline)]
pub use assembler::{
    Couplings, LinearAeroelastic, LinearAeroelasticBuilder, Stability, StatePartition,
};
#[doc(inline)]
pub use error::{Advisory, AdvisoryKind, Outcome};
#[doc(inline)]
pub use scaling::ScalingFactors;
#[doc(inline)]
pub use settings::Settings;
#[doc(inline)]
pub use state_space::{couple, StateSpace, Target};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AeroelasticError {
    #[error("state space: {0}")]
    StateSpace(#[from] state_space::StateSpaceError),
    #[error("settings: {0}")]
    Settings(#[from] settings::SettingsError),
    #[error("beam: {0}")]
    Beam(#[from] beam::BeamError),
    #[error("aeroelastic gains: {0}")]
    Gains(#[from] gains::GainsError),
    #[error("persisted data: {0}")]
    IO(#[from] io::IOError),
    #[error("Missing {0}")]
    MissingArguments(String),
    #[error("the aeroelastic system has not been assembled")]
    NotAssembled,
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    #[error("invalid reference speed: {0}")]
    Speed(f64),
}
