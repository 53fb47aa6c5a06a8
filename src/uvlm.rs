//! Linear unsteady vortex lattice aerodynamic model
//!
//! The aerodynamic inputs are the lattice vertex displacements and velocities (followed by
//! any external input such as gusts) and the outputs are the forces at the lattice vertices.

use crate::{
    scaling::ScalingFactors,
    settings::AeroSettings,
    state_space::{BalancedTruncation, Reduction, StateSpace, StateSpaceError},
};

type Result<T> = std::result::Result<T, StateSpaceError>;

/// Aerodynamic subsystem
pub struct LinearUvlm {
    ss: StateSpace,
    dt: f64,
    scaling: ScalingFactors,
    rom: Option<Box<dyn Reduction>>,
}
impl LinearUvlm {
    /// Wraps a discrete aerodynamic state space model
    ///
    /// A [`BalancedTruncation`] reduction is attached if the settings have a `rom` entry.
    pub fn new(ss: StateSpace, settings: &AeroSettings) -> Result<Self> {
        let dt = ss
            .dt()
            .ok_or_else(|| StateSpaceError::Continuous("the aerodynamic model".to_owned()))?;
        log::info!(
            "UVLM: {} states, {} inputs, {} outputs (dt={:e})",
            ss.n_states(),
            ss.n_inputs(),
            ss.n_outputs(),
            dt
        );
        Ok(Self {
            ss,
            dt,
            scaling: settings.scaling.into(),
            rom: settings
                .rom
                .as_ref()
                .map(|rom| Box::new(BalancedTruncation::from(rom)) as Box<dyn Reduction>),
        })
    }
    /// Replaces the reduced order model algorithm
    pub fn with_rom(self, rom: Box<dyn Reduction>) -> Self {
        Self {
            rom: Some(rom),
            ..self
        }
    }
    pub fn ss(&self) -> &StateSpace {
        &self.ss
    }
    pub fn scaling(&self) -> &ScalingFactors {
        &self.scaling
    }
    pub fn rom(&self) -> Option<&dyn Reduction> {
        self.rom.as_deref()
    }
    /// Aerodynamic time step
    pub fn dt(&self) -> f64 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RomSettings;
    use nalgebra::DMatrix;

    #[test]
    fn continuous_model_is_rejected() {
        let ss = StateSpace::continuous(
            DMatrix::zeros(1, 1),
            DMatrix::zeros(1, 1),
            DMatrix::zeros(1, 1),
            DMatrix::zeros(1, 1),
        )
        .unwrap();
        assert!(LinearUvlm::new(ss, &AeroSettings::default()).is_err());
    }

    #[test]
    fn rom_from_settings() {
        let ss = StateSpace::discrete(
            DMatrix::zeros(1, 1),
            DMatrix::zeros(1, 1),
            DMatrix::zeros(1, 1),
            DMatrix::zeros(1, 1),
            0.5,
        )
        .unwrap();
        let settings = AeroSettings {
            rom: Some(RomSettings::default()),
            ..Default::default()
        };
        let uvlm = LinearUvlm::new(ss, &settings).unwrap();
        assert!(uvlm.rom().is_some());
        assert_eq!(uvlm.dt(), 0.5);
        assert_eq!(uvlm.scaling().time, 1.);
    }
}
