//! Assembler configuration
//!
//! The settings are read from a pickle dictionary with the layout
//! ```text
//! {
//!   "aero_settings": {"scaling": {"length": .., "speed": .., "density": ..}, "rom": {"tolerance": .., "order": ..}},
//!   "beam_settings": {"modal_projection": .., "inout_coords": "Nodes"|"Modes", "num_modes": .., "discretisation": "Exponential"|"Bilinear"},
//!   "uvlm_filename": ..,
//!   "rigid_time_scaling": "Warn"|"Reject"
//! }
//! ```
//! Unknown keys are rejected, `aero_settings` and `beam_settings` are mandatory.

use crate::scaling::ScalingFactors;
use serde::{Deserialize, Serialize};
use serde_pickle as pkl;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings file not found")]
    FileNotFound(#[from] std::io::Error),
    #[error("pickle reader failed")]
    PickleRead(#[from] pkl::Error),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}
type Result<T> = std::result::Result<T, SettingsError>;

fn invalid(key: &str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key: key.to_owned(),
        reason: reason.to_owned(),
    }
}

fn one() -> f64 {
    1f64
}
fn default_tolerance() -> f64 {
    1e-8
}

/// Aerodynamic reference quantities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalingSettings {
    #[serde(default = "one")]
    pub length: f64,
    #[serde(default = "one")]
    pub speed: f64,
    #[serde(default = "one")]
    pub density: f64,
}
impl Default for ScalingSettings {
    fn default() -> Self {
        Self {
            length: 1f64,
            speed: 1f64,
            density: 1f64,
        }
    }
}
impl From<ScalingSettings> for ScalingFactors {
    fn from(s: ScalingSettings) -> Self {
        ScalingFactors::new(s.length, s.speed, s.density)
    }
}

/// Balanced truncation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RomSettings {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub order: Option<usize>,
}
impl Default for RomSettings {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            order: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AeroSettings {
    #[serde(default)]
    pub scaling: ScalingSettings,
    #[serde(default)]
    pub rom: Option<RomSettings>,
}

/// Coordinates of the beam inputs and outputs seen by the aerodynamics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coordinates {
    #[default]
    Nodes,
    Modes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscretisationMethod {
    #[default]
    Exponential,
    Bilinear,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BeamSettings {
    #[serde(default)]
    pub modal_projection: bool,
    #[serde(default)]
    pub inout_coords: Coordinates,
    /// Number of modes kept, all of them if `None`
    #[serde(default)]
    pub num_modes: Option<usize>,
    #[serde(default)]
    pub discretisation: DiscretisationMethod,
}

/// What to do with rigid body degrees of freedom in a non-unit time scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RigidTimeScaling {
    /// assemble and return an advisory
    #[default]
    Warn,
    /// refuse to assemble
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub aero_settings: AeroSettings,
    pub beam_settings: BeamSettings,
    /// Aerodynamic state space file, replaces the in-memory model and skips the projection
    #[serde(default)]
    pub uvlm_filename: Option<PathBuf>,
    #[serde(default)]
    pub rigid_time_scaling: RigidTimeScaling,
}
impl Settings {
    /// Reads and validates the settings from a pickle file
    pub fn from_pickle<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        let r = BufReader::new(f);
        let v: pkl::Value = pkl::from_reader(r, pkl::DeOptions::new())?;
        let settings: Settings = pkl::from_value(v)?;
        settings.validate()?;
        Ok(settings)
    }
    /// Checks the consistency of the settings
    pub fn validate(&self) -> Result<()> {
        if !self.scaling().is_valid() {
            let s = &self.aero_settings.scaling;
            return Err(invalid(
                "aero_settings.scaling",
                &format!(
                    "length={}, speed={} and density={} must be strictly positive",
                    s.length, s.speed, s.density
                ),
            ));
        }
        if let Some(rom) = &self.aero_settings.rom {
            if !(rom.tolerance.is_finite() && rom.tolerance > 0f64) {
                return Err(invalid(
                    "aero_settings.rom.tolerance",
                    "must be strictly positive",
                ));
            }
        }
        let beam = &self.beam_settings;
        if beam.inout_coords == Coordinates::Modes && !beam.modal_projection {
            return Err(invalid(
                "beam_settings.inout_coords",
                "modal coordinates require modal_projection",
            ));
        }
        if beam.num_modes == Some(0) {
            return Err(invalid("beam_settings.num_modes", "at least 1 mode"));
        }
        Ok(())
    }
    /// Scaling factors at the reference speed
    pub fn scaling(&self) -> ScalingFactors {
        self.aero_settings.scaling.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct WithExtraKey {
        aero_settings: AeroSettings,
        beam_settings: BeamSettings,
        gust: bool,
    }

    #[derive(Serialize)]
    struct WithoutBeam {
        aero_settings: AeroSettings,
    }

    #[test]
    fn pickle_round_trip() {
        let mut settings = Settings::default();
        settings.aero_settings.scaling.speed = 25.;
        settings.beam_settings.modal_projection = true;
        settings.beam_settings.inout_coords = Coordinates::Modes;
        settings.beam_settings.num_modes = Some(4);
        settings.rigid_time_scaling = RigidTimeScaling::Reject;
        let bytes = pkl::to_vec(&settings, pkl::SerOptions::new()).unwrap();
        let copy: Settings = pkl::from_slice(&bytes, pkl::DeOptions::new()).unwrap();
        assert_eq!(settings, copy);
        assert!(copy.validate().is_ok());
    }

    #[test]
    fn defaults_fill_partial_blocks() {
        let mut aero = BTreeMap::new();
        aero.insert("scaling".to_owned(), BTreeMap::from([("length".to_owned(), 2f64)]));
        #[derive(Serialize)]
        struct Partial {
            aero_settings: BTreeMap<String, BTreeMap<String, f64>>,
            beam_settings: BTreeMap<String, bool>,
        }
        let partial = Partial {
            aero_settings: aero,
            beam_settings: BTreeMap::new(),
        };
        let bytes = pkl::to_vec(&partial, pkl::SerOptions::new()).unwrap();
        let settings: Settings = pkl::from_slice(&bytes, pkl::DeOptions::new()).unwrap();
        assert_eq!(settings.aero_settings.scaling.length, 2.);
        assert_eq!(settings.aero_settings.scaling.speed, 1.);
        assert_eq!(settings.beam_settings, BeamSettings::default());
        assert_eq!(settings.rigid_time_scaling, RigidTimeScaling::Warn);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let extra = WithExtraKey {
            aero_settings: AeroSettings::default(),
            beam_settings: BeamSettings::default(),
            gust: true,
        };
        let bytes = pkl::to_vec(&extra, pkl::SerOptions::new()).unwrap();
        assert!(pkl::from_slice::<Settings>(&bytes, pkl::DeOptions::new()).is_err());
    }

    #[test]
    fn missing_block_is_rejected() {
        let partial = WithoutBeam {
            aero_settings: AeroSettings::default(),
        };
        let bytes = pkl::to_vec(&partial, pkl::SerOptions::new()).unwrap();
        assert!(pkl::from_slice::<Settings>(&bytes, pkl::DeOptions::new()).is_err());
    }

    #[test]
    fn validation() {
        let mut settings = Settings::default();
        settings.aero_settings.scaling.density = 0.;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { .. })
        ));
        let mut settings = Settings::default();
        settings.aero_settings.scaling.speed = f64::NAN;
        match settings.validate() {
            Err(SettingsError::Invalid { key, .. }) => assert_eq!(key, "aero_settings.scaling"),
            other => panic!("unexpected {:?}", other),
        }
        let mut settings = Settings::default();
        settings.beam_settings.inout_coords = Coordinates::Modes;
        assert!(settings.validate().is_err());
        let mut settings = Settings::default();
        settings.beam_settings.num_modes = Some(0);
        assert!(settings.validate().is_err());
        let mut settings = Settings::default();
        settings.aero_settings.rom = Some(RomSettings {
            tolerance: -1.,
            order: None,
        });
        assert!(settings.validate().is_err());
    }

    #[test]
    fn from_pickle_file() {
        let settings = Settings::default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        pkl::to_writer(&mut file, &settings, pkl::SerOptions::new()).unwrap();
        let copy = Settings::from_pickle(file.path()).unwrap();
        assert_eq!(settings, copy);
        assert!(matches!(
            Settings::from_pickle("no/such/settings.pkl"),
            Err(SettingsError::FileNotFound(_))
        ));
    }
}
