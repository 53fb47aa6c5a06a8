//! Persisted data
//!
//! The aerodynamic state space model is persisted in a pickle file as nested dictionaries
//! `linear → lsys → LinearAeroelastic → uvlm → ss → {A, B, C, D, dt}` with the matrices written
//! as lists of rows.

use crate::{
    beam::Structure,
    gains::ReferenceState,
    state_space::{StateSpace, StateSpaceError},
};
use nalgebra as na;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_pickle as pkl;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IOError {
    #[error("file not found")]
    FileNotFound(#[from] std::io::Error),
    #[error("pickle reader failed")]
    PickleRead(#[from] pkl::Error),
    #[error("matrix {0} has rows of different lengths")]
    Ragged(String),
    #[error("invalid state space: {0}")]
    StateSpace(#[from] StateSpaceError),
}
type Result<T> = std::result::Result<T, IOError>;
type Matrix = na::DMatrix<f64>;

/// Reads a pickle file into `T`
pub fn read_pickle<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let f = File::open(path)?;
    let r = BufReader::new(f);
    let v: pkl::Value = pkl::from_reader(r, pkl::DeOptions::new())?;
    Ok(pkl::from_value(v)?)
}
/// Writes `value` into a pickle file
pub fn write_pickle<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);
    pkl::to_writer(&mut w, value, pkl::SerOptions::new())?;
    w.flush()?;
    Ok(())
}

/// Converts a list of rows into a matrix, `ncols` is used only if there is no row
pub fn from_rows(name: &str, rows: &[Vec<f64>], ncols: usize) -> Result<Matrix> {
    let ncols = rows.first().map_or(ncols, |row| row.len());
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(IOError::Ragged(name.to_owned()));
    }
    Ok(Matrix::from_row_iterator(
        rows.len(),
        ncols,
        rows.iter().flat_map(|row| row.iter().cloned()),
    ))
}
/// Converts a matrix into a list of rows
pub fn to_rows(matrix: &Matrix) -> Vec<Vec<f64>> {
    matrix
        .row_iter()
        .map(|row| row.iter().cloned().collect())
        .collect()
}

macro_rules! key_path {
    ($($name:ident, $key:literal, $inner:ty),+) => {
        $(
        #[derive(Serialize, Deserialize)]
        struct $name {
            #[serde(rename = $key)]
            inner: $inner,
        }
        )+
    };
}
key_path!(
    Root,
    "linear",
    Linear,
    Linear,
    "lsys",
    LinearSystems,
    LinearSystems,
    "LinearAeroelastic",
    Aeroelastic,
    Aeroelastic,
    "uvlm",
    Uvlm,
    Uvlm,
    "ss",
    PersistedStateSpace
);

/// State space model as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedStateSpace {
    #[serde(rename = "A")]
    pub a: Vec<Vec<f64>>,
    #[serde(rename = "B")]
    pub b: Vec<Vec<f64>>,
    #[serde(rename = "C")]
    pub c: Vec<Vec<f64>>,
    #[serde(rename = "D")]
    pub d: Vec<Vec<f64>>,
    pub dt: f64,
}
impl TryFrom<PersistedStateSpace> for StateSpace {
    type Error = IOError;
    fn try_from(ss: PersistedStateSpace) -> Result<Self> {
        let a = from_rows("A", &ss.a, 0)?;
        let c = from_rows("C", &ss.c, a.nrows())?;
        let d = from_rows("D", &ss.d, ss.b.first().map_or(0, |row| row.len()))?;
        let b = from_rows("B", &ss.b, d.ncols())?;
        Ok(StateSpace::discrete(a, b, c, d, ss.dt)?)
    }
}
impl TryFrom<&StateSpace> for PersistedStateSpace {
    type Error = IOError;
    fn try_from(ss: &StateSpace) -> Result<Self> {
        let dt = ss
            .dt()
            .ok_or_else(|| StateSpaceError::Continuous("persisted state space".to_owned()))?;
        Ok(Self {
            a: to_rows(ss.a()),
            b: to_rows(ss.b()),
            c: to_rows(ss.c()),
            d: to_rows(ss.d()),
            dt,
        })
    }
}

/// Loads the aerodynamic state space model
pub fn load_state_space<P: AsRef<Path>>(path: P) -> Result<StateSpace> {
    log::info!("Loading state space model from {:?}", path.as_ref());
    let root: Root = read_pickle(path)?;
    root.inner.inner.inner.inner.inner.try_into()
}
/// Saves the aerodynamic state space model
pub fn save_state_space<P: AsRef<Path>>(ss: &StateSpace, path: P) -> Result<()> {
    log::info!("Saving state space model to {:?}", path.as_ref());
    let root = Root {
        inner: Linear {
            inner: LinearSystems {
                inner: Aeroelastic {
                    inner: Uvlm {
                        inner: PersistedStateSpace::try_from(ss)?,
                    },
                },
            },
        },
    };
    write_pickle(&root, path)
}

/// Structural matrices as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedStructure {
    pub mass: Vec<Vec<f64>>,
    pub damping: Vec<Vec<f64>>,
    pub stiffness: Vec<Vec<f64>>,
    #[serde(default)]
    pub modes: Option<Vec<Vec<f64>>>,
}
impl TryFrom<PersistedStructure> for Structure {
    type Error = IOError;
    fn try_from(s: PersistedStructure) -> Result<Self> {
        let n = s.mass.len();
        let structure = Structure::new(
            from_rows("mass", &s.mass, n)?,
            from_rows("damping", &s.damping, n)?,
            from_rows("stiffness", &s.stiffness, n)?,
        );
        Ok(match s.modes {
            Some(modes) => structure.with_modes(from_rows("modes", &modes, 0)?),
            None => structure,
        })
    }
}
impl From<&Structure> for PersistedStructure {
    fn from(s: &Structure) -> Self {
        Self {
            mass: to_rows(&s.mass),
            damping: to_rows(&s.damping),
            stiffness: to_rows(&s.stiffness),
            modes: s.modes.as_ref().map(to_rows),
        }
    }
}

/// Loads the beam structural matrices
pub fn load_structure<P: AsRef<Path>>(path: P) -> Result<Structure> {
    read_pickle::<PersistedStructure, P>(path)?.try_into()
}
/// Loads the aeroelastic reference state
pub fn load_reference_state<P: AsRef<Path>>(path: P) -> Result<ReferenceState> {
    read_pickle(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn model() -> StateSpace {
        StateSpace::discrete(
            Matrix::from_row_slice(2, 2, &[0.5, 0.1, 0., 0.2]),
            Matrix::from_row_slice(2, 3, &[1., 0., 2., 0., 1., 0.]),
            Matrix::from_row_slice(1, 2, &[1., -1.]),
            Matrix::from_row_slice(1, 3, &[0., 0.5, 0.]),
            0.025,
        )
        .unwrap()
    }

    #[test]
    fn state_space_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uvlm.pkl");
        let ss = model();
        save_state_space(&ss, &path).unwrap();
        let copy = load_state_space(&path).unwrap();
        assert_eq!(ss, copy);
    }

    #[test]
    fn static_model_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("static.pkl");
        let ss = StateSpace::discrete(
            Matrix::zeros(0, 0),
            Matrix::zeros(0, 2),
            Matrix::zeros(3, 0),
            Matrix::from_element(3, 2, 1.5),
            1.,
        )
        .unwrap();
        save_state_space(&ss, &path).unwrap();
        let copy = load_state_space(&path).unwrap();
        assert_eq!(copy.n_inputs(), 2);
        assert_eq!(copy.n_outputs(), 3);
        assert_eq!(copy.n_states(), 0);
    }

    #[test]
    fn missing_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incomplete.pkl");
        let mut ss = BTreeMap::new();
        for key in ["A", "B", "C", "D"] {
            ss.insert(key.to_owned(), vec![vec![1f64]]);
        }
        let nested = BTreeMap::from([(
            "linear",
            BTreeMap::from([(
                "lsys",
                BTreeMap::from([("LinearAeroelastic", BTreeMap::from([("uvlm", BTreeMap::from([("ss", ss)]))]))]),
            )]),
        )]);
        write_pickle(&nested, &path).unwrap();
        assert!(matches!(
            load_state_space(&path),
            Err(IOError::PickleRead(_))
        ));
        assert!(matches!(
            load_state_space(dir.path().join("none.pkl")),
            Err(IOError::FileNotFound(_))
        ));
    }

    #[test]
    fn ragged_rows() {
        assert!(matches!(
            from_rows("A", &[vec![1., 2.], vec![3.]], 0),
            Err(IOError::Ragged(_))
        ));
        let m = from_rows("A", &[vec![1., 2.], vec![3., 4.]], 0).unwrap();
        assert_eq!(m[(1, 0)], 3.);
        assert_eq!(to_rows(&m), vec![vec![1., 2.], vec![3., 4.]]);
    }

    #[test]
    fn inconsistent_shapes() {
        let ss = PersistedStateSpace {
            a: vec![vec![1.]],
            b: vec![vec![1.], vec![1.]],
            c: vec![vec![1.]],
            d: vec![vec![0.]],
            dt: 0.1,
        };
        assert!(matches!(
            StateSpace::try_from(ss),
            Err(IOError::StateSpace(StateSpaceError::Dimension { .. }))
        ));
    }

    #[test]
    fn structure_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beam.pkl");
        let structure = Structure::new(
            Matrix::identity(2, 2),
            Matrix::zeros(2, 2),
            Matrix::from_row_slice(2, 2, &[2., -1., -1., 2.]),
        )
        .with_modes(Matrix::identity(2, 1));
        write_pickle(&PersistedStructure::from(&structure), &path).unwrap();
        assert_eq!(load_structure(&path).unwrap(), structure);
    }
}
