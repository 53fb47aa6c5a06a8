//! Aeroelastic gains
//!
//! The gains project the structural degrees of freedom onto the aerodynamic lattice and the
//! lattice forces back onto the structure. They also carry the aerodynamic stiffness and damping
//! contributions to the structural equations of motion that result from the linearisation of
//! the reference aerodynamic forces.
//!
//! Structural DOFs are ordered as the 6 DOFs `[δx, δψ]` of each free node followed by the
//! rigid body DOFs (see [`RigidBody`]). Lattice quantities are ordered as the 3 components of
//! each vertex.

use nalgebra as na;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GainsError {
    #[error("vertex #{vertex} refers to the unknown node #{node}")]
    UnknownNode { vertex: usize, node: usize },
    #[error("gain {name}: expected a {expected:?} matrix, found {found:?}")]
    Shape {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
}
type Result<T> = std::result::Result<T, GainsError>;
type Matrix = na::DMatrix<f64>;
type Matrix3 = na::Matrix3<f64>;

/// Source of the aeroelastic gains
pub trait Linearisation: Send + Sync {
    fn gains(&self) -> Result<AeroelasticGains>;
}

/// Aeroelastic gains
#[derive(Debug, Clone, PartialEq)]
pub struct AeroelasticGains {
    /// structural displacements to lattice displacements
    pub kdisp: Matrix,
    /// structural velocities to lattice displacements
    pub kdisp_vel: Matrix,
    /// structural displacements to lattice velocities
    pub kvel_disp: Matrix,
    /// structural velocities to lattice velocities
    pub kvel_vel: Matrix,
    /// lattice forces to structural forces
    pub kforces: Matrix,
    /// aerodynamic stiffness of the flexible DOFs
    pub kss: Matrix,
    /// aerodynamic stiffness of the rigid body DOFs w.r.t. the flexible DOFs
    pub krs: Matrix,
    /// aerodynamic damping of the flexible DOFs w.r.t. the rigid body DOFs
    pub csr: Matrix,
    /// aerodynamic damping of the rigid body DOFs w.r.t. the flexible DOFs
    pub crs: Matrix,
    /// aerodynamic damping of the rigid body DOFs
    pub crr: Matrix,
    pub num_dof_flex: usize,
    pub num_dof_rig: usize,
}
impl AeroelasticGains {
    /// Gains with all entries set to zero
    ///
    /// `n_forces` is the number of aerodynamic outputs mapped by `kforces`
    pub fn zeroed(n_zeta: usize, num_dof_flex: usize, num_dof_rig: usize, n_forces: usize) -> Self {
        let num_dof = num_dof_flex + num_dof_rig;
        Self {
            kdisp: Matrix::zeros(n_zeta, num_dof),
            kdisp_vel: Matrix::zeros(n_zeta, num_dof),
            kvel_disp: Matrix::zeros(n_zeta, num_dof),
            kvel_vel: Matrix::zeros(n_zeta, num_dof),
            kforces: Matrix::zeros(num_dof, n_forces),
            kss: Matrix::zeros(num_dof_flex, num_dof_flex),
            krs: Matrix::zeros(num_dof_rig, num_dof_flex),
            csr: Matrix::zeros(num_dof_flex, num_dof_rig),
            crs: Matrix::zeros(num_dof_rig, num_dof_flex),
            crr: Matrix::zeros(num_dof_rig, num_dof_rig),
            num_dof_flex,
            num_dof_rig,
        }
    }
    pub fn num_dof(&self) -> usize {
        self.num_dof_flex + self.num_dof_rig
    }
    /// Number of lattice displacement components
    pub fn n_zeta(&self) -> usize {
        self.kdisp.nrows()
    }
    /// Gains with their names
    pub fn named(&self) -> Vec<(&'static str, &Matrix)> {
        vec![
            ("Kdisp", &self.kdisp),
            ("Kdisp_vel", &self.kdisp_vel),
            ("Kvel_disp", &self.kvel_disp),
            ("Kvel_vel", &self.kvel_vel),
            ("Kforces", &self.kforces),
            ("Kss", &self.kss),
            ("Krs", &self.krs),
            ("Csr", &self.csr),
            ("Crs", &self.crs),
            ("Crr", &self.crr),
        ]
    }
    /// Checks the shape of every gain
    pub fn validate(&self) -> Result<()> {
        let (flex, rig) = (self.num_dof_flex, self.num_dof_rig);
        let num_dof = self.num_dof();
        let n_zeta = self.n_zeta();
        let expected = [
            (n_zeta, num_dof),
            (n_zeta, num_dof),
            (n_zeta, num_dof),
            (n_zeta, num_dof),
            (num_dof, self.kforces.ncols()),
            (flex, flex),
            (rig, flex),
            (flex, rig),
            (rig, flex),
            (rig, rig),
        ];
        for ((name, gain), expected) in self.named().into_iter().zip(expected) {
            if gain.shape() != expected {
                return Err(GainsError::Shape {
                    name: name.to_owned(),
                    expected,
                    found: gain.shape(),
                });
            }
        }
        Ok(())
    }
    /// Aerodynamic contribution to the structural stiffness matrix
    pub fn stiffness(&self) -> Matrix {
        let (flex, rig) = (self.num_dof_flex, self.num_dof_rig);
        let mut k = Matrix::zeros(flex + rig, flex + rig);
        k.view_mut((0, 0), (flex, flex)).copy_from(&self.kss);
        k.view_mut((flex, 0), (rig, flex)).copy_from(&self.krs);
        k
    }
    /// Aerodynamic contribution to the structural damping matrix
    pub fn damping(&self) -> Matrix {
        let (flex, rig) = (self.num_dof_flex, self.num_dof_rig);
        let mut c = Matrix::zeros(flex + rig, flex + rig);
        c.view_mut((0, flex), (flex, rig)).copy_from(&self.csr);
        c.view_mut((flex, 0), (rig, flex)).copy_from(&self.crs);
        c.view_mut((flex, flex), (rig, rig)).copy_from(&self.crr);
        c
    }
}
impl Linearisation for AeroelasticGains {
    fn gains(&self) -> Result<AeroelasticGains> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// Structural node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// position in the body frame
    pub position: [f64; 3],
    /// a clamped node has no degree of freedom
    #[serde(default)]
    pub clamped: bool,
}

/// Aerodynamic lattice vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// index of the structural node the vertex is attached to
    pub node: usize,
    /// position in the body frame
    pub position: [f64; 3],
    /// reference aerodynamic force
    pub force: [f64; 3],
}

/// Rigid body degrees of freedom
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RigidBody {
    /// no rigid body motion
    #[default]
    Clamped,
    /// linear and angular velocities
    Free,
    /// linear and angular velocities and attitude
    FreeWithAttitude,
}
impl RigidBody {
    pub fn num_dof(&self) -> usize {
        match self {
            RigidBody::Clamped => 0,
            RigidBody::Free => 6,
            RigidBody::FreeWithAttitude => 9,
        }
    }
}

/// Reference state of the aeroelastic system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceState {
    pub nodes: Vec<Node>,
    pub vertices: Vec<Vertex>,
    /// angular velocity of the body frame
    #[serde(default)]
    pub omega: [f64; 3],
    #[serde(default)]
    pub rigid: RigidBody,
}

fn cross(v: &[f64; 3]) -> Matrix3 {
    na::Vector3::from(*v).cross_matrix()
}

fn add_block(m: &mut Matrix, i: usize, j: usize, block: &Matrix3) {
    let mut view = m.fixed_view_mut::<3, 3>(i, j);
    view += block;
}

impl ReferenceState {
    /// First DOF index of each node, `None` for clamped nodes
    fn dof_offsets(&self) -> (Vec<Option<usize>>, usize) {
        let mut count = 0;
        let offsets = self
            .nodes
            .iter()
            .map(|node| {
                if node.clamped {
                    None
                } else {
                    count += 6;
                    Some(count - 6)
                }
            })
            .collect();
        (offsets, count)
    }
}

impl Linearisation for ReferenceState {
    fn gains(&self) -> Result<AeroelasticGains> {
        let (offsets, flex) = self.dof_offsets();
        let rig = self.rigid.num_dof();
        let n_zeta = 3 * self.vertices.len();
        let mut gains = AeroelasticGains::zeroed(n_zeta, flex, rig, n_zeta);
        let eye = Matrix3::identity();
        let omega = cross(&self.omega);
        // first attitude column of the rigid partition
        let attitude = (self.rigid == RigidBody::FreeWithAttitude).then_some(6);

        for (k, vertex) in self.vertices.iter().enumerate() {
            let node = self.nodes.get(vertex.node).ok_or(GainsError::UnknownNode {
                vertex: k,
                node: vertex.node,
            })?;
            let iz = 3 * k;
            let r = [
                vertex.position[0] - node.position[0],
                vertex.position[1] - node.position[1],
                vertex.position[2] - node.position[2],
            ];
            let r_x = cross(&r);
            let zeta_x = cross(&vertex.position);
            let f_x = cross(&vertex.force);

            if let Some(i) = offsets[vertex.node] {
                add_block(&mut gains.kdisp, iz, i, &eye);
                add_block(&mut gains.kdisp, iz, i + 3, &(-r_x));
                add_block(&mut gains.kvel_vel, iz, i, &eye);
                add_block(&mut gains.kvel_vel, iz, i + 3, &(-r_x));
                add_block(&mut gains.kvel_disp, iz, i, &omega);
                add_block(&mut gains.kvel_disp, iz, i + 3, &(-omega * r_x));
                add_block(&mut gains.kforces, i, iz, &eye);
                add_block(&mut gains.kforces, i + 3, iz, &r_x);
                // follower forces
                add_block(&mut gains.kss, i, i + 3, &f_x);
                add_block(&mut gains.kss, i + 3, i + 3, &(r_x * f_x - f_x * r_x));
                if rig > 0 {
                    add_block(&mut gains.krs, 0, i + 3, &f_x);
                    add_block(&mut gains.krs, 3, i, &f_x);
                    add_block(&mut gains.krs, 3, i + 3, &(zeta_x * f_x - f_x * r_x));
                }
                if let Some(j) = attitude {
                    add_block(&mut gains.csr, i, j, &(-f_x));
                    add_block(&mut gains.csr, i + 3, j, &(-r_x * f_x));
                }
            }
            if rig > 0 {
                add_block(&mut gains.kvel_vel, iz, flex, &eye);
                add_block(&mut gains.kvel_vel, iz, flex + 3, &(-zeta_x));
                add_block(&mut gains.kforces, flex, iz, &eye);
                add_block(&mut gains.kforces, flex + 3, iz, &zeta_x);
            }
            if let Some(j) = attitude {
                add_block(&mut gains.crr, 0, j, &(-f_x));
                add_block(&mut gains.crr, 3, j, &(-zeta_x * f_x));
            }
        }
        log::info!(
            "Aeroelastic gains: {} lattice components, {} flexible DOFs, {} rigid DOFs",
            n_zeta,
            flex,
            rig
        );
        Ok(gains)
    }
}
