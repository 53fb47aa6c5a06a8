//! Model order reduction
//!
//! [`BalancedTruncation`] computes the controllability and observability Gramians of a stable
//! discrete model, balances the realisation with the square root method and truncates the states
//! with the smallest Hankel singular values.

use super::{Matrix, Result, StateSpace, StateSpaceError};
use crate::settings::RomSettings;
use nalgebra as na;

/// Reduced order model algorithm
///
/// The reduced model must keep the inputs and outputs of the full model.
pub trait Reduction: Send + Sync {
    fn run(&self, ss: &StateSpace) -> Result<StateSpace>;
}

const MAX_DOUBLING: usize = 64;

/// Square root balanced truncation
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedTruncation {
    /// Hankel singular values below `tolerance` times the largest one are discarded
    pub tolerance: f64,
    /// Number of states to keep, takes precedence over the tolerance
    pub order: Option<usize>,
}
impl Default for BalancedTruncation {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            order: None,
        }
    }
}
impl From<&RomSettings> for BalancedTruncation {
    fn from(settings: &RomSettings) -> Self {
        Self {
            tolerance: settings.tolerance,
            order: settings.order,
        }
    }
}

/// Solves the discrete Lyapunov equation $`X = A X A^T + Q`$ by Smith doubling
fn gramian(a: &Matrix, q: Matrix) -> Result<Matrix> {
    let mut x = q;
    let mut ak = a.clone();
    for _ in 0..MAX_DOUBLING {
        let dx = &ak * &x * ak.transpose();
        x += &dx;
        if dx.norm() <= f64::EPSILON * x.norm() {
            return Ok((&x + x.transpose()) * 0.5);
        }
        ak = &ak * &ak;
    }
    Err(StateSpaceError::Reduction(
        "Gramian iterations did not converge".to_owned(),
    ))
}

/// Returns `L` such as $`X = L L^T`$ for a symmetric positive semi-definite `X`
fn square_root(x: Matrix) -> Matrix {
    let eig = x.symmetric_eigen();
    let sqrt = eig.eigenvalues.map(|l| l.max(0f64).sqrt());
    eig.eigenvectors * Matrix::from_diagonal(&sqrt)
}

struct Balancing {
    lc: Matrix,
    lo: Matrix,
    u: Matrix,
    v: Matrix,
    /// singular values and their indices, largest first
    sigma: Vec<(usize, f64)>,
}

impl BalancedTruncation {
    pub fn new(tolerance: f64, order: Option<usize>) -> Self {
        Self { tolerance, order }
    }
    fn balancing(&self, ss: &StateSpace) -> Result<Balancing> {
        if !ss.is_discrete() {
            return Err(StateSpaceError::Continuous("balanced truncation".to_owned()));
        }
        if !ss.is_stable() {
            return Err(StateSpaceError::Reduction(format!(
                "unstable model (spectral radius: {:.6})",
                ss.spectral_radius()
            )));
        }
        let wc = gramian(ss.a(), ss.b() * ss.b().transpose())?;
        let wo = gramian(&ss.a().transpose(), ss.c().transpose() * ss.c())?;
        let lc = square_root(wc);
        let lo = square_root(wo);
        let svd = (lo.transpose() * &lc).svd(true, true);
        let u = svd
            .u
            .ok_or_else(|| StateSpaceError::Reduction("missing left singular vectors".to_owned()))?;
        let v = svd
            .v_t
            .ok_or_else(|| StateSpaceError::Reduction("missing right singular vectors".to_owned()))?
            .transpose();
        let mut sigma: Vec<(usize, f64)> = svd.singular_values.iter().cloned().enumerate().collect();
        sigma.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(Balancing {
            lc,
            lo,
            u,
            v,
            sigma,
        })
    }
    /// Hankel singular values of a stable discrete model, largest first
    pub fn hankel_singular_values(&self, ss: &StateSpace) -> Result<Vec<f64>> {
        if ss.n_states() == 0 {
            return Ok(vec![]);
        }
        Ok(self.balancing(ss)?.sigma.into_iter().map(|(_, s)| s).collect())
    }
}

impl Reduction for BalancedTruncation {
    fn run(&self, ss: &StateSpace) -> Result<StateSpace> {
        if ss.n_states() == 0 {
            return Ok(ss.clone());
        }
        let Balancing {
            lc,
            lo,
            u,
            v,
            sigma,
        } = self.balancing(ss)?;
        let sigma_max = sigma.first().map_or(0f64, |s| s.1);
        let threshold = self.tolerance * sigma_max;
        let kept: Vec<(usize, f64)> = match self.order {
            Some(order) => sigma.into_iter().take(order).filter(|s| s.1 > 0f64).collect(),
            None => sigma.into_iter().filter(|s| s.1 > threshold).collect(),
        };
        log::info!(
            "Balanced truncation: {} states kept, smallest Hankel singular value kept: {:e}",
            kept.len(),
            kept.last().map_or(sigma_max, |s| s.1)
        );
        let idx: Vec<usize> = kept.iter().map(|s| s.0).collect();
        let s = Matrix::from_diagonal(&na::DVector::from_iterator(
            kept.len(),
            kept.iter().map(|s| 1f64 / s.1.sqrt()),
        ));
        let t = &lc * v.select_columns(&idx) * &s;
        let ti = &s * u.select_columns(&idx).transpose() * lo.transpose();
        StateSpace::new(
            &ti * ss.a() * &t,
            &ti * ss.b(),
            ss.c() * &t,
            ss.d().clone(),
            ss.dt(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uncontrollable() -> StateSpace {
        StateSpace::discrete(
            Matrix::from_row_slice(2, 2, &[0.5, 0., 0., 0.2]),
            Matrix::from_row_slice(2, 1, &[1., 0.]),
            Matrix::from_row_slice(1, 2, &[1., 1.]),
            Matrix::zeros(1, 1),
            0.1,
        )
        .unwrap()
    }

    #[test]
    fn removes_uncontrollable_state() {
        let ss = uncontrollable();
        let rom = ss.reduce(&BalancedTruncation::default()).unwrap();
        assert_eq!(rom.n_states(), 1);
        assert_eq!(rom.n_inputs(), 1);
        assert_eq!(rom.n_outputs(), 1);
        assert_relative_eq!(rom.dc_gain().unwrap()[(0, 0)], 2., epsilon = 1e-8);
        assert_relative_eq!(rom.a()[(0, 0)], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn hankel_singular_values_are_sorted() {
        let ss = StateSpace::discrete(
            Matrix::from_row_slice(2, 2, &[0.2, 0., 0., 0.9]),
            Matrix::from_row_slice(2, 1, &[1., 1.]),
            Matrix::from_row_slice(1, 2, &[1., 1.]),
            Matrix::zeros(1, 1),
            1.,
        )
        .unwrap();
        let hsv = BalancedTruncation::default()
            .hankel_singular_values(&ss)
            .unwrap();
        assert_eq!(hsv.len(), 2);
        assert!(hsv[0] >= hsv[1]);
        let rom = ss.reduce(&BalancedTruncation::new(0., Some(1))).unwrap();
        assert_eq!(rom.n_states(), 1);
    }

    #[test]
    fn unstable_model_is_rejected() {
        let ss = StateSpace::discrete(
            Matrix::from_element(1, 1, 1.5),
            Matrix::from_element(1, 1, 1.),
            Matrix::from_element(1, 1, 1.),
            Matrix::zeros(1, 1),
            0.1,
        )
        .unwrap();
        assert!(matches!(
            ss.reduce(&BalancedTruncation::default()),
            Err(StateSpaceError::Reduction(_))
        ));
    }
}
