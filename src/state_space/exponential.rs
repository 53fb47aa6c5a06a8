//! Zero order hold discretisation
//!
//! The discrete model is obtained from the matrix exponential of the augmented matrix
//! ```math
//! \exp\left(\begin{bmatrix} A & B \\ 0 & 0 \end{bmatrix}\tau\right) =
//! \begin{bmatrix} A_d & B_d \\ 0 & I \end{bmatrix}
//! ```
//! with $`C_d = C`$ and $`D_d = D`$, $`\tau`$ being the sample time.

use super::{Discretisation, Matrix, Result, StateSpace};

/// Zero order hold discretisation through the matrix exponential
#[derive(Debug, Clone, Copy, Default)]
pub struct Exponential;

impl Discretisation for Exponential {
    fn discretise(ss: &StateSpace, dt: f64) -> Result<StateSpace> {
        let n = ss.n_states();
        let m = ss.n_inputs();
        let mut augmented = Matrix::zeros(n + m, n + m);
        if n > 0 {
            augmented.view_mut((0, 0), (n, n)).copy_from(ss.a());
            if m > 0 {
                augmented.view_mut((0, n), (n, m)).copy_from(ss.b());
            }
        }
        let expm = (augmented * dt).exp();
        let ad = expm.view((0, 0), (n, n)).into_owned();
        let bd = expm.view((0, n), (n, m)).into_owned();
        StateSpace::discrete(ad, bd, ss.c().clone(), ss.d().clone(), dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn harmonic_oscillator() {
        let omega = 2f64;
        let tau = 0.1f64;
        let ss = StateSpace::continuous(
            Matrix::from_row_slice(2, 2, &[0., 1., -omega * omega, 0.]),
            Matrix::from_row_slice(2, 1, &[0., 1.]),
            Matrix::from_row_slice(1, 2, &[1., 0.]),
            Matrix::zeros(1, 1),
        )
        .unwrap();
        let ssd = ss.discretise::<Exponential>(tau).unwrap();
        let (s, c) = (omega * tau).sin_cos();
        assert_relative_eq!(ssd.a()[(0, 0)], c, epsilon = 1e-10);
        assert_relative_eq!(ssd.a()[(0, 1)], s / omega, epsilon = 1e-10);
        assert_relative_eq!(ssd.a()[(1, 0)], -omega * s, epsilon = 1e-10);
        assert_relative_eq!(ssd.b()[(0, 0)], (1. - c) / (omega * omega), epsilon = 1e-10);
        assert_relative_eq!(ssd.b()[(1, 0)], s / omega, epsilon = 1e-10);
        assert_eq!(ssd.dt(), Some(tau));
    }

    #[test]
    fn preserves_dc_gain() {
        let ss = StateSpace::continuous(
            Matrix::from_row_slice(2, 2, &[-1., 0.5, 0., -3.]),
            Matrix::from_row_slice(2, 1, &[1., 2.]),
            Matrix::from_row_slice(1, 2, &[1., 1.]),
            Matrix::from_element(1, 1, 0.1),
        )
        .unwrap();
        let ssd = ss.discretise::<Exponential>(0.05).unwrap();
        assert_relative_eq!(ss.dc_gain().unwrap(), ssd.dc_gain().unwrap(), epsilon = 1e-9);
        assert!(ssd.is_stable());
    }

    #[test]
    fn discrete_model_is_rejected() {
        let ss = StateSpace::discrete(
            Matrix::identity(1, 1),
            Matrix::identity(1, 1),
            Matrix::identity(1, 1),
            Matrix::zeros(1, 1),
            0.1,
        )
        .unwrap();
        assert!(ss.discretise::<Exponential>(0.1).is_err());
    }
}
