//! Bilinear (Tustin) discretisation
//!
//! ```math
//! A_d = \left(I - {\tau\over 2}A\right)^{-1}\left(I + {\tau\over 2}A\right),\quad
//! B_d = \left(I - {\tau\over 2}A\right)^{-1} B\tau
//! ```
//! ```math
//! C_d = C\left(I - {\tau\over 2}A\right)^{-1},\quad
//! D_d = D + {1\over 2} C B_d
//! ```

use super::{Discretisation, Matrix, Result, StateSpace, StateSpaceError};

/// Tustin discretisation
#[derive(Debug, Clone, Copy, Default)]
pub struct Bilinear;

impl Discretisation for Bilinear {
    fn discretise(ss: &StateSpace, dt: f64) -> Result<StateSpace> {
        let n = ss.n_states();
        let i = Matrix::identity(n, n);
        let half = ss.a() * (0.5 * dt);
        let ima_inv = (&i - &half).try_inverse().ok_or_else(|| {
            StateSpaceError::Singular("bilinear transform (I - A dt/2)".to_owned())
        })?;
        let ad = &ima_inv * (&i + &half);
        let bd = &ima_inv * ss.b() * dt;
        let cd = ss.c() * &ima_inv;
        let dd = ss.d() + ss.c() * &bd * 0.5;
        StateSpace::discrete(ad, bd, cd, dd, dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_order_lag() {
        let ss = StateSpace::continuous(
            Matrix::from_element(1, 1, -2.),
            Matrix::from_element(1, 1, 1.),
            Matrix::from_element(1, 1, 3.),
            Matrix::zeros(1, 1),
        )
        .unwrap();
        let tau = 0.1;
        let ssd = ss.discretise::<Bilinear>(tau).unwrap();
        assert_relative_eq!(ssd.a()[(0, 0)], (1. - 0.1) / (1. + 0.1), epsilon = 1e-12);
        assert_relative_eq!(ssd.b()[(0, 0)], tau / 1.1, epsilon = 1e-12);
        assert_relative_eq!(ss.dc_gain().unwrap(), ssd.dc_gain().unwrap(), epsilon = 1e-10);
    }

    #[test]
    fn singular_transform() {
        let ss = StateSpace::continuous(
            Matrix::from_element(1, 1, 20.),
            Matrix::from_element(1, 1, 1.),
            Matrix::from_element(1, 1, 1.),
            Matrix::zeros(1, 1),
        )
        .unwrap();
        assert!(matches!(
            ss.discretise::<Bilinear>(0.1),
            Err(StateSpaceError::Singular(_))
        ));
    }
}
